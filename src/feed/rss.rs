//! RSS 2.0 wire format.
//!
//! Decodes the fetched XML into [`RawDocument`] without interpreting any of
//! it: `pub_date` stays the string the publisher sent, and missing child
//! elements become empty strings the way lenient feed consumers expect.
//! Interpretation (date parsing, empty-description handling) happens in the
//! scraper's normalize step.

use serde::Deserialize;

/// Transient structured form of one fetched feed document.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RawItem>,
}

/// One `<item>` element, as received.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "pubDate")]
    pub pub_date: String,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "item")]
    items: Vec<RawItem>,
}

/// Decode an RSS document from its XML bytes.
pub fn decode(bytes: &[u8]) -> Result<RawDocument, quick_xml::DeError> {
    let text = String::from_utf8_lossy(bytes);
    let rss: Rss = quick_xml::de::from_str(&text)?;
    Ok(RawDocument {
        title: rss.channel.title,
        link: rss.channel.link,
        description: rss.channel.description,
        items: rss.channel.items,
    })
}
