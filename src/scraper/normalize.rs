use chrono::DateTime;
use thiserror::Error;

use crate::feed::RawItem;
use crate::storage::{FeedSource, NewPost};

/// Errors normalizing one raw item into a post.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// pubDate did not match the RFC 2822 format RSS mandates
    #[error("Unparseable pubDate '{raw}': {source}")]
    BadPubDate {
        raw: String,
        #[source]
        source: chrono::format::ParseError,
    },
}

/// Convert one raw item into a post ready for insertion.
///
/// The pubDate is parsed as RFC 2822 ("Mon, 02 Jan 2006 15:04:05 -0700");
/// a malformed date fails only this item, never its siblings. An empty
/// description is recorded as `None` so the store can tell "omitted" from
/// "present but empty". `created_at` is stamped here, at normalization
/// time.
pub fn normalize_item(source: &FeedSource, item: &RawItem) -> Result<NewPost, NormalizeError> {
    let published_at = DateTime::parse_from_rfc2822(&item.pub_date)
        .map_err(|e| NormalizeError::BadPubDate {
            raw: item.pub_date.clone(),
            source: e,
        })?
        .timestamp();

    let description = if item.description.is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    Ok(NewPost {
        feed_id: source.id,
        title: item.title.clone(),
        url: item.link.clone(),
        description,
        published_at,
        created_at: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source() -> FeedSource {
        FeedSource {
            id: 42,
            title: "Test Feed".to_string(),
            url: "https://example.com/rss".to_string(),
            user_id: None,
            last_fetched_at: None,
            created_at: 0,
        }
    }

    fn test_item(pub_date: &str) -> RawItem {
        RawItem {
            title: "A Post".to_string(),
            link: "https://example.com/a-post".to_string(),
            description: "Some text".to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    #[test]
    fn test_normalize_valid_item() {
        let item = test_item("Mon, 02 Jan 2006 15:04:05 -0700");
        let post = normalize_item(&test_source(), &item).unwrap();

        assert_eq!(post.feed_id, 42);
        assert_eq!(post.title, "A Post");
        assert_eq!(post.url, "https://example.com/a-post");
        assert_eq!(post.description.as_deref(), Some("Some text"));
        assert_eq!(post.published_at, 1136239445);
        assert!(post.created_at > 0);
    }

    #[test]
    fn test_normalize_gmt_pub_date() {
        let item = test_item("Wed, 01 Jan 2020 00:00:00 GMT");
        let post = normalize_item(&test_source(), &item).unwrap();
        assert_eq!(post.published_at, 1577836800);
    }

    #[test]
    fn test_normalize_rejects_bad_pub_date() {
        for bad in ["", "yesterday", "2020-01-01T00:00:00Z"] {
            let err = normalize_item(&test_source(), &test_item(bad)).unwrap_err();
            let NormalizeError::BadPubDate { raw, .. } = err;
            assert_eq!(raw, bad);
        }
    }

    #[test]
    fn test_normalize_empty_description_becomes_none() {
        let mut item = test_item("Mon, 02 Jan 2006 15:04:05 -0700");
        item.description = String::new();
        let post = normalize_item(&test_source(), &item).unwrap();
        assert!(post.description.is_none());
    }
}
