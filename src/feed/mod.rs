mod fetch;
mod rss;

pub use fetch::{fetch_document, FetchError};
pub use rss::{RawDocument, RawItem};
