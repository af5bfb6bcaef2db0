pub mod config;
pub mod feed;
pub mod scraper;
pub mod storage;
