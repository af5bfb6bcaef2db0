use std::time::Duration;

use crate::feed::{self, FetchError};
use crate::storage::{Database, FeedSource};

use super::normalize::normalize_item;

/// Counts from processing one claimed source for one cycle.
///
/// Every outcome — full success, partial, or nothing fetched — completes
/// identically; the scheduler never branches on these numbers, they exist
/// for the cycle summary log and for tests.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub feed_id: i64,
    /// Items present in the fetched document
    pub fetched: usize,
    /// Posts newly persisted
    pub inserted: usize,
    /// Items already in the store (dedup no-op)
    pub duplicates: usize,
    /// Items dropped for an unparseable pubDate
    pub skipped: usize,
    /// Items whose insert failed at the store
    pub failed: usize,
}

/// Process one claimed feed source end to end: fetch, normalize, persist.
///
/// The source was already claimed by the scheduler, so every early return
/// here still consumed this cycle's slot — an empty-URL source or a dead
/// host only becomes due again once it rotates back through the
/// least-recently-fetched ordering.
pub async fn scrape_feed(
    db: &Database,
    client: &reqwest::Client,
    source: &FeedSource,
    timeout: Duration,
) -> ScrapeOutcome {
    let mut outcome = ScrapeOutcome {
        feed_id: source.id,
        ..Default::default()
    };

    if source.url.is_empty() {
        tracing::warn!(feed_id = source.id, "Feed URL is empty, skipping");
        return outcome;
    }

    tracing::debug!(feed_id = source.id, url = %source.url, "Scraping feed");

    let document = match feed::fetch_document(client, &source.url, timeout).await {
        Ok(doc) => doc,
        Err(e @ FetchError::Decode(_)) => {
            tracing::warn!(feed_id = source.id, url = %source.url, error = %e, "Feed document failed to decode");
            return outcome;
        }
        Err(e) => {
            tracing::warn!(feed_id = source.id, url = %source.url, error = %e, "Failed to fetch feed");
            return outcome;
        }
    };

    outcome.fetched = document.items.len();
    tracing::debug!(feed_id = source.id, items = outcome.fetched, "Fetched feed document");

    for item in &document.items {
        tracing::debug!(feed_id = source.id, title = %item.title, link = %item.link, "Item");

        let post = match normalize_item(source, item) {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(feed_id = source.id, error = %e, "Skipping item");
                outcome.skipped += 1;
                continue;
            }
        };

        // One failed insert never aborts the remaining items
        match db.insert_post(&post).await {
            Ok(true) => outcome.inserted += 1,
            Ok(false) => outcome.duplicates += 1,
            Err(e) => {
                tracing::warn!(feed_id = source.id, url = %post.url, error = %e, "Failed to persist post");
                outcome.failed += 1;
            }
        }
    }

    tracing::info!(
        feed_id = source.id,
        url = %source.url,
        fetched = outcome.fetched,
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        skipped = outcome.skipped,
        "Finished scraping feed"
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn source_for(db: &Database, url: &str) -> FeedSource {
        let id = db.insert_source(url, "Test Feed", None).await.unwrap();
        db.get_source(id).await.unwrap().unwrap()
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    const MIXED_DATES_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mixed</title>
    <item><title>Good 1</title><link>https://example.com/1</link>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate></item>
    <item><title>Bad</title><link>https://example.com/2</link>
        <pubDate>not a date</pubDate></item>
    <item><title>Good 2</title><link>https://example.com/3</link>
        <pubDate>Tue, 03 Jan 2006 15:04:05 -0700</pubDate></item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_bad_dates_skip_item_not_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MIXED_DATES_RSS))
            .mount(&server)
            .await;

        let db = test_db().await;
        let source = source_for(&db, &format!("{}/feed", server.uri())).await;

        let outcome = scrape_feed(&db, &reqwest::Client::new(), &source, timeout()).await;
        assert_eq!(outcome.fetched, 3);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 0);

        let posts = db.posts_for_feed(source.id, 10).await.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_url_source_makes_no_request() {
        let db = test_db().await;
        let source = source_for(&db, "").await;

        let outcome = scrape_feed(&db, &reqwest::Client::new(), &source, timeout()).await;
        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.inserted, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_zero_posts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let db = test_db().await;
        let source = source_for(&db, &format!("{}/feed", server.uri())).await;

        let outcome = scrape_feed(&db, &reqwest::Client::new(), &source, timeout()).await;
        assert_eq!(outcome.fetched, 0);
        assert!(db.posts_for_feed(source.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rescrape_counts_duplicates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MIXED_DATES_RSS))
            .mount(&server)
            .await;

        let db = test_db().await;
        let source = source_for(&db, &format!("{}/feed", server.uri())).await;
        let client = reqwest::Client::new();

        let first = scrape_feed(&db, &client, &source, timeout()).await;
        assert_eq!(first.inserted, 2);

        let second = scrape_feed(&db, &client, &source, timeout()).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);

        let posts = db.posts_for_feed(source.id, 10).await.unwrap();
        assert_eq!(posts.len(), 2, "re-ingestion must not duplicate posts");
    }
}
