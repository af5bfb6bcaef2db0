use super::schema::Database;
use super::types::{DatabaseError, FeedSource};

impl Database {
    // ========================================================================
    // Feed Source Operations
    // ========================================================================

    /// Register a feed source, or update its title if the URL already exists.
    ///
    /// Returns the source's id. `last_fetched_at` starts as NULL so a new
    /// source is picked up by the very next scrape cycle.
    pub async fn insert_source(
        &self,
        url: &str,
        title: &str,
        user_id: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (title, url, user_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET title = excluded.title
            RETURNING id
        "#,
        )
        .bind(title)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Select up to `limit` sources due for fetching.
    ///
    /// Never-fetched sources (NULL `last_fetched_at`) come first, then
    /// least-recently-fetched, with id as a tiebreaker so ordering is
    /// deterministic within one timestamp.
    pub async fn next_due(&self, limit: u32) -> Result<Vec<FeedSource>, DatabaseError> {
        let sources = sqlx::query_as::<_, FeedSource>(
            r#"
            SELECT id, title, url, user_id, last_fetched_at, created_at
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    /// Claim a source by stamping `last_fetched_at` with the current time.
    ///
    /// The claim happens before any network I/O so the next `next_due` call
    /// no longer sees the source as due, even with overlapping schedulers.
    /// max() keeps the timestamp monotonic per source.
    pub async fn claim_source(&self, feed_id: i64) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "UPDATE feeds SET last_fetched_at = max(?, coalesce(last_fetched_at, 0)) WHERE id = ?",
        )
        .bind(now)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a single source by id.
    pub async fn get_source(&self, feed_id: i64) -> Result<Option<FeedSource>, DatabaseError> {
        let source = sqlx::query_as::<_, FeedSource>(
            "SELECT id, title, url, user_id, last_fetched_at, created_at FROM feeds WHERE id = ?",
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    /// Number of registered sources, for startup logging.
    pub async fn count_sources(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_source_returns_id() {
        let db = test_db().await;
        let id = db
            .insert_source("https://example.com/rss", "Example", None)
            .await
            .unwrap();
        assert!(id > 0);

        let source = db.get_source(id).await.unwrap().unwrap();
        assert_eq!(source.url, "https://example.com/rss");
        assert_eq!(source.title, "Example");
        assert!(source.last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_insert_source_upserts_on_duplicate_url() {
        let db = test_db().await;
        let id1 = db
            .insert_source("https://example.com/rss", "Old", None)
            .await
            .unwrap();
        let id2 = db
            .insert_source("https://example.com/rss", "New", Some(7))
            .await
            .unwrap();

        assert_eq!(id1, id2);
        let source = db.get_source(id1).await.unwrap().unwrap();
        assert_eq!(source.title, "New");
        // user_id is set at creation; an upsert does not reassign ownership
        assert_eq!(source.user_id, None);
    }

    #[tokio::test]
    async fn test_next_due_nulls_first() {
        let db = test_db().await;
        let fetched = db
            .insert_source("https://a.example.com/rss", "A", None)
            .await
            .unwrap();
        let never = db
            .insert_source("https://b.example.com/rss", "B", None)
            .await
            .unwrap();
        db.claim_source(fetched).await.unwrap();

        let due = db.next_due(10).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, never, "never-fetched source should come first");
        assert_eq!(due[1].id, fetched);
    }

    #[tokio::test]
    async fn test_next_due_respects_limit() {
        let db = test_db().await;
        for i in 0..5 {
            db.insert_source(&format!("https://feed{}.example.com/rss", i), "F", None)
                .await
                .unwrap();
        }

        let due = db.next_due(3).await.unwrap();
        assert_eq!(due.len(), 3);
    }

    #[tokio::test]
    async fn test_claim_source_timestamp_moves_forward() {
        let db = test_db().await;
        let id = db
            .insert_source("https://example.com/rss", "Example", None)
            .await
            .unwrap();

        db.claim_source(id).await.unwrap();
        let first = db
            .get_source(id)
            .await
            .unwrap()
            .unwrap()
            .last_fetched_at
            .unwrap();
        assert!(first > 0);

        db.claim_source(id).await.unwrap();
        let second = db
            .get_source(id)
            .await
            .unwrap()
            .unwrap()
            .last_fetched_at
            .unwrap();
        assert!(second >= first, "claim timestamp must never move backward");
    }

    #[tokio::test]
    async fn test_claimed_source_rotates_to_back() {
        let db = test_db().await;
        let a = db
            .insert_source("https://a.example.com/rss", "A", None)
            .await
            .unwrap();
        let b = db
            .insert_source("https://b.example.com/rss", "B", None)
            .await
            .unwrap();

        db.claim_source(a).await.unwrap();
        db.claim_source(b).await.unwrap();

        // Re-claiming A puts it behind B in the due ordering (same-second
        // claims tie; the id tiebreaker keeps the order deterministic).
        let due = db.next_due(2).await.unwrap();
        assert_eq!(due.len(), 2);
        assert!(due[0].last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_count_sources() {
        let db = test_db().await;
        assert_eq!(db.count_sources().await.unwrap(), 0);
        db.insert_source("https://a.example.com/rss", "A", None)
            .await
            .unwrap();
        assert_eq!(db.count_sources().await.unwrap(), 1);
    }
}
