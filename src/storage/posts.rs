use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Persist a normalized post.
    ///
    /// Returns `true` if a row was inserted, `false` if the (feed_id, url)
    /// pair already exists. A duplicate is a silent no-op (INSERT OR IGNORE
    /// against the UNIQUE constraint), never an error — re-ingesting the
    /// same document must not fail the worker.
    pub async fn insert_post(&self, post: &NewPost) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO posts
                (feed_id, title, url, description, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Posts for one feed, newest first.
    pub async fn posts_for_feed(
        &self,
        feed_id: i64,
        limit: u32,
    ) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Most recent posts across all feeds, newest first.
    pub async fn recent_posts(&self, limit: u32) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at
            FROM posts
            ORDER BY published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
