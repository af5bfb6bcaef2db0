use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("Another instance of harvester appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered feed source, as stored in the `feeds` table.
///
/// `url` is immutable after creation; `last_fetched_at` is touched only by
/// the scraper's claim step and only ever moves forward. `None` means the
/// source has never been fetched, which sorts it to the front of the
/// due-source queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedSource {
    pub id: i64,
    pub title: String,
    pub url: String,
    /// Owning user, if any; sources may be unowned.
    pub user_id: Option<i64>,
    /// Unix seconds of the last claim; NULL = never fetched.
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
}

/// A normalized feed item ready for insertion.
///
/// Produced by the scraper's normalize step; `created_at` is stamped at
/// normalization time, not insertion time.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    /// `None` when the item carried no description text at all.
    pub description: Option<String>,
    /// Parsed publish timestamp, Unix seconds.
    pub published_at: i64,
    pub created_at: i64,
}

/// A persisted post, as stored in the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub created_at: i64,
}
