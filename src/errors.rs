use rusqlite::ErrorCode;
use thiserror::Error;

/// Error type for feedgraph operations.
///
/// Every failing operation leaves the store exactly as it was before the
/// call: the surrounding transaction is rolled back before the error surfaces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedGraphError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transient store error: {0}")]
    Transient(String),
    #[error("store error: {0}")]
    Fatal(String),
}

impl FeedGraphError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        FeedGraphError::NotFound(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        FeedGraphError::Validation(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        FeedGraphError::Conflict(msg.into())
    }

    pub fn transient<T: Into<String>>(msg: T) -> Self {
        FeedGraphError::Transient(msg.into())
    }

    pub fn fatal<T: Into<String>>(msg: T) -> Self {
        FeedGraphError::Fatal(msg.into())
    }

    /// Classifies a SQLite failure. Lock contention is worth retrying as a
    /// whole transaction; anything else is not.
    pub fn store(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _)
                if matches!(
                    inner.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                FeedGraphError::Transient(err.to_string())
            }
            _ => FeedGraphError::Fatal(err.to_string()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FeedGraphError::Transient(_))
    }
}
