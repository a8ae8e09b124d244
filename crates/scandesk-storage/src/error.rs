use thiserror::Error;

/// Storage-specific error types for ScanDesk persistence.
///
/// The coordinator only cares about one distinction: whether a failure is
/// transient ([`StorageError::is_transient`]), in which case the write is
/// retried and eventually served in degraded mode, or permanent, in which
/// case the write is logged and dropped.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entity not found in database
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Backend temporarily unreachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parsed payload fields could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// SQLite primary result codes for a busy or locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl StorageError {
    /// Returns `true` for failures that may succeed on retry: pool
    /// exhaustion, a closed pool, I/O errors, and SQLite busy/locked.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Database(e) => is_transient_sqlx(e),
            _ => false,
        }
    }

    pub(crate) fn not_found(entity_type: &str, field: &str, value: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

fn is_transient_sqlx(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(StorageError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StorageError::Database(sqlx::Error::PoolClosed).is_transient());
        assert!(StorageError::Unavailable("down".into()).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!StorageError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!StorageError::Validation("bad".into()).is_transient());
        assert!(!StorageError::not_found("Session", "id", "x").is_transient());
    }

    #[test]
    fn test_not_found_display() {
        let err = StorageError::not_found("Session", "id", 42);
        assert_eq!(err.to_string(), "Entity not found: Session with id=42");
    }
}
