//! Row types read back from the database.

use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use scandesk_core::{SessionId, UserId, UserProfile};
use sqlx::FromRow;

/// A persisted session row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StoredSession {
    pub id: String,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    /// Parse the stored session ID.
    pub fn session_id(&self) -> StorageResult<SessionId> {
        self.id
            .parse()
            .map_err(|_| StorageError::Validation(format!("malformed session id {}", self.id)))
    }
}

/// A persisted scan row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StoredScan {
    pub id: i64,
    pub session_id: String,
    pub raw_payload: String,
    pub payload_format: String,
    /// Parsed fields as JSON text, absent for plain-text payloads.
    pub parsed_fields: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub source_id: i64,
}

impl StoredScan {
    /// Decode the stored parsed fields.
    pub fn fields(&self) -> StorageResult<Option<serde_json::Value>> {
        self.parsed_fields
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(StorageError::from)
    }
}

/// A directory user row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DirectoryUser {
    pub id: i64,
    pub display_name: String,
    pub tag_id: String,
    pub active: bool,
}

impl From<DirectoryUser> for UserProfile {
    fn from(user: DirectoryUser) -> Self {
        UserProfile::new(UserId::new(user.id), user.display_name)
    }
}
