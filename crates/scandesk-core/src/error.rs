use thiserror::Error;

use crate::types::{SessionId, UserId};

#[derive(Error, Debug)]
pub enum Error {
    // Session state machine misuse
    #[error("User {0} already has an active session")]
    AlreadyLoggedIn(UserId),

    #[error("Session {0} is not active")]
    SessionNotActive(SessionId),

    // Tag handling
    #[error("Invalid tag format: {0}")]
    InvalidTag(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    // Persistence
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    // Manual assignment
    #[error("Manual assignment timed out after {timeout_secs}s")]
    ManualAssignmentTimeout { timeout_secs: u64 },

    #[error("Unknown manual assignment request: {0}")]
    UnknownManualRequest(String),

    // Runtime
    #[error("Coordinator is not running")]
    CoordinatorStopped,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` for errors the caller should retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::PersistenceUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
