//! Types shared by capture sources and the scanner pool.

use chrono::{DateTime, Utc};
use scandesk_core::SourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture source metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source name (e.g., "left camera", "Mock Scanner").
    pub name: String,

    /// Device path or other locator, if any.
    pub location: Option<String>,
}

impl SourceInfo {
    /// Create a new SourceInfo with the required name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    /// Set the device location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Lifecycle status of one scanner worker.
///
/// ```text
/// Stopped -> Starting -> Running
///               ^           |
///               |           v
///               +------- Error --(ceiling reached)--> Disabled
/// ```
///
/// `Stopped` and `Disabled` are only left through an explicit start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Stopped,
    Starting,
    Running,
    Error,
    Disabled,
}

impl WorkerStatus {
    /// Returns `true` if the worker will not run again without an operator.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Stopped | WorkerStatus::Disabled)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerStatus::Stopped => "Stopped",
            WorkerStatus::Starting => "Starting",
            WorkerStatus::Running => "Running",
            WorkerStatus::Error => "Error",
            WorkerStatus::Disabled => "Disabled",
        };
        write!(f, "{name}")
    }
}

/// Point-in-time state of one configured scan source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerWorkerState {
    pub source_id: SourceId,
    pub status: WorkerStatus,
    pub consecutive_failures: u32,
    pub last_restart_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared on a healthy read.
    pub last_error: Option<String>,
}

impl ScannerWorkerState {
    pub fn stopped(source_id: SourceId) -> Self {
        Self {
            source_id,
            status: WorkerStatus::Stopped,
            consecutive_failures: 0,
            last_restart_at: None,
            last_error: None,
        }
    }
}

/// A decoded payload captured by one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub source_id: SourceId,
    pub payload: String,
    pub captured_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(source_id: SourceId, payload: impl Into<String>) -> Self {
        Self {
            source_id,
            payload: payload.into(),
            captured_at: Utc::now(),
        }
    }
}
