//! Notifications for the UI collaborator.
//!
//! Delivery is fire-and-forget: [`NotificationSink::notify`] is synchronous
//! and must return immediately. A sink that cannot keep up drops events
//! rather than stalling the coordinator.

use std::fmt;

use scandesk_core::{Session, SessionId, SourceId, UserProfile};
use scandesk_hardware::ScannerWorkerState;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Identifies one outstanding manual-choice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ManualRequestId(pub u64);

impl fmt::Display for ManualRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manual-{}", self.0)
    }
}

/// Why a scan was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Claimed by another session inside the global cooldown.
    DuplicateGlobal,
    /// Same session scanned it again inside its own cooldown.
    DuplicateSession,
    NoActiveSessions,
    ManualTimeout,
    /// The manual choice named a session that was not offered.
    InvalidChoice,
    /// A manual-choice prompt for the same payload is still open.
    PendingChoice,
    /// The chosen session ended before the choice arrived.
    SessionEnded,
}

/// Why a presented tag did not toggle a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagRejection {
    Invalid,
    Unknown,
    LookupFailed,
}

/// Everything the coordinator reports to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    LoggedIn {
        session: Session,
        user: UserProfile,
    },
    LoggedOut {
        session: Session,
    },
    ScanAccepted {
        session_id: SessionId,
        source_id: SourceId,
        raw_payload: String,
        scan_count: u64,
    },
    ScanDiscarded {
        source_id: SourceId,
        raw_payload: String,
        reason: DiscardReason,
    },
    ManualChoiceRequested {
        request_id: ManualRequestId,
        candidates: Vec<SessionId>,
        raw_payload: String,
        timeout_secs: u64,
    },
    TagRejected {
        raw: String,
        reason: TagRejection,
    },
    WorkerStateChanged(ScannerWorkerState),
    PersistenceDegraded {
        error: String,
    },
    PersistenceRestored,
}

pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, event: UiEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _event: UiEvent) {}
}

/// Forwards events into a bounded channel, dropping them when it is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<UiEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<UiEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: UiEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.tx.try_send(event) {
            warn!(?event, "UI channel full, notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_request_id_display() {
        assert_eq!(ManualRequestId(7).to_string(), "manual-7");
    }

    #[test]
    fn test_event_serialization() {
        let event = UiEvent::ScanDiscarded {
            source_id: SourceId::new(2),
            raw_payload: "X".into(),
            reason: DiscardReason::DuplicateGlobal,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "scan_discarded");
        assert_eq!(json["reason"], "duplicate_global");
        assert_eq!(json["raw_payload"], "X");
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);

        sink.notify(UiEvent::PersistenceRestored);
        sink.notify(UiEvent::PersistenceDegraded {
            error: "disk full".into(),
        });

        assert_eq!(rx.recv().await, Some(UiEvent::PersistenceRestored));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);
        sink.notify(UiEvent::PersistenceRestored);
    }
}
