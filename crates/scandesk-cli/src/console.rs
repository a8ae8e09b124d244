//! Operator console: notifications printed to standard output.

use scandesk_coordinator::{NotificationSink, UiEvent};

/// How notifications are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One readable line per event
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Prints every coordinator notification on its own line.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    format: OutputFormat,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn line(&self, event: &UiEvent) -> String {
        match self.format {
            OutputFormat::Text => render(event),
            OutputFormat::Json => {
                serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
            }
        }
    }
}

impl NotificationSink for ConsoleSink {
    fn notify(&self, event: UiEvent) {
        println!("{}", self.line(&event));
    }
}

/// Human-readable form of `event`.
pub fn render(event: &UiEvent) -> String {
    match event {
        UiEvent::LoggedIn { session, user } => {
            format!("✓ {} logged in (session {})", user.display_name, session.id)
        }
        UiEvent::LoggedOut { session } => format!(
            "✓ session {} ended after {} scans",
            session.id, session.scan_count
        ),
        UiEvent::ScanAccepted {
            session_id,
            source_id,
            raw_payload,
            scan_count,
        } => format!(
            "  [{source_id}] {raw_payload} -> session {session_id} (#{scan_count})"
        ),
        UiEvent::ScanDiscarded {
            source_id,
            raw_payload,
            reason,
        } => format!("⚠ [{source_id}] {raw_payload} discarded: {reason:?}"),
        UiEvent::ManualChoiceRequested {
            request_id,
            candidates,
            raw_payload,
            timeout_secs,
        } => {
            let candidates: Vec<String> = candidates.iter().map(ToString::to_string).collect();
            format!(
                "? {request_id}: assign {raw_payload} to one of [{}] within {timeout_secs}s",
                candidates.join(", ")
            )
        }
        UiEvent::TagRejected { raw, reason } => {
            format!("⚠ tag {:?} rejected: {reason:?}", raw.trim())
        }
        UiEvent::WorkerStateChanged(state) => match &state.last_error {
            Some(error) => format!(
                "  scanner {} {} ({} failures: {error})",
                state.source_id, state.status, state.consecutive_failures
            ),
            None => format!("  scanner {} {}", state.source_id, state.status),
        },
        UiEvent::PersistenceDegraded { error } => {
            format!("✗ database unavailable, recording in memory only: {error}")
        }
        UiEvent::PersistenceRestored => "✓ database available again".to_string(),
    }
}
