//! Session assignment strategies.
//!
//! [`AssignmentPolicy::decide`] is a pure function of the active-session
//! snapshot and the policy's own state. State only changes through
//! [`commit`](AssignmentPolicy::commit) (after a scan was actually accepted)
//! and the `observe_*` hooks the coordinator calls on RFID toggles, so a
//! scan rejected by the duplicate filter never moves the round-robin
//! pointer.

use chrono::{DateTime, NaiveDate, Utc};
use scandesk_core::config::{AssignmentConfig, AssignmentMode, ResetPolicy};
use scandesk_core::{Session, SessionId};

/// Where an incoming payload should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    AssignTo(SessionId),
    /// The UI must pick one of these, oldest login first.
    NeedsManualChoice(Vec<SessionId>),
    NoActiveSessions,
}

/// Assignment strategy plus the state it carries between scans.
#[derive(Debug, Clone)]
pub struct AssignmentPolicy {
    mode: AssignmentMode,
    reset: ResetPolicy,
    /// Last round-robin target and its login time.
    anchor: Option<(SessionId, DateTime<Utc>)>,
    anchor_day: Option<NaiveDate>,
    last_rfid: Option<SessionId>,
}

impl AssignmentPolicy {
    pub fn new(config: &AssignmentConfig) -> Self {
        Self {
            mode: config.mode,
            reset: config.reset,
            anchor: None,
            anchor_day: None,
            last_rfid: None,
        }
    }

    pub fn mode(&self) -> AssignmentMode {
        self.mode
    }

    /// Pick a target for a scan arriving at `now`.
    ///
    /// `active` must be ordered oldest login first, as returned by
    /// [`SessionRegistry::active_sessions`](crate::registry::SessionRegistry::active_sessions).
    pub fn decide(&self, active: &[Session], now: DateTime<Utc>) -> Assignment {
        match active {
            [] => return Assignment::NoActiveSessions,
            [only] => return Assignment::AssignTo(only.id),
            _ => {}
        }

        match self.mode {
            AssignmentMode::RoundRobin => {
                let index = next_index(active, self.live_anchor(now));
                Assignment::AssignTo(active[index].id)
            }
            AssignmentMode::Manual => {
                Assignment::NeedsManualChoice(active.iter().map(|s| s.id).collect())
            }
            AssignmentMode::LastRfid => self
                .last_rfid
                .filter(|id| active.iter().any(|s| s.id == *id))
                .map_or(Assignment::NoActiveSessions, Assignment::AssignTo),
            AssignmentMode::LastLogin => active
                .iter()
                .max_by_key(|s| s.started_at)
                .map_or(Assignment::NoActiveSessions, |s| Assignment::AssignTo(s.id)),
        }
    }

    /// Record that a scan was accepted for `session_id`.
    ///
    /// Only round robin keeps per-scan state, and only when there was an
    /// actual choice to make.
    pub fn commit(&mut self, session_id: SessionId, active: &[Session], now: DateTime<Utc>) {
        if self.mode != AssignmentMode::RoundRobin || active.len() < 2 {
            return;
        }
        if let Some(session) = active.iter().find(|s| s.id == session_id) {
            self.anchor = Some((session.id, session.started_at));
            self.anchor_day = Some(now.date_naive());
        }
    }

    /// The set of active sessions changed (login or logout).
    pub fn observe_session_change(&mut self) {
        if self.reset == ResetPolicy::Session {
            self.anchor = None;
            self.anchor_day = None;
        }
    }

    /// A session was touched by an RFID toggle.
    pub fn observe_rfid(&mut self, session_id: SessionId) {
        self.last_rfid = Some(session_id);
    }

    fn live_anchor(&self, now: DateTime<Utc>) -> Option<(SessionId, DateTime<Utc>)> {
        if self.reset == ResetPolicy::Daily && self.anchor_day != Some(now.date_naive()) {
            return None;
        }
        self.anchor
    }
}

/// Index of the session after `anchor` in login order, wrapping around.
///
/// If the anchor session has since ended, continue with the first session
/// that logged in after it.
fn next_index(active: &[Session], anchor: Option<(SessionId, DateTime<Utc>)>) -> usize {
    let Some((anchor_id, anchor_start)) = anchor else {
        return 0;
    };
    if let Some(pos) = active.iter().position(|s| s.id == anchor_id) {
        return (pos + 1) % active.len();
    }
    active
        .iter()
        .position(|s| s.started_at > anchor_start)
        .unwrap_or(0)
}
