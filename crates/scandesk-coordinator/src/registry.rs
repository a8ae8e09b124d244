//! Session registry.
//!
//! Owns every active [`Session`]. At most one session per user is active at
//! any time; an ended session is dropped from the registry, so later calls
//! naming it behave exactly like calls naming an unknown session.
//!
//! The coordinator loop is the only writer. Readers (UI polling through the
//! handle) take the read lock and always get a consistent copy.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use scandesk_core::UserId;
//! use scandesk_coordinator::registry::{SessionRegistry, ToggleOutcome};
//!
//! let registry = SessionRegistry::new();
//! let user = UserId::new(1);
//!
//! let ToggleOutcome::Created(session) = registry.toggle(user, Utc::now()) else {
//!     panic!("first toggle logs in");
//! };
//! assert_eq!(registry.record_scan(session.id, Utc::now()).unwrap(), 1);
//!
//! assert!(matches!(registry.toggle(user, Utc::now()), ToggleOutcome::Ended(_)));
//! assert!(registry.record_scan(session.id, Utc::now()).is_err());
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use scandesk_core::{Error, Result, Session, SessionId, UserId};

/// Result of [`SessionRegistry::toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A new session was opened.
    Created(Session),
    /// The user's active session was closed; carries its final state.
    Ended(Session),
}

impl ToggleOutcome {
    pub fn session(&self) -> &Session {
        match self {
            ToggleOutcome::Created(session) | ToggleOutcome::Ended(session) => session,
        }
    }
}

struct Entry {
    session: Session,
    /// Login order, breaks ties between equal start timestamps.
    seq: u64,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, Entry>,
    active_by_user: HashMap<UserId, SessionId>,
    next_seq: u64,
}

impl RegistryState {
    fn open(&mut self, user_id: UserId, now: DateTime<Utc>) -> Session {
        let session = Session::start(user_id, now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.active_by_user.insert(user_id, session.id);
        self.sessions.insert(
            session.id,
            Entry {
                session: session.clone(),
                seq,
            },
        );
        session
    }

    fn end(&mut self, session_id: SessionId, now: DateTime<Utc>) -> Option<Session> {
        let mut entry = self.sessions.remove(&session_id)?;
        self.active_by_user.remove(&entry.session.user_id);
        entry.session.ended_at = Some(now);
        entry.session.last_rfid_at = now;
        Some(entry.session)
    }
}

/// Registry of active sessions.
#[derive(Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyLoggedIn`] if the user already has an active
    /// session. Use [`toggle`](Self::toggle) for badge events.
    pub fn login(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Session> {
        let mut state = self.write();
        if state.active_by_user.contains_key(&user_id) {
            return Err(Error::AlreadyLoggedIn(user_id));
        }
        Ok(state.open(user_id, now))
    }

    /// Log `user_id` in if they have no active session, otherwise log them
    /// out.
    pub fn toggle(&self, user_id: UserId, now: DateTime<Utc>) -> ToggleOutcome {
        let mut state = self.write();
        match state.active_by_user.get(&user_id).copied() {
            Some(session_id) => match state.end(session_id, now) {
                Some(ended) => ToggleOutcome::Ended(ended),
                None => ToggleOutcome::Created(state.open(user_id, now)),
            },
            None => ToggleOutcome::Created(state.open(user_id, now)),
        }
    }

    /// Count a scan against an active session and return the new count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotActive`] if the session has ended or never
    /// existed.
    pub fn record_scan(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.write();
        let entry = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotActive(session_id))?;
        entry.session.scan_count += 1;
        entry.session.last_scan_at = Some(now);
        Ok(entry.session.scan_count)
    }

    /// Active sessions, oldest login first.
    pub fn active_sessions(&self) -> Vec<Session> {
        let state = self.read();
        let mut entries: Vec<&Entry> = state.sessions.values().collect();
        entries.sort_by_key(|entry| (entry.session.started_at, entry.seq));
        entries.into_iter().map(|entry| entry.session.clone()).collect()
    }

    /// End the active session of `user_id`, if any. Idempotent.
    pub fn logout(&self, user_id: UserId, now: DateTime<Utc>) -> Option<Session> {
        let mut state = self.write();
        let session_id = state.active_by_user.get(&user_id).copied()?;
        state.end(session_id, now)
    }

    /// End a session by ID, if still active. Idempotent.
    pub fn force_logout(&self, session_id: SessionId, now: DateTime<Utc>) -> Option<Session> {
        self.write().end(session_id, now)
    }

    /// Snapshot of an active session.
    pub fn get(&self, session_id: SessionId) -> Option<Session> {
        self.read()
            .sessions
            .get(&session_id)
            .map(|entry| entry.session.clone())
    }

    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.read().sessions.contains_key(&session_id)
    }

    pub fn active_count(&self) -> usize {
        self.read().sessions.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_login_rejects_second_session() {
        let registry = SessionRegistry::new();
        let user = UserId::new(1);

        registry.login(user, at(0)).unwrap();
        assert!(matches!(
            registry.login(user, at(1)),
            Err(Error::AlreadyLoggedIn(u)) if u == user
        ));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_toggle_ends_session() {
        let registry = SessionRegistry::new();
        let user = UserId::new(1);

        let created = registry.toggle(user, at(0));
        let ToggleOutcome::Created(session) = created else {
            panic!("expected login");
        };

        let ended = registry.toggle(user, at(60));
        let ToggleOutcome::Ended(ended) = ended else {
            panic!("expected logout");
        };
        assert_eq!(ended.id, session.id);
        assert_eq!(ended.ended_at, Some(at(60)));
        assert_eq!(ended.duration(at(999)), Duration::seconds(60));
        assert!(!registry.is_active(session.id));
    }

    #[test]
    fn test_record_scan_counts() {
        let registry = SessionRegistry::new();
        let session = registry.login(UserId::new(1), at(0)).unwrap();

        assert_eq!(registry.record_scan(session.id, at(1)).unwrap(), 1);
        assert_eq!(registry.record_scan(session.id, at(2)).unwrap(), 2);

        let snapshot = registry.get(session.id).unwrap();
        assert_eq!(snapshot.scan_count, 2);
        assert_eq!(snapshot.last_scan_at, Some(at(2)));
    }

    #[test]
    fn test_record_scan_on_ended_session() {
        let registry = SessionRegistry::new();
        let session = registry.login(UserId::new(1), at(0)).unwrap();
        registry.force_logout(session.id, at(5)).unwrap();

        assert!(matches!(
            registry.record_scan(session.id, at(6)),
            Err(Error::SessionNotActive(id)) if id == session.id
        ));
        assert!(registry.record_scan(SessionId::new(), at(6)).is_err());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let registry = SessionRegistry::new();
        let user = UserId::new(3);
        let session = registry.login(user, at(0)).unwrap();

        assert!(registry.logout(user, at(1)).is_some());
        assert!(registry.logout(user, at(2)).is_none());
        assert!(registry.force_logout(session.id, at(3)).is_none());
    }

    #[test]
    fn test_active_sessions_in_login_order() {
        let registry = SessionRegistry::new();
        let b = registry.login(UserId::new(2), at(5)).unwrap();
        let a = registry.login(UserId::new(1), at(0)).unwrap();
        let c = registry.login(UserId::new(3), at(5)).unwrap();

        let ids: Vec<_> = registry.active_sessions().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    proptest! {
        #[test]
        fn prop_toggle_alternates(toggles in 1usize..40) {
            let registry = SessionRegistry::new();
            let user = UserId::new(42);

            for i in 0..toggles {
                let outcome = registry.toggle(user, at(i as i64));
                let expected_active = i % 2 == 0;
                prop_assert_eq!(matches!(outcome, ToggleOutcome::Created(_)), expected_active);
                prop_assert_eq!(registry.active_count(), usize::from(expected_active));
            }
        }

        #[test]
        fn prop_one_active_session_per_user(users in proptest::collection::vec(0i64..5, 1..60)) {
            let registry = SessionRegistry::new();
            for (i, user) in users.iter().enumerate() {
                registry.toggle(UserId::new(*user), at(i as i64));

                let active = registry.active_sessions();
                let mut seen: Vec<_> = active.iter().map(|s| s.user_id).collect();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), active.len());
            }
        }
    }
}
