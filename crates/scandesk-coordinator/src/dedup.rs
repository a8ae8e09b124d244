//! Duplicate payload filter.
//!
//! One [`DedupEntry`] per payload hash, created on first acceptance and
//! expired once `global_cooldown` has passed since it was last seen.
//! Expired entries are swept on every [`DedupCache::check`]; there is no
//! background task.
//!
//! Decision order for `check(hash, session, source, now)`:
//!
//! 1. No live entry: start a new one claimed by `session`, `Accept`.
//! 2. Cross-user check on and `session` is not a claimant: `RejectGlobal`.
//! 3. `session` is a claimant but its claim came through another source:
//!    `RejectGlobal`. Two scanners saw the same physical item.
//! 4. `session` claimed it less than `session_cooldown` ago: `RejectSession`.
//! 5. Otherwise `Accept`, refreshing the entry and the session's claim.
//!
//! The cross-user and per-session checks are independent. With the
//! cross-user check off, a second session simply becomes another claimant.
//! Because an entry only lives for `global_cooldown` after its last
//! sighting, a per-session cooldown longer than the global one is only
//! enforced while the payload keeps being seen.
//!
//! [`DedupCache::screen`] runs the same rules read-only against every
//! active session before an assignment is decided, so a payload nobody
//! may claim is dropped without asking the policy or the operator.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use scandesk_core::config::DedupConfig;
use scandesk_core::{PayloadHash, SessionId, SourceId};
use serde::Serialize;
use tracing::trace;

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupDecision {
    Accept,
    /// Already claimed inside the global window by another session or
    /// through another scanner.
    RejectGlobal,
    /// The same session scanned it again inside its own cooldown.
    RejectSession,
}

impl DedupDecision {
    pub fn is_accept(self) -> bool {
        self == DedupDecision::Accept
    }
}

/// A session's latest accepted claim on a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub at: DateTime<Utc>,
    pub source_id: SourceId,
}

/// Tracking record for one payload hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub claims: HashMap<SessionId, Claim>,
}

impl DedupEntry {
    fn new(session_id: SessionId, source_id: SourceId, now: DateTime<Utc>) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            claims: HashMap::from([(session_id, Claim { at: now, source_id })]),
        }
    }
}

/// Point-in-time counters of a [`DedupCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub enabled: bool,
    pub tracked_payloads: usize,
    pub claimants: usize,
    pub global_cooldown: Duration,
    pub session_cooldown: Duration,
    pub cross_user_check: bool,
}

/// Duplicate filter keyed by payload hash.
///
/// Check-and-update happens under one lock, so two concurrent checks of the
/// same hash from different sessions can never both be accepted.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use scandesk_core::config::DedupConfig;
/// use scandesk_core::{PayloadHash, SessionId, SourceId};
/// use scandesk_coordinator::dedup::{DedupCache, DedupDecision};
///
/// let cache = DedupCache::new(&DedupConfig::default());
/// let hash = PayloadHash::of("ORDER-1");
/// let (a, b) = (SessionId::new(), SessionId::new());
/// let (left, right) = (SourceId::new(0), SourceId::new(1));
/// let now = Utc::now();
///
/// assert_eq!(cache.check(&hash, a, left, now), DedupDecision::Accept);
/// assert_eq!(cache.check(&hash, b, left, now), DedupDecision::RejectGlobal);
/// assert_eq!(cache.check(&hash, a, right, now), DedupDecision::RejectGlobal);
/// assert_eq!(cache.check(&hash, a, left, now), DedupDecision::RejectSession);
/// ```
#[derive(Debug)]
pub struct DedupCache {
    enabled: bool,
    global_cooldown: Duration,
    session_cooldown: Duration,
    cross_user_check: bool,
    entries: Mutex<HashMap<PayloadHash, DedupEntry>>,
}

impl DedupCache {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            enabled: config.enabled,
            global_cooldown: config.global_cooldown(),
            session_cooldown: config.session_cooldown(),
            cross_user_check: config.cross_user_check,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether `session_id` may claim the payload `hash`, read by
    /// `source_id` at `now`.
    pub fn check(
        &self,
        hash: &PayloadHash,
        session_id: SessionId,
        source_id: SourceId,
        now: DateTime<Utc>,
    ) -> DedupDecision {
        if !self.enabled {
            return DedupDecision::Accept;
        }

        let mut entries = self.lock();
        let global_cooldown = self.global_cooldown;
        entries.retain(|_, entry| elapsed(entry.last_seen, now) < global_cooldown);

        let Some(entry) = entries.get_mut(hash) else {
            entries.insert(hash.clone(), DedupEntry::new(session_id, source_id, now));
            trace!(hash = hash.short(), session_id = %session_id, "new payload");
            return DedupDecision::Accept;
        };

        let decision = self.verdict(entry, session_id, source_id, now);
        if decision.is_accept() {
            entry.last_seen = now;
            entry.claims.insert(session_id, Claim { at: now, source_id });
        }
        trace!(
            hash = hash.short(),
            session_id = %session_id,
            source_id = %source_id,
            ?decision,
            "payload seen again"
        );
        decision
    }

    /// Read-only check of `hash` against every session in `candidates`.
    ///
    /// Returns `Accept` when there is no live entry or at least one
    /// candidate could claim the payload. Otherwise the payload is a
    /// duplicate for all of them: `RejectSession` if every candidate is
    /// only inside its own cooldown, `RejectGlobal` if not. Nothing is
    /// recorded; the claim itself still goes through [`DedupCache::check`].
    pub fn screen(
        &self,
        hash: &PayloadHash,
        candidates: &[SessionId],
        source_id: SourceId,
        now: DateTime<Utc>,
    ) -> DedupDecision {
        if !self.enabled || candidates.is_empty() {
            return DedupDecision::Accept;
        }

        let entries = self.lock();
        let Some(entry) = entries
            .get(hash)
            .filter(|entry| elapsed(entry.last_seen, now) < self.global_cooldown)
        else {
            return DedupDecision::Accept;
        };

        let mut all_session = true;
        for &session_id in candidates {
            match self.verdict(entry, session_id, source_id, now) {
                DedupDecision::Accept => return DedupDecision::Accept,
                DedupDecision::RejectGlobal => all_session = false,
                DedupDecision::RejectSession => {}
            }
        }
        if all_session {
            DedupDecision::RejectSession
        } else {
            DedupDecision::RejectGlobal
        }
    }

    /// Drop every claim held by `session_id`, e.g. after logout.
    ///
    /// The entries themselves stay until they expire, so a payload claimed
    /// by the ended session is still rejected for everyone else.
    pub fn forget_session(&self, session_id: SessionId) {
        for entry in self.lock().values_mut() {
            entry.claims.remove(&session_id);
        }
    }

    pub fn stats(&self) -> DedupStats {
        let entries = self.lock();
        DedupStats {
            enabled: self.enabled,
            tracked_payloads: entries.len(),
            claimants: entries.values().map(|entry| entry.claims.len()).sum(),
            global_cooldown: self.global_cooldown,
            session_cooldown: self.session_cooldown,
            cross_user_check: self.cross_user_check,
        }
    }

    /// Copy of the entry for `hash`, expired or not.
    pub fn entry(&self, hash: &PayloadHash) -> Option<DedupEntry> {
        self.lock().get(hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decision for `session_id` against a live entry.
    fn verdict(
        &self,
        entry: &DedupEntry,
        session_id: SessionId,
        source_id: SourceId,
        now: DateTime<Utc>,
    ) -> DedupDecision {
        match entry.claims.get(&session_id) {
            None if self.cross_user_check => DedupDecision::RejectGlobal,
            None => DedupDecision::Accept,
            Some(claim) if claim.source_id != source_id => DedupDecision::RejectGlobal,
            Some(claim) if elapsed(claim.at, now) < self.session_cooldown => {
                DedupDecision::RejectSession
            }
            Some(_) => DedupDecision::Accept,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PayloadHash, DedupEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Time from `then` to `now`; zero if the clock went backwards.
fn elapsed(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}
