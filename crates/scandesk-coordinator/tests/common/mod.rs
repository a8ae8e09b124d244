//! Shared fixtures for coordinator integration tests.
//!
//! [`Harness`] runs a real [`Coordinator`] over in-memory collaborators:
//! - [`MemoryGateway`] records every write and can be switched offline
//! - [`MemoryDirectory`] knows three badges (see `tags`)
//! - a [`ManualClock`] drives session and dedup timestamps
//!
//! Payloads are fed straight into the pool channel, so tests control the
//! source and capture time of every scan.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use scandesk_coordinator::{
    ChannelSink, Clock, Coordinator, CoordinatorHandle, ManualClock, TagOutcome, UiEvent,
};
use scandesk_core::config::ScanConfig;
use scandesk_core::{ScanRecord, Session, SessionId, SourceId, TagId, UserId, UserProfile};
use scandesk_hardware::{PoolEvent, ScanEvent};
use scandesk_storage::{PersistenceGateway, StorageError, StorageResult, TagResolver};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Badges known to [`MemoryDirectory`].
pub mod tags {
    pub const ALICE: &str = "AA000001";
    pub const BOB: &str = "BB000002";
    pub const CAROL: &str = "CC000003";
    pub const UNKNOWN: &str = "DD000004";
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap()
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Default)]
pub struct GatewayState {
    pub sessions: Vec<Session>,
    pub closed: Vec<(SessionId, DateTime<Utc>)>,
    pub scans: Vec<ScanRecord>,
    pub offline: bool,
    pub attempts: usize,
}

/// Gateway keeping writes in memory. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MemoryGateway {
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn scans(&self) -> Vec<ScanRecord> {
        self.lock().scans.clone()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.clone()
    }

    pub fn closed(&self) -> Vec<(SessionId, DateTime<Utc>)> {
        self.lock().closed.clone()
    }

    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn write(&self, apply: impl FnOnce(&mut GatewayState)) -> StorageResult<()> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.offline {
            return Err(StorageError::Unavailable("database offline".into()));
        }
        apply(&mut state);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceGateway for MemoryGateway {
    async fn append_session(&self, session: &Session) -> StorageResult<()> {
        self.write(|state| state.sessions.push(session.clone()))
    }

    async fn close_session(&self, session_id: SessionId, ended_at: DateTime<Utc>) -> StorageResult<()> {
        self.write(|state| state.closed.push((session_id, ended_at)))
    }

    async fn append_scan(&self, record: &ScanRecord) -> StorageResult<()> {
        self.write(|state| state.scans.push(record.clone()))
    }
}

/// Fixed badge directory.
pub struct MemoryDirectory {
    users: HashMap<TagId, UserProfile>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        let users = [
            (tags::ALICE, 1, "Alice"),
            (tags::BOB, 2, "Bob"),
            (tags::CAROL, 3, "Carol"),
        ]
        .into_iter()
        .map(|(tag, id, name)| {
            (
                TagId::parse(tag).unwrap(),
                UserProfile::new(UserId::new(id), name),
            )
        })
        .collect();
        Self { users }
    }
}

impl TagResolver for MemoryDirectory {
    async fn resolve(&self, tag: &TagId) -> StorageResult<Option<UserProfile>> {
        Ok(self.users.get(tag).cloned())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub handle: CoordinatorHandle,
    pub pool_tx: mpsc::Sender<PoolEvent>,
    pub events: mpsc::Receiver<UiEvent>,
    pub clock: ManualClock,
    pub gateway: MemoryGateway,
    pub task: JoinHandle<()>,
}

impl Harness {
    /// Spawn a coordinator with `config` and the clock at [`epoch`].
    pub fn start(config: ScanConfig) -> Self {
        let clock = ManualClock::new(epoch());
        let gateway = MemoryGateway::default();
        let (sink, events) = ChannelSink::new(256);
        let (pool_tx, pool_rx) = mpsc::channel(config.channel_capacity);

        let (coordinator, handle) =
            Coordinator::builder(&config, gateway.clone(), MemoryDirectory::default())
                .sink(Arc::new(sink))
                .clock(Arc::new(clock.clone()))
                .build(pool_rx);
        let task = tokio::spawn(coordinator.run());

        Self {
            handle,
            pool_tx,
            events,
            clock,
            gateway,
            task,
        }
    }

    /// Move the clock to `secs` seconds after [`epoch`].
    pub fn at(&self, secs: i64) {
        self.clock.set(epoch() + chrono::Duration::seconds(secs));
    }

    pub async fn tag(&self, raw: &str) -> TagOutcome {
        self.handle.submit_tag(raw).await.unwrap()
    }

    /// Present a badge that must log its owner in.
    pub async fn login(&self, raw: &str) -> Session {
        match self.tag(raw).await {
            TagOutcome::LoggedIn(session) => session,
            other => panic!("expected login for {raw}, got {other:?}"),
        }
    }

    /// Feed a payload from `source` captured now.
    pub async fn feed(&self, source: u16, payload: &str) {
        let event = ScanEvent {
            source_id: SourceId::new(source),
            payload: payload.to_string(),
            captured_at: self.clock.now(),
        };
        self.pool_tx.send(PoolEvent::Payload(event)).await.unwrap();
    }

    /// Feed a payload and return the scan notification it produced.
    pub async fn scan(&mut self, source: u16, payload: &str) -> UiEvent {
        self.feed(source, payload).await;
        self.next_scan_event().await
    }

    pub async fn next_event(&mut self) -> UiEvent {
        tokio::time::timeout(Duration::from_secs(600), self.events.recv())
            .await
            .expect("no notification within timeout")
            .expect("notification channel closed")
    }

    /// Skip login/logout and worker notifications up to the next scan outcome.
    pub async fn next_scan_event(&mut self) -> UiEvent {
        loop {
            let event = self.next_event().await;
            if matches!(
                event,
                UiEvent::ScanAccepted { .. }
                    | UiEvent::ScanDiscarded { .. }
                    | UiEvent::ManualChoiceRequested { .. }
            ) {
                return event;
            }
        }
    }

    pub async fn stop(self) {
        self.handle.shutdown().await;
        self.task.await.unwrap();
    }
}

/// Session an accepted scan went to.
pub fn accepted_session(event: &UiEvent) -> SessionId {
    match event {
        UiEvent::ScanAccepted { session_id, .. } => *session_id,
        other => panic!("expected accepted scan, got {other:?}"),
    }
}
