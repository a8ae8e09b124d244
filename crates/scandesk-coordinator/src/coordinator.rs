//! The coordinator event loop.
//!
//! Every state-changing event goes through one task: RFID tags and UI
//! commands arrive on the command channel, decoded payloads and worker state
//! changes on the scanner pool channel. The loop handles them one at a time,
//! so the session registry, duplicate filter, and assignment policy never
//! see concurrent writers.
//!
//! ```text
//!  TagSource ──┐                      ┌──► SessionRegistry
//!  UI handle ──┼─► Command channel ─┐ │
//!              │                    ├─┼──► DedupCache ──► AssignmentPolicy
//!  ScannerPool ──► PoolEvent channel┘ │
//!                                     ├──► PersistenceGateway
//!                                     └──► NotificationSink
//! ```
//!
//! Reads that do not change state (`active_sessions`, `worker_snapshot`,
//! `stats`) are served straight from [`CoordinatorHandle`] without a round
//! trip through the loop.
//!
//! A manual-choice request never blocks the loop: it is kept as an
//! outstanding entry with a deadline and resolved by a later
//! [`CoordinatorHandle::complete_manual`] call or by expiry.
//!
//! # Examples
//!
//! ```no_run
//! use scandesk_core::config::ScanConfig;
//! use scandesk_coordinator::Coordinator;
//! use scandesk_storage::{Database, DatabaseConfig, SqliteSessionStore, SqliteTagDirectory};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig::default();
//! let db = Database::new(DatabaseConfig::new("scandesk.db")).await?;
//! let store = SqliteSessionStore::new(db.pool().clone());
//! let directory = SqliteTagDirectory::new(db.pool().clone());
//!
//! let (_pool_tx, pool_rx) = mpsc::channel(config.channel_capacity);
//! let (coordinator, handle) = Coordinator::builder(&config, store, directory).build(pool_rx);
//! let task = tokio::spawn(coordinator.run());
//!
//! let outcome = handle.submit_tag("04AB12CD").await?;
//! println!("{outcome:?}");
//!
//! handle.shutdown().await;
//! task.await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use scandesk_core::config::ScanConfig;
use scandesk_core::{
    Error, Result, ScanPayload, ScanRecord, Session, SessionId, SourceId, TagId, UserId,
    UserProfile,
};
use scandesk_hardware::{
    PoolEvent, ScanEvent, ScannerPool, ScannerWorkerState, SourceProvider, TagSource,
    WorkerStatus,
};
use scandesk_storage::{PersistenceGateway, StorageError, TagResolver};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::dedup::{DedupCache, DedupDecision, DedupStats};
use crate::notify::{
    DiscardReason, ManualRequestId, NotificationSink, NullSink, TagRejection, UiEvent,
};
use crate::policy::{Assignment, AssignmentPolicy};
use crate::registry::{SessionRegistry, ToggleOutcome};
use crate::tags::{CachedResolver, TagDebouncer};

/// Read-only view of scanner worker states.
pub trait WorkerSnapshot: Send + Sync + 'static {
    fn snapshot(&self) -> Vec<ScannerWorkerState>;
}

impl<P: SourceProvider> WorkerSnapshot for ScannerPool<P> {
    fn snapshot(&self) -> Vec<ScannerWorkerState> {
        ScannerPool::snapshot(self)
    }
}

/// What a presented tag did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    LoggedIn(Session),
    LoggedOut(Session),
    /// Same tag seen again inside the debounce window; ignored.
    Debounced,
    Rejected(TagRejection),
}

/// Counters maintained by the event loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub scans_accepted: u64,
    /// All discarded scans, whatever the reason.
    pub scans_discarded: u64,
    pub duplicates_rejected: u64,
    pub no_session_drops: u64,
    pub manual_timeouts: u64,
    pub tags_processed: u64,
    pub tags_rejected: u64,
    pub failed_writes: u64,
    pub active_sessions: usize,
    pub pending_manual_choices: usize,
    pub persistence_degraded: bool,
}

#[derive(Debug, Default)]
struct StatsCounters {
    scans_accepted: AtomicU64,
    scans_discarded: AtomicU64,
    duplicates_rejected: AtomicU64,
    no_session_drops: AtomicU64,
    manual_timeouts: AtomicU64,
    tags_processed: AtomicU64,
    tags_rejected: AtomicU64,
    failed_writes: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn duplicate_reason(decision: DedupDecision) -> Option<DiscardReason> {
    match decision {
        DedupDecision::Accept => None,
        DedupDecision::RejectGlobal => Some(DiscardReason::DuplicateGlobal),
        DedupDecision::RejectSession => Some(DiscardReason::DuplicateSession),
    }
}

/// State readable from outside the loop.
struct Shared {
    registry: SessionRegistry,
    dedup: DedupCache,
    counters: StatsCounters,
    pending_manual: AtomicUsize,
    degraded: AtomicBool,
    workers: Option<Arc<dyn WorkerSnapshot>>,
}

enum Command {
    Tag {
        raw: String,
        reply: Option<oneshot::Sender<TagOutcome>>,
    },
    ManualChoice {
        request_id: ManualRequestId,
        session_id: SessionId,
        reply: oneshot::Sender<Result<()>>,
    },
    Logout {
        user_id: UserId,
        reply: oneshot::Sender<Option<Session>>,
    },
    ForceLogout {
        session_id: SessionId,
        reply: oneshot::Sender<Option<Session>>,
    },
    Shutdown,
}

enum PersistOp {
    AppendSession(Session),
    CloseSession {
        session_id: SessionId,
        ended_at: DateTime<Utc>,
    },
    AppendScan(ScanRecord),
}

impl PersistOp {
    fn name(&self) -> &'static str {
        match self {
            PersistOp::AppendSession(_) => "append_session",
            PersistOp::CloseSession { .. } => "close_session",
            PersistOp::AppendScan(_) => "append_scan",
        }
    }
}

struct PendingChoice {
    payload: ScanPayload,
    source_id: SourceId,
    captured_at: DateTime<Utc>,
    candidates: Vec<SessionId>,
    deadline: Instant,
}

/// Configures and creates a [`Coordinator`].
pub struct CoordinatorBuilder<G, R> {
    config: ScanConfig,
    gateway: G,
    resolver: R,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    workers: Option<Arc<dyn WorkerSnapshot>>,
}

impl<G: PersistenceGateway, R: TagResolver> CoordinatorBuilder<G, R> {
    /// Where UI notifications go. Defaults to [`NullSink`].
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Source of session and scan timestamps. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Worker states served by [`CoordinatorHandle::worker_snapshot`].
    pub fn workers(mut self, workers: Arc<dyn WorkerSnapshot>) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Create the loop, consuming scanner events from `pool_events`.
    pub fn build(
        self,
        pool_events: mpsc::Receiver<PoolEvent>,
    ) -> (Coordinator<G, R>, CoordinatorHandle) {
        let config = self.config;
        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity.max(1));

        let shared = Arc::new(Shared {
            registry: SessionRegistry::new(),
            dedup: DedupCache::new(&config.dedup),
            counters: StatsCounters::default(),
            pending_manual: AtomicUsize::new(0),
            degraded: AtomicBool::new(false),
            workers: self.workers,
        });

        let coordinator = Coordinator {
            shared: Arc::clone(&shared),
            gateway: self.gateway,
            resolver: CachedResolver::new(
                self.resolver,
                config.rfid.resolver_cache_ttl(),
                config.rfid.resolver_cache_capacity,
            ),
            policy: AssignmentPolicy::new(&config.assignment),
            debouncer: TagDebouncer::new(config.rfid.debounce()),
            sink: self.sink,
            clock: self.clock,
            commands: command_rx,
            pool_events,
            pending: HashMap::new(),
            next_request: 1,
            manual_timeout: config.assignment.manual_timeout(),
            write_attempts: config.persistence.max_retries.max(1),
            write_backoff: config.persistence.retry_backoff(),
        };
        let handle = CoordinatorHandle {
            commands: command_tx,
            shared,
        };
        (coordinator, handle)
    }
}

/// Single consumer of all state-changing events.
pub struct Coordinator<G, R> {
    shared: Arc<Shared>,
    gateway: G,
    resolver: CachedResolver<R>,
    policy: AssignmentPolicy,
    debouncer: TagDebouncer,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    commands: mpsc::Receiver<Command>,
    pool_events: mpsc::Receiver<PoolEvent>,
    pending: HashMap<ManualRequestId, PendingChoice>,
    next_request: u64,
    manual_timeout: Duration,
    write_attempts: u32,
    write_backoff: Duration,
}

impl<G: PersistenceGateway, R: TagResolver> Coordinator<G, R> {
    pub fn builder(config: &ScanConfig, gateway: G, resolver: R) -> CoordinatorBuilder<G, R> {
        CoordinatorBuilder {
            config: config.clone(),
            gateway,
            resolver,
            sink: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
            workers: None,
        }
    }

    /// Process events until [`CoordinatorHandle::shutdown`] is called or
    /// every handle is dropped.
    pub async fn run(mut self) {
        info!(mode = %self.policy.mode(), "coordinator started");
        let mut pool_open = true;

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = self.pool_events.recv(), if pool_open => match event {
                    Some(event) => self.handle_pool_event(event).await,
                    None => {
                        debug!("scanner pool channel closed");
                        pool_open = false;
                    }
                },
                () = wait_until(deadline) => self.expire_manual_choices(),
            }
        }

        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "coordinator stopping with unanswered manual choices");
        }
        info!(
            active_sessions = self.shared.registry.active_count(),
            "coordinator stopped"
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Tag { raw, reply } => {
                let outcome = self.handle_tag(raw).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::ManualChoice {
                request_id,
                session_id,
                reply,
            } => {
                let result = self.complete_manual(request_id, session_id).await;
                let _ = reply.send(result);
            }
            Command::Logout { user_id, reply } => {
                let now = self.clock.now();
                let ended = self.shared.registry.logout(user_id, now);
                if let Some(session) = &ended {
                    self.on_logout(session.clone(), false).await;
                }
                let _ = reply.send(ended);
            }
            Command::ForceLogout { session_id, reply } => {
                let now = self.clock.now();
                let ended = self.shared.registry.force_logout(session_id, now);
                if let Some(session) = &ended {
                    self.on_logout(session.clone(), false).await;
                }
                let _ = reply.send(ended);
            }
            Command::Shutdown => {}
        }
    }

    async fn handle_pool_event(&mut self, event: PoolEvent) {
        match event {
            PoolEvent::Payload(scan) => self.handle_payload(scan).await,
            PoolEvent::WorkerStateChanged(state) => {
                if state.status == WorkerStatus::Disabled {
                    warn!(
                        source_id = %state.source_id,
                        failures = state.consecutive_failures,
                        error = state.last_error.as_deref().unwrap_or("unknown"),
                        "scanner disabled, operator restart required"
                    );
                }
                self.sink.notify(UiEvent::WorkerStateChanged(state));
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // RFID
    // ------------------------------------------------------------------

    async fn handle_tag(&mut self, raw: String) -> TagOutcome {
        let now = self.clock.now();
        let tag = match TagId::parse(&raw) {
            Ok(tag) => tag,
            Err(e) => {
                warn!(raw = %raw.trim(), error = %e, "tag rejected");
                return self.reject_tag(raw, TagRejection::Invalid);
            }
        };

        if !self.debouncer.should_accept(&tag, now) {
            return TagOutcome::Debounced;
        }
        bump(&self.shared.counters.tags_processed);

        let user = match self.resolver.resolve(&tag).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                let e = Error::UnknownTag(tag.to_string());
                info!(error = %e, "tag rejected");
                return self.reject_tag(raw, TagRejection::Unknown);
            }
            Err(e) => {
                error!(tag = %tag, error = %e, "tag lookup failed");
                return self.reject_tag(raw, TagRejection::LookupFailed);
            }
        };

        match self.shared.registry.toggle(user.id, now) {
            ToggleOutcome::Created(session) => {
                self.on_login(session.clone(), user).await;
                TagOutcome::LoggedIn(session)
            }
            ToggleOutcome::Ended(session) => {
                self.on_logout(session.clone(), true).await;
                TagOutcome::LoggedOut(session)
            }
        }
    }

    fn reject_tag(&self, raw: String, reason: TagRejection) -> TagOutcome {
        bump(&self.shared.counters.tags_rejected);
        self.sink.notify(UiEvent::TagRejected { raw, reason });
        TagOutcome::Rejected(reason)
    }

    async fn on_login(&mut self, session: Session, user: UserProfile) {
        info!(
            session_id = %session.id,
            user_id = %user.id,
            user = %user.display_name,
            "user logged in"
        );
        self.persist(PersistOp::AppendSession(session.clone())).await;
        self.policy.observe_rfid(session.id);
        self.policy.observe_session_change();
        self.sink.notify(UiEvent::LoggedIn { session, user });
    }

    async fn on_logout(&mut self, session: Session, via_rfid: bool) {
        let ended_at = session.ended_at.unwrap_or(session.last_rfid_at);
        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            scans = session.scan_count,
            via_rfid,
            "user logged out"
        );
        self.persist(PersistOp::CloseSession {
            session_id: session.id,
            ended_at,
        })
        .await;
        self.shared.dedup.forget_session(session.id);
        if via_rfid {
            self.policy.observe_rfid(session.id);
        }
        self.policy.observe_session_change();
        self.sink.notify(UiEvent::LoggedOut { session });
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    async fn handle_payload(&mut self, scan: ScanEvent) {
        let payload = ScanPayload::new(&scan.payload);
        if payload.is_empty() {
            debug!(source_id = %scan.source_id, "blank payload ignored");
            return;
        }

        if self
            .pending
            .values()
            .any(|pending| pending.payload.hash() == payload.hash())
        {
            self.discard(scan.source_id, payload.raw(), DiscardReason::PendingChoice);
            return;
        }

        let now = self.clock.now();
        let active = self.shared.registry.active_sessions();
        let active_ids: Vec<SessionId> = active.iter().map(|session| session.id).collect();
        let screened = self
            .shared
            .dedup
            .screen(payload.hash(), &active_ids, scan.source_id, now);
        if let Some(reason) = duplicate_reason(screened) {
            self.discard(scan.source_id, payload.raw(), reason);
            return;
        }

        match self.policy.decide(&active, now) {
            Assignment::AssignTo(session_id) => {
                self.accept_for(session_id, payload, scan.source_id, scan.captured_at, &active, now)
                    .await;
            }
            Assignment::NeedsManualChoice(candidates) => {
                self.request_manual_choice(payload, scan.source_id, scan.captured_at, candidates);
            }
            Assignment::NoActiveSessions => {
                warn!(
                    source_id = %scan.source_id,
                    hash = payload.hash().short(),
                    "scan dropped, no session to assign it to"
                );
                self.discard(scan.source_id, payload.raw(), DiscardReason::NoActiveSessions);
            }
        }
    }

    async fn accept_for(
        &mut self,
        session_id: SessionId,
        payload: ScanPayload,
        source_id: SourceId,
        captured_at: DateTime<Utc>,
        active: &[Session],
        now: DateTime<Utc>,
    ) {
        let decision = self.shared.dedup.check(payload.hash(), session_id, source_id, now);
        if let Some(reason) = duplicate_reason(decision) {
            self.discard(source_id, payload.raw(), reason);
            return;
        }

        let scan_count = match self.shared.registry.record_scan(session_id, now) {
            Ok(count) => count,
            Err(e) => {
                warn!(source_id = %source_id, error = %e, "scan target ended before recording");
                self.discard(source_id, payload.raw(), DiscardReason::SessionEnded);
                return;
            }
        };
        self.policy.commit(session_id, active, now);

        debug!(
            session_id = %session_id,
            source_id = %source_id,
            hash = payload.hash().short(),
            format = payload.parsed().format_name(),
            scan_count,
            "scan accepted"
        );
        let (raw_payload, parsed) = payload.into_parts();
        let record = ScanRecord {
            session_id,
            raw_payload: raw_payload.clone(),
            parsed,
            captured_at,
            source_id,
        };
        self.persist(PersistOp::AppendScan(record)).await;

        bump(&self.shared.counters.scans_accepted);
        self.sink.notify(UiEvent::ScanAccepted {
            session_id,
            source_id,
            raw_payload,
            scan_count,
        });
    }

    fn discard(&self, source_id: SourceId, raw_payload: &str, reason: DiscardReason) {
        let counters = &self.shared.counters;
        bump(&counters.scans_discarded);
        match reason {
            DiscardReason::DuplicateGlobal | DiscardReason::DuplicateSession => {
                bump(&counters.duplicates_rejected);
            }
            DiscardReason::NoActiveSessions => bump(&counters.no_session_drops),
            DiscardReason::ManualTimeout => bump(&counters.manual_timeouts),
            _ => {}
        }
        debug!(source_id = %source_id, ?reason, "scan discarded");
        self.sink.notify(UiEvent::ScanDiscarded {
            source_id,
            raw_payload: raw_payload.to_string(),
            reason,
        });
    }

    // ------------------------------------------------------------------
    // Manual assignment
    // ------------------------------------------------------------------

    fn request_manual_choice(
        &mut self,
        payload: ScanPayload,
        source_id: SourceId,
        captured_at: DateTime<Utc>,
        candidates: Vec<SessionId>,
    ) {
        let request_id = ManualRequestId(self.next_request);
        self.next_request += 1;

        info!(
            request_id = %request_id,
            source_id = %source_id,
            candidates = candidates.len(),
            "manual choice requested"
        );
        self.sink.notify(UiEvent::ManualChoiceRequested {
            request_id,
            candidates: candidates.clone(),
            raw_payload: payload.raw().to_string(),
            timeout_secs: self.manual_timeout.as_secs(),
        });
        self.pending.insert(
            request_id,
            PendingChoice {
                payload,
                source_id,
                captured_at,
                candidates,
                deadline: Instant::now() + self.manual_timeout,
            },
        );
        self.publish_pending();
    }

    async fn complete_manual(
        &mut self,
        request_id: ManualRequestId,
        session_id: SessionId,
    ) -> Result<()> {
        let pending = self
            .pending
            .remove(&request_id)
            .ok_or_else(|| Error::UnknownManualRequest(request_id.to_string()))?;
        self.publish_pending();

        if !pending.candidates.contains(&session_id) {
            warn!(request_id = %request_id, session_id = %session_id, "manual choice not among candidates");
            self.discard(pending.source_id, pending.payload.raw(), DiscardReason::InvalidChoice);
            return Err(Error::SessionNotActive(session_id));
        }
        if !self.shared.registry.is_active(session_id) {
            self.discard(pending.source_id, pending.payload.raw(), DiscardReason::SessionEnded);
            return Err(Error::SessionNotActive(session_id));
        }

        let now = self.clock.now();
        let active = self.shared.registry.active_sessions();
        self.accept_for(
            session_id,
            pending.payload,
            pending.source_id,
            pending.captured_at,
            &active,
            now,
        )
        .await;
        Ok(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    fn expire_manual_choices(&mut self) {
        let now = Instant::now();
        let expired: Vec<ManualRequestId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for request_id in expired {
            if let Some(pending) = self.pending.remove(&request_id) {
                let e = Error::ManualAssignmentTimeout {
                    timeout_secs: self.manual_timeout.as_secs(),
                };
                warn!(request_id = %request_id, error = %e, "scan discarded");
                self.discard(pending.source_id, pending.payload.raw(), DiscardReason::ManualTimeout);
            }
        }
        self.publish_pending();
    }

    fn publish_pending(&self) {
        self.shared
            .pending_manual
            .store(self.pending.len(), Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write through the gateway, retrying transient failures.
    ///
    /// After the configured attempts fail the coordinator goes degraded and
    /// keeps serving in memory; while degraded each write is tried once.
    /// Permanent failures are logged and the write is dropped.
    async fn persist(&mut self, op: PersistOp) {
        let degraded = self.shared.degraded.load(Ordering::Relaxed);
        let attempts = if degraded { 1 } else { self.write_attempts };
        let mut backoff = self.write_backoff;
        let mut attempt = 1;

        loop {
            let result = match &op {
                PersistOp::AppendSession(session) => self.gateway.append_session(session).await,
                PersistOp::CloseSession {
                    session_id,
                    ended_at,
                } => self.gateway.close_session(*session_id, *ended_at).await,
                PersistOp::AppendScan(record) => self.gateway.append_scan(record).await,
            };

            match result {
                Ok(()) => {
                    if degraded {
                        self.shared.degraded.store(false, Ordering::Relaxed);
                        info!(op = op.name(), "persistence restored");
                        self.sink.notify(UiEvent::PersistenceRestored);
                    }
                    return;
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    debug!(op = op.name(), attempt, error = %e, "transient write failure, retrying");
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    self.enter_degraded(&op, e);
                    return;
                }
                Err(e) => {
                    bump(&self.shared.counters.failed_writes);
                    error!(op = op.name(), error = %e, "write rejected by storage, dropped");
                    return;
                }
            }
        }
    }

    fn enter_degraded(&self, op: &PersistOp, cause: StorageError) {
        bump(&self.shared.counters.failed_writes);
        let e = Error::PersistenceUnavailable(cause.to_string());
        if self.shared.degraded.swap(true, Ordering::Relaxed) {
            debug!(op = op.name(), error = %e, "write skipped while degraded");
            return;
        }
        warn!(op = op.name(), error = %e, "continuing in memory only");
        self.sink.notify(UiEvent::PersistenceDegraded {
            error: e.to_string(),
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable front end of a running [`Coordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl CoordinatorHandle {
    /// Feed a raw tag string as if read by an RFID reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorStopped`] if the loop has exited.
    pub async fn submit_tag(&self, raw: impl Into<String>) -> Result<TagOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Tag {
            raw: raw.into(),
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| Error::CoordinatorStopped)
    }

    /// Answer a manual-choice request.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownManualRequest`] if the request expired or was
    ///   already answered.
    /// - [`Error::SessionNotActive`] if the session was not offered or has
    ///   ended; the scan is discarded.
    pub async fn complete_manual(
        &self,
        request_id: ManualRequestId,
        session_id: SessionId,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ManualChoice {
            request_id,
            session_id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::CoordinatorStopped)?
    }

    /// End the active session of `user_id`. `Ok(None)` if there was none.
    pub async fn logout(&self, user_id: UserId) -> Result<Option<Session>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Logout { user_id, reply }).await?;
        rx.await.map_err(|_| Error::CoordinatorStopped)
    }

    /// End a session by ID. `Ok(None)` if it was not active.
    pub async fn force_logout(&self, session_id: SessionId) -> Result<Option<Session>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ForceLogout { session_id, reply }).await?;
        rx.await.map_err(|_| Error::CoordinatorStopped)
    }

    /// Forward every tag read by `source` until it disconnects or the
    /// coordinator stops.
    pub fn attach_tag_source<T: TagSource + 'static>(&self, mut source: T) -> JoinHandle<()> {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let reader = source.info().name;
            info!(reader = %reader, "tag reader attached");
            loop {
                match source.next_tag().await {
                    Ok(raw) => {
                        let command = Command::Tag { raw, reply: None };
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) if e.is_decode_failure() => {
                        warn!(reader = %reader, error = %e, "unreadable tag ignored");
                    }
                    Err(e) => {
                        warn!(reader = %reader, error = %e, "tag reader detached");
                        break;
                    }
                }
            }
        })
    }

    /// Active sessions, oldest login first.
    pub fn active_sessions(&self) -> Vec<Session> {
        self.shared.registry.active_sessions()
    }

    /// Current scanner worker states; empty if no pool was attached.
    pub fn worker_snapshot(&self) -> Vec<ScannerWorkerState> {
        self.shared
            .workers
            .as_ref()
            .map(|workers| workers.snapshot())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let c = &self.shared.counters;
        CoordinatorStats {
            scans_accepted: c.scans_accepted.load(Ordering::Relaxed),
            scans_discarded: c.scans_discarded.load(Ordering::Relaxed),
            duplicates_rejected: c.duplicates_rejected.load(Ordering::Relaxed),
            no_session_drops: c.no_session_drops.load(Ordering::Relaxed),
            manual_timeouts: c.manual_timeouts.load(Ordering::Relaxed),
            tags_processed: c.tags_processed.load(Ordering::Relaxed),
            tags_rejected: c.tags_rejected.load(Ordering::Relaxed),
            failed_writes: c.failed_writes.load(Ordering::Relaxed),
            active_sessions: self.shared.registry.active_count(),
            pending_manual_choices: self.shared.pending_manual.load(Ordering::Relaxed),
            persistence_degraded: self.shared.degraded.load(Ordering::Relaxed),
        }
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.shared.dedup.stats()
    }

    /// Ask the loop to exit after the events already queued ahead of this
    /// request. Returns immediately if it already stopped.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::CoordinatorStopped)
    }
}
