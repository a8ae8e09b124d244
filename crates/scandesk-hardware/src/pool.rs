//! Scanner pool supervisor.
//!
//! The pool runs one worker task per configured scan source and funnels
//! decoded payloads into a single channel for the coordinator.
//!
//! ```text
//! ┌──────────┐
//! │ source-0 │──┐
//! │ worker   │  │     ┌─────────────────┐
//! └──────────┘  ├────►│  PoolEvent      │
//! ┌──────────┐  │     │  channel (mpsc) │──────► Coordinator
//! │ source-1 │──┘     └─────────────────┘
//! │ worker   │
//! └──────────┘
//! ```
//!
//! Each worker owns its capture source and walks the lifecycle described on
//! [`WorkerStatus`]. A failure to open or read the source counts towards
//! `max_consecutive_failures`; a healthy read resets the count. Isolated
//! decode failures are tolerated, but a run of them as long as the failure
//! ceiling counts as one capture failure. Once the ceiling is reached the
//! worker is `Disabled` and only an explicit start or restart brings it
//! back.
//!
//! Payloads are never allowed to block capture: each worker keeps a bounded
//! backlog and drops the oldest payload when the coordinator falls behind.
//!
//! # Examples
//!
//! ```no_run
//! use scandesk_core::config::ScannerConfig;
//! use scandesk_hardware::devices::DeviceProvider;
//! use scandesk_hardware::pool::{PoolEvent, ScannerPool};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> scandesk_hardware::Result<()> {
//!     let config = ScannerConfig::default();
//!     let provider = DeviceProvider::new(config.sources.clone())?;
//!     let (tx, mut rx) = mpsc::channel(256);
//!
//!     let pool = ScannerPool::new(provider, &config, tx);
//!     pool.start_all()?;
//!
//!     while let Some(event) = rx.recv().await {
//!         if let PoolEvent::Payload(scan) = event {
//!             println!("{}: {}", scan.source_id, scan.payload);
//!         }
//!     }
//!
//!     pool.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use scandesk_core::SourceId;
use scandesk_core::config::ScannerConfig;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::traits::{ScanSource, SourceProvider};
use crate::types::{ScanEvent, ScannerWorkerState, WorkerStatus};
use crate::{HardwareError, Result};

/// Event emitted by the pool.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PoolEvent {
    /// A source decoded a payload.
    Payload(ScanEvent),

    /// A worker changed state.
    ///
    /// Delivered best-effort: if the channel is full the notification is
    /// dropped, but [`ScannerPool::snapshot`] always has the latest state.
    WorkerStateChanged(ScannerWorkerState),
}

/// Supervision parameters shared by all workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_consecutive_failures: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub buffer_capacity: usize,
}

impl From<&ScannerConfig> for PoolConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            retry_delay: config.retry_delay(),
            poll_interval: config.poll_interval(),
            buffer_capacity: config.buffer_capacity.max(1),
        }
    }
}

type SharedStates = Arc<RwLock<BTreeMap<SourceId, ScannerWorkerState>>>;

struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Supervises one capture worker per configured source.
///
/// Must be used from within a Tokio runtime.
pub struct ScannerPool<P: SourceProvider> {
    provider: Arc<P>,
    config: PoolConfig,
    events: mpsc::Sender<PoolEvent>,
    workers: Mutex<HashMap<SourceId, WorkerHandle>>,
    states: SharedStates,
}

impl<P: SourceProvider> ScannerPool<P> {
    /// Create a pool over every source the provider knows. All workers
    /// start out `Stopped`.
    pub fn new(provider: P, config: &ScannerConfig, events: mpsc::Sender<PoolEvent>) -> Self {
        Self::with_pool_config(provider, PoolConfig::from(config), events)
    }

    pub fn with_pool_config(
        provider: P,
        config: PoolConfig,
        events: mpsc::Sender<PoolEvent>,
    ) -> Self {
        let states = provider
            .source_ids()
            .into_iter()
            .map(|id| (id, ScannerWorkerState::stopped(id)))
            .collect();

        Self {
            provider: Arc::new(provider),
            config,
            events,
            workers: Mutex::new(HashMap::new()),
            states: Arc::new(RwLock::new(states)),
        }
    }

    /// Start the worker for `id`.
    ///
    /// Starting a worker that is already running is a no-op. Starting a
    /// `Stopped` or `Disabled` worker resets its failure count.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::UnknownSource`] if `id` is not configured.
    pub fn start(&self, id: SourceId) -> Result<()> {
        self.ensure_known(id)?;

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if workers.get(&id).is_some_and(|w| !w.join.is_finished()) {
            debug!(source = %id, "scanner worker already running");
            return Ok(());
        }

        update_state(&self.states, &self.events, id, |state| {
            state.consecutive_failures = 0;
            state.last_error = None;
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = Worker {
            id,
            provider: Arc::clone(&self.provider),
            config: self.config,
            events: self.events.clone(),
            states: Arc::clone(&self.states),
            stop_rx,
            backlog: Backlog::new(self.config.buffer_capacity),
            failures: 0,
        };
        let join = tokio::spawn(worker.run());
        workers.insert(id, WorkerHandle { stop_tx, join });

        info!(source = %id, "scanner worker started");
        Ok(())
    }

    /// Start every configured worker.
    ///
    /// # Errors
    ///
    /// Propagates the first start failure.
    pub fn start_all(&self) -> Result<()> {
        for id in self.source_ids() {
            self.start(id)?;
        }
        Ok(())
    }

    /// Stop the worker for `id` and wait until its capture source has been
    /// released.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::UnknownSource`] if `id` is not configured.
    pub async fn stop(&self, id: SourceId) -> Result<()> {
        self.ensure_known(id)?;

        let handle = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(true);
            if let Err(e) = handle.join.await {
                error!(source = %id, error = %e, "scanner worker terminated abnormally");
            }
        }

        update_state(&self.states, &self.events, id, |state| {
            state.status = WorkerStatus::Stopped;
        });
        info!(source = %id, "scanner worker stopped");
        Ok(())
    }

    /// Stop then start the worker for `id`, clearing its failure count.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::UnknownSource`] if `id` is not configured.
    pub async fn restart(&self, id: SourceId) -> Result<()> {
        self.stop(id).await?;
        self.start(id)
    }

    /// Stop every worker.
    pub async fn shutdown(&self) {
        for id in self.source_ids() {
            if let Err(e) = self.stop(id).await {
                warn!(source = %id, error = %e, "failed to stop scanner worker");
            }
        }
    }

    /// Current state of every configured source, ordered by ID.
    pub fn snapshot(&self) -> Vec<ScannerWorkerState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Current state of one source.
    pub fn state(&self, id: SourceId) -> Option<ScannerWorkerState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Configured source IDs, ordered.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    fn ensure_known(&self, id: SourceId) -> Result<()> {
        let known = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id);
        if known {
            Ok(())
        } else {
            Err(HardwareError::UnknownSource(id))
        }
    }
}

impl<P: SourceProvider> Drop for ScannerPool<P> {
    fn drop(&mut self) {
        // Dropping the stop senders makes every worker wind down on its own.
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Apply `update` to the stored state of `id` and publish the result.
fn update_state(
    states: &SharedStates,
    events: &mpsc::Sender<PoolEvent>,
    id: SourceId,
    update: impl FnOnce(&mut ScannerWorkerState),
) {
    let snapshot = {
        let mut states = states.write().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(id)
            .or_insert_with(|| ScannerWorkerState::stopped(id));
        let before = state.clone();
        update(state);
        if *state == before {
            return;
        }
        state.clone()
    };

    debug!(
        source = %id,
        status = %snapshot.status,
        failures = snapshot.consecutive_failures,
        "scanner worker state changed"
    );
    if let Err(TrySendError::Full(_)) = events.try_send(PoolEvent::WorkerStateChanged(snapshot)) {
        debug!(source = %id, "event channel full, dropped worker state notification");
    }
}

/// Bounded per-worker queue of payloads awaiting delivery.
#[derive(Debug)]
struct Backlog {
    queue: VecDeque<ScanEvent>,
    capacity: usize,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue `event`, returning the oldest payload if it had to be dropped.
    fn push(&mut self, event: ScanEvent) -> Option<ScanEvent> {
        let dropped = if self.queue.len() >= self.capacity {
            self.queue.pop_front()
        } else {
            None
        };
        self.queue.push_back(event);
        dropped
    }

    /// Hand queued payloads to the channel until it is full.
    ///
    /// Returns `false` once the receiving side is gone.
    fn flush(&mut self, events: &mpsc::Sender<PoolEvent>) -> bool {
        while let Some(event) = self.queue.pop_front() {
            match events.try_send(PoolEvent::Payload(event)) {
                Ok(()) => {}
                Err(TrySendError::Full(PoolEvent::Payload(event))) => {
                    self.queue.push_front(event);
                    break;
                }
                Err(TrySendError::Full(_)) => break,
                Err(TrySendError::Closed(_)) => return false,
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

enum CaptureOutcome {
    StopRequested,
    ConsumerGone,
    Failed(String),
}

struct Worker<P: SourceProvider> {
    id: SourceId,
    provider: Arc<P>,
    config: PoolConfig,
    events: mpsc::Sender<PoolEvent>,
    states: SharedStates,
    stop_rx: watch::Receiver<bool>,
    backlog: Backlog,
    failures: u32,
}

impl<P: SourceProvider> Worker<P> {
    async fn run(mut self) {
        loop {
            if self.stop_requested() {
                break;
            }

            let now = Utc::now();
            let failures = self.failures;
            self.set_state(|state| {
                state.status = WorkerStatus::Starting;
                state.consecutive_failures = failures;
                state.last_restart_at = Some(now);
            });

            let outcome = match self.provider.open(self.id).await {
                Ok(mut source) => {
                    self.set_state(|state| state.status = WorkerStatus::Running);
                    info!(source = %self.id, device = %source.info().name, "scan source opened");

                    let outcome = self.capture(&mut source).await;
                    if let Err(e) = source.close().await {
                        warn!(source = %self.id, error = %e, "failed to close scan source");
                    }
                    outcome
                }
                Err(e) => CaptureOutcome::Failed(e.to_string()),
            };

            match outcome {
                CaptureOutcome::StopRequested => break,
                CaptureOutcome::ConsumerGone => {
                    debug!(source = %self.id, "pool event receiver closed");
                    break;
                }
                CaptureOutcome::Failed(message) => {
                    self.failures += 1;
                    let failures = self.failures;

                    if failures >= self.config.max_consecutive_failures {
                        error!(
                            source = %self.id,
                            failures,
                            error = %message,
                            "scan source disabled after repeated failures"
                        );
                        self.set_state(|state| {
                            state.status = WorkerStatus::Disabled;
                            state.consecutive_failures = failures;
                            state.last_error = Some(message);
                        });
                        return;
                    }

                    warn!(
                        source = %self.id,
                        failures,
                        error = %message,
                        "scan source failed, retrying"
                    );
                    self.set_state(|state| {
                        state.status = WorkerStatus::Error;
                        state.consecutive_failures = failures;
                        state.last_error = Some(message);
                    });

                    if self.sleep_unless_stopped(self.config.retry_delay).await {
                        break;
                    }
                }
            }
        }

        self.set_state(|state| state.status = WorkerStatus::Stopped);
    }

    async fn capture(&mut self, source: &mut P::Source) -> CaptureOutcome {
        let mut decode_failures = 0u32;

        loop {
            if self.stop_requested() {
                return CaptureOutcome::StopRequested;
            }

            match source.next_payload(self.config.poll_interval).await {
                Ok(Some(payload)) => {
                    decode_failures = 0;
                    self.mark_healthy();
                    let event = ScanEvent::new(self.id, payload);
                    if let Some(dropped) = self.backlog.push(event) {
                        warn!(
                            source = %self.id,
                            dropped_at = %dropped.captured_at,
                            "payload backlog full, dropped oldest payload"
                        );
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_decode_failure() => {
                    decode_failures += 1;
                    debug!(source = %self.id, error = %e, decode_failures, "frame not decoded");
                    if decode_failures >= self.config.max_consecutive_failures {
                        return CaptureOutcome::Failed(format!(
                            "{decode_failures} consecutive decode failures: {e}"
                        ));
                    }
                }
                Err(e) => return CaptureOutcome::Failed(e.to_string()),
            }

            if !self.backlog.flush(&self.events) {
                return CaptureOutcome::ConsumerGone;
            }
            if self.backlog.len() > 0 {
                debug!(source = %self.id, pending = self.backlog.len(), "payload backlog pending");
            }
        }
    }

    fn mark_healthy(&mut self) {
        if self.failures == 0 {
            return;
        }
        self.failures = 0;
        self.set_state(|state| {
            state.consecutive_failures = 0;
            state.last_error = None;
        });
    }

    /// Sleep for `delay`; returns `true` if a stop was requested meanwhile.
    async fn sleep_unless_stopped(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => self.stop_requested(),
            () = wait_for_stop(&mut self.stop_rx) => true,
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow() || self.stop_rx.has_changed().is_err()
    }

    fn set_state(&self, update: impl FnOnce(&mut ScannerWorkerState)) {
        update_state(&self.states, &self.events, self.id, update);
    }
}

/// Resolves once `true` is sent or the sender is dropped.
async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    const SOURCE: SourceId = SourceId::new(0);

    fn pool_config(max_consecutive_failures: u32) -> PoolConfig {
        PoolConfig {
            max_consecutive_failures,
            retry_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(20),
            buffer_capacity: 8,
        }
    }

    fn pool(
        provider: MockProvider,
        max_failures: u32,
    ) -> (ScannerPool<MockProvider>, mpsc::Receiver<PoolEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (
            ScannerPool::with_pool_config(provider, pool_config(max_failures), tx),
            rx,
        )
    }

    async fn wait_for_status(
        rx: &mut mpsc::Receiver<PoolEvent>,
        status: WorkerStatus,
    ) -> ScannerWorkerState {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match rx.recv().await {
                    Some(PoolEvent::WorkerStateChanged(state)) if state.status == status => {
                        return state;
                    }
                    Some(_) => {}
                    None => panic!("pool event channel closed"),
                }
            }
        })
        .await
        .expect("worker never reached expected status")
    }

    async fn next_payload(rx: &mut mpsc::Receiver<PoolEvent>) -> ScanEvent {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match rx.recv().await {
                    Some(PoolEvent::Payload(event)) => return event,
                    Some(_) => {}
                    None => panic!("pool event channel closed"),
                }
            }
        })
        .await
        .expect("no payload delivered")
    }

    #[tokio::test(start_paused = true)]
    async fn test_payloads_are_forwarded() {
        let provider = MockProvider::new([SOURCE]);
        let scanner = provider.queue_scanner(SOURCE);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        wait_for_status(&mut rx, WorkerStatus::Running).await;

        scanner.push_payload("ORDER-1").await.unwrap();
        let event = next_payload(&mut rx).await;
        assert_eq!(event.source_id, SOURCE);
        assert_eq!(event.payload, "ORDER-1");

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_after_consecutive_open_failures() {
        let provider = MockProvider::new([SOURCE]);
        provider.fail_next_open(SOURCE, 3);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        let state = wait_for_status(&mut rx, WorkerStatus::Disabled).await;
        assert_eq!(state.consecutive_failures, 3);
        assert!(state.last_error.is_some());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(pool.provider.open_attempts(SOURCE), 3);
        assert_eq!(
            pool.state(SOURCE).map(|s| s.status),
            Some(WorkerStatus::Disabled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_and_resets_failures() {
        let provider = MockProvider::new([SOURCE]);
        provider.fail_next_open(SOURCE, 1);
        let scanner = provider.queue_scanner(SOURCE);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        let errored = wait_for_status(&mut rx, WorkerStatus::Error).await;
        assert_eq!(errored.consecutive_failures, 1);

        let running = wait_for_status(&mut rx, WorkerStatus::Running).await;
        assert_eq!(running.consecutive_failures, 1);

        scanner.push_payload("ORDER-2").await.unwrap();
        next_payload(&mut rx).await;

        let state = pool.state(SOURCE).unwrap();
        assert_eq!(state.status, WorkerStatus::Running);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_isolated_decode_failures_tolerated() {
        let provider = MockProvider::new([SOURCE]);
        let scanner = provider.queue_scanner(SOURCE);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        wait_for_status(&mut rx, WorkerStatus::Running).await;

        scanner.inject_decode_failure("glare").await.unwrap();
        scanner.inject_decode_failure("glare").await.unwrap();
        scanner.push_payload("ORDER-3").await.unwrap();

        assert_eq!(next_payload(&mut rx).await.payload, "ORDER-3");
        assert_eq!(pool.provider.open_attempts(SOURCE), 1);

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_failure_reopens_source() {
        let provider = MockProvider::new([SOURCE]);
        let first = provider.queue_scanner(SOURCE);
        let second = provider.queue_scanner(SOURCE);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        wait_for_status(&mut rx, WorkerStatus::Running).await;

        first.disconnect().await.unwrap();
        wait_for_status(&mut rx, WorkerStatus::Error).await;
        assert!(first.is_closed());

        wait_for_status(&mut rx, WorkerStatus::Running).await;
        second.push_payload("ORDER-4").await.unwrap();
        assert_eq!(next_payload(&mut rx).await.payload, "ORDER-4");

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_source() {
        let provider = MockProvider::new([SOURCE]);
        let scanner = provider.queue_scanner(SOURCE);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        wait_for_status(&mut rx, WorkerStatus::Running).await;

        pool.stop(SOURCE).await.unwrap();
        assert!(scanner.is_closed());
        assert_eq!(scanner.close_count(), 1);
        assert_eq!(
            pool.state(SOURCE).map(|s| s.status),
            Some(WorkerStatus::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_revives_disabled_worker() {
        let provider = MockProvider::new([SOURCE]);
        provider.fail_next_open(SOURCE, 2);
        let (pool, mut rx) = pool(provider, 2);

        pool.start(SOURCE).unwrap();
        wait_for_status(&mut rx, WorkerStatus::Disabled).await;

        let scanner = pool.provider.queue_scanner(SOURCE);
        pool.restart(SOURCE).await.unwrap();
        let state = wait_for_status(&mut rx, WorkerStatus::Running).await;
        assert_eq!(state.consecutive_failures, 0);

        scanner.push_payload("ORDER-5").await.unwrap();
        assert_eq!(next_payload(&mut rx).await.payload, "ORDER-5");

        pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let provider = MockProvider::new([SOURCE]);
        let _scanner = provider.queue_scanner(SOURCE);
        let (pool, mut rx) = pool(provider, 3);

        pool.start(SOURCE).unwrap();
        pool.start(SOURCE).unwrap();
        wait_for_status(&mut rx, WorkerStatus::Running).await;
        assert_eq!(pool.provider.open_attempts(SOURCE), 1);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_source_rejected() {
        let (pool, _rx) = pool(MockProvider::new([SOURCE]), 3);
        let unknown = SourceId::new(9);

        assert!(matches!(
            pool.start(unknown),
            Err(HardwareError::UnknownSource(id)) if id == unknown
        ));
        assert!(pool.stop(unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_stopped() {
        let ids = [SourceId::new(0), SourceId::new(1)];
        let (pool, _rx) = pool(MockProvider::new(ids), 3);

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|s| s.status == WorkerStatus::Stopped));
        assert_eq!(pool.source_ids(), ids.to_vec());
    }

    #[test]
    fn test_backlog_drops_oldest() {
        let mut backlog = Backlog::new(2);
        assert!(backlog.push(ScanEvent::new(SOURCE, "a")).is_none());
        assert!(backlog.push(ScanEvent::new(SOURCE, "b")).is_none());

        let dropped = backlog.push(ScanEvent::new(SOURCE, "c")).unwrap();
        assert_eq!(dropped.payload, "a");
        assert_eq!(backlog.len(), 2);
    }

    #[tokio::test]
    async fn test_backlog_flush_stops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut backlog = Backlog::new(4);
        backlog.push(ScanEvent::new(SOURCE, "a"));
        backlog.push(ScanEvent::new(SOURCE, "b"));

        assert!(backlog.flush(&tx));
        assert_eq!(backlog.len(), 1);

        assert!(matches!(rx.recv().await, Some(PoolEvent::Payload(e)) if e.payload == "a"));
        assert!(backlog.flush(&tx));
        assert_eq!(backlog.len(), 0);

        drop(rx);
        backlog.push(ScanEvent::new(SOURCE, "c"));
        assert!(!backlog.flush(&tx));
    }
}
