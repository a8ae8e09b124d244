//! Mock scan sources for testing without cameras.
//!
//! [`MockScanner`] is driven through a [`MockScannerHandle`]: tests push
//! payloads, inject decode or capture failures, and observe whether the
//! pool closed the source. [`MockProvider`] scripts what happens each time
//! the pool tries to open a source, which is how restart and disable
//! behaviour is exercised.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scandesk_core::SourceId;
use tokio::sync::mpsc;

use crate::traits::{ScanSource, SourceProvider};
use crate::types::SourceInfo;
use crate::{HardwareError, Result};

const MOCK_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
enum ScriptedFrame {
    Payload(String),
    DecodeFailure(String),
    CaptureFailure(String),
    Disconnect,
}

/// Mock scan source fed by a [`MockScannerHandle`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use scandesk_hardware::mock::MockScanner;
/// use scandesk_hardware::traits::ScanSource;
///
/// #[tokio::main]
/// async fn main() -> scandesk_hardware::Result<()> {
///     let (mut scanner, handle) = MockScanner::new();
///     handle.push_payload("ORDER-42").await?;
///
///     let payload = scanner.next_payload(Duration::from_millis(50)).await?;
///     assert_eq!(payload.as_deref(), Some("ORDER-42"));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockScanner {
    frames: mpsc::Receiver<ScriptedFrame>,
    name: String,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl MockScanner {
    /// Create a mock scanner with the default name.
    pub fn new() -> (Self, MockScannerHandle) {
        Self::with_name("Mock Scanner")
    }

    /// Create a mock scanner with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockScannerHandle) {
        let (tx, frames) = mpsc::channel(MOCK_CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        let close_calls = Arc::new(AtomicUsize::new(0));

        let scanner = Self {
            frames,
            name: name.into(),
            closed: Arc::clone(&closed),
            close_calls: Arc::clone(&close_calls),
        };
        let handle = MockScannerHandle {
            tx,
            closed,
            close_calls,
        };

        (scanner, handle)
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new().0
    }
}

impl ScanSource for MockScanner {
    async fn next_payload(&mut self, timeout: Duration) -> Result<Option<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HardwareError::disconnected(self.name.clone()));
        }

        match tokio::time::timeout(timeout, self.frames.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(ScriptedFrame::Payload(payload))) => Ok(Some(payload)),
            Ok(Some(ScriptedFrame::DecodeFailure(message))) => Err(HardwareError::decode(message)),
            Ok(Some(ScriptedFrame::CaptureFailure(message))) => {
                Err(HardwareError::capture(message))
            }
            Ok(Some(ScriptedFrame::Disconnect)) | Ok(None) => {
                Err(HardwareError::disconnected(self.name.clone()))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        SourceInfo::new(self.name.clone())
    }
}

/// Handle for driving a [`MockScanner`].
#[derive(Debug, Clone)]
pub struct MockScannerHandle {
    tx: mpsc::Sender<ScriptedFrame>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl MockScannerHandle {
    /// Make the scanner decode `payload` on its next read.
    pub async fn push_payload(&self, payload: impl Into<String>) -> Result<()> {
        self.send(ScriptedFrame::Payload(payload.into())).await
    }

    /// Make the next read fail to decode a frame.
    pub async fn inject_decode_failure(&self, message: impl Into<String>) -> Result<()> {
        self.send(ScriptedFrame::DecodeFailure(message.into())).await
    }

    /// Make the next read fail as if the camera stopped delivering frames.
    pub async fn inject_capture_failure(&self, message: impl Into<String>) -> Result<()> {
        self.send(ScriptedFrame::CaptureFailure(message.into())).await
    }

    /// Simulate the device being unplugged.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(ScriptedFrame::Disconnect).await
    }

    /// Returns `true` once the scanner has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of times the scanner was actually closed (repeat closes do
    /// not count).
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    async fn send(&self, frame: ScriptedFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| HardwareError::disconnected("mock scanner dropped"))
    }
}

enum OpenOutcome {
    Scanner(MockScanner),
    Fail(String),
}

#[derive(Default)]
struct ProviderState {
    scripts: BTreeMap<SourceId, VecDeque<OpenOutcome>>,
    open_attempts: HashMap<SourceId, u32>,
}

/// [`SourceProvider`] whose open results are scripted per source.
///
/// Each call to `open` consumes the next scripted outcome for that source.
/// With nothing scripted, opening fails with a capture error, the same as a
/// camera that is not plugged in.
///
/// # Examples
///
/// ```
/// use scandesk_core::SourceId;
/// use scandesk_hardware::mock::MockProvider;
/// use scandesk_hardware::traits::SourceProvider;
///
/// #[tokio::main]
/// async fn main() {
///     let provider = MockProvider::new([SourceId::new(0)]);
///     provider.fail_next_open(SourceId::new(0), 1);
///     let _handle = provider.queue_scanner(SourceId::new(0));
///
///     assert!(provider.open(SourceId::new(0)).await.is_err());
///     assert!(provider.open(SourceId::new(0)).await.is_ok());
///     assert_eq!(provider.open_attempts(SourceId::new(0)), 2);
/// }
/// ```
pub struct MockProvider {
    state: Mutex<ProviderState>,
}

impl MockProvider {
    /// Create a provider that knows about `ids`.
    pub fn new(ids: impl IntoIterator<Item = SourceId>) -> Self {
        let mut state = ProviderState::default();
        for id in ids {
            state.scripts.entry(id).or_default();
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Script a successful open for `id` and return the handle driving the
    /// scanner it yields.
    pub fn queue_scanner(&self, id: SourceId) -> MockScannerHandle {
        let (scanner, handle) = MockScanner::with_name(format!("Mock Scanner {id}"));
        self.lock()
            .scripts
            .entry(id)
            .or_default()
            .push_back(OpenOutcome::Scanner(scanner));
        handle
    }

    /// Script `count` failed opens for `id`.
    pub fn fail_next_open(&self, id: SourceId, count: u32) {
        let mut state = self.lock();
        let script = state.scripts.entry(id).or_default();
        for attempt in 0..count {
            script.push_back(OpenOutcome::Fail(format!(
                "mock open failure {} for {id}",
                attempt + 1
            )));
        }
    }

    /// Number of times `open` was called for `id`.
    pub fn open_attempts(&self, id: SourceId) -> u32 {
        self.lock().open_attempts.get(&id).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SourceProvider for MockProvider {
    type Source = MockScanner;

    fn source_ids(&self) -> Vec<SourceId> {
        self.lock().scripts.keys().copied().collect()
    }

    async fn open(&self, id: SourceId) -> Result<MockScanner> {
        let outcome = {
            let mut state = self.lock();
            let Some(script) = state.scripts.get_mut(&id) else {
                return Err(HardwareError::UnknownSource(id));
            };
            let outcome = script.pop_front();
            *state.open_attempts.entry(id).or_insert(0) += 1;
            outcome
        };

        match outcome {
            Some(OpenOutcome::Scanner(scanner)) => Ok(scanner),
            Some(OpenOutcome::Fail(message)) => Err(HardwareError::capture(message)),
            None => Err(HardwareError::capture(format!("no camera attached to {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_payload_delivery() {
        let (mut scanner, handle) = MockScanner::new();
        handle.push_payload("first").await.unwrap();
        handle.push_payload("second").await.unwrap();

        assert_eq!(
            scanner.next_payload(POLL).await.unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            scanner.next_payload(POLL).await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_none() {
        let (mut scanner, _handle) = MockScanner::new();
        assert_eq!(scanner.next_payload(POLL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let (mut scanner, handle) = MockScanner::new();
        handle.inject_decode_failure("blurred").await.unwrap();
        handle.inject_capture_failure("no frames").await.unwrap();
        handle.disconnect().await.unwrap();

        let err = scanner.next_payload(POLL).await.unwrap_err();
        assert!(err.is_decode_failure());
        let err = scanner.next_payload(POLL).await.unwrap_err();
        assert!(matches!(err, HardwareError::CaptureSourceFailure { .. }));
        let err = scanner.next_payload(POLL).await.unwrap_err();
        assert!(matches!(err, HardwareError::Disconnected { .. }));
    }

    #[tokio::test]
    async fn test_dropped_handle_disconnects() {
        let (mut scanner, handle) = MockScanner::new();
        drop(handle);
        let err = scanner.next_payload(POLL).await.unwrap_err();
        assert!(matches!(err, HardwareError::Disconnected { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut scanner, handle) = MockScanner::new();
        scanner.close().await.unwrap();
        scanner.close().await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(handle.close_count(), 1);
        assert!(scanner.next_payload(POLL).await.is_err());
    }

    #[tokio::test]
    async fn test_provider_scripts_in_order() {
        let id = SourceId::new(1);
        let provider = MockProvider::new([id]);
        provider.fail_next_open(id, 2);
        let handle = provider.queue_scanner(id);

        assert!(provider.open(id).await.is_err());
        assert!(provider.open(id).await.is_err());
        let mut scanner = provider.open(id).await.unwrap();
        handle.push_payload("ok").await.unwrap();
        assert_eq!(
            scanner.next_payload(POLL).await.unwrap().as_deref(),
            Some("ok")
        );
        assert_eq!(provider.open_attempts(id), 3);
    }

    #[tokio::test]
    async fn test_provider_unknown_source() {
        let provider = MockProvider::new([SourceId::new(0)]);
        let err = provider.open(SourceId::new(7)).await.unwrap_err();
        assert!(matches!(err, HardwareError::UnknownSource(_)));
        assert_eq!(provider.source_ids(), vec![SourceId::new(0)]);
    }
}
