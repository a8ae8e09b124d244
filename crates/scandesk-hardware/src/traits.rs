//! Capture source trait definitions.
//!
//! These traits are the boundary between the coordinator core and the
//! excluded collaborators that actually talk to cameras, decoders, and
//! badge readers. The core only ever sees decoded payload strings and raw
//! tag strings.
//!
//! Methods return `impl Future + Send` rather than plain `async fn` so that
//! generic callers (the pool spawns one Tokio task per source) can rely on
//! the futures being `Send`. Implementations may still be written with
//! `async fn`.
//!
//! As with any RPITIT trait these are not object-safe. Consumers are
//! generic over the concrete source type instead, the way
//! [`ScannerPool`](crate::pool::ScannerPool) is generic over its
//! [`SourceProvider`].

use std::future::Future;
use std::time::Duration;

use scandesk_core::SourceId;

use crate::error::Result;
use crate::types::SourceInfo;

/// A source of decoded QR payloads (camera + decoder, or a scanner that
/// already emits text).
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use scandesk_hardware::traits::ScanSource;
/// use scandesk_hardware::Result;
///
/// async fn drain<S: ScanSource>(source: &mut S) -> Result<Vec<String>> {
///     let mut payloads = Vec::new();
///     while let Some(payload) = source.next_payload(Duration::from_millis(100)).await? {
///         payloads.push(payload);
///     }
///     source.close().await?;
///     Ok(payloads)
/// }
/// ```
pub trait ScanSource: Send {
    /// Wait up to `timeout` for the next decoded payload.
    ///
    /// Returns `Ok(None)` if nothing was decoded within the timeout. Must be
    /// cancel-safe: dropping the future loses no already-received data.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device is disconnected
    /// - The source denies access or stops delivering frames
    /// - A frame could not be decoded ([`HardwareError::DecodeFailed`](crate::HardwareError::DecodeFailed))
    fn next_payload(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Release the underlying device.
    ///
    /// Closing an already closed source is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Source metadata for logs.
    fn info(&self) -> SourceInfo;
}

/// A source of raw RFID tag strings.
pub trait TagSource: Send {
    /// Wait for the next tag presented to the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is disconnected or fails.
    fn next_tag(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Reader metadata for logs.
    fn info(&self) -> SourceInfo;
}

/// Acquires scan sources by stable source ID.
///
/// The pool calls [`open`](SourceProvider::open) every time a worker enters
/// `Starting`, so a provider must be able to open the same source again
/// after it has been closed.
pub trait SourceProvider: Send + Sync + 'static {
    /// Concrete source type handed to workers.
    type Source: ScanSource + 'static;

    /// IDs of all configured sources, in ascending order.
    fn source_ids(&self) -> Vec<SourceId>;

    /// Acquire the capture source for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::UnknownSource`](crate::HardwareError::UnknownSource)
    /// for an unconfigured ID, or a capture failure if the device cannot be
    /// opened.
    fn open(&self, id: SourceId) -> impl Future<Output = Result<Self::Source>> + Send;
}
