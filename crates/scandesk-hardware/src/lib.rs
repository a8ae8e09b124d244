//! Capture source abstraction and scanner pool for ScanDesk.
//!
//! This crate owns everything between a physical (or simulated) device and
//! the coordinator: the capture source traits, line-oriented device
//! implementations, mocks for tests, and the [`ScannerPool`] supervisor that
//! keeps one worker per scan source alive.
//!
//! # Capture Sources
//!
//! - [`ScanSource`]: decoded QR payloads, one per read
//! - [`TagSource`]: raw RFID tag strings
//! - [`SourceProvider`]: opens a scan source by [`SourceId`](scandesk_core::SourceId)
//!
//! ```no_run
//! use std::time::Duration;
//! use scandesk_hardware::line::LineScanSource;
//! use scandesk_hardware::traits::ScanSource;
//!
//! #[tokio::main]
//! async fn main() -> scandesk_hardware::Result<()> {
//!     let mut scanner = LineScanSource::open("/dev/ttyACM0", "left camera").await?;
//!     if let Some(payload) = scanner.next_payload(Duration::from_millis(100)).await? {
//!         println!("decoded {payload}");
//!     }
//!     scanner.close().await
//! }
//! ```
//!
//! # Supervision
//!
//! See the [`pool`] module for worker lifecycle, restart, and backpressure
//! rules.

pub mod devices;
pub mod error;
pub mod line;
pub mod mock;
pub mod pool;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use pool::{PoolConfig, PoolEvent, ScannerPool};
pub use traits::{ScanSource, SourceProvider, TagSource};
pub use types::{ScanEvent, ScannerWorkerState, SourceInfo, WorkerStatus};
