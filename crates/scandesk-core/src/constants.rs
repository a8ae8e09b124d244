//! Default values and limits shared across the scandesk crates.
//!
//! Every tunable in [`ScanConfig`](crate::config::ScanConfig) takes its
//! default from here, so tests and the binary agree on the baseline.
//!
//! # Usage
//!
//! ```
//! use scandesk_core::constants::*;
//! use std::time::Duration;
//!
//! let cooldown = Duration::from_secs(DEFAULT_GLOBAL_COOLDOWN_SECS);
//! assert_eq!(cooldown.as_secs(), 300);
//! ```

// ============================================================================
// Deduplication
// ============================================================================

/// Window during which one payload may only be claimed once across sessions.
pub const DEFAULT_GLOBAL_COOLDOWN_SECS: u64 = 300;

/// Window during which the same session may not claim the same payload again.
pub const DEFAULT_SESSION_COOLDOWN_SECS: u64 = 3600;

// ============================================================================
// Assignment
// ============================================================================

/// How long the UI has to answer a manual-choice request.
pub const DEFAULT_MANUAL_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Scanner pool
// ============================================================================

/// Upper bound on concurrently supervised scan sources.
pub const DEFAULT_MAX_SOURCES: usize = 8;

/// Delay before a failed worker is started again.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Consecutive failures after which a worker is disabled.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Bound on a single capture-source wait, so stop requests are seen promptly.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Per-worker backlog kept while the coordinator channel is full.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// Longest line a line-oriented device may send, in bytes.
///
/// A QR code holds at most about 3 KB; anything longer without a CR/LF is
/// a jammed or misconfigured reader and is dropped as a decode failure.
pub const MAX_LINE_LENGTH: usize = 8192;

// ============================================================================
// RFID
// ============================================================================

/// Same-tag repeats inside this window are ignored.
pub const DEFAULT_RFID_DEBOUNCE_MS: u64 = 2000;

/// Lifetime of a cached tag lookup, positive or negative.
pub const DEFAULT_RESOLVER_CACHE_SECS: u64 = 300;

/// Maximum cached tag lookups before the oldest are evicted.
pub const DEFAULT_RESOLVER_CACHE_CAPACITY: usize = 100;

/// Minimum tag length in hex characters.
pub const MIN_TAG_LENGTH: usize = 8;

/// Maximum tag length in hex characters.
pub const MAX_TAG_LENGTH: usize = 20;

// ============================================================================
// Persistence
// ============================================================================

/// Default SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "scandesk.db";

/// Attempts per write before the coordinator enters degraded mode.
pub const DEFAULT_PERSISTENCE_MAX_RETRIES: u32 = 3;

/// First backoff step between persistence retries; doubles per attempt.
pub const DEFAULT_PERSISTENCE_BACKOFF_MS: u64 = 50;

// ============================================================================
// Coordinator
// ============================================================================

/// Capacity of the shared inbound event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Field separator of caret-delimited QR payloads.
pub const PAYLOAD_CARET_DELIMITER: char = '^';
