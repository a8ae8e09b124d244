//! Configuration surface of the scan coordinator.
//!
//! All sections deserialize with defaults, so a partial file or a handful
//! of environment overrides is enough. Durations are stored as plain
//! integers (seconds or milliseconds, as the field name says) and exposed
//! as [`Duration`] through accessor methods.
//!
//! # Examples
//!
//! ```
//! use scandesk_core::config::{AssignmentMode, ResetPolicy, ScanConfig};
//!
//! let config = ScanConfig::default()
//!     .with_assignment_mode(AssignmentMode::RoundRobin)
//!     .with_reset_policy(ResetPolicy::Daily)
//!     .with_global_cooldown_secs(120);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.dedup.global_cooldown().as_secs(), 120);
//! ```

use crate::constants::*;
use crate::error::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Strategy used to pick the session that receives an accepted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    RoundRobin,
    Manual,
    LastRfid,
    #[default]
    LastLogin,
}

impl fmt::Display for AssignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssignmentMode::RoundRobin => "round_robin",
            AssignmentMode::Manual => "manual",
            AssignmentMode::LastRfid => "last_rfid",
            AssignmentMode::LastLogin => "last_login",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AssignmentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "round_robin" => Ok(AssignmentMode::RoundRobin),
            "manual" => Ok(AssignmentMode::Manual),
            "last_rfid" => Ok(AssignmentMode::LastRfid),
            "last_login" => Ok(AssignmentMode::LastLogin),
            other => Err(Error::Config(format!("Invalid assignment mode: {other}"))),
        }
    }
}

/// When the round-robin pointer snaps back to the oldest session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Whenever the set of active sessions changes.
    Session,
    /// At the first assignment of each calendar day.
    Daily,
    #[default]
    Never,
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResetPolicy::Session => "session",
            ResetPolicy::Daily => "daily",
            ResetPolicy::Never => "never",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ResetPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "session" => Ok(ResetPolicy::Session),
            "daily" => Ok(ResetPolicy::Daily),
            "never" => Ok(ResetPolicy::Never),
            other => Err(Error::Config(format!("Invalid reset policy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    pub mode: AssignmentMode,
    pub reset: ResetPolicy,
    pub manual_timeout_secs: u64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            mode: AssignmentMode::default(),
            reset: ResetPolicy::default(),
            manual_timeout_secs: DEFAULT_MANUAL_TIMEOUT_SECS,
        }
    }
}

impl AssignmentConfig {
    #[must_use]
    pub fn manual_timeout(&self) -> Duration {
        Duration::from_secs(self.manual_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub enabled: bool,
    pub global_cooldown_secs: u64,
    pub session_cooldown_secs: u64,
    pub cross_user_check: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_cooldown_secs: DEFAULT_GLOBAL_COOLDOWN_SECS,
            session_cooldown_secs: DEFAULT_SESSION_COOLDOWN_SECS,
            cross_user_check: true,
        }
    }
}

impl DedupConfig {
    #[must_use]
    pub fn global_cooldown(&self) -> Duration {
        Duration::from_secs(self.global_cooldown_secs)
    }

    #[must_use]
    pub fn session_cooldown(&self) -> Duration {
        Duration::from_secs(self.session_cooldown_secs)
    }
}

/// One configured scan source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Human-readable label used in logs and notifications.
    pub name: String,
    /// Device node emitting one payload per line (e.g. `/dev/ttyACM0`).
    pub device: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub sources: Vec<SourceConfig>,
    pub max_sources: usize,
    pub retry_delay_ms: u64,
    pub max_consecutive_failures: u32,
    pub poll_interval_ms: u64,
    pub buffer_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            max_sources: DEFAULT_MAX_SOURCES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl ScannerConfig {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RfidConfig {
    /// Reader device node; `None` disables the hardware reader.
    pub device: Option<PathBuf>,
    pub debounce_ms: u64,
    pub resolver_cache_secs: u64,
    pub resolver_cache_capacity: usize,
}

impl Default for RfidConfig {
    fn default() -> Self {
        Self {
            device: None,
            debounce_ms: DEFAULT_RFID_DEBOUNCE_MS,
            resolver_cache_secs: DEFAULT_RESOLVER_CACHE_SECS,
            resolver_cache_capacity: DEFAULT_RESOLVER_CACHE_CAPACITY,
        }
    }
}

impl RfidConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn resolver_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.resolver_cache_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub database_path: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            max_retries: DEFAULT_PERSISTENCE_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_PERSISTENCE_BACKOFF_MS,
        }
    }
}

impl PersistenceConfig {
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Complete configuration of one scan station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub assignment: AssignmentConfig,
    pub dedup: DedupConfig,
    pub scanners: ScannerConfig,
    pub rfid: RfidConfig,
    pub persistence: PersistenceConfig,
    pub channel_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            assignment: AssignmentConfig::default(),
            dedup: DedupConfig::default(),
            scanners: ScannerConfig::default(),
            rfid: RfidConfig::default(),
            persistence: PersistenceConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ScanConfig {
    /// Set the assignment strategy.
    pub fn with_assignment_mode(mut self, mode: AssignmentMode) -> Self {
        self.assignment.mode = mode;
        self
    }

    /// Set the round-robin reset policy.
    pub fn with_reset_policy(mut self, reset: ResetPolicy) -> Self {
        self.assignment.reset = reset;
        self
    }

    /// Set the manual-choice timeout in seconds.
    pub fn with_manual_timeout_secs(mut self, secs: u64) -> Self {
        self.assignment.manual_timeout_secs = secs;
        self
    }

    /// Set the cross-session duplicate window in seconds.
    pub fn with_global_cooldown_secs(mut self, secs: u64) -> Self {
        self.dedup.global_cooldown_secs = secs;
        self
    }

    /// Set the same-session duplicate window in seconds.
    pub fn with_session_cooldown_secs(mut self, secs: u64) -> Self {
        self.dedup.session_cooldown_secs = secs;
        self
    }

    /// Enable or disable the cross-user duplicate check.
    pub fn with_cross_user_check(mut self, enabled: bool) -> Self {
        self.dedup.cross_user_check = enabled;
        self
    }

    /// Add a scan source.
    pub fn with_source(mut self, name: impl Into<String>, device: impl Into<PathBuf>) -> Self {
        self.scanners.sources.push(SourceConfig {
            name: name.into(),
            device: device.into(),
        });
        self
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.scanners.sources.len() > self.scanners.max_sources {
            return Err(Error::Config(format!(
                "{} scan sources configured, at most {} allowed",
                self.scanners.sources.len(),
                self.scanners.max_sources
            )));
        }
        if self.scanners.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "scanners.max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if self.scanners.poll_interval_ms == 0 {
            return Err(Error::Config(
                "scanners.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.scanners.buffer_capacity == 0 || self.channel_capacity == 0 {
            return Err(Error::Config(
                "buffer and channel capacities must be greater than 0".to_string(),
            ));
        }
        if self.assignment.mode == AssignmentMode::Manual && self.assignment.manual_timeout_secs == 0
        {
            return Err(Error::Config(
                "assignment.manual_timeout_secs must be greater than 0 in manual mode".to_string(),
            ));
        }
        if self.rfid.resolver_cache_capacity == 0 {
            return Err(Error::Config(
                "rfid.resolver_cache_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
