//! Error types for capture sources and the scanner pool.
//!
//! Capture failures are never fatal to the process: the pool turns them
//! into worker state transitions (`Error`, then `Disabled`).

use scandesk_core::SourceId;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while acquiring or reading a capture source.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The capture source could not be acquired or stopped working.
    #[error("Capture source failure: {message}")]
    CaptureSourceFailure { message: String },

    /// A frame was captured but could not be decoded.
    ///
    /// Isolated decode failures are tolerated; a run of them counts as a
    /// capture failure.
    #[error("Decode failed: {message}")]
    DecodeFailed { message: String },

    /// No source with this ID is configured.
    #[error("Unknown scan source: {0}")]
    UnknownSource(SourceId),

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new capture source failure.
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureSourceFailure {
            message: message.into(),
        }
    }

    /// Create a new decode failure.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Returns `true` if the error only affects a single frame.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::DecodeFailed { .. })
    }
}
