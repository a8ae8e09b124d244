pub mod config;
pub mod constants;
pub mod error;
pub mod payload;
pub mod types;

pub use error::{Error, Result};
pub use payload::{ParsedPayload, PayloadHash, ScanPayload};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
