//! Mock capture sources for tests and demos.

mod rfid;
mod scanner;

pub use rfid::{MockTagReader, MockTagReaderHandle};
pub use scanner::{MockProvider, MockScanner, MockScannerHandle};
