//! Mock RFID badge reader.
//!
//! Emits raw tag strings exactly as presented, so tests can check the
//! normalization and debounce applied further down the pipeline.

use tokio::sync::mpsc;

use crate::traits::TagSource;
use crate::types::SourceInfo;
use crate::{HardwareError, Result};

/// Mock RFID reader fed by a [`MockTagReaderHandle`].
///
/// # Examples
///
/// ```
/// use scandesk_hardware::mock::MockTagReader;
/// use scandesk_hardware::traits::TagSource;
///
/// #[tokio::main]
/// async fn main() -> scandesk_hardware::Result<()> {
///     let (mut reader, handle) = MockTagReader::new();
///     handle.present_tag(" 04abcdef12 ").await?;
///
///     assert_eq!(reader.next_tag().await?, " 04abcdef12 ");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTagReader {
    tags: mpsc::Receiver<String>,
    name: String,
}

impl MockTagReader {
    /// Create a new mock reader with the default name.
    pub fn new() -> (Self, MockTagReaderHandle) {
        Self::with_name("Mock RFID Reader")
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockTagReaderHandle) {
        let (tx, tags) = mpsc::channel(32);
        (
            Self {
                tags,
                name: name.into(),
            },
            MockTagReaderHandle { tx },
        )
    }
}

impl Default for MockTagReader {
    fn default() -> Self {
        Self::new().0
    }
}

impl TagSource for MockTagReader {
    async fn next_tag(&mut self) -> Result<String> {
        self.tags
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected(self.name.clone()))
    }

    fn info(&self) -> SourceInfo {
        SourceInfo::new(self.name.clone())
    }
}

/// Handle for presenting badges to a [`MockTagReader`].
#[derive(Debug, Clone)]
pub struct MockTagReaderHandle {
    tx: mpsc::Sender<String>,
}

impl MockTagReaderHandle {
    /// Present a badge. The raw string is delivered unmodified.
    pub async fn present_tag(&self, raw: impl Into<String>) -> Result<()> {
        self.tx
            .send(raw.into())
            .await
            .map_err(|_| HardwareError::disconnected("mock tag reader dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tags_delivered_in_order() {
        let (mut reader, handle) = MockTagReader::new();
        handle.present_tag("AAAA1111").await.unwrap();
        handle.present_tag("BBBB2222").await.unwrap();

        assert_eq!(reader.next_tag().await.unwrap(), "AAAA1111");
        assert_eq!(reader.next_tag().await.unwrap(), "BBBB2222");
    }

    #[tokio::test]
    async fn test_dropped_handle_disconnects() {
        let (mut reader, handle) = MockTagReader::with_name("desk badge");
        drop(handle);

        let err = reader.next_tag().await.unwrap_err();
        assert_eq!(err.to_string(), "Device disconnected: desk badge");
    }

    #[tokio::test]
    async fn test_present_after_reader_dropped() {
        let (reader, handle) = MockTagReader::new();
        drop(reader);
        assert!(handle.present_tag("AAAA1111").await.is_err());
    }
}
