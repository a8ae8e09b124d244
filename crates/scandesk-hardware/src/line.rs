//! Line-oriented capture sources.
//!
//! Many QR scanners and nearly all desk badge readers present themselves as
//! a character device that emits one decoded value per line (CR or LF
//! terminated). [`LineScanSource`] and [`LineTagSource`] read such devices,
//! or any other `AsyncRead` such as a FIFO or standard input.
//!
//! Reads go through an owned buffer and `AsyncReadExt::read`, both of which
//! keep `next_payload` cancel-safe: a timed-out read never loses bytes that
//! already arrived.
//!
//! A line longer than [`MAX_LINE_LENGTH`] is reported once as a decode
//! failure and its remaining bytes are skipped up to the next terminator.

use std::path::Path;
use std::time::Duration;

use scandesk_core::constants::MAX_LINE_LENGTH;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::debug;

use crate::traits::{ScanSource, TagSource};
use crate::types::SourceInfo;
use crate::{HardwareError, Result};

const READ_CHUNK: usize = 512;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

struct LineReader {
    reader: Option<BoxedReader>,
    buffer: Vec<u8>,
    /// Inside an oversized line; drop bytes until its terminator.
    skipping: bool,
    info: SourceInfo,
}

impl LineReader {
    fn new(info: SourceInfo, reader: BoxedReader) -> Self {
        Self {
            reader: Some(reader),
            buffer: Vec::new(),
            skipping: false,
            info,
        }
    }

    async fn open(path: &Path, name: String) -> Result<Self> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            HardwareError::capture(format!("cannot open {}: {e}", path.display()))
        })?;
        let info = SourceInfo::new(name).with_location(path.display().to_string());
        debug!(device = %path.display(), "opened line device");
        Ok(Self::new(info, Box::new(file)))
    }

    /// Pop the next complete, non-blank line from the buffer.
    fn take_line(&mut self) -> Option<Result<String>> {
        loop {
            let Some(end) = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                if self.skipping {
                    self.buffer.clear();
                } else if self.buffer.len() > MAX_LINE_LENGTH {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    self.skipping = true;
                    return Some(Err(HardwareError::decode(format!(
                        "line exceeds {MAX_LINE_LENGTH} bytes ({dropped} buffered)"
                    ))));
                }
                return None;
            };
            if self.skipping {
                self.buffer.drain(..=end);
                self.skipping = false;
                continue;
            }
            let line: Vec<u8> = self.buffer.drain(..=end).take(end).collect();
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(
                String::from_utf8(line)
                    .map_err(|_| HardwareError::decode("line is not valid UTF-8")),
            );
        }
    }

    /// Read until a full line is buffered or `deadline` passes.
    async fn read_line(&mut self, deadline: Option<Instant>) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.take_line() {
                return line.map(Some);
            }

            let Some(reader) = self.reader.as_mut() else {
                return Err(HardwareError::disconnected(self.info.name.clone()));
            };

            let mut chunk = [0u8; READ_CHUNK];
            let read = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, reader.read(&mut chunk))
                    .await
                {
                    Ok(read) => read?,
                    Err(_) => return Ok(None),
                },
                None => reader.read(&mut chunk).await?,
            };

            if read == 0 {
                self.reader = None;
                return Err(HardwareError::disconnected(self.info.name.clone()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    fn close(&mut self) {
        self.reader = None;
        self.buffer.clear();
        self.skipping = false;
    }
}

/// Scan source reading one decoded payload per line.
pub struct LineScanSource {
    inner: LineReader,
}

impl LineScanSource {
    /// Open a character device, FIFO, or file.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::CaptureSourceFailure`] if the path cannot be
    /// opened.
    pub async fn open(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            inner: LineReader::open(path.as_ref(), name.into()).await?,
        })
    }

    /// Wrap an already open reader.
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            inner: LineReader::new(SourceInfo::new(name), Box::new(reader)),
        }
    }
}

impl ScanSource for LineScanSource {
    async fn next_payload(&mut self, timeout: Duration) -> Result<Option<String>> {
        self.inner.read_line(Some(Instant::now() + timeout)).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close();
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        self.inner.info.clone()
    }
}

/// RFID reader emitting one tag per line (keyboard-wedge style).
pub struct LineTagSource {
    inner: LineReader,
}

impl LineTagSource {
    /// Open a badge reader device.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::CaptureSourceFailure`] if the path cannot be
    /// opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            inner: LineReader::open(path.as_ref(), "RFID reader".to_string()).await?,
        })
    }

    /// Read tags from standard input, as a keyboard-wedge reader would
    /// deliver them to a terminal.
    pub fn stdin() -> Self {
        Self::from_reader("stdin", tokio::io::stdin())
    }

    /// Wrap an already open reader.
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            inner: LineReader::new(SourceInfo::new(name), Box::new(reader)),
        }
    }
}

impl TagSource for LineTagSource {
    async fn next_tag(&mut self) -> Result<String> {
        match self.inner.read_line(None).await? {
            Some(tag) => Ok(tag),
            None => Err(HardwareError::disconnected(self.inner.info.name.clone())),
        }
    }

    fn info(&self) -> SourceInfo {
        self.inner.info.clone()
    }
}
