//! Configured capture devices.
//!
//! [`DeviceProvider`] maps each configured source to a stable
//! [`SourceId`] (its position in the configuration) and opens it as a
//! [`LineScanSource`] whenever the pool starts or restarts that worker.

use std::path::PathBuf;

use scandesk_core::SourceId;
use scandesk_core::config::SourceConfig;

use crate::line::LineScanSource;
use crate::traits::SourceProvider;
use crate::{HardwareError, Result};

/// Opens line-oriented scan devices listed in the configuration.
///
/// # Examples
///
/// ```
/// use scandesk_core::SourceId;
/// use scandesk_core::config::SourceConfig;
/// use scandesk_hardware::devices::DeviceProvider;
/// use scandesk_hardware::traits::SourceProvider;
///
/// let provider = DeviceProvider::new(vec![
///     SourceConfig { name: "left".into(), device: "/dev/ttyACM0".into() },
///     SourceConfig { name: "right".into(), device: "/dev/ttyACM1".into() },
/// ]).unwrap();
///
/// assert_eq!(provider.source_ids(), vec![SourceId::new(0), SourceId::new(1)]);
/// assert_eq!(provider.name(SourceId::new(1)), Some("right"));
/// ```
#[derive(Debug, Clone)]
pub struct DeviceProvider {
    sources: Vec<SourceConfig>,
}

impl DeviceProvider {
    /// Build a provider over the configured sources.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InvalidData`] if there are more sources than
    /// a [`SourceId`] can address.
    pub fn new(sources: Vec<SourceConfig>) -> Result<Self> {
        if sources.len() > usize::from(u16::MAX) {
            return Err(HardwareError::invalid_data(format!(
                "{} scan sources configured",
                sources.len()
            )));
        }
        Ok(Self { sources })
    }

    /// Configured name of a source.
    pub fn name(&self, id: SourceId) -> Option<&str> {
        self.get(id).map(|source| source.name.as_str())
    }

    /// Configured device path of a source.
    pub fn device(&self, id: SourceId) -> Option<&PathBuf> {
        self.get(id).map(|source| &source.device)
    }

    fn get(&self, id: SourceId) -> Option<&SourceConfig> {
        self.sources.get(usize::from(id.index()))
    }
}

impl SourceProvider for DeviceProvider {
    type Source = LineScanSource;

    fn source_ids(&self) -> Vec<SourceId> {
        (0..self.sources.len())
            .filter_map(|index| u16::try_from(index).ok())
            .map(SourceId::new)
            .collect()
    }

    async fn open(&self, id: SourceId) -> Result<LineScanSource> {
        let source = self.get(id).ok_or(HardwareError::UnknownSource(id))?;
        LineScanSource::open(&source.device, source.name.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ScanSource;
    use std::io::Write;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_configured_device() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ORDER-9").unwrap();

        let provider = DeviceProvider::new(vec![SourceConfig {
            name: "bench".into(),
            device: file.path().to_path_buf(),
        }])
        .unwrap();

        let mut source = provider.open(SourceId::new(0)).await.unwrap();
        let payload = source
            .next_payload(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(payload.as_deref(), Some("ORDER-9"));
    }

    #[tokio::test]
    async fn test_open_unknown_source() {
        let provider = DeviceProvider::new(Vec::new()).unwrap();
        assert!(provider.source_ids().is_empty());
        assert!(matches!(
            provider.open(SourceId::new(0)).await,
            Err(HardwareError::UnknownSource(_))
        ));
    }
}
