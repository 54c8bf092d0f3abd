//! Export configuration.
//!
//! Loaded once at startup and handed to the [`Exporter`](crate::Exporter);
//! nothing here is global.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Naming convention of partition files inside a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionNaming {
    /// File name prefix before the embedded timestamp.
    /// Default: `venus_data_`
    pub prefix: String,

    /// File extension, without the dot.
    /// Default: `parquet`
    pub extension: String,
}

impl Default for PartitionNaming {
    fn default() -> Self {
        Self {
            prefix: "venus_data_".to_string(),
            extension: "parquet".to_string(),
        }
    }
}

/// Configuration for the export pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory holding the partition files.
    /// Default: `./data/venus`
    pub store: PathBuf,

    #[serde(flatten)]
    pub naming: PartitionNaming,

    /// Column holding each sample's time.
    /// Default: `timestamp`
    pub timestamp_column: String,

    /// Where published artifacts land. Temporary files are created here too,
    /// so the final rename never crosses a filesystem.
    /// Default: the system temp directory
    pub output_dir: PathBuf,

    /// Written in place of a missing or NaN sample.
    /// Default: empty field
    pub missing_marker: String,

    /// Coverage assumed for the newest partition, which has no successor to
    /// bound it.
    /// Default: 86400 (one day)
    pub last_partition_span_secs: u64,

    /// Per-request deadline; `None` disables it.
    /// Default: none
    pub deadline_secs: Option<u64>,

    /// Rows per record batch when reading partitions.
    /// Default: 8192
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from("./data/venus"),
            naming: PartitionNaming::default(),
            timestamp_column: "timestamp".to_string(),
            output_dir: std::env::temp_dir(),
            missing_marker: String::new(),
            last_partition_span_secs: 86_400,
            deadline_secs: None,
            batch_size: 8192,
        }
    }
}

impl ExportConfig {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file; absent keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|err| ExportError::Config(format!("read {}: {err}", path.display())))?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|err| ExportError::Config(format!("parse {}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timestamp_column.is_empty() {
            return Err(ExportError::Config("timestamp_column is empty".to_string()));
        }
        if self.naming.extension.is_empty() {
            return Err(ExportError::Config("extension is empty".to_string()));
        }
        if self.last_partition_span_secs == 0 {
            return Err(ExportError::Config(
                "last_partition_span_secs must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ExportError::Config("batch_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn last_partition_span(&self) -> Duration {
        Duration::from_secs(self.last_partition_span_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_config_default() {
        let config = ExportConfig::default();
        assert_eq!(config.naming.prefix, "venus_data_");
        assert_eq!(config.naming.extension, "parquet");
        assert_eq!(config.timestamp_column, "timestamp");
        assert_eq!(config.last_partition_span(), Duration::from_secs(86_400));
        assert_eq!(config.deadline(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"store": "/srv/venus", "prefix": "ecris_", "deadline_secs": 30}"#;
        let config: ExportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.store, PathBuf::from("/srv/venus"));
        assert_eq!(config.naming.prefix, "ecris_");
        assert_eq!(config.naming.extension, "parquet");
        assert_eq!(config.deadline(), Some(Duration::from_secs(30)));
        assert_eq!(config.batch_size, 8192);
    }

    #[test]
    fn test_load_rejects_zero_span() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, r#"{"last_partition_span_secs": 0}"#).unwrap();
        assert!(matches!(
            ExportConfig::load(&path),
            Err(ExportError::Config(_))
        ));
    }
}
