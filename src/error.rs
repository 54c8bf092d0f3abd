use std::path::PathBuf;

use thiserror::Error;

use crate::timestamp::{TimeWindow, Timestamp};

/// Errors produced by the export pipeline.
///
/// Every variant carries enough context (channel, partition, window) for the
/// caller to render a message without re-deriving anything.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid window: start {start} must be before end {end}")]
    InvalidWindow { start: Timestamp, end: Timestamp },

    #[error("no channels requested")]
    EmptySelection,

    #[error("invalid channel identifier {channel:?}: {reason}")]
    InvalidChannel { channel: String, reason: &'static str },

    #[error("invalid timestamp {value:?}: expected YYYY-MM-DD[ HH:MM[:SS]]")]
    InvalidTimestamp { value: String },

    #[error("malformed partition {}: {reason}", path.display())]
    MalformedPartition { path: PathBuf, reason: String },

    #[error("channel {channel:?} not present in partition {}", partition.display())]
    UnknownChannel { channel: String, partition: PathBuf },

    #[error("partition {} goes back in time: {current} after {previous} (window {window})", partition.display())]
    OutOfOrder {
        partition: PathBuf,
        previous: Timestamp,
        current: Timestamp,
        window: TimeWindow,
    },

    #[error("failed to read {}: {source}", path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to write {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("export cancelled (window {window})")]
    Cancelled { window: TimeWindow },

    #[error("export deadline exceeded (window {window})")]
    DeadlineExceeded { window: TimeWindow },

    #[error("config error: {0}")]
    Config(String),

    #[error("export worker failed: {0}")]
    Worker(String),
}

impl ExportError {
    pub(crate) fn read(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ExportError::StorageRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn write(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ExportError::StorageWrite {
            path: path.into(),
            source: source.into(),
        }
    }

    /// True for errors raised by request validation, before any I/O.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidWindow { .. }
                | ExportError::EmptySelection
                | ExportError::InvalidChannel { .. }
                | ExportError::InvalidTimestamp { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
