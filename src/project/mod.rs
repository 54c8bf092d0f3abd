//! Channel projection: read one partition, keep the rows inside the window
//! and the requested channels, in request order.

mod parquet_source;

use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::channel::ChannelId;
use crate::error::Result;
use crate::partition::Partition;
use crate::timestamp::{TimeWindow, Timestamp};

pub use parquet_source::ParquetSource;

/// One sample: its time and one value per requested channel.
/// `None` marks a missing sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub timestamp: Timestamp,
    pub values: Vec<Option<String>>,
}

/// Rows of one partition restricted to a window and a channel list,
/// in the partition's native (time) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    partition: PathBuf,
    channels: Vec<ChannelId>,
    rows: Vec<Row>,
}

impl Fragment {
    pub fn new(partition: impl Into<PathBuf>, channels: Vec<ChannelId>, rows: Vec<Row>) -> Self {
        Self {
            partition: partition.into(),
            channels,
            rows,
        }
    }

    pub fn partition(&self) -> &Path {
        &self.partition
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Backing store for partitions.
///
/// Implementations must fail with `UnknownChannel` rather than drop a column,
/// keep rows with `window.start() <= ts < window.end()` only, and poll
/// `cancel` between reads.
pub trait PartitionSource: Send + Sync {
    fn project(
        &self,
        partition: &Partition,
        channels: &[ChannelId],
        window: &TimeWindow,
        cancel: &CancelToken,
    ) -> Result<Fragment>;
}
