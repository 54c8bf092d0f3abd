//! Time-ranged channel export from partitioned VENUS telemetry stores.
//!
//! A store is a directory of per-day parquet partitions. An export picks a
//! set of channels and a half-open window `[start, end)` and produces one CSV
//! file:
//!
//! 1. [`partition::PartitionIndex`] lists the store's partitions by anchor.
//! 2. [`partition::RangePlanner`] keeps the partitions whose coverage meets
//!    the window.
//! 3. A [`project::PartitionSource`] reads each one, keeping rows inside the
//!    window and the requested channels in request order.
//! 4. [`artifact::ArtifactWriter`] concatenates the fragments into a
//!    temporary file and renames it into place once complete.
//!
//! [`ExportService`] wraps the pipeline for a front end: one worker thread per
//! request, deadlines, and cancellation.

pub mod artifact;
pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod project;
pub mod service;
pub mod timestamp;

pub use artifact::{ArtifactWriter, ExportArtifact, PendingArtifact};
pub use cancel::CancelToken;
pub use channel::{ChannelGroup, ChannelId, ChannelInfo, ExportRequest, KNOWN_CHANNELS};
pub use config::{ExportConfig, PartitionNaming};
pub use error::{ExportError, Result};
pub use pipeline::Exporter;
pub use service::{ExportHandle, ExportService};
pub use timestamp::{TimeWindow, Timestamp};
