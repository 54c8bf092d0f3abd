//! Partition discovery and range planning.
//!
//! A store is a flat directory of immutable partition files, each named after
//! the instant its coverage starts (its *anchor*):
//!
//! ```text
//! data/venus/
//!   venus_data_2024-03-01.parquet
//!   venus_data_2024-03-02.parquet
//! ```
//!
//! A partition covers `[anchor, next anchor)`. The newest one has no
//! successor and covers a configured span instead.
//!
//! ```no_run
//! use venus_export::partition::{PartitionIndex, RangePlanner};
//! use venus_export::{PartitionNaming, TimeWindow};
//!
//! let index = PartitionIndex::scan("./data/venus", &PartitionNaming::default())?;
//! let window = TimeWindow::parse("2024-03-01 12:00:00", "2024-03-02 06:00:00")?;
//! for partition in RangePlanner::default().select(index.partitions(), &window) {
//!     println!("{}", partition.path().display());
//! }
//! # Ok::<(), venus_export::ExportError>(())
//! ```

mod index;
mod planner;

pub use index::{timestamp_of, Partition, PartitionIndex, SkippedPartition};
pub use planner::RangePlanner;
