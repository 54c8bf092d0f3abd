use std::fs::File;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, TimeUnit, TimestampNanosecondType,
};
use arrow::error::ArrowError;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;

use crate::cancel::CancelToken;
use crate::channel::ChannelId;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::partition::Partition;
use crate::project::{Fragment, PartitionSource, Row};
use crate::timestamp::{TimeWindow, Timestamp};

const DEFAULT_BATCH_SIZE: usize = 8192;

/// Reads partitions stored as parquet files with one column per channel and
/// a timestamp column.
///
/// The timestamp column may be any arrow timestamp unit, `Int64`
/// nanoseconds, or strings arrow can cast to a timestamp.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    timestamp_column: String,
    batch_size: usize,
}

impl ParquetSource {
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.timestamp_column.clone()).with_batch_size(config.batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl PartitionSource for ParquetSource {
    fn project(
        &self,
        partition: &Partition,
        channels: &[ChannelId],
        window: &TimeWindow,
        cancel: &CancelToken,
    ) -> Result<Fragment> {
        cancel.check(window)?;
        let path = partition.path();
        let read_err = |err: ArrowError| ExportError::read(path, err);

        let file = File::open(path).map_err(|err| ExportError::read(path, err))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|err| ExportError::read(path, err))?;

        let schema = Arc::clone(builder.schema());
        let ts_index = schema.index_of(&self.timestamp_column).map_err(|_| {
            ExportError::read(
                path,
                format!("missing timestamp column {:?}", self.timestamp_column),
            )
        })?;
        let mut roots = Vec::with_capacity(channels.len() + 1);
        roots.push(ts_index);
        for channel in channels {
            if channel.as_str() == self.timestamp_column {
                return Err(ExportError::InvalidChannel {
                    channel: channel.to_string(),
                    reason: "name is reserved for the timestamp column",
                });
            }
            let index = schema
                .index_of(channel.as_str())
                .map_err(|_| ExportError::UnknownChannel {
                    channel: channel.to_string(),
                    partition: path.to_path_buf(),
                })?;
            roots.push(index);
        }

        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()
            .map_err(|err| ExportError::read(path, err))?;

        let mut rows = Vec::new();
        let mut scanned = 0usize;
        for batch in reader {
            cancel.check(window)?;
            let batch = batch.map_err(read_err)?;

            let raw_times = batch
                .column_by_name(&self.timestamp_column)
                .ok_or_else(|| ExportError::read(path, "timestamp column missing from batch"))?;
            let times_ns = cast(raw_times, &DataType::Timestamp(TimeUnit::Nanosecond, None))
                .map_err(read_err)?;
            let times = times_ns
                .as_primitive_opt::<TimestampNanosecondType>()
                .ok_or_else(|| ExportError::read(path, "timestamp column did not cast"))?;

            let columns = channels
                .iter()
                .map(|channel| {
                    let array = batch.column_by_name(channel.as_str()).ok_or_else(|| {
                        ExportError::UnknownChannel {
                            channel: channel.to_string(),
                            partition: path.to_path_buf(),
                        }
                    })?;
                    ChannelColumn::new(array.as_ref()).map_err(read_err)
                })
                .collect::<Result<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                if times.is_null(row) {
                    return Err(ExportError::read(
                        path,
                        format!("null timestamp in row {}", scanned + row),
                    ));
                }
                let timestamp = Timestamp::from_nanos(times.value(row));
                if !window.contains(timestamp) {
                    continue;
                }
                rows.push(Row {
                    timestamp,
                    values: columns.iter().map(|c| c.value(row)).collect(),
                });
            }
            scanned += batch.num_rows();
        }

        debug!(
            "projected {} of {} rows from {}",
            rows.len(),
            scanned,
            path.display()
        );
        Ok(Fragment::new(path, channels.to_vec(), rows))
    }
}

struct ChannelColumn<'a> {
    array: &'a dyn Array,
    formatter: ArrayFormatter<'a>,
}

impl<'a> ChannelColumn<'a> {
    fn new(array: &'a dyn Array) -> std::result::Result<Self, ArrowError> {
        let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
        Ok(Self { array, formatter })
    }

    fn value(&self, row: usize) -> Option<String> {
        if self.array.is_null(row) || is_nan(self.array, row) {
            return None;
        }
        Some(self.formatter.value(row).to_string())
    }
}

fn is_nan(array: &dyn Array, row: usize) -> bool {
    match array.data_type() {
        DataType::Float16 => array.as_primitive::<Float16Type>().value(row).is_nan(),
        DataType::Float32 => array.as_primitive::<Float32Type>().value(row).is_nan(),
        DataType::Float64 => array.as_primitive::<Float64Type>().value(row).is_nan(),
        _ => false,
    }
}
