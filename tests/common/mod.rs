#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;
use venus_export::timestamp::NANOS_PER_SEC;
use venus_export::{ExportConfig, Timestamp};

pub const MINUTE: i64 = 60 * NANOS_PER_SEC;
pub const HOUR: i64 = 60 * MINUTE;

/// Channels in the order they are stored on disk.
pub const STORE_CHANNELS: [&str; 3] = ["bl_mig2_torr", "ext_mbar", "inj_mbar"];

pub struct TestStore {
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("store")).expect("store dir");
        Self { dir }
    }

    pub fn store(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn config(&self) -> ExportConfig {
        let mut config = ExportConfig::new(self.store());
        config.output_dir = self.output();
        config
    }

    /// Writes one partition for `day` with a row every `step` nanoseconds.
    ///
    /// Channel `k` (in [`STORE_CHANNELS`] order) holds `k * 100_000 + row`,
    /// and `inj_mbar` is null on every fifth row.
    pub fn write_day(&self, day: &str, step: i64) -> PathBuf {
        let start = Timestamp::parse(day).expect("day").as_nanos();
        let times: Vec<i64> = (0..)
            .map(|i| start + i * step)
            .take_while(|t| *t < start + 24 * HOUR)
            .collect();
        let path = self.store().join(format!("venus_data_{day}.parquet"));
        write_columns(&path, &times, &STORE_CHANNELS);
        path
    }

    pub fn output_files(&self) -> Vec<PathBuf> {
        list_dir(&self.output())
    }
}

pub fn write_columns(path: &Path, times: &[i64], channels: &[&str]) {
    let mut fields = vec![Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Nanosecond, None),
        false,
    )];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(TimestampNanosecondArray::from(times.to_vec()))];
    for (k, name) in channels.iter().enumerate() {
        fields.push(Field::new(*name, DataType::Int64, true));
        let values: Vec<Option<i64>> = (0..times.len())
            .map(|row| {
                if *name == "inj_mbar" && row % 5 == 4 {
                    None
                } else {
                    Some((k as i64) * 100_000 + row as i64)
                }
            })
            .collect();
        arrays.push(Arc::new(Int64Array::from(values)));
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(Arc::clone(&schema), arrays).expect("batch");
    let file = File::create(path).expect("create parquet");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("writer");
    writer.write(&batch).expect("write batch");
    writer.close().expect("close writer");
}

pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    entries.sort();
    entries
}

/// Header and rows of a CSV artifact.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open csv");
    let header = reader
        .headers()
        .expect("header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("record").iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

pub fn ts(value: &str) -> Timestamp {
    Timestamp::parse(value).expect("timestamp")
}
