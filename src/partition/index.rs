use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::config::PartitionNaming;
use crate::error::{ExportError, Result};
use crate::timestamp::Timestamp;

/// One immutable partition file and the instant its coverage starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    path: PathBuf,
    anchor: Timestamp,
}

impl Partition {
    pub fn new(path: impl Into<PathBuf>, anchor: Timestamp) -> Self {
        Self {
            path: path.into(),
            anchor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn anchor(&self) -> Timestamp {
        self.anchor
    }
}

/// A file that looked like a partition but was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPartition {
    pub path: PathBuf,
    pub reason: String,
}

/// Parses the anchor embedded in a partition's file name.
///
/// `venus_data_2024-03-01.parquet`, `venus_data_20240301.parquet` and the
/// time-qualified forms `..._2024-03-01_06-00-00`, `..._20240301_060000`,
/// `..._2024-03-01T06-00-00` are understood.
pub fn timestamp_of(path: &Path, naming: &PartitionNaming) -> Result<Timestamp> {
    let malformed = |reason: &str| ExportError::MalformedPartition {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| malformed("file name is not valid UTF-8"))?;
    let stem = file_name
        .strip_prefix(naming.prefix.as_str())
        .and_then(|rest| rest.strip_suffix(naming.extension.as_str()))
        .and_then(|rest| rest.strip_suffix('.'))
        .ok_or_else(|| malformed("name does not follow the store's naming convention"))?;

    let datetimes = [
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]"),
        format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]"),
        format_description!("[year][month][day]_[hour][minute][second]"),
    ];
    if let Some(dt) = datetimes
        .iter()
        .find_map(|fmt| PrimitiveDateTime::parse(stem, *fmt).ok())
    {
        return Timestamp::from_datetime(dt).ok_or_else(|| malformed("timestamp out of range"));
    }

    let dates = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[year][month][day]"),
    ];
    let date = dates
        .iter()
        .find_map(|fmt| Date::parse(stem, *fmt).ok())
        .ok_or_else(|| malformed("cannot parse timestamp from file name"))?;
    Timestamp::from_date(date).ok_or_else(|| malformed("timestamp out of range"))
}

/// Snapshot of a store's partitions, ascending by anchor with unique anchors.
///
/// The index is read-only once built and can be shared between requests;
/// [`PartitionIndex::iter`] restarts from the oldest partition every call.
#[derive(Debug, Clone, Default)]
pub struct PartitionIndex {
    partitions: Vec<Partition>,
    skipped: Vec<SkippedPartition>,
}

impl PartitionIndex {
    /// Lists the partitions of `store`. A missing store is empty, not an error.
    pub fn scan(store: impl AsRef<Path>, naming: &PartitionNaming) -> Result<Self> {
        let store = store.as_ref();
        let mut found = Vec::new();
        let mut skipped = Vec::new();
        let entries = match std::fs::read_dir(store) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("store {} does not exist", store.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(ExportError::read(store, err)),
        };

        for entry in entries {
            let entry = entry.map_err(|err| ExportError::read(store, err))?;
            let path = entry.path();
            if !looks_like_partition(&path, naming) {
                continue;
            }
            // follows symlinks; a dangling link is reported, not ignored
            let reason = match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => None,
                Ok(_) => Some("not a regular file".to_string()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    Some("dangling symlink".to_string())
                }
                Err(err) => return Err(ExportError::read(&path, err)),
            };
            if let Some(reason) = reason {
                warn!("skipping partition {}: {reason}", path.display());
                skipped.push(SkippedPartition { path, reason });
                continue;
            }
            match timestamp_of(&path, naming) {
                Ok(anchor) => found.push(Partition::new(path, anchor)),
                Err(err) => {
                    warn!("skipping partition: {err}");
                    skipped.push(SkippedPartition {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let mut index = Self::from_partitions(found);
        skipped.append(&mut index.skipped);
        skipped.sort_by(|a, b| a.path.cmp(&b.path));
        index.skipped = skipped;
        debug!(
            "indexed {} partitions in {} ({} skipped)",
            index.partitions.len(),
            store.display(),
            index.skipped.len()
        );
        Ok(index)
    }

    /// Builds an index from already-known partitions. When two share an
    /// anchor, the one whose path sorts first is kept.
    pub fn from_partitions(mut partitions: Vec<Partition>) -> Self {
        partitions.sort_by(|a, b| a.anchor.cmp(&b.anchor).then_with(|| a.path.cmp(&b.path)));
        let mut kept: Vec<Partition> = Vec::with_capacity(partitions.len());
        let mut skipped = Vec::new();
        for partition in partitions {
            match kept.last() {
                Some(prev) if prev.anchor == partition.anchor => {
                    let reason = format!(
                        "duplicate anchor {}, shadowed by {}",
                        partition.anchor,
                        prev.path.display()
                    );
                    warn!("skipping partition {}: {reason}", partition.path.display());
                    skipped.push(SkippedPartition {
                        path: partition.path,
                        reason,
                    });
                }
                _ => kept.push(partition),
            }
        }
        Self {
            partitions: kept,
            skipped,
        }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    pub fn skipped(&self) -> &[SkippedPartition] {
        &self.skipped
    }

    /// Anchors of every indexed partition, oldest first.
    pub fn available_dates(&self) -> Vec<Timestamp> {
        self.partitions.iter().map(Partition::anchor).collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl<'a> IntoIterator for &'a PartitionIndex {
    type Item = &'a Partition;
    type IntoIter = std::slice::Iter<'a, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn looks_like_partition(path: &Path, naming: &PartitionNaming) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        // Non-UTF-8 names can still carry the extension; let timestamp_of
        // report them.
        return path.extension().map_or(false, |ext| ext == naming.extension.as_str());
    };
    name.starts_with(naming.prefix.as_str())
        && path.extension().map_or(false, |ext| ext == naming.extension.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn naming() -> PartitionNaming {
        PartitionNaming::default()
    }

    #[test]
    fn parses_date_and_datetime_names() {
        let day = timestamp_of(Path::new("venus_data_2024-03-01.parquet"), &naming()).unwrap();
        assert_eq!(day.to_string(), "2024-03-01 00:00:00");

        let compact = timestamp_of(Path::new("/x/venus_data_20240301.parquet"), &naming()).unwrap();
        assert_eq!(compact, day);

        let with_time =
            timestamp_of(Path::new("venus_data_2024-03-01_06-30-00.parquet"), &naming()).unwrap();
        assert_eq!(with_time.to_string(), "2024-03-01 06:30:00");

        let compact_time =
            timestamp_of(Path::new("venus_data_20240301_063000.parquet"), &naming()).unwrap();
        assert_eq!(compact_time, with_time);
    }

    #[test]
    fn malformed_names_are_errors() {
        for name in [
            "venus_data_latest.parquet",
            "venus_data_2024-02-30.parquet",
            "other_2024-03-01.parquet",
            "venus_data_2024-03-01.csv",
        ] {
            let err = timestamp_of(Path::new(name), &naming()).unwrap_err();
            assert!(
                matches!(err, ExportError::MalformedPartition { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn scan_sorts_and_reports_malformed() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "venus_data_2024-03-02.parquet",
            "venus_data_2024-03-01.parquet",
            "venus_data_garbage.parquet",
            "notes.txt",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("venus_data_2024-03-05.parquet")).unwrap();

        let index = PartitionIndex::scan(dir.path(), &naming()).unwrap();
        let dates: Vec<String> = index.available_dates().iter().map(|t| t.to_string()).collect();
        assert_eq!(dates, ["2024-03-01 00:00:00", "2024-03-02 00:00:00"]);
        let skipped: Vec<&Path> = index.skipped().iter().map(|s| s.path.as_path()).collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped[0].ends_with("venus_data_2024-03-05.parquet"));
        assert!(skipped[1].ends_with("venus_data_garbage.parquet"));

        // restartable
        assert_eq!(index.iter().count(), 2);
        assert_eq!(index.iter().count(), 2);
    }

    #[test]
    fn duplicate_anchor_keeps_first_path() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("venus_data_2024-03-01.parquet")).unwrap();
        File::create(dir.path().join("venus_data_20240301.parquet")).unwrap();

        let index = PartitionIndex::scan(dir.path(), &naming()).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.partitions()[0]
            .path()
            .ends_with("venus_data_2024-03-01.parquet"));
        assert_eq!(index.skipped().len(), 1);
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = PartitionIndex::scan(dir.path().join("absent"), &naming()).unwrap();
        assert!(index.is_empty());
        assert!(index.skipped().is_empty());
    }

    #[test]
    fn store_under_a_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        File::create(&file).unwrap();

        let err = PartitionIndex::scan(file.join("store"), &naming()).unwrap_err();
        assert!(matches!(err, ExportError::StorageRead { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_partitions_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        std::fs::create_dir(&store).unwrap();
        let elsewhere = dir.path().join("archive.parquet");
        File::create(&elsewhere).unwrap();
        File::create(store.join("venus_data_2024-03-01.parquet")).unwrap();
        std::os::unix::fs::symlink(&elsewhere, store.join("venus_data_2024-03-02.parquet"))
            .unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("gone.parquet"),
            store.join("venus_data_2024-03-03.parquet"),
        )
        .unwrap();

        let index = PartitionIndex::scan(&store, &naming()).unwrap();
        let dates: Vec<String> = index.available_dates().iter().map(|t| t.to_string()).collect();
        assert_eq!(dates, ["2024-03-01 00:00:00", "2024-03-02 00:00:00"]);
        assert_eq!(index.skipped().len(), 1);
        assert!(index.skipped()[0].path.ends_with("venus_data_2024-03-03.parquet"));
        assert_eq!(index.skipped()[0].reason, "dangling symlink");
    }
}
