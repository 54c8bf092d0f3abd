//! Export artifacts: CSV files published with write-to-temp then rename.
//!
//! A [`PendingArtifact`] lives under a hidden temporary name in the output
//! directory until [`PendingArtifact::publish`] syncs it and renames it into
//! place. Dropping it unpublished removes the temporary file, so readers of
//! the output directory only ever see complete artifacts.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::channel::ChannelId;
use crate::error::{ExportError, Result};
use crate::project::Fragment;
use crate::timestamp::{TimeWindow, Timestamp};

const TIMESTAMP_HEADER: &str = "timestamp";

static NEXT_ARTIFACT: AtomicU64 = AtomicU64::new(0);

/// A published export. The caller owns the file and removes it when done.
///
/// Ownership is exclusive, so the handle cannot be duplicated:
///
/// ```compile_fail
/// fn shareable<T: Clone>() {}
/// shareable::<venus_export::ExportArtifact>();
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    path: PathBuf,
    rows: u64,
}

impl ExportArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written, excluding the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.path)
    }

    pub fn remove(self) -> std::io::Result<()> {
        std::fs::remove_file(&self.path)
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Creates artifacts in one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    missing_marker: String,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, missing_marker: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            missing_marker: missing_marker.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Starts an artifact with the header `timestamp,<channels...>`.
    pub fn create(&self, channels: &[ChannelId], window: TimeWindow) -> Result<PendingArtifact> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|err| ExportError::write(&self.output_dir, err))?;

        let name = unique_name();
        let final_path = self.output_dir.join(&name);
        let temp_path = self.output_dir.join(format!(".{name}.tmp"));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|err| ExportError::write(&temp_path, err))?;

        let mut pending = PendingArtifact {
            temp_path,
            final_path,
            writer: Some(csv::Writer::from_writer(file)),
            channels: channels.to_vec(),
            window,
            missing_marker: self.missing_marker.clone(),
            last: None,
            rows: 0,
            duplicates: 0,
            published: false,
        };
        pending.write_header()?;
        Ok(pending)
    }

    /// Writes `fragments`, already in time order, into one published artifact.
    pub fn write<I>(
        &self,
        channels: &[ChannelId],
        window: TimeWindow,
        fragments: I,
    ) -> Result<ExportArtifact>
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut pending = self.create(channels, window)?;
        for fragment in fragments {
            pending.append(&fragment)?;
        }
        pending.publish()
    }
}

/// An artifact still being written under its temporary name.
pub struct PendingArtifact {
    temp_path: PathBuf,
    final_path: PathBuf,
    writer: Option<csv::Writer<File>>,
    channels: Vec<ChannelId>,
    window: TimeWindow,
    missing_marker: String,
    last: Option<Timestamp>,
    rows: u64,
    duplicates: u64,
    published: bool,
}

impl PendingArtifact {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Appends a fragment's rows.
    ///
    /// A row repeating the previous timestamp is dropped; one going back in
    /// time fails the export.
    pub fn append(&mut self, fragment: &Fragment) -> Result<()> {
        if fragment.channels() != self.channels.as_slice() {
            return Err(ExportError::write(
                &self.temp_path,
                format!(
                    "fragment from {} does not match the artifact's columns",
                    fragment.partition().display()
                ),
            ));
        }
        let temp_path = &self.temp_path;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ExportError::write(temp_path, "artifact is closed"))?;

        for row in fragment.rows() {
            if let Some(previous) = self.last {
                if row.timestamp < previous {
                    return Err(ExportError::OutOfOrder {
                        partition: fragment.partition().to_path_buf(),
                        previous,
                        current: row.timestamp,
                        window: self.window,
                    });
                }
                if row.timestamp == previous {
                    self.duplicates += 1;
                    continue;
                }
            }
            let timestamp = row.timestamp.to_string();
            let mut record: Vec<&str> = Vec::with_capacity(row.values.len() + 1);
            record.push(&timestamp);
            record.extend(
                row.values
                    .iter()
                    .map(|value| value.as_deref().unwrap_or(&self.missing_marker)),
            );
            writer
                .write_record(&record)
                .map_err(|err| ExportError::write(temp_path, err))?;
            self.last = Some(row.timestamp);
            self.rows += 1;
        }
        Ok(())
    }

    /// Flushes, syncs and renames the artifact into place.
    pub fn publish(mut self) -> Result<ExportArtifact> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ExportError::write(&self.temp_path, "artifact is closed"))?;
        let file = writer
            .into_inner()
            .map_err(|err| ExportError::write(&self.temp_path, err.error().to_string()))?;
        file.sync_all()
            .map_err(|err| ExportError::write(&self.temp_path, err))?;
        drop(file);

        std::fs::rename(&self.temp_path, &self.final_path)
            .map_err(|err| ExportError::write(&self.final_path, err))?;
        self.published = true;
        if let Some(dir) = self.final_path.parent() {
            if let Err(err) = fsync_dir(dir) {
                warn!("failed to sync {}: {err}", dir.display());
            }
        }

        if self.duplicates > 0 {
            debug!(
                "dropped {} rows with repeated timestamps from {}",
                self.duplicates,
                self.final_path.display()
            );
        }
        info!(
            "published {} ({} rows, window {})",
            self.final_path.display(),
            self.rows,
            self.window
        );
        Ok(ExportArtifact {
            path: self.final_path.clone(),
            rows: self.rows,
        })
    }

    fn write_header(&mut self) -> Result<()> {
        let temp_path = &self.temp_path;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ExportError::write(temp_path, "artifact is closed"))?;
        let header = std::iter::once(TIMESTAMP_HEADER)
            .chain(self.channels.iter().map(ChannelId::as_str));
        writer
            .write_record(header)
            .map_err(|err| ExportError::write(temp_path, err))
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        drop(self.writer.take());
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => debug!("discarded {}", self.temp_path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove {}: {err}", self.temp_path.display()),
        }
    }
}

fn unique_name() -> String {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = NEXT_ARTIFACT.fetch_add(1, Ordering::Relaxed);
    format!("venus_export_{now_ns}_{}_{seq}.csv", std::process::id())
}

fn fsync_dir(path: &Path) -> std::io::Result<()> {
    let dir = File::open(path)?;
    dir.sync_all()
}
