//! The export pipeline: index, plan, project, write.

use log::info;

use crate::artifact::{ArtifactWriter, ExportArtifact};
use crate::cancel::CancelToken;
use crate::channel::ExportRequest;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::partition::{PartitionIndex, RangePlanner};
use crate::project::{ParquetSource, PartitionSource};
use crate::timestamp::TimeWindow;

/// Runs export requests against one store.
///
/// Holds no per-request state; one `Exporter` can serve any number of
/// concurrent requests.
pub struct Exporter<S = ParquetSource> {
    config: ExportConfig,
    source: S,
    planner: RangePlanner,
    writer: ArtifactWriter,
}

impl Exporter<ParquetSource> {
    pub fn new(config: ExportConfig) -> Result<Self> {
        let source = ParquetSource::from_config(&config);
        Self::with_source(config, source)
    }
}

impl<S: PartitionSource> Exporter<S> {
    pub fn with_source(config: ExportConfig, source: S) -> Result<Self> {
        config.validate()?;
        let planner = RangePlanner::new(config.last_partition_span());
        let writer = ArtifactWriter::new(&config.output_dir, config.missing_marker.clone());
        Ok(Self {
            config,
            source,
            planner,
            writer,
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Scans the store for its current partitions.
    pub fn index(&self) -> Result<PartitionIndex> {
        PartitionIndex::scan(&self.config.store, &self.config.naming)
    }

    /// Exports with the configured deadline, scanning the store first.
    pub fn export(&self, request: &ExportRequest) -> Result<ExportArtifact> {
        let cancel = match self.config.deadline() {
            Some(deadline) => CancelToken::with_timeout(deadline),
            None => CancelToken::new(),
        };
        self.export_with(request, &cancel)
    }

    /// Exports under an explicit token. The window is re-checked before the
    /// store is touched.
    pub fn export_with(
        &self,
        request: &ExportRequest,
        cancel: &CancelToken,
    ) -> Result<ExportArtifact> {
        let window = TimeWindow::new(request.window().start(), request.window().end())?;
        cancel.check(&window)?;
        let index = self.index()?;
        self.export_from(&index, request, cancel)
    }

    /// Exports against an already-built index, which may be shared between
    /// concurrent requests.
    pub fn export_from(
        &self,
        index: &PartitionIndex,
        request: &ExportRequest,
        cancel: &CancelToken,
    ) -> Result<ExportArtifact> {
        let window = TimeWindow::new(request.window().start(), request.window().end())?;
        cancel.check(&window)?;

        let selected = self.planner.select(index.partitions(), &window);
        info!(
            "exporting {} channels over {} from {} of {} partitions",
            request.channels().len(),
            window,
            selected.len(),
            index.len()
        );

        let mut pending = self.writer.create(request.channels(), window)?;
        for partition in selected {
            cancel.check(&window)?;
            let fragment = self
                .source
                .project(partition, request.channels(), &window, cancel)?;
            pending.append(&fragment)?;
        }
        cancel.check(&window)?;
        pending.publish()
    }
}
