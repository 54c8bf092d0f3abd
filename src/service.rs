//! Request intake: one worker thread per export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::artifact::ExportArtifact;
use crate::cancel::CancelToken;
use crate::channel::ExportRequest;
use crate::error::{ExportError, Result};
use crate::pipeline::Exporter;
use crate::project::{ParquetSource, PartitionSource};
use crate::timestamp::TimeWindow;

/// Runs each submitted request on its own thread so a slow export never
/// holds up another.
pub struct ExportService<S = ParquetSource> {
    exporter: Arc<Exporter<S>>,
    next_id: AtomicU64,
}

impl<S> ExportService<S>
where
    S: PartitionSource + 'static,
{
    pub fn new(exporter: Exporter<S>) -> Self {
        Self {
            exporter: Arc::new(exporter),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn exporter(&self) -> &Exporter<S> {
        &self.exporter
    }

    /// Starts an export in the background. The configured deadline, if any,
    /// starts counting now.
    pub fn submit(&self, request: ExportRequest) -> Result<ExportHandle> {
        let cancel = match self.exporter.config().deadline() {
            Some(deadline) => CancelToken::with_timeout(deadline),
            None => CancelToken::new(),
        };
        let window = request.window();
        let exporter = Arc::clone(&self.exporter);
        let worker_cancel = cancel.clone();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let join = thread::Builder::new()
            .name(format!("venus-export-{id}"))
            .spawn(move || {
                let result = exporter.export_with(&request, &worker_cancel);
                // a cancel that raced the publish still discards the artifact
                match result {
                    Ok(artifact) if worker_cancel.is_cancelled() => {
                        discard(artifact);
                        Err(ExportError::Cancelled { window })
                    }
                    other => other,
                }
            })
            .map_err(|err| ExportError::Worker(format!("spawn failed: {err}")))?;

        Ok(ExportHandle {
            cancel,
            join: Some(join),
            window,
        })
    }

    /// Validates form input and runs the export to completion.
    ///
    /// This is the single call a front end makes per submission.
    pub fn run<I, C>(&self, channels: I, start: &str, end: &str) -> Result<ExportArtifact>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let window = TimeWindow::parse(start, end)?;
        let request = ExportRequest::new(channels, window)?;
        self.submit(request)?.wait()
    }
}

/// A running export. Dropping the handle cancels it and removes whatever it
/// produced.
pub struct ExportHandle {
    cancel: CancelToken,
    join: Option<JoinHandle<Result<ExportArtifact>>>,
    window: TimeWindow,
}

impl ExportHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the export finishes. After [`ExportHandle::cancel`] no
    /// artifact is returned, even if the worker managed to publish one.
    pub fn wait(mut self) -> Result<ExportArtifact> {
        let join = self
            .join
            .take()
            .ok_or_else(|| ExportError::Worker("export already collected".to_string()))?;
        let result = join
            .join()
            .map_err(|_| ExportError::Worker("export worker panicked".to_string()))?;
        match result {
            Ok(artifact) if self.cancel.is_cancelled() => {
                discard(artifact);
                Err(ExportError::Cancelled {
                    window: self.window,
                })
            }
            other => other,
        }
    }
}

impl Drop for ExportHandle {
    fn drop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.cancel.cancel();
        // reap off-thread so dropping never blocks on I/O; the worker handle
        // stays reachable here in case the reaper cannot be spawned
        let slot = Arc::new(Mutex::new(Some(join)));
        let reaper_slot = Arc::clone(&slot);
        let reaper = thread::Builder::new()
            .name("venus-export-reaper".to_string())
            .spawn(move || reap(&reaper_slot));
        if let Err(err) = reaper {
            warn!("failed to spawn export reaper, reaping inline: {err}");
            reap(&slot);
        }
    }
}

fn reap(slot: &Mutex<Option<JoinHandle<Result<ExportArtifact>>>>) {
    let join = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(join) = join {
        if let Ok(Ok(artifact)) = join.join() {
            discard(artifact);
        }
    }
}

fn discard(artifact: ExportArtifact) {
    let path = artifact.path().to_path_buf();
    match artifact.remove() {
        Ok(()) => debug!("discarded cancelled artifact {}", path.display()),
        Err(err) => warn!("failed to remove cancelled artifact {}: {err}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactWriter;
    use crate::channel::ChannelId;

    #[test]
    fn reaping_discards_published_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().to_path_buf();
        let join = thread::spawn(move || -> Result<ExportArtifact> {
            let window = TimeWindow::parse("2024-03-01", "2024-03-02")?;
            let channels = [ChannelId::new("inj_mbar")?];
            ArtifactWriter::new(output, "").write(&channels, window, Vec::new())
        });
        let slot = Mutex::new(Some(join));

        reap(&slot);
        assert!(slot.lock().unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // a second reap finds nothing left to do
        reap(&slot);
    }
}
