use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ExportError, Result};
use crate::timestamp::TimeWindow;

/// Stops an in-flight export, either on request or once a deadline passes.
///
/// Clones share the same flag, so the caller keeps one half and the worker
/// polls the other.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Errors if the export for `window` should stop now.
    pub fn check(&self, window: &TimeWindow) -> Result<()> {
        if self.is_cancelled() {
            return Err(ExportError::Cancelled { window: *window });
        }
        if self.deadline.map_or(false, |d| Instant::now() >= d) {
            return Err(ExportError::DeadlineExceeded { window: *window });
        }
        Ok(())
    }
}
