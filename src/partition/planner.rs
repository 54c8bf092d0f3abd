use std::time::Duration;

use crate::partition::Partition;
use crate::timestamp::{TimeWindow, Timestamp};

const ONE_DAY: Duration = Duration::from_secs(86_400);

/// Maps a window onto the partitions that may hold samples inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePlanner {
    last_span: Duration,
}

impl Default for RangePlanner {
    fn default() -> Self {
        Self::new(ONE_DAY)
    }
}

impl RangePlanner {
    /// `last_span` is the coverage assumed for the newest partition.
    pub fn new(last_span: Duration) -> Self {
        Self { last_span }
    }

    /// Coverage `[anchor, end)` of `partitions[idx]`.
    pub fn span_of(&self, partitions: &[Partition], idx: usize) -> (Timestamp, Timestamp) {
        let anchor = partitions[idx].anchor();
        let end = match partitions.get(idx + 1) {
            Some(next) => next.anchor(),
            None => anchor.saturating_add(self.last_span),
        };
        (anchor, end)
    }

    /// Returns the contiguous run of `partitions` (ascending, unique anchors)
    /// whose coverage intersects `window`.
    ///
    /// This includes the partition anchored before `window.start()` whose
    /// coverage runs into the window, so nothing is lost at a boundary.
    pub fn select<'a>(&self, partitions: &'a [Partition], window: &TimeWindow) -> &'a [Partition] {
        if partitions.is_empty() {
            return &[];
        }
        let at_or_before_start = partitions.partition_point(|p| p.anchor() <= window.start());
        let mut lo = at_or_before_start.saturating_sub(1);
        let hi = partitions.partition_point(|p| p.anchor() < window.end());
        if lo >= hi {
            return &[];
        }
        let (from, until) = self.span_of(partitions, lo);
        if !window.overlaps(from, until) {
            lo += 1;
        }
        &partitions[lo..hi]
    }
}
