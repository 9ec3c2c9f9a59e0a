//! Progress reporting.
//!
//! A [`ProgressCallback`] observes a run as frames are encoded. Callbacks are
//! informational only; a run cannot be cancelled from one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use scxvid::{PipelineOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         eprintln!("{} frames ({:.1} fps)", info.frames_encoded, info.frames_per_second);
//!     }
//! }
//!
//! let options = PipelineOptions::new("scenes.log")
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_progress_interval(100);
//! ```

use std::time::{Duration, Instant};

/// A snapshot of pipeline progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames encoded so far.
    pub frames_encoded: u64,
    /// Compressed bytes produced (and discarded) so far.
    pub bitstream_bytes: u64,
    /// Wall-clock time since the first frame was requested.
    pub elapsed: Duration,
    /// Average throughput since the start.
    pub frames_per_second: f64,
}

/// Receives progress updates during a run.
pub trait ProgressCallback: Send + Sync {
    /// Called every `progress_interval` frames and once when the run ends.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Tracks counters for one run and decides when to notify.
pub(crate) struct ProgressTracker {
    started: Instant,
    interval: u64,
    frames_encoded: u64,
    bitstream_bytes: u64,
}

impl ProgressTracker {
    pub(crate) fn new(interval: u64) -> Self {
        Self {
            started: Instant::now(),
            interval: interval.max(1),
            frames_encoded: 0,
            bitstream_bytes: 0,
        }
    }

    /// Record one encoded frame. Returns a snapshot when one is due.
    pub(crate) fn record(&mut self, bytes: usize) -> Option<ProgressInfo> {
        self.frames_encoded += 1;
        self.bitstream_bytes += bytes as u64;
        if self.frames_encoded % self.interval == 0 {
            Some(self.snapshot())
        } else {
            None
        }
    }

    pub(crate) fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub(crate) fn bitstream_bytes(&self) -> u64 {
        self.bitstream_bytes
    }

    pub(crate) fn snapshot(&self) -> ProgressInfo {
        let elapsed = self.started.elapsed();
        let seconds = elapsed.as_secs_f64();
        ProgressInfo {
            frames_encoded: self.frames_encoded,
            bitstream_bytes: self.bitstream_bytes,
            elapsed,
            frames_per_second: if seconds > 0.0 {
                self.frames_encoded as f64 / seconds
            } else {
                0.0
            },
        }
    }
}
