//! Pipeline configuration.
//!
//! [`PipelineOptions`] is a builder carrying the statistics log destination
//! plus the optional knobs of a run.
//!
//! # Example
//!
//! ```
//! use scxvid::PipelineOptions;
//!
//! let options = PipelineOptions::new("scenes.log")
//!     .with_progress_interval(250)
//!     .with_bitstream_capacity(8 * 1024 * 1024);
//! assert_eq!(options.bitstream_capacity(), 8 * 1024 * 1024);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    encoder::UNBOUNDED_KEY_INTERVAL,
    frame_buffer::DEFAULT_BITSTREAM_CAPACITY,
    progress::ProgressCallback,
};

/// Smallest bitstream scratch capacity accepted (1 MiB).
pub const MIN_BITSTREAM_CAPACITY: usize = 1024 * 1024;

/// Settings for one [`Pipeline`](crate::Pipeline) run.
#[derive(Clone)]
pub struct PipelineOptions {
    pub(crate) log_path: PathBuf,
    pub(crate) progress: Option<Arc<dyn ProgressCallback>>,
    pub(crate) progress_interval: u64,
    pub(crate) bitstream_capacity: usize,
    pub(crate) max_key_interval: u32,
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("log_path", &self.log_path)
            .field("has_progress", &self.progress.is_some())
            .field("progress_interval", &self.progress_interval)
            .field("bitstream_capacity", &self.bitstream_capacity)
            .field("max_key_interval", &self.max_key_interval)
            .finish()
    }
}

impl PipelineOptions {
    /// Options writing statistics to `log_path`, everything else default.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            progress: None,
            progress_interval: 1,
            bitstream_capacity: DEFAULT_BITSTREAM_CAPACITY,
            max_key_interval: UNBOUNDED_KEY_INTERVAL,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Report progress every `frames` frames. `0` is treated as `1`.
    pub fn with_progress_interval(mut self, frames: u64) -> Self {
        self.progress_interval = frames.max(1);
        self
    }

    /// Scratch capacity for the discarded bitstream.
    ///
    /// Values below [`MIN_BITSTREAM_CAPACITY`] are raised to it.
    pub fn with_bitstream_capacity(mut self, bytes: usize) -> Self {
        self.bitstream_capacity = bytes.max(MIN_BITSTREAM_CAPACITY);
        self
    }

    /// Maximum distance between forced keyframes.
    pub fn with_max_key_interval(mut self, interval: u32) -> Self {
        self.max_key_interval = interval.max(1);
        self
    }

    /// Statistics log destination.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Frames between progress reports.
    pub fn progress_interval(&self) -> u64 {
        self.progress_interval
    }

    /// Bitstream scratch capacity in bytes.
    pub fn bitstream_capacity(&self) -> usize {
        self.bitstream_capacity
    }

    /// Maximum keyframe distance handed to the encoder.
    pub fn max_key_interval(&self) -> u32 {
        self.max_key_interval
    }
}
