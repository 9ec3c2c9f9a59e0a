//! Encoder collaborator interface.
//!
//! The pipeline never talks to a codec library directly. It asks an
//! [`EncoderBackend`] to create a [`FrameEncoder`] session, feeds it one frame
//! at a time, and tears it down through an [`EncoderSession`] guard that
//! guarantees `destroy` runs exactly once on every exit path.
//!
//! [`FfmpegStatsBackend`](crate::FfmpegStatsBackend) is the production
//! implementation; tests substitute in-memory recorders.

use std::path::PathBuf;

use crate::{error::ScxvidError, frame_buffer::FramePlanes, geometry::VideoGeometry};

/// Distance between forced keyframes; large enough to never trigger.
pub const UNBOUNDED_KEY_INTERVAL: u32 = 10_000_000;

/// Everything a backend needs to create a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Luma width in pixels.
    pub width: u32,
    /// Luma height in pixels.
    pub height: u32,
    /// Frame rate as `(numerator, denominator)`. Always one frame per unit
    /// of time; real timing does not affect the statistics.
    pub frame_rate: (u32, u32),
    /// Maximum distance between forced keyframes.
    pub max_key_interval: u32,
    /// Destination of the per-frame statistics log.
    pub log_path: PathBuf,
}

impl EncoderSettings {
    /// Settings for `geometry`, logging to `log_path`.
    pub fn new(geometry: &VideoGeometry, log_path: impl Into<PathBuf>) -> Self {
        Self {
            width: geometry.width(),
            height: geometry.height(),
            frame_rate: (1, 1),
            max_key_interval: UNBOUNDED_KEY_INTERVAL,
            log_path: log_path.into(),
        }
    }

    /// Override the maximum keyframe distance.
    pub fn with_max_key_interval(mut self, interval: u32) -> Self {
        self.max_key_interval = interval;
        self
    }
}

/// Factory for encoder sessions.
pub trait EncoderBackend {
    /// Session type produced by [`create`](Self::create).
    type Session: FrameEncoder;

    /// Create a session for the given settings.
    ///
    /// A backend that fails part-way must release whatever it acquired before
    /// returning the error; the pipeline has no session to destroy.
    fn create(&mut self, settings: &EncoderSettings) -> Result<Self::Session, ScxvidError>;
}

/// One open encoder session.
pub trait FrameEncoder {
    /// Encode one frame, writing compressed output into `bitstream`.
    ///
    /// Returns the number of bytes written. `frame_index` is zero-based and
    /// increases by one per call.
    fn encode(
        &mut self,
        frame_index: u64,
        planes: &FramePlanes<'_>,
        bitstream: &mut [u8],
    ) -> Result<usize, ScxvidError>;

    /// Flush and release the session.
    ///
    /// Must be safe to call more than once and on a session whose last
    /// `encode` failed.
    fn destroy(&mut self) -> Result<(), ScxvidError>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for Box<E> {
    fn encode(
        &mut self,
        frame_index: u64,
        planes: &FramePlanes<'_>,
        bitstream: &mut [u8],
    ) -> Result<usize, ScxvidError> {
        (**self).encode(frame_index, planes, bitstream)
    }

    fn destroy(&mut self) -> Result<(), ScxvidError> {
        (**self).destroy()
    }
}

/// Owns a [`FrameEncoder`] and destroys it exactly once.
///
/// Call [`close`](Self::close) to destroy explicitly and observe the result;
/// if the guard is dropped without being closed, `destroy` runs from `Drop`
/// and any error is logged.
pub struct EncoderSession<E: FrameEncoder> {
    encoder: E,
    frames_encoded: u64,
    destroyed: bool,
}

impl<E: FrameEncoder> EncoderSession<E> {
    /// Create a session through `backend`.
    pub fn create<B>(backend: &mut B, settings: &EncoderSettings) -> Result<Self, ScxvidError>
    where
        B: EncoderBackend<Session = E>,
    {
        let encoder = backend.create(settings)?;
        Ok(Self {
            encoder,
            frames_encoded: 0,
            destroyed: false,
        })
    }

    /// Frames successfully encoded so far.
    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    /// Encode the next frame in stream order.
    pub fn encode(
        &mut self,
        planes: &FramePlanes<'_>,
        bitstream: &mut [u8],
    ) -> Result<usize, ScxvidError> {
        if self.destroyed {
            return Err(ScxvidError::EncodeFailed {
                frame_index: self.frames_encoded,
                code: crate::error::STATUS_FAIL,
                reason: "session already destroyed".to_string(),
            });
        }
        let written = self.encoder.encode(self.frames_encoded, planes, bitstream)?;
        self.frames_encoded += 1;
        Ok(written)
    }

    /// Destroy the session now.
    pub fn close(mut self) -> Result<(), ScxvidError> {
        self.destroy_once()
    }

    fn destroy_once(&mut self) -> Result<(), ScxvidError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        log::debug!(
            "Destroying encoder session after {} frames",
            self.frames_encoded
        );
        self.encoder.destroy()
    }
}

impl<E: FrameEncoder> Drop for EncoderSession<E> {
    fn drop(&mut self) {
        if let Err(error) = self.destroy_once() {
            log::warn!("Encoder teardown failed during unwinding: {error}");
        }
    }
}
