//! Error types for the `scxvid` crate.
//!
//! [`ScxvidError`] is returned by every fallible operation. Each variant
//! belongs to one [`ErrorKind`] and maps to a library-style negative status
//! through [`ScxvidError::status`], which the binary turns into its exit code.

use std::io::Error as IoError;

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// Generic failure status (malformed input, I/O failure).
pub const STATUS_FAIL: i32 = -1;

/// Out-of-memory status.
pub const STATUS_MEMORY: i32 = -2;

/// Broad category of an [`ScxvidError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The container is malformed or truncated.
    Format,
    /// A buffer could not be allocated.
    Resource,
    /// The encoder collaborator reported a failure.
    Encoder,
    /// Reading the input stream failed for a reason other than its end.
    Io,
}

/// The unified error type for all `scxvid` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScxvidError {
    /// The stream ended (or was closed) before a header line could be read.
    #[error("Failed to read stream header: input is empty")]
    MissingHeader,

    /// The header line does not carry usable dimensions.
    #[error("Failed to parse stream header: {0}")]
    InvalidHeader(String),

    /// The header names a colourspace other than 8-bit 4:2:0.
    #[error("Unsupported colourspace C{0} (only 4:2:0 input is supported)")]
    UnsupportedColorspace(String),

    /// A header or marker line exceeded the line length limit.
    #[error("Line exceeds {limit} bytes without a newline")]
    LineTooLong {
        /// Maximum accepted line length in bytes.
        limit: usize,
    },

    /// A frame marker line does not start with `FRAME`.
    #[error("Invalid marker before frame {frame_index}: {marker:?}")]
    InvalidFrameMarker {
        /// Zero-based index of the frame the marker should have introduced.
        frame_index: u64,
        /// The offending line, lossily decoded.
        marker: String,
    },

    /// The stream ended inside a frame payload.
    #[error(
        "Unexpected end of stream in frame {frame_index}: expected {expected} bytes, got {received}"
    )]
    TruncatedFrame {
        /// Zero-based index of the truncated frame.
        frame_index: u64,
        /// Bytes required for a full frame.
        expected: usize,
        /// Bytes actually available.
        received: usize,
    },

    /// The container reader was driven out of order.
    #[error("Container reader misuse: {0}")]
    ReaderState(&'static str),

    /// A buffer could not be allocated.
    #[error("Failed to allocate {bytes} bytes for the {purpose}")]
    AllocationFailed {
        /// Which buffer was being allocated.
        purpose: &'static str,
        /// Requested size in bytes.
        bytes: usize,
    },

    /// The encoder session could not be created.
    #[error("Failed to initialize encoder (status {code}): {reason}")]
    EncoderCreate {
        /// Negative backend status.
        code: i32,
        /// Backend explanation.
        reason: String,
    },

    /// The encoder rejected a frame.
    #[error("Encoder failed on frame {frame_index} (status {code}): {reason}")]
    EncodeFailed {
        /// Zero-based index of the rejected frame.
        frame_index: u64,
        /// Negative backend status.
        code: i32,
        /// Backend explanation.
        reason: String,
    },

    /// Flushing or closing the encoder session failed.
    #[error("Encoder teardown failed (status {code}): {reason}")]
    EncoderTeardown {
        /// Negative backend status.
        code: i32,
        /// Backend explanation.
        reason: String,
    },

    /// An I/O error occurred while reading the input stream.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl ScxvidError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScxvidError::MissingHeader
            | ScxvidError::InvalidHeader(_)
            | ScxvidError::UnsupportedColorspace(_)
            | ScxvidError::LineTooLong { .. }
            | ScxvidError::InvalidFrameMarker { .. }
            | ScxvidError::TruncatedFrame { .. }
            | ScxvidError::ReaderState(_) => ErrorKind::Format,
            ScxvidError::AllocationFailed { .. } => ErrorKind::Resource,
            ScxvidError::EncoderCreate { .. }
            | ScxvidError::EncodeFailed { .. }
            | ScxvidError::EncoderTeardown { .. } => ErrorKind::Encoder,
            ScxvidError::IoError(_) => ErrorKind::Io,
        }
    }

    /// Short name of the pipeline phase that failed, for diagnostics.
    pub fn phase(&self) -> &'static str {
        match self {
            ScxvidError::MissingHeader
            | ScxvidError::InvalidHeader(_)
            | ScxvidError::UnsupportedColorspace(_) => "header",
            ScxvidError::LineTooLong { .. }
            | ScxvidError::InvalidFrameMarker { .. }
            | ScxvidError::TruncatedFrame { .. }
            | ScxvidError::ReaderState(_) => "frame",
            ScxvidError::AllocationFailed { .. } => "allocation",
            ScxvidError::EncoderCreate { .. } => "encoder setup",
            ScxvidError::EncodeFailed { .. } => "encode",
            ScxvidError::EncoderTeardown { .. } => "teardown",
            ScxvidError::IoError(_) => "input",
        }
    }

    /// Library-style negative status for this error.
    ///
    /// Encoder errors carry the backend's own status; a non-negative backend
    /// status is replaced by [`STATUS_FAIL`] so the result is always negative.
    pub fn status(&self) -> i32 {
        match self {
            ScxvidError::EncoderCreate { code, .. }
            | ScxvidError::EncodeFailed { code, .. }
            | ScxvidError::EncoderTeardown { code, .. } => {
                if *code < 0 {
                    *code
                } else {
                    STATUS_FAIL
                }
            }
            ScxvidError::AllocationFailed { .. } => STATUS_MEMORY,
            _ => STATUS_FAIL,
        }
    }

    /// Process exit byte for this error: the status truncated to eight bits,
    /// never zero.
    pub fn exit_code(&self) -> u8 {
        match self.status() as u8 {
            0 => 1,
            code => code,
        }
    }

    pub(crate) fn encoder_create(error: FfmpegError) -> Self {
        ScxvidError::EncoderCreate {
            code: i32::from(error),
            reason: error.to_string(),
        }
    }

    pub(crate) fn encode_failed(frame_index: u64, error: FfmpegError) -> Self {
        ScxvidError::EncodeFailed {
            frame_index,
            code: i32::from(error),
            reason: error.to_string(),
        }
    }
}
