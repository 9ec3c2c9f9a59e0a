//! # scxvid
//!
//! Scene-change statistics from raw video. `scxvid` reads an uncompressed
//! 4:2:0 Y4M stream, runs every frame through a first-pass MPEG-4 encode
//! with keyframe forcing disabled, throws the compressed bitstream away and
//! keeps the encoder's per-frame statistics log. Keyframe decisions in that
//! log mark scene changes, which subtitle timing tools consume.
//!
//! ## Quick Start
//!
//! ```no_run
//! use scxvid::{FfmpegStatsBackend, Pipeline, PipelineOptions, ScxvidError};
//!
//! let mut pipeline = Pipeline::new(
//!     FfmpegStatsBackend::new(),
//!     PipelineOptions::new("keyframes.log"),
//! );
//! let summary = pipeline.run(std::io::stdin().lock())?;
//! eprintln!(
//!     "{}x{}: {} frames",
//!     summary.header.geometry.width(),
//!     summary.header.geometry.height(),
//!     summary.frames_encoded,
//! );
//! # Ok::<(), ScxvidError>(())
//! ```
//!
//! ## Layout
//!
//! - [`container`] parses the Y4M header and frame markers.
//! - [`frame_buffer`] owns the single reused frame buffer and its plane views.
//! - [`encoder`] is the capability interface the pipeline drives; plug in any
//!   backend that can open a session and feed it frames.
//! - [`stats_encoder`] is the FFmpeg (libxvid or native MPEG-4) backend.
//! - [`pipeline`] sequences everything and guarantees cleanup.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed. The `libxvid` encoder is
//! used when FFmpeg was built with it, otherwise FFmpeg's own MPEG-4 encoder.

pub mod configuration;
pub mod container;
pub mod encoder;
pub mod error;
pub mod ffmpeg;
pub mod frame_buffer;
pub mod geometry;
pub mod pipeline;
pub mod progress;
pub mod stats_encoder;

pub use configuration::{MIN_BITSTREAM_CAPACITY, PipelineOptions};
pub use container::{ContainerReader, FrameRead, StreamHeader};
pub use encoder::{EncoderBackend, EncoderSession, EncoderSettings, FrameEncoder};
pub use error::{ErrorKind, ScxvidError};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use frame_buffer::{
    BitstreamBuffer, DEFAULT_BITSTREAM_CAPACITY, FrameBuffer, FramePlanes, PlaneView,
};
pub use geometry::VideoGeometry;
pub use pipeline::{Pipeline, PipelineState, RunSummary};
pub use progress::{ProgressCallback, ProgressInfo};
pub use stats_encoder::{FfmpegStatsBackend, FfmpegStatsSession, StatsCodec};
