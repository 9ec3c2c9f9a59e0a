//! First-pass statistics encoder backed by FFmpeg.
//!
//! Runs an MPEG-4 Part 2 encoder in first-pass mode and appends the
//! per-frame statistics the encoder publishes in `stats_out` to the log
//! file. The compressed packets themselves only pass through the caller's
//! scratch buffer.
//!
//! With [`StatsCodec::Xvid`] FFmpeg drives libxvidcore, whose first-pass
//! log is the Xvid two-pass statistics format. [`StatsCodec::Mpeg4`] uses
//! FFmpeg's built-in encoder and its own first-pass format.
//!
//! # Example
//!
//! ```no_run
//! use scxvid::{FfmpegStatsBackend, Pipeline, PipelineOptions, ScxvidError, StatsCodec};
//!
//! let backend = FfmpegStatsBackend::new().codec(StatsCodec::Auto);
//! let mut pipeline = Pipeline::new(backend, PipelineOptions::new("scenes.log"));
//! let summary = pipeline.run(std::io::stdin().lock())?;
//! println!("{} frames analysed", summary.frames_encoded);
//! # Ok::<(), ScxvidError>(())
//! ```

use std::{
    ffi::CStr,
    fs::File,
    io::{BufWriter, Write},
};

use ffmpeg_next::{
    Dictionary, Error as FfmpegError, Packet, Rational, codec::Context as CodecContext,
    encoder::Video as VideoEncoder, format::Pixel, frame::Video as VideoFrame,
};

use crate::{
    encoder::{EncoderBackend, EncoderSettings, FrameEncoder},
    error::{STATUS_FAIL, ScxvidError},
    frame_buffer::{FramePlanes, PlaneView},
};

/// Which FFmpeg encoder produces the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsCodec {
    /// Prefer libxvid, fall back to the built-in MPEG-4 encoder.
    #[default]
    Auto,
    /// FFmpeg's libxvid wrapper.
    Xvid,
    /// FFmpeg's built-in MPEG-4 Part 2 encoder.
    Mpeg4,
}

impl StatsCodec {
    /// Parse a codec name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(StatsCodec::Auto),
            "xvid" | "libxvid" => Some(StatsCodec::Xvid),
            "mpeg4" | "native" => Some(StatsCodec::Mpeg4),
            _ => None,
        }
    }

    /// FFmpeg encoder names to try, in order.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            StatsCodec::Auto => &["libxvid", "mpeg4"],
            StatsCodec::Xvid => &["libxvid"],
            StatsCodec::Mpeg4 => &["mpeg4"],
        }
    }
}

/// Encoder picked for a [`StatsCodec`] preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EncoderSelection {
    requested: StatsCodec,
    name: &'static str,
}

impl EncoderSelection {
    /// `Auto` settled on an encoder whose log is not the Xvid format.
    fn changes_log_format(&self) -> bool {
        self.requested == StatsCodec::Auto && self.name != "libxvid"
    }
}

/// First candidate of `codec` that `is_available` accepts.
fn select_encoder(
    codec: StatsCodec,
    is_available: impl Fn(&str) -> bool,
) -> Option<EncoderSelection> {
    codec
        .candidates()
        .iter()
        .copied()
        .find(|&name| is_available(name))
        .map(|name| EncoderSelection {
            requested: codec,
            name,
        })
}

/// [`EncoderBackend`] producing [`FfmpegStatsSession`]s.
#[derive(Debug, Clone, Default)]
pub struct FfmpegStatsBackend {
    codec: StatsCodec,
    threads: Option<usize>,
}

impl FfmpegStatsBackend {
    /// Backend with automatic codec selection and FFmpeg-chosen threading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the encoder.
    pub fn codec(mut self, codec: StatsCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Fix the encoder thread count. `0` lets FFmpeg decide.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = if threads == 0 { None } else { Some(threads) };
        self
    }

    fn encoder_options(&self, codec_name: &str) -> Dictionary<'static> {
        let mut options = Dictionary::new();
        // RD mode decision, four motion vectors per macroblock and trellis
        // quantisation, the closest match to Xvid's general preset.
        options.set("flags", "+pass1+mv4");
        options.set("mbd", "rd");
        options.set("trellis", "1");
        match self.threads {
            Some(count) => options.set("threads", &count.to_string()),
            None => options.set("threads", "auto"),
        }
        if codec_name == "libxvid" {
            options.set("me_quality", "6");
        }
        options
    }
}

impl EncoderBackend for FfmpegStatsBackend {
    type Session = FfmpegStatsSession;

    fn create(&mut self, settings: &EncoderSettings) -> Result<FfmpegStatsSession, ScxvidError> {
        crate::ffmpeg::initialize()?;

        let selection = select_encoder(self.codec, |name| {
            ffmpeg_next::encoder::find_by_name(name).is_some()
        })
        .ok_or_else(|| ScxvidError::EncoderCreate {
            code: i32::from(FfmpegError::EncoderNotFound),
            reason: format!(
                "none of the encoders {:?} is available in this FFmpeg build",
                self.codec.candidates()
            ),
        })?;
        if selection.changes_log_format() {
            log::warn!(
                "libxvid is not available; falling back to {}, which writes FFmpeg's \
                 first-pass statistics instead of the Xvid log format",
                selection.name
            );
        }
        let codec = ffmpeg_next::encoder::find_by_name(selection.name).ok_or_else(|| {
            ScxvidError::encoder_create(FfmpegError::EncoderNotFound)
        })?;
        let codec_name = codec.name().to_string();
        log::info!(
            "Using FFmpeg encoder {codec_name} for {}x{} statistics",
            settings.width,
            settings.height
        );

        let mut encoder = CodecContext::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(ScxvidError::encoder_create)?;
        let (numerator, denominator) = settings.frame_rate;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(Rational::new(denominator as i32, numerator as i32));
        encoder.set_frame_rate(Some(Rational::new(numerator as i32, denominator as i32)));
        encoder.set_gop(settings.max_key_interval);
        encoder.set_max_b_frames(0);

        let encoder = encoder
            .open_as_with(codec, self.encoder_options(&codec_name))
            .map_err(|error| ScxvidError::EncoderCreate {
                code: i32::from(error),
                reason: format!("cannot open {codec_name}: {error}"),
            })?;

        let log = File::create(&settings.log_path).map_err(|error| ScxvidError::EncoderCreate {
            code: STATUS_FAIL,
            reason: format!(
                "cannot create statistics log {}: {error}",
                settings.log_path.display()
            ),
        })?;

        Ok(FfmpegStatsSession {
            encoder: Some(encoder),
            frame: VideoFrame::new(Pixel::YUV420P, settings.width, settings.height),
            packet: Packet::empty(),
            log: Some(BufWriter::new(log)),
            codec_name,
        })
    }
}

/// Open FFmpeg encoder plus its statistics log.
pub struct FfmpegStatsSession {
    encoder: Option<VideoEncoder>,
    frame: VideoFrame,
    packet: Packet,
    log: Option<BufWriter<File>>,
    codec_name: String,
}

impl FfmpegStatsSession {
    /// Name of the FFmpeg encoder in use.
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    /// Copy the plane views into the reused FFmpeg frame.
    fn load_frame(&mut self, planes: &FramePlanes<'_>) -> Result<(), FfmpegError> {
        // The encoder may still reference the previous frame's buffers.
        let status = unsafe { ffmpeg_sys_next::av_frame_make_writable(self.frame.as_mut_ptr()) };
        if status < 0 {
            return Err(FfmpegError::from(status));
        }

        for (index, plane) in [planes.luma, planes.cb, planes.cr].iter().enumerate() {
            let stride = self.frame.stride(index);
            copy_plane(plane, self.frame.data_mut(index), stride);
        }
        Ok(())
    }
}

fn copy_plane(plane: &PlaneView<'_>, destination: &mut [u8], destination_stride: usize) {
    for (row, source) in plane.row_iter().enumerate() {
        let start = row * destination_stride;
        destination[start..start + source.len()].copy_from_slice(source);
    }
}

/// Receive every packet the encoder has ready, copying each into
/// `bitstream` and appending the encoder statistics to `log`.
fn drain_packets(
    encoder: &mut VideoEncoder,
    packet: &mut Packet,
    log: &mut BufWriter<File>,
    bitstream: &mut [u8],
) -> Result<usize, ScxvidError> {
    let mut written = 0;
    loop {
        match encoder.receive_packet(packet) {
            Ok(()) => {}
            Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                break;
            }
            Err(FfmpegError::Eof) => break,
            Err(error) => {
                return Err(ScxvidError::EncoderTeardown {
                    code: i32::from(error),
                    reason: format!("receive_packet failed: {error}"),
                });
            }
        }

        let data = packet.data().unwrap_or(&[]);
        if data.len() > bitstream.len() {
            return Err(ScxvidError::EncoderTeardown {
                code: i32::from(FfmpegError::BufferTooSmall),
                reason: format!(
                    "{} byte packet exceeds the {} byte bitstream buffer",
                    data.len(),
                    bitstream.len()
                ),
            });
        }
        bitstream[..data.len()].copy_from_slice(data);
        written += data.len();

        write_stats(encoder, log)?;
    }
    Ok(written)
}

fn write_stats(encoder: &VideoEncoder, log: &mut BufWriter<File>) -> Result<(), ScxvidError> {
    let stats = unsafe {
        let stats_out = (*encoder.as_ptr()).stats_out;
        if stats_out.is_null() {
            return Ok(());
        }
        CStr::from_ptr(stats_out).to_bytes()
    };
    log.write_all(stats)
        .map_err(|error| ScxvidError::EncoderTeardown {
            code: STATUS_FAIL,
            reason: format!("cannot write statistics: {error}"),
        })
}

impl FrameEncoder for FfmpegStatsSession {
    fn encode(
        &mut self,
        frame_index: u64,
        planes: &FramePlanes<'_>,
        bitstream: &mut [u8],
    ) -> Result<usize, ScxvidError> {
        if self.encoder.is_none() {
            return Err(ScxvidError::EncodeFailed {
                frame_index,
                code: STATUS_FAIL,
                reason: "encoder already destroyed".to_string(),
            });
        }

        self.load_frame(planes)
            .map_err(|error| ScxvidError::encode_failed(frame_index, error))?;
        self.frame.set_pts(Some(frame_index as i64));

        let (Some(encoder), Some(log)) = (self.encoder.as_mut(), self.log.as_mut()) else {
            return Err(ScxvidError::EncodeFailed {
                frame_index,
                code: STATUS_FAIL,
                reason: "encoder already destroyed".to_string(),
            });
        };
        encoder
            .send_frame(&self.frame)
            .map_err(|error| ScxvidError::encode_failed(frame_index, error))?;

        drain_packets(encoder, &mut self.packet, log, bitstream).map_err(|error| match error {
            ScxvidError::EncoderTeardown { code, reason } => ScxvidError::EncodeFailed {
                frame_index,
                code,
                reason,
            },
            other => other,
        })
    }

    fn destroy(&mut self) -> Result<(), ScxvidError> {
        let mut result = Ok(());

        if let Some(mut encoder) = self.encoder.take() {
            log::debug!("Flushing {} encoder", self.codec_name);
            result = match encoder.send_eof() {
                Ok(()) => match self.log.as_mut() {
                    Some(log) => {
                        // Flushed packets are discarded; only their statistics matter.
                        let mut scratch = vec![0u8; flush_scratch_size(&self.frame)];
                        drain_packets(&mut encoder, &mut self.packet, log, &mut scratch)
                            .map(|_| ())
                    }
                    None => Ok(()),
                },
                Err(error) => Err(ScxvidError::EncoderTeardown {
                    code: i32::from(error),
                    reason: format!("send_eof failed: {error}"),
                }),
            };
        }

        if let Some(mut log) = self.log.take() {
            let flushed = log.flush().map_err(|error| ScxvidError::EncoderTeardown {
                code: STATUS_FAIL,
                reason: format!("cannot flush statistics log: {error}"),
            });
            if result.is_ok() {
                result = flushed;
            }
        }

        result
    }
}

/// Upper bound for a flushed packet: one uncompressed frame plus slack.
fn flush_scratch_size(frame: &VideoFrame) -> usize {
    let pixels = frame.width() as usize * frame.height() as usize;
    pixels * 3 / 2 + 64 * 1024
}

impl Drop for FfmpegStatsSession {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            log::warn!("Statistics encoder teardown failed: {error}");
        }
    }
}
