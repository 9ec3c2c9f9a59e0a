//! Y4M container parsing.
//!
//! The container is a single ASCII header line such as
//! `YUV4MPEG2 W640 H480 F25:1 Ip A1:1 C420jpeg` followed by any number of
//! `FRAME` marker lines, each immediately followed by exactly one frame of
//! raw planar 4:2:0 bytes.
//!
//! [`ContainerReader`] distinguishes a clean end of stream (no further
//! marker line) from a stream that stops inside a frame payload: only the
//! former terminates a run successfully.
//!
//! # Example
//!
//! ```
//! use scxvid::{ContainerReader, FrameBuffer, FrameRead, ScxvidError};
//!
//! let mut stream = b"YUV4MPEG2 W2 H2\nFRAME\n".to_vec();
//! stream.extend_from_slice(&[16, 16, 16, 16, 128, 128]);
//!
//! let mut reader = ContainerReader::new(stream.as_slice());
//! let header = reader.parse_header()?;
//! let mut buffer = FrameBuffer::allocate(header.geometry)?;
//!
//! assert_eq!(reader.read_next_frame(&mut buffer)?, FrameRead::Frame);
//! assert_eq!(reader.read_next_frame(&mut buffer)?, FrameRead::EndOfStream);
//! # Ok::<(), ScxvidError>(())
//! ```

use std::io::{BufRead, ErrorKind as IoErrorKind, Read};

use crate::{error::ScxvidError, frame_buffer::FrameBuffer, geometry::VideoGeometry};

/// Magic token written by conforming Y4M producers.
pub const Y4M_MAGIC: &str = "YUV4MPEG2";

/// Prefix every frame marker line must start with.
pub const FRAME_MARKER: &[u8] = b"FRAME";

/// Longest header or marker line accepted, in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Colourspace tags describing 8-bit 4:2:0 data.
const SUPPORTED_COLORSPACES: &[&str] = &["420", "420jpeg", "420mpeg2", "420paldv"];

/// Parsed stream header.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHeader {
    /// First token of the header line, as written.
    pub magic: String,
    /// Frame dimensions and plane sizes.
    pub geometry: VideoGeometry,
    /// `F` tag as `(numerator, denominator)`, if present and well formed.
    pub frame_rate: Option<(u32, u32)>,
    /// `I` tag (`p`, `t`, `b` or `m`), if present.
    pub interlacing: Option<char>,
    /// `A` tag as `(numerator, denominator)`, if present and well formed.
    pub pixel_aspect: Option<(u32, u32)>,
    /// `C` tag value, if present. Always a 4:2:0 layout.
    pub colorspace: Option<String>,
}

impl StreamHeader {
    /// Parse a header line (without its trailing newline).
    ///
    /// The first token is the magic and is not enforced. `W` and `H` tags
    /// may appear in any order after it; unknown tags are ignored.
    ///
    /// # Errors
    ///
    /// [`ScxvidError::InvalidHeader`] if the magic, width or height is
    /// missing or malformed, or [`ScxvidError::UnsupportedColorspace`] for a
    /// non-4:2:0 `C` tag.
    pub fn parse(line: &str) -> Result<Self, ScxvidError> {
        let mut tokens = line.split_ascii_whitespace();
        let magic = tokens
            .next()
            .ok_or_else(|| ScxvidError::InvalidHeader("header line is blank".to_string()))?;

        let mut width = None;
        let mut height = None;
        let mut frame_rate = None;
        let mut interlacing = None;
        let mut pixel_aspect = None;
        let mut colorspace = None;

        for token in tokens {
            let mut chars = token.chars();
            let tag = chars.next();
            let value = chars.as_str();
            match tag {
                Some('W') => width = Some(parse_dimension(token, value)?),
                Some('H') => height = Some(parse_dimension(token, value)?),
                Some('F') => frame_rate = parse_ratio(token, value),
                Some('A') => pixel_aspect = parse_ratio(token, value),
                Some('I') => interlacing = value.chars().next(),
                Some('C') => {
                    if !SUPPORTED_COLORSPACES.contains(&value) {
                        return Err(ScxvidError::UnsupportedColorspace(value.to_string()));
                    }
                    colorspace = Some(value.to_string());
                }
                _ => log::trace!("Ignoring header token {token:?}"),
            }
        }

        let width = width.ok_or_else(|| {
            ScxvidError::InvalidHeader("missing W<width> tag; probably not a Y4M stream".to_string())
        })?;
        let height = height.ok_or_else(|| {
            ScxvidError::InvalidHeader(
                "missing H<height> tag; probably not a Y4M stream".to_string(),
            )
        })?;

        if magic != Y4M_MAGIC {
            log::warn!("Unexpected stream magic {magic:?}, continuing anyway");
        }

        Ok(Self {
            magic: magic.to_string(),
            geometry: VideoGeometry::new(width, height)?,
            frame_rate,
            interlacing,
            pixel_aspect,
            colorspace,
        })
    }
}

fn parse_dimension(token: &str, digits: &str) -> Result<u32, ScxvidError> {
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ScxvidError::InvalidHeader(format!(
            "expected digits in {token:?}"
        )));
    }
    digits
        .parse::<u32>()
        .map_err(|_| ScxvidError::InvalidHeader(format!("dimension out of range in {token:?}")))
}

fn parse_ratio(token: &str, value: &str) -> Option<(u32, u32)> {
    let ratio = value.split_once(':').and_then(|(numerator, denominator)| {
        Some((numerator.parse().ok()?, denominator.parse().ok()?))
    });
    if ratio.is_none() {
        log::debug!("Ignoring malformed header tag {token:?}");
    }
    ratio
}

/// Outcome of [`ContainerReader::read_next_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// A full frame was read into the buffer.
    Frame,
    /// No further marker line: the stream ended cleanly.
    EndOfStream,
}

/// Pull-based reader over a Y4M byte stream.
///
/// Reads the header once with [`parse_header`](Self::parse_header), then one
/// frame per [`read_next_frame`](Self::read_next_frame) call.
pub struct ContainerReader<R> {
    input: R,
    line: Vec<u8>,
    header_parsed: bool,
    frames_read: u64,
}

impl<R: BufRead> ContainerReader<R> {
    /// Wrap a buffered byte stream.
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: Vec::with_capacity(128),
            header_parsed: false,
            frames_read: 0,
        }
    }

    /// Number of complete frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Recover the underlying stream.
    pub fn into_inner(self) -> R {
        self.input
    }

    /// Read and parse the stream header line.
    ///
    /// # Errors
    ///
    /// - [`ScxvidError::MissingHeader`] if the stream is empty.
    /// - [`ScxvidError::InvalidHeader`] / [`ScxvidError::UnsupportedColorspace`]
    ///   if the line is not a usable 4:2:0 header.
    /// - [`ScxvidError::ReaderState`] if the header was already parsed.
    pub fn parse_header(&mut self) -> Result<StreamHeader, ScxvidError> {
        if self.header_parsed {
            return Err(ScxvidError::ReaderState("stream header already parsed"));
        }
        if !self.read_line()? {
            return Err(ScxvidError::MissingHeader);
        }
        self.header_parsed = true;

        let line = String::from_utf8_lossy(trim_line_end(&self.line));
        let header = StreamHeader::parse(&line)?;
        log::info!(
            "Stream header: {}x{} (frame {} bytes, rate {:?}, colourspace {:?})",
            header.geometry.width(),
            header.geometry.height(),
            header.geometry.frame_size(),
            header.frame_rate,
            header.colorspace
        );
        Ok(header)
    }

    /// Read the next marker line and frame payload into `buffer`.
    ///
    /// The buffer is overwritten in place; it must have been allocated for
    /// this stream's geometry.
    ///
    /// # Errors
    ///
    /// - [`ScxvidError::InvalidFrameMarker`] if the marker does not start with
    ///   `FRAME`; no payload bytes are consumed in that case.
    /// - [`ScxvidError::TruncatedFrame`] if the stream ends inside the payload.
    /// - [`ScxvidError::IoError`] for any other read failure.
    pub fn read_next_frame(&mut self, buffer: &mut FrameBuffer) -> Result<FrameRead, ScxvidError> {
        if !self.header_parsed {
            return Err(ScxvidError::ReaderState("frame requested before stream header"));
        }
        if !self.read_line()? {
            return Ok(FrameRead::EndOfStream);
        }

        if !self.line.starts_with(FRAME_MARKER) {
            return Err(ScxvidError::InvalidFrameMarker {
                frame_index: self.frames_read,
                marker: String::from_utf8_lossy(trim_line_end(&self.line)).into_owned(),
            });
        }

        let payload = buffer.as_bytes_mut();
        let received = fill(&mut self.input, payload)?;
        if received < payload.len() {
            return Err(ScxvidError::TruncatedFrame {
                frame_index: self.frames_read,
                expected: payload.len(),
                received,
            });
        }

        log::trace!("Read frame {}", self.frames_read);
        self.frames_read += 1;
        Ok(FrameRead::Frame)
    }

    /// Read one line into `self.line`. Returns `false` at end of stream.
    fn read_line(&mut self) -> Result<bool, ScxvidError> {
        self.line.clear();
        let limit = MAX_LINE_LENGTH as u64 + 1;
        let read = (&mut self.input)
            .take(limit)
            .read_until(b'\n', &mut self.line)?;
        if read == 0 {
            return Ok(false);
        }
        if self.line.last() != Some(&b'\n') && read as u64 == limit {
            return Err(ScxvidError::LineTooLong {
                limit: MAX_LINE_LENGTH,
            });
        }
        Ok(true)
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Read until `buffer` is full or the stream ends; returns bytes read.
fn fill<R: Read>(input: &mut R, buffer: &mut [u8]) -> Result<usize, ScxvidError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match input.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == IoErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }
    Ok(filled)
}
