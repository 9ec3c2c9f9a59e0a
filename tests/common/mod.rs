//! Shared helpers: synthetic Y4M streams and a recording encoder backend.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    io::{self, BufRead, Read},
    path::PathBuf,
    rc::Rc,
};

use scxvid::{EncoderBackend, EncoderSettings, FrameEncoder, FramePlanes, ScxvidError};

/// Build a Y4M stream of `frames` frames; frame `n` is filled with byte `n`.
pub fn y4m_stream(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let frame_size = (width * height * 3 / 2) as usize;
    let mut stream = format!("YUV4MPEG2 W{width} H{height} F25:1 Ip A1:1 C420jpeg\n").into_bytes();
    for index in 0..frames {
        stream.extend_from_slice(b"FRAME\n");
        stream.extend(std::iter::repeat_n(index as u8, frame_size));
    }
    stream
}

/// Byte offset of frame `index`'s marker line in a [`y4m_stream`].
pub fn marker_offset(stream: &[u8], frame_size: usize, index: usize) -> usize {
    let header = stream.iter().position(|&byte| byte == b'\n').unwrap() + 1;
    header + index * (b"FRAME\n".len() + frame_size)
}

/// In-memory stream that fails with `kind` once `fail_at` bytes have been
/// consumed. `Interrupted` fails only once; any other kind keeps failing.
pub struct FailingReader {
    data: Vec<u8>,
    position: usize,
    fail_at: usize,
    kind: io::ErrorKind,
    failures: usize,
}

impl FailingReader {
    pub fn new(data: Vec<u8>, fail_at: usize, kind: io::ErrorKind) -> Self {
        Self {
            data,
            position: 0,
            fail_at,
            kind,
            failures: 0,
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl BufRead for FailingReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let armed = self.kind != io::ErrorKind::Interrupted || self.failures == 0;
        if self.position == self.fail_at && armed {
            self.failures += 1;
            return Err(io::Error::new(self.kind, "injected read failure"));
        }
        let end = if self.position < self.fail_at {
            self.fail_at.min(self.data.len())
        } else {
            self.data.len()
        };
        Ok(&self.data[self.position..end])
    }

    fn consume(&mut self, amount: usize) {
        self.position += amount;
    }
}

impl Read for FailingReader {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let count = available.len().min(buffer.len());
        buffer[..count].copy_from_slice(&available[..count]);
        self.consume(count);
        Ok(count)
    }
}

/// One call observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        width: u32,
        height: u32,
        frame_rate: (u32, u32),
        max_key_interval: u32,
        log_path: PathBuf,
    },
    Encode {
        frame_index: u64,
        offsets: [usize; 3],
        strides: [usize; 3],
        lengths: [usize; 3],
        fill: u8,
    },
    Destroy,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Backend that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: CallLog,
    pub fail_create: bool,
    pub fail_encode_at: Option<u64>,
    pub fail_destroy: bool,
    pub bytes_per_frame: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            bytes_per_frame: 10,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn destroy_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Destroy))
    }

    pub fn encode_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Encode { .. }))
    }

    pub fn create_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Create { .. }))
    }
}

impl EncoderBackend for RecordingBackend {
    type Session = RecordingSession;

    fn create(&mut self, settings: &EncoderSettings) -> Result<RecordingSession, ScxvidError> {
        self.calls.borrow_mut().push(Call::Create {
            width: settings.width,
            height: settings.height,
            frame_rate: settings.frame_rate,
            max_key_interval: settings.max_key_interval,
            log_path: settings.log_path.clone(),
        });
        if self.fail_create {
            return Err(ScxvidError::EncoderCreate {
                code: -4,
                reason: "refused".to_string(),
            });
        }
        Ok(RecordingSession {
            calls: Rc::clone(&self.calls),
            fail_encode_at: self.fail_encode_at,
            fail_destroy: self.fail_destroy,
            bytes_per_frame: self.bytes_per_frame,
        })
    }
}

pub struct RecordingSession {
    calls: CallLog,
    fail_encode_at: Option<u64>,
    fail_destroy: bool,
    bytes_per_frame: usize,
}

impl FrameEncoder for RecordingSession {
    fn encode(
        &mut self,
        frame_index: u64,
        planes: &FramePlanes<'_>,
        bitstream: &mut [u8],
    ) -> Result<usize, ScxvidError> {
        self.calls.borrow_mut().push(Call::Encode {
            frame_index,
            offsets: [planes.luma.offset, planes.cb.offset, planes.cr.offset],
            strides: [planes.luma.stride, planes.cb.stride, planes.cr.stride],
            lengths: [planes.luma.data.len(), planes.cb.data.len(), planes.cr.data.len()],
            fill: planes.luma.data[0],
        });
        if self.fail_encode_at == Some(frame_index) {
            return Err(ScxvidError::EncodeFailed {
                frame_index,
                code: -3,
                reason: "bad frame".to_string(),
            });
        }
        bitstream[..self.bytes_per_frame].fill(0xAB);
        Ok(self.bytes_per_frame)
    }

    fn destroy(&mut self) -> Result<(), ScxvidError> {
        self.calls.borrow_mut().push(Call::Destroy);
        if self.fail_destroy {
            return Err(ScxvidError::EncoderTeardown {
                code: -6,
                reason: "flush failed".to_string(),
            });
        }
        Ok(())
    }
}
