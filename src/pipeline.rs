//! The pipeline controller.
//!
//! [`Pipeline::run`] walks `Start → HeaderParsed → EncoderReady → Looping →
//! Done`, or ends in `Error` from any earlier state. Frames go to the encoder
//! strictly in stream order, one at a time, all through a single reused
//! [`FrameBuffer`]. Every resource acquired along the way is released on
//! every exit path; the encoder session is destroyed exactly once.

use std::io::BufRead;

use crate::{
    configuration::PipelineOptions,
    container::{ContainerReader, FrameRead, StreamHeader},
    encoder::{EncoderBackend, EncoderSession, EncoderSettings},
    error::ScxvidError,
    frame_buffer::{BitstreamBuffer, FrameBuffer},
    progress::ProgressTracker,
};

/// Where a [`Pipeline`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing read yet.
    Start,
    /// Header parsed, nothing allocated.
    HeaderParsed,
    /// Buffers allocated and encoder session created.
    EncoderReady,
    /// Encoding frames.
    Looping,
    /// Stream ended cleanly and everything was released.
    Done,
    /// A fatal error occurred; everything acquired was released.
    Error,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The stream header.
    pub header: StreamHeader,
    /// Frames submitted to and accepted by the encoder.
    pub frames_encoded: u64,
    /// Total compressed bytes produced and discarded.
    pub bitstream_bytes: u64,
}

/// Drives a Y4M stream through an encoder backend.
pub struct Pipeline<B: EncoderBackend> {
    backend: B,
    options: PipelineOptions,
    state: PipelineState,
}

impl<B: EncoderBackend> Pipeline<B> {
    /// Create a pipeline around `backend`.
    pub fn new(backend: B, options: PipelineOptions) -> Self {
        Self {
            backend,
            options,
            state: PipelineState::Start,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The options this pipeline runs with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Borrow the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Recover the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Process `input` to its end.
    ///
    /// # Errors
    ///
    /// Any [`ScxvidError`]; the pipeline is then in [`PipelineState::Error`]
    /// and every resource it acquired has been released.
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<RunSummary, ScxvidError> {
        self.state = PipelineState::Start;
        let result = self.run_stages(ContainerReader::new(input));
        self.state = match result {
            Ok(_) => PipelineState::Done,
            Err(ref error) => {
                log::debug!("Pipeline failed in {} phase: {error}", error.phase());
                PipelineState::Error
            }
        };
        result
    }

    fn run_stages<R: BufRead>(
        &mut self,
        mut reader: ContainerReader<R>,
    ) -> Result<RunSummary, ScxvidError> {
        let header = reader.parse_header()?;
        self.state = PipelineState::HeaderParsed;

        let geometry = header.geometry;
        let mut frame = FrameBuffer::allocate(geometry)?;
        let mut bitstream = BitstreamBuffer::allocate(self.options.bitstream_capacity)?;
        let settings = EncoderSettings::new(&geometry, self.options.log_path.clone())
            .with_max_key_interval(self.options.max_key_interval);
        let mut session = EncoderSession::create(&mut self.backend, &settings)?;
        self.state = PipelineState::EncoderReady;

        let mut tracker = ProgressTracker::new(self.options.progress_interval);
        self.state = PipelineState::Looping;
        let looped = loop {
            match reader.read_next_frame(&mut frame) {
                Ok(FrameRead::EndOfStream) => break Ok(()),
                Ok(FrameRead::Frame) => {}
                Err(error) => break Err(error),
            }

            let planes = frame.planes();
            match session.encode(&planes, bitstream.as_mut_slice()) {
                Ok(written) => {
                    log::trace!("Frame {} -> {written} bytes", tracker.frames_encoded());
                    if let (Some(info), Some(progress)) =
                        (tracker.record(written), &self.options.progress)
                    {
                        progress.on_progress(&info);
                    }
                }
                Err(error) => break Err(error),
            }
        };

        let teardown = session.close();
        drop(bitstream);
        drop(frame);

        match (looped, teardown) {
            (Err(error), Err(teardown_error)) => {
                log::warn!("Ignoring teardown failure after fatal error: {teardown_error}");
                Err(error)
            }
            (Err(error), Ok(())) | (Ok(()), Err(error)) => Err(error),
            (Ok(()), Ok(())) => {
                if let Some(progress) = &self.options.progress {
                    progress.on_progress(&tracker.snapshot());
                }
                log::info!(
                    "Encoded {} frames ({} bitstream bytes discarded)",
                    tracker.frames_encoded(),
                    tracker.bitstream_bytes()
                );
                Ok(RunSummary {
                    header,
                    frames_encoded: tracker.frames_encoded(),
                    bitstream_bytes: tracker.bitstream_bytes(),
                })
            }
        }
    }
}
