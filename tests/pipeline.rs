//! Pipeline controller tests against a recording encoder backend.

mod common;

use std::{
    io::ErrorKind as IoErrorKind,
    sync::{Arc, Mutex},
};

use common::{Call, FailingReader, RecordingBackend, marker_offset, y4m_stream};
use scxvid::{
    ErrorKind, Pipeline, PipelineOptions, PipelineState, ProgressCallback, ProgressInfo,
    ScxvidError,
};

const WIDTH: u32 = 8;
const HEIGHT: u32 = 4;
const LUMA: usize = 32;
const CHROMA: usize = 8;
const FRAME: usize = 48;

fn pipeline(backend: RecordingBackend) -> Pipeline<RecordingBackend> {
    Pipeline::new(backend, PipelineOptions::new("stats.log"))
}

// ── Normal runs ────────────────────────────────────────────────────

#[test]
fn n_frames_yield_n_encodes_in_order() {
    let mut pipeline = pipeline(RecordingBackend::new());
    let summary = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 5).as_slice())
        .expect("run should succeed");

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.frames_encoded, 5);
    assert_eq!(summary.bitstream_bytes, 50);
    assert_eq!(summary.header.geometry.frame_size(), FRAME);

    let calls = pipeline.backend().calls();
    assert_eq!(calls.len(), 7);
    assert!(matches!(calls[0], Call::Create { .. }));
    assert_eq!(calls[6], Call::Destroy);

    for (index, call) in calls[1..6].iter().enumerate() {
        assert_eq!(
            *call,
            Call::Encode {
                frame_index: index as u64,
                offsets: [0, LUMA, LUMA + CHROMA],
                strides: [WIDTH as usize, WIDTH as usize / 2, WIDTH as usize / 2],
                lengths: [LUMA, CHROMA, CHROMA],
                fill: index as u8,
            }
        );
    }
}

#[test]
fn encoder_created_with_unit_rate_and_unbounded_keyframes() {
    let mut pipeline = pipeline(RecordingBackend::new());
    pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 1).as_slice())
        .expect("run should succeed");

    match &pipeline.backend().calls()[0] {
        Call::Create {
            width,
            height,
            frame_rate,
            max_key_interval,
            log_path,
        } => {
            assert_eq!((*width, *height), (WIDTH, HEIGHT));
            assert_eq!(*frame_rate, (1, 1));
            assert_eq!(*max_key_interval, 10_000_000);
            assert_eq!(log_path.to_str(), Some("stats.log"));
        }
        other => panic!("Expected Create, got: {other:?}"),
    }
}

#[test]
fn header_only_stream_succeeds_with_zero_frames() {
    let mut pipeline = pipeline(RecordingBackend::new());
    let summary = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 0).as_slice())
        .expect("run should succeed");

    assert_eq!(summary.frames_encoded, 0);
    assert_eq!(pipeline.backend().create_count(), 1);
    assert_eq!(pipeline.backend().encode_count(), 0);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn stream_ending_after_payload_is_clean() {
    let stream = y4m_stream(WIDTH, HEIGHT, 2);
    assert_eq!(*stream.last().unwrap(), 1);

    let mut pipeline = pipeline(RecordingBackend::new());
    assert!(pipeline.run(stream.as_slice()).is_ok());
    assert_eq!(pipeline.state(), PipelineState::Done);
}

// ── Container failures ─────────────────────────────────────────────

#[test]
fn truncated_payload_is_fatal_and_destroys_once() {
    let mut stream = y4m_stream(WIDTH, HEIGHT, 3);
    stream.truncate(stream.len() - 5);

    let mut pipeline = pipeline(RecordingBackend::new());
    let error = pipeline.run(stream.as_slice()).unwrap_err();

    match error {
        ScxvidError::TruncatedFrame {
            frame_index,
            expected,
            received,
        } => {
            assert_eq!(frame_index, 2);
            assert_eq!(expected, FRAME);
            assert_eq!(received, FRAME - 5);
        }
        other => panic!("Expected TruncatedFrame, got: {other}"),
    }
    assert_eq!(pipeline.state(), PipelineState::Error);
    assert_eq!(pipeline.backend().encode_count(), 2);
    assert_eq!(pipeline.backend().destroy_count(), 1);
    assert_eq!(pipeline.backend().calls().last(), Some(&Call::Destroy));
}

#[test]
fn marker_with_no_payload_is_truncated_not_end_of_stream() {
    let mut stream = y4m_stream(WIDTH, HEIGHT, 1);
    stream.extend_from_slice(b"FRAME\n");

    let mut pipeline = pipeline(RecordingBackend::new());
    let error = pipeline.run(stream.as_slice()).unwrap_err();

    assert!(matches!(
        error,
        ScxvidError::TruncatedFrame {
            frame_index: 1,
            received: 0,
            ..
        }
    ));
    assert_eq!(error.kind(), ErrorKind::Format);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn bad_marker_is_fatal_and_destroys_once() {
    let mut stream = y4m_stream(WIDTH, HEIGHT, 1);
    stream.extend_from_slice(b"FRAMF\n");
    stream.extend(std::iter::repeat_n(7u8, FRAME));

    let mut pipeline = pipeline(RecordingBackend::new());
    let error = pipeline.run(stream.as_slice()).unwrap_err();

    match error {
        ScxvidError::InvalidFrameMarker {
            frame_index,
            ref marker,
        } => {
            assert_eq!(frame_index, 1);
            assert_eq!(marker, "FRAMF");
        }
        ref other => panic!("Expected InvalidFrameMarker, got: {other}"),
    }
    assert_eq!(pipeline.backend().encode_count(), 1);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn header_without_dimensions_allocates_nothing() {
    for header in [
        &b"YUV4MPEG2 W\n"[..],
        &b"YUV4MPEG2 W640\n"[..],
        &b"YUV4MPEG2 Wabc H480\n"[..],
        &b"P5 640 480\n"[..],
        &b"\n"[..],
        &b""[..],
    ] {
        let mut pipeline = pipeline(RecordingBackend::new());
        let error = pipeline.run(header).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Format, "header {header:?}");
        assert_eq!(error.phase(), "header");
        assert_eq!(pipeline.state(), PipelineState::Error);
        assert!(pipeline.backend().calls().is_empty(), "header {header:?}");
    }
}

#[test]
fn empty_input_reports_missing_header() {
    let mut pipeline = pipeline(RecordingBackend::new());
    let error = pipeline.run(&b""[..]).unwrap_err();
    assert!(matches!(error, ScxvidError::MissingHeader));
}

#[test]
fn read_error_at_marker_is_fatal_and_destroys_once() {
    let stream = y4m_stream(WIDTH, HEIGHT, 3);
    let fail_at = marker_offset(&stream, FRAME, 1);

    let mut pipeline = pipeline(RecordingBackend::new());
    let error = pipeline
        .run(FailingReader::new(stream, fail_at, IoErrorKind::BrokenPipe))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Io, "got: {error}");
    assert_eq!(error.status(), -1);
    assert_eq!(pipeline.state(), PipelineState::Error);
    assert_eq!(pipeline.backend().encode_count(), 1);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn read_error_inside_payload_is_fatal_and_destroys_once() {
    let stream = y4m_stream(WIDTH, HEIGHT, 3);
    let fail_at = marker_offset(&stream, FRAME, 1) + b"FRAME\n".len() + LUMA;

    let mut pipeline = pipeline(RecordingBackend::new());
    let error = pipeline
        .run(FailingReader::new(stream, fail_at, IoErrorKind::BrokenPipe))
        .unwrap_err();

    assert!(matches!(error, ScxvidError::IoError(_)), "got: {error}");
    assert_eq!(pipeline.state(), PipelineState::Error);
    assert_eq!(pipeline.backend().encode_count(), 1);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn interrupted_read_inside_payload_still_encodes_whole_frame() {
    let stream = y4m_stream(WIDTH, HEIGHT, 3);
    let fail_at = marker_offset(&stream, FRAME, 1) + b"FRAME\n".len() + 7;

    let mut pipeline = pipeline(RecordingBackend::new());
    let summary = pipeline
        .run(FailingReader::new(stream, fail_at, IoErrorKind::Interrupted))
        .expect("interrupted reads should be retried");

    assert_eq!(summary.frames_encoded, 3);
    assert_eq!(pipeline.state(), PipelineState::Done);
    assert!(matches!(
        pipeline.backend().calls()[2],
        Call::Encode { frame_index: 1, fill: 1, .. }
    ));
}

// ── Encoder failures ───────────────────────────────────────────────

#[test]
fn encode_failure_stops_and_destroys_once() {
    let mut backend = RecordingBackend::new();
    backend.fail_encode_at = Some(2);

    let mut pipeline = pipeline(backend);
    let error = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 6).as_slice())
        .unwrap_err();

    assert!(matches!(
        error,
        ScxvidError::EncodeFailed {
            frame_index: 2,
            code: -3,
            ..
        }
    ));
    assert_eq!(error.status(), -3);
    assert_eq!(pipeline.state(), PipelineState::Error);
    assert_eq!(pipeline.backend().encode_count(), 3);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn create_failure_reads_no_frames() {
    let mut backend = RecordingBackend::new();
    backend.fail_create = true;

    let mut pipeline = pipeline(backend);
    let error = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 3).as_slice())
        .unwrap_err();

    assert!(matches!(error, ScxvidError::EncoderCreate { code: -4, .. }));
    assert_eq!(error.kind(), ErrorKind::Encoder);
    assert_eq!(pipeline.backend().create_count(), 1);
    assert_eq!(pipeline.backend().encode_count(), 0);
    assert_eq!(pipeline.backend().destroy_count(), 0);
}

#[test]
fn teardown_failure_after_clean_run_is_reported() {
    let mut backend = RecordingBackend::new();
    backend.fail_destroy = true;

    let mut pipeline = pipeline(backend);
    let error = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 2).as_slice())
        .unwrap_err();

    assert!(matches!(error, ScxvidError::EncoderTeardown { .. }));
    assert_eq!(pipeline.state(), PipelineState::Error);
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

#[test]
fn teardown_failure_does_not_mask_original_error() {
    let mut backend = RecordingBackend::new();
    backend.fail_destroy = true;
    backend.fail_encode_at = Some(0);

    let mut pipeline = pipeline(backend);
    let error = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 2).as_slice())
        .unwrap_err();

    assert!(matches!(error, ScxvidError::EncodeFailed { .. }));
    assert_eq!(pipeline.backend().destroy_count(), 1);
}

// ── Progress ───────────────────────────────────────────────────────

struct RecordingProgress {
    frames: Mutex<Vec<u64>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.frames.lock().unwrap().push(info.frames_encoded);
    }
}

#[test]
fn progress_reported_on_interval_and_at_end() {
    let progress = Arc::new(RecordingProgress {
        frames: Mutex::new(Vec::new()),
    });
    let options = PipelineOptions::new("stats.log")
        .with_progress(progress.clone())
        .with_progress_interval(2);

    let mut pipeline = Pipeline::new(RecordingBackend::new(), options);
    pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 5).as_slice())
        .expect("run should succeed");

    assert_eq!(*progress.frames.lock().unwrap(), vec![2, 4, 5]);
}

#[test]
fn pipeline_can_run_again_after_failure() {
    let mut pipeline = pipeline(RecordingBackend::new());
    assert!(pipeline.run(&b"garbage\n"[..]).is_err());
    assert_eq!(pipeline.state(), PipelineState::Error);

    let summary = pipeline
        .run(y4m_stream(WIDTH, HEIGHT, 1).as_slice())
        .expect("second run should succeed");
    assert_eq!(summary.frames_encoded, 1);
    assert_eq!(pipeline.state(), PipelineState::Done);
}
