//! End-to-end recording behavior against in-memory capture and writer fakes

mod common;

use capture_recorder::capture::{CaptureSession, MediaKind, MediaTime, Orientation};
use capture_recorder::recorder::controller::{RECORD_TITLE, STOP_TITLE};
use capture_recorder::recorder::{
    CaptureController, RecorderEvent, RecordingOutcome, RecordingSession, RecordingState,
    SampleRecorder, UiState,
};
use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Harness {
    _dir: TempDir,
    recorder: SampleRecorder,
    capture: Arc<FakeCapture>,
    writers: Arc<FakeWriterFactory>,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let capture = Arc::new(FakeCapture::default());
        let writers = Arc::new(FakeWriterFactory::default());
        let (tx, events) = mpsc::unbounded_channel();
        let recorder = SampleRecorder::new(
            &config,
            Arc::new(RecordingSession::new()),
            capture.clone(),
            writers.clone(),
            tx,
        );
        Self {
            _dir: dir,
            recorder,
            capture,
            writers,
            events,
        }
    }

    fn wait_outcome(&mut self) -> RecordingOutcome {
        match self.events.blocking_recv() {
            Some(RecorderEvent::RecordingFinished(outcome)) => outcome,
            None => panic!("recorder event channel closed"),
        }
    }
}

#[test]
fn test_start_and_stop_are_idempotent() {
    let mut h = Harness::new();

    h.recorder.start().unwrap();
    h.recorder.start().unwrap();
    assert!(h.recorder.session().is_recording());
    assert_eq!(h.writers.created(), 1);

    h.recorder.stop();
    h.recorder.stop();
    assert!(!h.recorder.session().is_recording());

    assert!(h.wait_outcome().is_ok());
    assert!(h.events.try_recv().is_err(), "one outcome per effective stop");
    assert_eq!(h.capture.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_start_replaces_previous_file() {
    let mut h = Harness::new();
    let path = h.recorder.output_path().to_path_buf();
    std::fs::write(&path, b"stale recording").unwrap();

    h.recorder.start().unwrap();
    assert!(!path.exists(), "previous file is removed on start");
    assert_eq!(h.recorder.session().output_path(), path);

    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(0));
    h.recorder.stop();

    let finished = h.wait_outcome().unwrap();
    assert_eq!(finished.handle.path(), path);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "movie with 1 buffers");
}

#[test]
fn test_second_recording_replaces_first() {
    let mut h = Harness::new();
    let path = h.recorder.output_path().to_path_buf();

    h.recorder.start().unwrap();
    for i in 0..3 {
        h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(i * 33));
    }
    h.recorder.stop();
    let first = h.wait_outcome().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "movie with 3 buffers");

    h.recorder.start().unwrap();
    assert!(!path.exists(), "first recording is removed before the second writes");

    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(5_000));
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(5_010));
    h.recorder.stop();
    let second = h.wait_outcome().unwrap();

    assert_ne!(first.recording_id, second.recording_id);
    assert_eq!(second.handle.path(), path);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "movie with 2 buffers");

    // The second writer only ever saw the second recording's buffers
    let log = h.writers.log(1);
    let log = log.lock();
    let appended: Vec<_> = log.appends.iter().map(|(kind, pts, _)| (*kind, *pts)).collect();
    assert_eq!(
        appended,
        vec![
            (MediaKind::Video, MediaTime::from_millis(5_000)),
            (MediaKind::Audio, MediaTime::from_millis(5_010))
        ]
    );
    assert_eq!(log.session_starts, vec![MediaTime::from_millis(5_000)]);
    assert_eq!(
        h.recorder.session().start_timestamp(),
        Some(MediaTime::from_millis(5_000))
    );
}

#[test]
fn test_buffers_outside_recording_are_ignored() {
    let mut h = Harness::new();

    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(0));
    assert_eq!(h.writers.created(), 0);

    h.recorder.start().unwrap();
    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(100));
    h.recorder.stop();
    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(200));
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(200));

    let finished = h.wait_outcome().unwrap();
    let log = h.writers.log(0);
    let log = log.lock();
    assert_eq!(log.appends.len(), 1);
    assert_eq!(log.appends[0].1, MediaTime::from_millis(100));
    assert_eq!(finished.stats.video_buffers, 1);
    assert_eq!(finished.stats.audio_buffers, 0);
}

#[test]
fn test_not_ready_input_drops_buffer_without_touching_other_input() {
    let mut h = Harness::new();
    h.writers.controls.set_ready(MediaKind::Audio, false);

    h.recorder.start().unwrap();
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(0));
    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(10));
    h.writers.controls.set_ready(MediaKind::Audio, true);
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(20));
    h.recorder.stop();

    let finished = h.wait_outcome().unwrap();
    let log = h.writers.log(0);
    let log = log.lock();
    let appended: Vec<_> = log.appends.iter().map(|(kind, pts, _)| (*kind, pts.as_nanos())).collect();
    assert_eq!(
        appended,
        vec![
            (MediaKind::Video, 10_000_000),
            (MediaKind::Audio, 20_000_000)
        ]
    );
    assert_eq!(finished.stats.dropped_buffers, 1);
}

#[test]
fn test_session_origin_is_first_admitted_timestamp() {
    let mut h = Harness::new();
    h.writers.controls.set_ready(MediaKind::Video, false);

    h.recorder.start().unwrap();
    assert_eq!(h.recorder.session().start_timestamp(), None);

    // Dropped for readiness but still opens the session
    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(500));
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(510));
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(540));
    h.recorder.stop();

    let finished = h.wait_outcome().unwrap();
    assert_eq!(
        h.recorder.session().start_timestamp(),
        Some(MediaTime::from_millis(500))
    );
    let log = h.writers.log(0);
    let log = log.lock();
    assert_eq!(log.session_starts, vec![MediaTime::from_millis(500)]);
    assert_eq!(log.session_end, Some(MediaTime::from_millis(540)));
    assert!((finished.stats.duration_ms - 40.0).abs() < 1e-6);
}

#[test]
fn test_interleaved_buffers_are_written_in_arrival_order() {
    let mut h = Harness::new();
    h.recorder.start().unwrap();

    let mut expected = Vec::new();
    for i in 0..10 {
        let t = i * 33;
        h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(t));
        h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(t + 5));
        expected.push((MediaKind::Video, MediaTime::from_millis(t)));
        expected.push((MediaKind::Audio, MediaTime::from_millis(t + 5)));
    }
    h.recorder.stop();

    let finished = h.wait_outcome().unwrap();
    assert_eq!(finished.stats.video_buffers, 10);
    assert_eq!(finished.stats.audio_buffers, 10);
    assert_eq!(finished.stats.dropped_buffers, 0);

    let log = h.writers.log(0);
    let log = log.lock();
    let appended: Vec<_> = log.appends.iter().map(|(kind, pts, _)| (*kind, *pts)).collect();
    assert_eq!(appended, expected);
    assert!(log
        .appends
        .iter()
        .filter(|(kind, _, _)| *kind == MediaKind::Video)
        .all(|(_, _, orientation)| *orientation == Orientation::Portrait));
    assert_eq!(log.inputs, vec![MediaKind::Video, MediaKind::Audio]);
    assert_eq!(log.finished_inputs, vec![MediaKind::Video, MediaKind::Audio]);
    assert!(log.finalized);
}

#[test]
fn test_failed_writer_reports_failure_on_stop() {
    let mut h = Harness::new();
    h.recorder.start().unwrap();
    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(0));

    h.writers.controls.fail.store(true, Ordering::SeqCst);
    h.recorder.on_sample_buffer(MediaKind::Video, video_buffer(33));
    h.recorder.on_sample_buffer(MediaKind::Audio, audio_buffer(40));
    h.recorder.stop();

    let failure = h.wait_outcome().unwrap_err();
    assert_eq!(failure.path, h.recorder.output_path());
    assert_eq!(h.writers.log(0).lock().appends.len(), 1);
    assert_eq!(h.recorder.state(), RecordingState::Idle);
}

#[test]
fn test_start_while_finishing_is_ignored() {
    let mut h = Harness::new();
    let release = h.writers.controls.hold_finish();

    h.recorder.start().unwrap();
    h.recorder.stop();
    assert_eq!(h.recorder.state(), RecordingState::Finishing);

    h.recorder.start().unwrap();
    assert!(!h.recorder.session().is_recording());
    assert_eq!(h.writers.created(), 1);

    release.send(()).unwrap();
    assert!(h.wait_outcome().is_ok());
    assert_eq!(h.recorder.state(), RecordingState::Idle);

    h.recorder.start().unwrap();
    assert!(h.recorder.session().is_recording());
    assert_eq!(h.writers.created(), 2);
}

#[tokio::test]
async fn test_controller_records_and_presents_on_its_own_thread() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let capture = Arc::new(FakeCapture::default());
    let writers = Arc::new(FakeWriterFactory::default());

    let (mut controller, handle) = CaptureController::new(
        &config,
        capture.clone(),
        writers.clone(),
        RecordingPresenter::default(),
    )
    .unwrap();
    assert_eq!(controller.presenter().titles, vec![RECORD_TITLE]);

    controller.toggle_recording();
    assert_eq!(controller.ui_state(), &UiState::Recording);
    assert!(capture.is_running());

    // Capture callbacks run on the controller's queue thread
    for i in 0..10 {
        capture.emit(video_buffer(i * 33));
        capture.emit(audio_buffer(i * 33 + 1));
    }

    controller.toggle_recording();
    assert!(!capture.is_running());
    assert!(!controller.session().is_recording());

    assert!(handle.shutdown());
    controller.run().await;

    let ui_thread = std::thread::current().id();
    let presenter = controller.presenter();
    assert_eq!(presenter.titles, vec![RECORD_TITLE, STOP_TITLE, RECORD_TITLE]);
    assert_eq!(presenter.playbacks.len(), 1);
    assert_eq!(presenter.playbacks[0].0, config.output_path());
    assert_eq!(presenter.playbacks[0].1, ui_thread);
    assert!(presenter.errors.is_empty());
    assert_eq!(controller.completed_recordings(), 1);
    assert!(matches!(controller.ui_state(), UiState::Playback(handle) if handle.path() == config.output_path()));

    let log = writers.log(0);
    let log = log.lock();
    assert_eq!(log.appends.len(), 20);
    assert_eq!(capture.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_while_recording_waits_for_finalization() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let capture = Arc::new(FakeCapture::default());
    let writers = Arc::new(FakeWriterFactory::default());

    let (mut controller, handle) = CaptureController::new(
        &config,
        capture.clone(),
        writers.clone(),
        RecordingPresenter::default(),
    )
    .unwrap();

    assert!(handle.toggle_recording());
    assert!(handle.shutdown());
    drop(handle);
    controller.run().await;

    assert!(!controller.session().is_recording());
    assert_eq!(controller.completed_recordings(), 1);
    assert!(controller.presenter().errors.is_empty());
    assert!(config.output_path().exists());
}

#[tokio::test]
async fn test_controller_surfaces_writer_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let capture = Arc::new(FakeCapture::default());
    let writers = Arc::new(FakeWriterFactory::default());

    let (mut controller, handle) = CaptureController::new(
        &config,
        capture.clone(),
        writers.clone(),
        RecordingPresenter::default(),
    )
    .unwrap();

    controller.toggle_recording();
    capture.emit(video_buffer(0));
    writers.controls.fail.store(true, Ordering::SeqCst);
    controller.toggle_recording();

    handle.shutdown();
    controller.run().await;

    assert_eq!(controller.presenter().errors.len(), 1);
    assert!(controller.presenter().playbacks.is_empty());
    assert_eq!(controller.ui_state(), &UiState::Idle);
}
