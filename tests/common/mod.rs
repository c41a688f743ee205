//! In-memory capture session and container writer for recording tests
#![allow(dead_code)]

use capture_recorder::capture::{
    AudioChunk, CaptureResult, CaptureSession, MediaKind, MediaTime, Orientation, PixelFormat,
    SampleBuffer, SampleBufferDelegate, SampleFormat, SerialQueue, VideoFrame,
};
use capture_recorder::config::RecorderConfig;
use capture_recorder::playback::Presenter;
use capture_recorder::recorder::{FinishedRecording, RecordingFailure};
use capture_recorder::writer::{
    ContainerWriter, FileType, TrackSettings, WriterError, WriterFactory, WriterResult,
    WriterStatus,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread::ThreadId;

pub fn test_config(dir: &Path) -> RecorderConfig {
    RecorderConfig {
        output_dir: dir.to_path_buf(),
        ..RecorderConfig::default()
    }
}

pub fn video_buffer(millis: i64) -> SampleBuffer {
    SampleBuffer::video(
        MediaTime::from_millis(millis),
        VideoFrame {
            width: 4,
            height: 2,
            pixel_format: PixelFormat::Bgra,
            data: vec![0; 4 * 2 * 4],
        },
    )
}

pub fn audio_buffer(millis: i64) -> SampleBuffer {
    SampleBuffer::audio(
        MediaTime::from_millis(millis),
        AudioChunk {
            sample_rate: 48_000,
            channels: 1,
            sample_format: SampleFormat::F32le,
            data: vec![0; 480 * 4],
        },
    )
}

/// What one writer saw during its lifetime
#[derive(Debug, Default)]
pub struct WriterLog {
    pub inputs: Vec<MediaKind>,
    pub session_starts: Vec<MediaTime>,
    pub session_end: Option<MediaTime>,
    pub appends: Vec<(MediaKind, MediaTime, Orientation)>,
    pub finished_inputs: Vec<MediaKind>,
    pub finalized: bool,
}

/// Knobs shared by every writer a `FakeWriterFactory` creates
#[derive(Debug)]
pub struct WriterControls {
    pub video_ready: AtomicBool,
    pub audio_ready: AtomicBool,
    pub fail: AtomicBool,
    finish_gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Default for WriterControls {
    fn default() -> Self {
        Self {
            video_ready: AtomicBool::new(true),
            audio_ready: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            finish_gate: Mutex::new(None),
        }
    }
}

impl WriterControls {
    pub fn set_ready(&self, kind: MediaKind, ready: bool) {
        match kind {
            MediaKind::Video => self.video_ready.store(ready, Ordering::SeqCst),
            MediaKind::Audio => self.audio_ready.store(ready, Ordering::SeqCst),
        }
    }

    /// Block the next finalization until the returned sender fires
    pub fn hold_finish(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.finish_gate.lock() = Some(rx);
        tx
    }
}

pub struct FakeWriter {
    path: PathBuf,
    status: WriterStatus,
    controls: Arc<WriterControls>,
    log: Arc<Mutex<WriterLog>>,
}

impl ContainerWriter for FakeWriter {
    fn output_path(&self) -> &Path {
        &self.path
    }

    fn status(&self) -> WriterStatus {
        if self.controls.fail.load(Ordering::SeqCst) {
            WriterStatus::Failed
        } else {
            self.status
        }
    }

    fn can_add_input(&self, _settings: &TrackSettings) -> bool {
        self.status == WriterStatus::Unknown
    }

    fn add_input(&mut self, settings: TrackSettings) -> WriterResult<()> {
        self.log.lock().inputs.push(settings.kind());
        Ok(())
    }

    fn start_writing(&mut self) -> WriterResult<()> {
        self.status = WriterStatus::Writing;
        Ok(())
    }

    fn start_session(&mut self, at: MediaTime) {
        self.log.lock().session_starts.push(at);
    }

    fn end_session(&mut self, at: MediaTime) {
        self.log.lock().session_end = Some(at);
    }

    fn is_ready_for_more_media_data(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.controls.video_ready.load(Ordering::SeqCst),
            MediaKind::Audio => self.controls.audio_ready.load(Ordering::SeqCst),
        }
    }

    fn append(&mut self, kind: MediaKind, buffer: &SampleBuffer) -> WriterResult<()> {
        assert!(self.is_ready_for_more_media_data(kind), "append on a busy input");
        self.log
            .lock()
            .appends
            .push((kind, buffer.presentation_timestamp(), buffer.orientation()));
        Ok(())
    }

    fn mark_as_finished(&mut self, kind: MediaKind) {
        self.log.lock().finished_inputs.push(kind);
    }

    fn finish_writing(self: Box<Self>) -> WriterResult<PathBuf> {
        let gate = self.controls.finish_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        if self.controls.fail.load(Ordering::SeqCst) {
            return Err(WriterError::Encoder("disk full".to_string()));
        }
        let appended = self.log.lock().appends.len();
        std::fs::write(&self.path, format!("movie with {} buffers", appended))?;
        self.log.lock().finalized = true;
        Ok(self.path)
    }
}

#[derive(Default)]
pub struct FakeWriterFactory {
    pub controls: Arc<WriterControls>,
    logs: Mutex<Vec<Arc<Mutex<WriterLog>>>>,
}

impl FakeWriterFactory {
    pub fn created(&self) -> usize {
        self.logs.lock().len()
    }

    /// Log of the `index`-th writer created
    pub fn log(&self, index: usize) -> Arc<Mutex<WriterLog>> {
        self.logs.lock()[index].clone()
    }
}

impl WriterFactory for FakeWriterFactory {
    fn create_writer(&self, path: &Path, _file_type: FileType) -> WriterResult<Box<dyn ContainerWriter>> {
        let log = Arc::new(Mutex::new(WriterLog::default()));
        self.logs.lock().push(log.clone());
        Ok(Box::new(FakeWriter {
            path: path.to_path_buf(),
            status: WriterStatus::Unknown,
            controls: self.controls.clone(),
            log,
        }))
    }
}

/// Capture session driven by the test instead of hardware
#[derive(Default)]
pub struct FakeCapture {
    delegates: Mutex<Vec<(MediaKind, Weak<dyn SampleBufferDelegate>, SerialQueue)>>,
    running: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FakeCapture {
    /// Deliver a buffer through the bound queue and wait for it to be handled
    pub fn emit(&self, buffer: SampleBuffer) {
        let kind = buffer.kind();
        let binding = self
            .delegates
            .lock()
            .iter()
            .rev()
            .find(|(output, _, _)| *output == kind)
            .map(|(_, delegate, queue)| (delegate.clone(), queue.clone()));

        if let Some((delegate, queue)) = binding {
            queue.dispatch(move || {
                if let Some(delegate) = delegate.upgrade() {
                    delegate.capture_output(kind, buffer);
                }
            });
            queue.sync();
        }
    }
}

impl CaptureSession for FakeCapture {
    fn set_sample_buffer_delegate(
        &self,
        output: MediaKind,
        delegate: Weak<dyn SampleBufferDelegate>,
        queue: &SerialQueue,
    ) -> CaptureResult<()> {
        self.delegates.lock().push((output, delegate, queue.clone()));
        Ok(())
    }

    fn start_running(&self) -> CaptureResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_running(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Presenter that remembers what it was asked to show and from which thread
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub titles: Vec<String>,
    pub playbacks: Vec<(PathBuf, ThreadId)>,
    pub errors: Vec<String>,
}

impl Presenter for RecordingPresenter {
    fn set_record_button_title(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }

    fn present_playback(&mut self, recording: &FinishedRecording) {
        self.playbacks
            .push((recording.handle.path().to_path_buf(), std::thread::current().id()));
    }

    fn present_error(&mut self, failure: &RecordingFailure) {
        self.errors.push(failure.to_string());
    }
}
