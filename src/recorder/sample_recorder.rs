//! Sample recorder
//!
//! Owns the container writer for the duration of one recording and decides,
//! buffer by buffer, what gets written. Lifecycle:
//!
//! `Idle → Writing → Finishing → Idle`
//!
//! Only `Writing` carries a writer. `stop()` moves the writer out of the
//! state and finalizes it on a background thread, then reports the outcome
//! through the event channel.

use super::state::{
    FinishedRecording, PlayableHandle, RecorderEvent, RecordingFailure, RecordingSession,
    RecordingState, RecordingStats,
};
use crate::capture::{
    CaptureSession, MediaKind, MediaTime, Orientation, SampleBuffer, SampleBufferDelegate,
};
use crate::config::RecorderConfig;
use crate::utils::AppResult;
use crate::writer::{
    ContainerWriter, FileType, TrackSettings, VideoSettings, WriterFactory, WriterResult,
    WriterStatus,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

enum WriterState {
    Idle,
    Writing(ActiveRecording),
    Finishing,
}

struct ActiveRecording {
    id: Uuid,
    writer: Box<dyn ContainerWriter>,
    started_at: DateTime<Utc>,
    origin: Option<MediaTime>,
    last_timestamp: Option<MediaTime>,
    stats: RecordingStats,
    failure_logged: bool,
}

impl ActiveRecording {
    fn new(writer: Box<dyn ContainerWriter>) -> Self {
        Self {
            id: Uuid::new_v4(),
            writer,
            started_at: Utc::now(),
            origin: None,
            last_timestamp: None,
            stats: RecordingStats::default(),
            failure_logged: false,
        }
    }
}

/// Routes capture buffers into a container writer while recording
pub struct SampleRecorder {
    output_path: PathBuf,
    file_type: FileType,
    video_settings: VideoSettings,
    session: Arc<RecordingSession>,
    capture: Arc<dyn CaptureSession>,
    writers: Arc<dyn WriterFactory>,
    state: Arc<Mutex<WriterState>>,
    events: UnboundedSender<RecorderEvent>,
}

impl SampleRecorder {
    pub fn new(
        config: &RecorderConfig,
        session: Arc<RecordingSession>,
        capture: Arc<dyn CaptureSession>,
        writers: Arc<dyn WriterFactory>,
        events: UnboundedSender<RecorderEvent>,
    ) -> Self {
        Self {
            output_path: config.output_path(),
            file_type: config.file_type,
            video_settings: config.video.clone(),
            session,
            capture,
            writers,
            state: Arc::new(Mutex::new(WriterState::Idle)),
            events,
        }
    }

    pub fn session(&self) -> &Arc<RecordingSession> {
        &self.session
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> RecordingState {
        match *self.state.lock() {
            WriterState::Idle => RecordingState::Idle,
            WriterState::Writing(_) => RecordingState::Writing,
            WriterState::Finishing => RecordingState::Finishing,
        }
    }

    /// Open a fresh writer at the output path and start accepting buffers.
    ///
    /// No-op while already recording or while a previous recording is
    /// still being finalized.
    pub fn start(&self) -> AppResult<()> {
        let mut state = self.state.lock();

        if self.session.is_recording() {
            tracing::debug!("Start ignored: already recording");
            return Ok(());
        }
        if matches!(*state, WriterState::Finishing) {
            tracing::warn!("Start ignored: previous recording is still finalizing");
            return Ok(());
        }
        if !self.session.begin() {
            return Ok(());
        }

        remove_previous_output(&self.output_path);
        self.session.set_output_path(&self.output_path);
        self.session.set_start_timestamp(None);

        match self.open_writer() {
            Ok(writer) => {
                let active = ActiveRecording::new(writer);
                tracing::info!(
                    "Recording {} started, writing to {:?}",
                    active.id,
                    self.output_path
                );
                *state = WriterState::Writing(active);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to set up writer: {}", e);
                self.session.end();
                *state = WriterState::Idle;
                Err(e.into())
            }
        }
    }

    fn open_writer(&self) -> WriterResult<Box<dyn ContainerWriter>> {
        let mut writer = self.writers.create_writer(&self.output_path, self.file_type)?;

        for settings in [
            TrackSettings::Video(self.video_settings.clone()),
            TrackSettings::Audio,
        ] {
            let kind = settings.kind();
            if !writer.can_add_input(&settings) {
                tracing::warn!("Writer cannot add {} input, skipping", kind);
                continue;
            }
            match writer.add_input(settings) {
                Ok(()) => tracing::info!("{} input added", kind),
                Err(e) => tracing::warn!("Failed to add {} input: {}", kind, e),
            }
        }

        writer.start_writing()?;
        tracing::debug!("Writer status after start: {:?}", writer.status());
        Ok(writer)
    }

    /// Stop accepting buffers and finalize the file in the background.
    ///
    /// Emits exactly one `RecordingFinished` event per effective stop.
    pub fn stop(&self) {
        if !self.session.end() {
            tracing::debug!("Stop ignored: not recording");
            return;
        }

        let active = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, WriterState::Finishing) {
                WriterState::Writing(active) => active,
                other => {
                    *state = match other {
                        WriterState::Finishing => WriterState::Finishing,
                        _ => WriterState::Idle,
                    };
                    tracing::warn!("Stop requested without an open writer");
                    return;
                }
            }
        };

        let ActiveRecording {
            id,
            mut writer,
            started_at,
            origin,
            last_timestamp,
            mut stats,
            ..
        } = active;

        writer.mark_as_finished(MediaKind::Video);
        writer.mark_as_finished(MediaKind::Audio);
        tracing::debug!("Inputs marked as finished");

        self.capture.stop_running();

        if let Some(last) = last_timestamp {
            writer.end_session(last);
            if let Some(origin) = origin {
                stats.duration_ms = last.saturating_since(origin).as_secs_f64() * 1000.0;
            }
        }

        tracing::info!(
            "Recording {} stopped: {} video, {} audio, {} dropped, {:.0}ms",
            id,
            stats.video_buffers,
            stats.audio_buffers,
            stats.dropped_buffers,
            stats.duration_ms
        );

        let state = self.state.clone();
        let events = self.events.clone();
        let expected_path = writer.output_path().to_path_buf();

        let finalize = move || {
            let result = writer.finish_writing();
            *state.lock() = WriterState::Idle;

            let outcome = match result {
                Ok(path) => {
                    tracing::info!("Finished writing {:?}", path);
                    Ok(FinishedRecording {
                        recording_id: id,
                        handle: PlayableHandle::new(path),
                        stats,
                        started_at,
                        finished_at: Utc::now(),
                    })
                }
                Err(reason) => {
                    tracing::error!("Failed to finalize recording {}: {}", id, reason);
                    Err(RecordingFailure {
                        recording_id: id,
                        path: expected_path,
                        reason,
                    })
                }
            };

            if events.send(RecorderEvent::RecordingFinished(outcome)).is_err() {
                tracing::warn!("Recording {} finished with nobody listening", id);
            }
        };

        if let Err(e) = std::thread::Builder::new()
            .name("recording-finalizer".to_string())
            .spawn(finalize)
        {
            // The closure (and the writer with it) is gone; report the loss
            tracing::error!("Failed to spawn finalizer thread: {}", e);
            *self.state.lock() = WriterState::Idle;
            let _ = self.events.send(RecorderEvent::RecordingFinished(Err(RecordingFailure {
                recording_id: id,
                path: self.output_path.clone(),
                reason: e.into(),
            })));
        }
    }

    /// Admission and routing for one buffer from the capture queue
    pub fn on_sample_buffer(&self, output: MediaKind, mut buffer: SampleBuffer) {
        if output == MediaKind::Video {
            buffer.set_orientation(Orientation::Portrait);
        }

        let mut state = self.state.lock();
        let WriterState::Writing(active) = &mut *state else {
            return;
        };

        let status = active.writer.status();
        if !self.session.is_recording() || status != WriterStatus::Writing {
            if matches!(status, WriterStatus::Failed | WriterStatus::Cancelled) && !active.failure_logged {
                tracing::warn!(
                    "Writer for recording {} is {:?}; dropping buffers until stop",
                    active.id,
                    status
                );
                active.failure_logged = true;
            }
            active.stats.dropped_buffers += 1;
            return;
        }

        let pts = buffer.presentation_timestamp();
        if active.origin.is_none() {
            active.writer.start_session(pts);
            active.origin = Some(pts);
            self.session.set_start_timestamp(Some(pts));
            tracing::info!("Writing session started at {:?}", pts);
        }
        active.last_timestamp = Some(pts);

        if !active.writer.is_ready_for_more_media_data(output) {
            tracing::debug!("{} input not ready, dropping buffer at {:?}", output, pts);
            active.stats.dropped_buffers += 1;
            return;
        }

        match active.writer.append(output, &buffer) {
            Ok(()) => match output {
                MediaKind::Video => active.stats.video_buffers += 1,
                MediaKind::Audio => active.stats.audio_buffers += 1,
            },
            Err(e) => {
                tracing::debug!("Dropped {} buffer at {:?}: {}", output, pts, e);
                active.stats.dropped_buffers += 1;
            }
        }
    }
}

impl SampleBufferDelegate for SampleRecorder {
    fn capture_output(&self, output: MediaKind, buffer: SampleBuffer) {
        self.on_sample_buffer(output, buffer);
    }
}

fn remove_previous_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!("Removed previous recording at {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Unable to delete file {:?}: {}", path, e),
    }
}
