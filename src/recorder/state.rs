//! Recording state management
//!
//! Defines the recording state machine, the shared session record and the
//! outcome reported when a recording is finalized.

use crate::capture::MediaTime;
use crate::writer::WriterError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Current state of the sample recorder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No writer open
    #[default]
    Idle,
    /// Writer open and accepting buffers
    Writing,
    /// Writer being finalized in the background
    Finishing,
}

/// State shared between the UI side and the capture queue
///
/// One per controller. The recording flag is read on the capture queue and
/// written from the UI side, so it is atomic.
#[derive(Debug, Default)]
pub struct RecordingSession {
    is_recording: AtomicBool,
    start_timestamp: Mutex<Option<MediaTime>>,
    output_path: Mutex<PathBuf>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Flip the flag on. Returns false if it was already set.
    pub(crate) fn begin(&self) -> bool {
        self.is_recording
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Flip the flag off. Returns false if it was already clear.
    pub(crate) fn end(&self) -> bool {
        self.is_recording
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Time origin of the current recording, once the first buffer is admitted
    pub fn start_timestamp(&self) -> Option<MediaTime> {
        *self.start_timestamp.lock()
    }

    pub(crate) fn set_start_timestamp(&self, at: Option<MediaTime>) {
        *self.start_timestamp.lock() = at;
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_path.lock().clone()
    }

    pub(crate) fn set_output_path(&self, path: &Path) {
        *self.output_path.lock() = path.to_path_buf();
    }
}

/// Location of a finalized recording, ready for playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableHandle {
    path: PathBuf,
}

impl PlayableHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Per-recording buffer counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStats {
    pub video_buffers: u64,
    pub audio_buffers: u64,
    /// Buffers that arrived while writing but were not appended
    pub dropped_buffers: u64,
    /// Time from the origin to the last admitted buffer
    pub duration_ms: f64,
}

/// A successfully finalized recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedRecording {
    pub recording_id: Uuid,
    pub handle: PlayableHandle,
    pub stats: RecordingStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A recording whose finalization failed
#[derive(Debug, Error)]
#[error("Recording {recording_id} to {path:?} failed: {reason}")]
pub struct RecordingFailure {
    pub recording_id: Uuid,
    pub path: PathBuf,
    #[source]
    pub reason: WriterError,
}

/// Result delivered exactly once per stop
pub type RecordingOutcome = Result<FinishedRecording, RecordingFailure>;

/// Events the recorder emits towards its owner
#[derive(Debug)]
pub enum RecorderEvent {
    RecordingFinished(RecordingOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_transitions_are_exclusive() {
        let session = RecordingSession::new();
        assert!(!session.is_recording());
        assert!(session.begin());
        assert!(!session.begin());
        assert!(session.is_recording());
        assert!(session.end());
        assert!(!session.end());
    }

    #[test]
    fn test_playable_handle_url() {
        let handle = PlayableHandle::new("/tmp/OutputVideo.mp4");
        assert_eq!(handle.url(), "file:///tmp/OutputVideo.mp4");
        assert_eq!(handle.path(), Path::new("/tmp/OutputVideo.mp4"));
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&RecordingState::Finishing).unwrap();
        assert_eq!(json, "\"finishing\"");
    }
}
