//! Recording system module
//!
//! - `SampleRecorder`: writer lifecycle and per-buffer admission
//! - `CaptureController`: capture session and UI state, driven by messages
//! - `state`: session record, state machine and outcome types

pub mod controller;
pub mod sample_recorder;
pub mod state;

pub use controller::{CaptureController, ControllerCommand, ControllerHandle, UiState};
pub use sample_recorder::SampleRecorder;
pub use state::{
    FinishedRecording, PlayableHandle, RecorderEvent, RecordingFailure, RecordingOutcome,
    RecordingSession, RecordingState, RecordingStats,
};
