//! Capture controller
//!
//! Owns the capture session and the UI state, and turns record-button
//! presses into recorder start/stop calls. Runs as an event loop on the
//! UI-owning task: user commands and recorder events both arrive as
//! messages, so every UI mutation (including the finished-recording
//! handoff) happens on that one task.

use super::sample_recorder::SampleRecorder;
use super::state::{PlayableHandle, RecorderEvent, RecordingOutcome, RecordingSession};
use crate::capture::{CaptureSession, MediaKind, SampleBufferDelegate, SerialQueue};
use crate::config::RecorderConfig;
use crate::playback::Presenter;
use crate::utils::AppResult;
use crate::writer::WriterFactory;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Button title while idle
pub const RECORD_TITLE: &str = "Record Video!";

/// Button title while recording
pub const STOP_TITLE: &str = "End Recording";

/// Commands from the outer surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// The record button was pressed
    ToggleRecording,
    /// Stop recording if needed, wait for finalization, then exit the loop
    Shutdown,
}

/// Cloneable handle for sending commands to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerCommand>,
}

impl ControllerHandle {
    /// Press the record button. Returns false if the controller has exited.
    pub fn toggle_recording(&self) -> bool {
        self.tx.send(ControllerCommand::ToggleRecording).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.tx.send(ControllerCommand::Shutdown).is_ok()
    }
}

/// What the UI is currently showing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Recording,
    Playback(PlayableHandle),
}

pub struct CaptureController<P: Presenter> {
    session: Arc<RecordingSession>,
    capture: Arc<dyn CaptureSession>,
    recorder: Arc<SampleRecorder>,
    queue: SerialQueue,
    presenter: P,
    ui_state: UiState,
    commands: mpsc::UnboundedReceiver<ControllerCommand>,
    commands_open: bool,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
    shutting_down: bool,
    awaiting_outcome: bool,
    completed: usize,
}

impl<P: Presenter> CaptureController<P> {
    /// Wire a controller to a capture session and writer factory
    pub fn new(
        config: &RecorderConfig,
        capture: Arc<dyn CaptureSession>,
        writers: Arc<dyn WriterFactory>,
        mut presenter: P,
    ) -> AppResult<(Self, ControllerHandle)> {
        config.validate()?;

        let queue = SerialQueue::new(&config.queue_label)?;
        let session = Arc::new(RecordingSession::new());
        let (event_tx, events) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::unbounded_channel();

        let recorder = Arc::new(SampleRecorder::new(
            config,
            session.clone(),
            capture.clone(),
            writers,
            event_tx,
        ));

        presenter.set_record_button_title(RECORD_TITLE);

        let controller = Self {
            session,
            capture,
            recorder,
            queue,
            presenter,
            ui_state: UiState::Idle,
            commands,
            commands_open: true,
            events,
            shutting_down: false,
            awaiting_outcome: false,
            completed: 0,
        };
        Ok((controller, ControllerHandle { tx: command_tx }))
    }

    pub fn session(&self) -> &Arc<RecordingSession> {
        &self.session
    }

    pub fn recorder(&self) -> &Arc<SampleRecorder> {
        &self.recorder
    }

    /// Queue the capture callbacks run on
    pub fn queue(&self) -> &SerialQueue {
        &self.queue
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui_state
    }

    /// Number of finished-recording outcomes handled so far
    pub fn completed_recordings(&self) -> usize {
        self.completed
    }

    /// Bind both capture outputs to the recorder on the capture queue
    fn configure_outputs(&self) -> AppResult<()> {
        let recorder: Weak<SampleRecorder> = Arc::downgrade(&self.recorder);
        for output in [MediaKind::Video, MediaKind::Audio] {
            let delegate: Weak<dyn SampleBufferDelegate> = recorder.clone();
            self.capture
                .set_sample_buffer_delegate(output, delegate, &self.queue)?;
        }
        Ok(())
    }

    /// Handle a record-button press
    pub fn toggle_recording(&mut self) {
        if self.session.is_recording() {
            self.recorder.stop();
            self.awaiting_outcome = true;
            self.presenter.set_record_button_title(RECORD_TITLE);
            self.capture.stop_running();
            self.ui_state = UiState::Idle;
            return;
        }

        if let Err(e) = self.configure_outputs() {
            tracing::error!("Failed to configure capture outputs: {}", e);
            return;
        }

        self.presenter.set_record_button_title(STOP_TITLE);
        if let Err(e) = self.capture.start_running() {
            tracing::error!("Failed to start capture session: {}", e);
            self.presenter.set_record_button_title(RECORD_TITLE);
            return;
        }

        match self.recorder.start() {
            Ok(()) if self.session.is_recording() => {
                self.ui_state = UiState::Recording;
            }
            Ok(()) => {
                // Previous recording still finalizing
                self.presenter.set_record_button_title(RECORD_TITLE);
                self.capture.stop_running();
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.presenter.set_record_button_title(RECORD_TITLE);
                self.capture.stop_running();
            }
        }
    }

    /// Handle the recorder's finalization result
    pub fn on_recording_finished(&mut self, outcome: RecordingOutcome) {
        self.awaiting_outcome = false;
        self.completed += 1;
        match outcome {
            Ok(recording) => {
                tracing::info!(
                    "Recording {} ready at {:?}",
                    recording.recording_id,
                    recording.handle.path()
                );
                self.presenter.present_playback(&recording);
                self.ui_state = UiState::Playback(recording.handle);
            }
            Err(failure) => {
                self.presenter.present_error(&failure);
                self.ui_state = UiState::Idle;
            }
        }
    }

    fn begin_shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        tracing::info!("Capture controller shutting down");
        self.shutting_down = true;
        if self.session.is_recording() {
            self.toggle_recording();
        }
        self.capture.stop_running();
    }

    fn finished_shutting_down(&self) -> bool {
        self.shutting_down && !self.awaiting_outcome
    }

    /// Run the event loop until shut down.
    ///
    /// Dropping every `ControllerHandle` counts as a shutdown request.
    /// A recording being finalized is always waited for.
    pub async fn run(&mut self) {
        tracing::info!("Capture controller running");

        while !self.finished_shutting_down() {
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(ControllerCommand::ToggleRecording) => {
                        if !self.shutting_down {
                            self.toggle_recording();
                        }
                    }
                    Some(ControllerCommand::Shutdown) => self.begin_shutdown(),
                    None => {
                        self.commands_open = false;
                        self.begin_shutdown();
                    }
                },
                Some(event) = self.events.recv() => match event {
                    RecorderEvent::RecordingFinished(outcome) => self.on_recording_finished(outcome),
                },
            }
        }

        tracing::info!("Capture controller stopped");
    }
}
