//! Capture Recorder - camera and microphone capture to a single movie file.
//!
//! This is the main library crate. It provides the capture sources, the
//! sample recorder that feeds a container writer, and the controller that
//! ties recording to a record button.

pub mod capture;
pub mod config;
pub mod playback;
pub mod recorder;
pub mod utils;
pub mod writer;

pub use config::RecorderConfig;
pub use recorder::{CaptureController, ControllerHandle, SampleRecorder};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// Honors `RUST_LOG`; defaults to debug output for this crate.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    tracing::info!("Starting Capture Recorder v{}", env!("CARGO_PKG_VERSION"));
}
