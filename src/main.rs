//! Headless record-button demo: records for a configured number of seconds,
//! then hands the finished movie to the log presenter.

use anyhow::{bail, Context};
use capture_recorder::capture::{CaptureSession, SyntheticCaptureSession};
use capture_recorder::config::{CaptureSourceKind, RecorderConfig};
use capture_recorder::playback::LogPresenter;
use capture_recorder::recorder::CaptureController;
use capture_recorder::writer::FfmpegWriterFactory;
use std::sync::Arc;
use std::time::Duration;

fn open_capture(config: &RecorderConfig) -> anyhow::Result<Arc<dyn CaptureSession>> {
    match config.source {
        CaptureSourceKind::Synthetic => Ok(Arc::new(SyntheticCaptureSession::new(
            config.synthetic.clone(),
        ))),
        #[cfg(feature = "native-capture")]
        CaptureSourceKind::Native => {
            use capture_recorder::capture::native;

            for camera in native::list_cameras() {
                tracing::info!("Camera {}: {}", camera.id, camera.name);
            }
            for mic in native::list_microphones() {
                tracing::info!("Microphone: {} (default: {})", mic.name, mic.is_default);
            }
            let session = native::NativeCaptureSession::open(config.camera_index)
                .context("Failed to open camera and microphone")?;
            Ok(Arc::new(session))
        }
        #[cfg(not(feature = "native-capture"))]
        CaptureSourceKind::Native => {
            bail!("native capture requires building with the `native-capture` feature")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    capture_recorder::init_tracing();

    let config = RecorderConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!("Configuration: {:?}", config);

    let writers = FfmpegWriterFactory::new(&config.ffmpeg_path);
    if !writers.is_available() {
        bail!("FFmpeg not found at {:?}", config.ffmpeg_path);
    }

    let capture = open_capture(&config)?;
    let (mut controller, handle) =
        CaptureController::new(&config, capture, Arc::new(writers), LogPresenter::default())
            .context("Failed to set up capture controller")?;

    let record_for = Duration::from_secs_f64(config.record_seconds);
    let button = handle.clone();
    tokio::spawn(async move {
        button.toggle_recording();
        tokio::select! {
            _ = tokio::time::sleep(record_for) => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, stopping early"),
        }
        button.toggle_recording();
        button.shutdown();
    });

    controller.run().await;
    drop(handle);

    match controller.presenter().last_playback() {
        Some(path) => {
            tracing::info!("Recording saved to {:?}", path);
            Ok(())
        }
        None => bail!("Recording did not produce a playable file"),
    }
}
