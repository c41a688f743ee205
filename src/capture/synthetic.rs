//! Synthetic capture source
//!
//! Generates a moving-bar test pattern and a sine tone at fixed rates, paced
//! against the wall clock like a real camera and microphone. Used when no
//! hardware is available and by the demo binary's default configuration.

use super::output::OutputBindings;
use super::queue::SerialQueue;
use super::traits::{
    AudioChunk, CaptureError, CaptureResult, CaptureSession, MediaKind, MediaTime, PixelFormat,
    SampleBuffer, SampleBufferDelegate, SampleFormat, VideoFrame,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Synthetic source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyntheticSourceConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub tone_hz: f32,
}

impl Default for SyntheticSourceConfig {
    fn default() -> Self {
        // Landscape sensor geometry, like a phone's back camera
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            sample_rate: 48_000,
            channels: 1,
            tone_hz: 440.0,
        }
    }
}

/// Capture session backed by generated media
pub struct SyntheticCaptureSession {
    config: SyntheticSourceConfig,
    outputs: Arc<OutputBindings>,
    running: Arc<AtomicBool>,
    producer: Mutex<Option<JoinHandle<()>>>,
    /// Clock epoch shared by every run so timestamps keep increasing
    epoch: Instant,
}

impl SyntheticCaptureSession {
    pub fn new(config: SyntheticSourceConfig) -> Self {
        Self {
            config,
            outputs: Arc::new(OutputBindings::new()),
            running: Arc::new(AtomicBool::new(false)),
            producer: Mutex::new(None),
            epoch: Instant::now(),
        }
    }

    pub fn config(&self) -> &SyntheticSourceConfig {
        &self.config
    }
}

impl CaptureSession for SyntheticCaptureSession {
    fn set_sample_buffer_delegate(
        &self,
        output: MediaKind,
        delegate: Weak<dyn SampleBufferDelegate>,
        queue: &SerialQueue,
    ) -> CaptureResult<()> {
        self.outputs.bind(output, delegate, queue);
        Ok(())
    }

    fn start_running(&self) -> CaptureResult<()> {
        if self.config.fps == 0 || self.config.width == 0 || self.config.height == 0 {
            return Err(CaptureError::Session(
                "Synthetic source needs non-zero size and frame rate".to_string(),
            ));
        }

        let mut producer = self.producer.lock();
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // A previous run may still be winding down
        if let Some(handle) = producer.take() {
            let _ = handle.join();
        }

        let config = self.config.clone();
        let outputs = self.outputs.clone();
        let running = self.running.clone();
        let start_offset = MediaTime::from_duration(self.epoch.elapsed());

        let handle = std::thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || produce(config, outputs, running, start_offset))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Io(e)
            })?;

        *producer = Some(handle);

        tracing::info!(
            "Synthetic capture started: {}x{} @ {}fps, {}Hz {}ch",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.sample_rate,
            self.config.channels
        );
        Ok(())
    }

    fn stop_running(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let handle = self.producer.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }

        tracing::info!("Synthetic capture stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticCaptureSession {
    fn drop(&mut self) {
        self.stop_running();
    }
}

fn produce(
    config: SyntheticSourceConfig,
    outputs: Arc<OutputBindings>,
    running: Arc<AtomicBool>,
    start_offset: MediaTime,
) {
    let frame_interval = Duration::from_secs_f64(1.0 / config.fps as f64);
    let samples_per_frame = (config.sample_rate / config.fps).max(1) as u64;
    let started = Instant::now();

    let mut frame_index: u64 = 0;
    let mut samples_emitted: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let video_pts = offset_by(start_offset, frame_interval.mul_f64(frame_index as f64));
        outputs.deliver(
            MediaKind::Video,
            SampleBuffer::video(video_pts, test_pattern(&config, frame_index)),
        );

        if config.sample_rate > 0 {
            let audio_pts = offset_by(
                start_offset,
                Duration::from_secs_f64(samples_emitted as f64 / config.sample_rate as f64),
            );
            outputs.deliver(
                MediaKind::Audio,
                SampleBuffer::audio(audio_pts, sine_chunk(&config, samples_emitted, samples_per_frame)),
            );
            samples_emitted += samples_per_frame;
        }

        frame_index += 1;
        let next_tick = started + frame_interval.mul_f64(frame_index as f64);
        if let Some(wait) = next_tick.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    }

    tracing::debug!("Synthetic producer emitted {} frames", frame_index);
}

fn offset_by(base: MediaTime, delta: Duration) -> MediaTime {
    MediaTime::from_nanos(base.as_nanos() + MediaTime::from_duration(delta).as_nanos())
}

/// BGRA frame with a dark gradient and a white bar sweeping left to right
fn test_pattern(config: &SyntheticSourceConfig, frame_index: u64) -> VideoFrame {
    let width = config.width as usize;
    let height = config.height as usize;
    let bar_width = (width / 32).max(1);
    let bar_x = (frame_index as usize * 8) % width;

    let mut data = vec![0u8; PixelFormat::Bgra.frame_size(config.width, config.height)];
    for (y, row) in data.chunks_exact_mut(width * 4).enumerate() {
        let shade = (y * 160 / height.max(1)) as u8;
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let on_bar = x >= bar_x && x < bar_x + bar_width;
            let value = if on_bar { 255 } else { shade };
            px.copy_from_slice(&[value, value / 2, if on_bar { 255 } else { 32 }, 255]);
        }
    }

    VideoFrame {
        width: config.width,
        height: config.height,
        pixel_format: PixelFormat::Bgra,
        data,
    }
}

/// Interleaved f32 sine tone starting at sample `first_sample`
fn sine_chunk(config: &SyntheticSourceConfig, first_sample: u64, frames: u64) -> AudioChunk {
    let channels = config.channels.max(1) as usize;
    let mut data = Vec::with_capacity(frames as usize * channels * 4);

    for n in first_sample..first_sample + frames {
        let t = n as f32 / config.sample_rate as f32;
        let sample = (TAU * config.tone_hz * t).sin() * 0.25;
        for _ in 0..channels {
            data.extend_from_slice(&sample.to_le_bytes());
        }
    }

    AudioChunk {
        sample_rate: config.sample_rate,
        channels: channels as u16,
        sample_format: SampleFormat::F32le,
        data,
    }
}
