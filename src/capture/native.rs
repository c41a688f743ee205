//! Camera and microphone capture using nokhwa and cpal
//!
//! The camera is opened on its own thread (nokhwa cameras are not `Send`),
//! frames are decoded to RGBA and timestamped on arrival. The microphone is
//! a cpal input stream kept alive on a second thread.

use super::output::OutputBindings;
use super::queue::SerialQueue;
use super::traits::{
    AudioChunk, AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult, CaptureSession,
    MediaKind, MediaTime, PixelFormat, SampleBuffer, SampleBufferDelegate, SampleFormat,
    VideoFrame,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Get list of available microphones
pub fn list_microphones() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|d| d.name().ok())
            .map(|name| AudioDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate microphones: {}", e);
            Vec::new()
        }
    }
}

/// Capture session for the default camera and microphone
pub struct NativeCaptureSession {
    camera_index: CameraIndex,
    outputs: Arc<OutputBindings>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    epoch: Instant,
}

impl NativeCaptureSession {
    /// Check that a camera and a microphone exist before building a session
    pub fn open(camera_index: u32) -> CaptureResult<Self> {
        let cameras = list_cameras();
        if cameras.is_empty() {
            return Err(CaptureError::DeviceNotFound("No cameras found".to_string()));
        }
        if cpal::default_host().default_input_device().is_none() {
            return Err(CaptureError::DeviceNotFound(
                "No microphone found".to_string(),
            ));
        }

        tracing::info!(
            "Native capture ready: {} camera(s), using index {}",
            cameras.len(),
            camera_index
        );

        Ok(Self {
            camera_index: CameraIndex::Index(camera_index),
            outputs: Arc::new(OutputBindings::new()),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            epoch: Instant::now(),
        })
    }

    fn spawn_camera(&self) -> CaptureResult<JoinHandle<()>> {
        let index = self.camera_index.clone();
        let outputs = self.outputs.clone();
        let running = self.running.clone();
        let epoch = self.epoch;

        let handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                let format =
                    RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
                let mut camera = match Camera::new(index.clone(), format) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Failed to open camera {:?}: {:?}", index, e);
                        return;
                    }
                };
                if let Err(e) = camera.open_stream() {
                    tracing::error!("Failed to open camera stream: {:?}", e);
                    return;
                }

                let camera_format = camera.camera_format();
                tracing::info!(
                    "Camera opened: {}x{} @ {}fps ({:?})",
                    camera_format.resolution().width(),
                    camera_format.resolution().height(),
                    camera_format.frame_rate(),
                    camera_format.format()
                );

                let mut frames: u64 = 0;
                while running.load(Ordering::SeqCst) {
                    let frame = match camera.frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::debug!("Failed to capture frame: {:?}", e);
                            continue;
                        }
                    };
                    let pts = MediaTime::from_duration(epoch.elapsed());
                    match frame.decode_image::<RgbAFormat>() {
                        Ok(image) => {
                            let video = VideoFrame {
                                width: image.width(),
                                height: image.height(),
                                pixel_format: PixelFormat::Rgba,
                                data: image.into_raw(),
                            };
                            outputs.deliver(MediaKind::Video, SampleBuffer::video(pts, video));
                            frames += 1;
                        }
                        Err(e) => tracing::debug!("Failed to decode frame: {:?}", e),
                    }
                }

                if let Err(e) = camera.stop_stream() {
                    tracing::warn!("Error stopping camera stream: {:?}", e);
                }
                tracing::info!("Camera capture stopped after {} frames", frames);
            })?;

        Ok(handle)
    }

    fn spawn_microphone(&self) -> CaptureResult<JoinHandle<()>> {
        let outputs = self.outputs.clone();
        let running = self.running.clone();
        let epoch = self.epoch;

        let handle = std::thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || {
                let Some(device) = cpal::default_host().default_input_device() else {
                    tracing::error!("No default input device");
                    return;
                };
                let supported = match device.default_input_config() {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Failed to get microphone config: {}", e);
                        return;
                    }
                };
                let sample_format = supported.sample_format();
                let config = supported.config();
                let sample_rate = config.sample_rate.0;
                let channels = config.channels;

                let err_fn = |err: cpal::StreamError| tracing::error!("Microphone stream error: {}", err);
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => {
                        let outputs = outputs.clone();
                        device.build_input_stream(
                            &config,
                            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                                let bytes = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                                let chunk = AudioChunk {
                                    sample_rate,
                                    channels,
                                    sample_format: SampleFormat::F32le,
                                    data: bytes,
                                };
                                let pts = MediaTime::from_duration(epoch.elapsed());
                                outputs.deliver(MediaKind::Audio, SampleBuffer::audio(pts, chunk));
                            },
                            err_fn,
                            None,
                        )
                    }
                    cpal::SampleFormat::I16 => {
                        let outputs = outputs.clone();
                        device.build_input_stream(
                            &config,
                            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                                let bytes = data.iter().flat_map(|s| s.to_le_bytes()).collect();
                                let chunk = AudioChunk {
                                    sample_rate,
                                    channels,
                                    sample_format: SampleFormat::S16le,
                                    data: bytes,
                                };
                                let pts = MediaTime::from_duration(epoch.elapsed());
                                outputs.deliver(MediaKind::Audio, SampleBuffer::audio(pts, chunk));
                            },
                            err_fn,
                            None,
                        )
                    }
                    other => {
                        tracing::error!("Unsupported microphone sample format: {:?}", other);
                        return;
                    }
                };

                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!("Failed to build microphone stream: {}", e);
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    tracing::error!("Failed to start microphone stream: {}", e);
                    return;
                }

                tracing::info!("Microphone capture started: {}Hz {}ch", sample_rate, channels);
                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
                tracing::info!("Microphone capture stopped");
            })?;

        Ok(handle)
    }
}

impl CaptureSession for NativeCaptureSession {
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
        let mut threads = self.threads.lock();
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for handle in threads.drain(..) {
            let _ = handle.join();
        }

        let camera = self.spawn_camera();
        let microphone = self.spawn_microphone();
        match (camera, microphone) {
            (Ok(camera), Ok(microphone)) => {
                threads.push(camera);
                threads.push(microphone);
                Ok(())
            }
            (camera, microphone) => {
                self.running.store(false, Ordering::SeqCst);
                let mut first_error = None;
                for result in [camera, microphone] {
                    match result {
                        Ok(handle) => {
                            let _ = handle.join();
                        }
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Err(first_error
                    .unwrap_or_else(|| CaptureError::Session("Capture start failed".to_string())))
            }
        }
    }

    fn stop_running(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for NativeCaptureSession {
    fn drop(&mut self) {
        self.stop_running();
    }
}
