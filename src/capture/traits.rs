//! Capture trait definitions
//!
//! Platform-agnostic types for the sample buffers a capture session produces
//! and the traits that connect a session to its consumer.

use super::queue::SerialQueue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Weak;
use std::time::Duration;
use thiserror::Error;

/// Capture-related errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture session error: {0}")]
    Session(String),

    #[error("Output not supported: {0}")]
    OutputRejected(MediaKind),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Which stream a buffer (or a capture output) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Presentation timestamp on the capture clock, in nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaTime(i64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX))
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Time elapsed since `origin`, clamped at zero
    pub fn saturating_since(self, origin: MediaTime) -> Duration {
        let delta = self.0.saturating_sub(origin.0);
        Duration::from_nanos(u64::try_from(delta).unwrap_or(0))
    }
}

/// Orientation metadata attached to video buffers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    /// Native sensor orientation of most cameras
    #[default]
    LandscapeRight,
    LandscapeLeft,
}

impl Orientation {
    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::Portrait | Orientation::PortraitUpsideDown)
    }
}

/// Raw pixel layouts a video buffer can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgra,
    Rgba,
    Rgb24,
    Yuyv422,
    Nv12,
}

impl PixelFormat {
    /// FFmpeg `-pixel_format` name
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            PixelFormat::Bgra => "bgra",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Yuyv422 => "yuyv422",
            PixelFormat::Nv12 => "nv12",
        }
    }

    /// Size in bytes of one frame
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Bgra | PixelFormat::Rgba => pixels * 4,
            PixelFormat::Rgb24 => pixels * 3,
            PixelFormat::Yuyv422 => pixels * 2,
            PixelFormat::Nv12 => pixels * 3 / 2,
        }
    }
}

/// PCM sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32le,
    S16le,
}

impl SampleFormat {
    /// FFmpeg raw demuxer name
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            SampleFormat::F32le => "f32le",
            SampleFormat::S16le => "s16le",
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32le => 4,
            SampleFormat::S16le => 2,
        }
    }
}

/// One uncompressed video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
}

/// A run of interleaved PCM samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub data: Vec<u8>,
}

impl AudioChunk {
    /// Number of sample frames (one sample per channel) in the chunk
    pub fn frame_count(&self) -> usize {
        let frame_bytes = self.sample_format.bytes_per_sample() * self.channels.max(1) as usize;
        self.data.len() / frame_bytes
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplePayload {
    Video(VideoFrame),
    Audio(AudioChunk),
}

/// A timestamped unit of media delivered by a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    pts: MediaTime,
    orientation: Orientation,
    payload: SamplePayload,
}

impl SampleBuffer {
    pub fn video(pts: MediaTime, frame: VideoFrame) -> Self {
        Self {
            pts,
            orientation: Orientation::default(),
            payload: SamplePayload::Video(frame),
        }
    }

    pub fn audio(pts: MediaTime, chunk: AudioChunk) -> Self {
        Self {
            pts,
            orientation: Orientation::default(),
            payload: SamplePayload::Audio(chunk),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self.payload {
            SamplePayload::Video(_) => MediaKind::Video,
            SamplePayload::Audio(_) => MediaKind::Audio,
        }
    }

    pub fn presentation_timestamp(&self) -> MediaTime {
        self.pts
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn payload(&self) -> &SamplePayload {
        &self.payload
    }
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

/// Information about an audio input device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Device name
    pub name: String,

    /// Whether this is the default device
    pub is_default: bool,
}

/// Receives sample buffers from a capture output
pub trait SampleBufferDelegate: Send + Sync {
    /// Called once per buffer on the queue the output was bound with.
    /// `output` identifies the capture output the buffer came from.
    fn capture_output(&self, output: MediaKind, buffer: SampleBuffer);
}

/// A running source of audio and video sample buffers
///
/// Sessions hold delegates weakly: dropping the delegate silently stops
/// delivery instead of keeping it alive.
pub trait CaptureSession: Send + Sync {
    /// Bind `output` to `delegate`, delivering on `queue`.
    /// Rebinding replaces the previous delegate.
    fn set_sample_buffer_delegate(
        &self,
        output: MediaKind,
        delegate: Weak<dyn SampleBufferDelegate>,
        queue: &SerialQueue,
    ) -> CaptureResult<()>;

    /// Begin producing buffers. Starting a running session is a no-op.
    fn start_running(&self) -> CaptureResult<()>;

    /// Stop producing buffers. Buffers already queued are still delivered.
    fn stop_running(&self);

    fn is_running(&self) -> bool;
}
