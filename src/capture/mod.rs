//! Capture sources
//!
//! Sample buffer types, the `CaptureSession` abstraction, the serial queue
//! buffers are delivered on, and the concrete sources.

pub mod output;
pub mod queue;
pub mod synthetic;
pub mod traits;

#[cfg(feature = "native-capture")]
pub mod native;

pub use queue::SerialQueue;
pub use synthetic::{SyntheticCaptureSession, SyntheticSourceConfig};
pub use traits::{
    AudioChunk, AudioDeviceInfo, CameraInfo, CaptureError, CaptureResult, CaptureSession,
    MediaKind, MediaTime, Orientation, PixelFormat, SampleBuffer, SampleBufferDelegate,
    SampleFormat, SamplePayload, VideoFrame,
};
