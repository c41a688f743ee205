//! Container writers
//!
//! A container writer multiplexes at most one video and one audio track
//! into a single output file. It must be started before it accepts buffers
//! and finalized to produce a valid file.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegContainerWriter, FfmpegWriterFactory};

use crate::capture::{MediaKind, MediaTime, SampleBuffer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Writer-related errors
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found. Please install FFmpeg and make sure it is on PATH")]
    ToolNotFound(String),

    #[error("Writer cannot add a {0} input")]
    InputRejected(MediaKind),

    #[error("Writer is not writing (status: {0:?})")]
    NotWriting(WriterStatus),

    #[error("{0} input is not ready for more media data")]
    NotReady(MediaKind),

    #[error("Buffer is {actual} but was routed to the {expected} input")]
    PayloadMismatch { expected: MediaKind, actual: MediaKind },

    #[error("Stream format changed mid-recording: {0}")]
    FormatChanged(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("No media was written")]
    NoMedia,
}

pub type WriterResult<T> = Result<T, WriterError>;

/// Lifecycle status of a container writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterStatus {
    /// Created, inputs may still be added
    #[default]
    Unknown,
    /// Accepting buffers
    Writing,
    /// Finalized successfully
    Completed,
    Failed,
    Cancelled,
}

/// Container file type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Mov,
    Mp4,
}

impl FileType {
    /// FFmpeg muxer name
    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            FileType::Mov => "mov",
            FileType::Mp4 => "mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
}

impl VideoCodec {
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
        }
    }
}

/// Output settings for the video track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Average bitrate in bits per second
    pub average_bit_rate: u32,
    /// Nominal input frame rate
    pub frame_rate: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            width: 720,
            height: 1280,
            average_bit_rate: 2_300_000,
            frame_rate: 30,
        }
    }
}

/// Settings for one writer input. Audio uses the container's defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSettings {
    Video(VideoSettings),
    Audio,
}

impl TrackSettings {
    pub fn kind(&self) -> MediaKind {
        match self {
            TrackSettings::Video(_) => MediaKind::Video,
            TrackSettings::Audio => MediaKind::Audio,
        }
    }
}

/// A stateful sink that muxes one audio and one video stream into a file
pub trait ContainerWriter: Send {
    fn output_path(&self) -> &Path;

    fn status(&self) -> WriterStatus;

    fn can_add_input(&self, settings: &TrackSettings) -> bool;

    fn add_input(&mut self, settings: TrackSettings) -> WriterResult<()>;

    /// Move to `Writing`. Inputs can no longer be added afterwards.
    fn start_writing(&mut self) -> WriterResult<()>;

    /// Open the time span at `at`; later timestamps are relative to it
    fn start_session(&mut self, at: MediaTime);

    /// Close the time span at `at`
    fn end_session(&mut self, at: MediaTime);

    fn is_ready_for_more_media_data(&self, kind: MediaKind) -> bool;

    /// Append a buffer to the `kind` input. Never call when the input is not ready.
    fn append(&mut self, kind: MediaKind, buffer: &SampleBuffer) -> WriterResult<()>;

    /// No further buffers will be appended to the `kind` input
    fn mark_as_finished(&mut self, kind: MediaKind);

    /// Finalize the container. Blocks until the file is complete.
    fn finish_writing(self: Box<Self>) -> WriterResult<PathBuf>;
}

/// Creates a fresh writer for every recording
pub trait WriterFactory: Send + Sync {
    fn create_writer(&self, path: &Path, file_type: FileType) -> WriterResult<Box<dyn ContainerWriter>>;
}
