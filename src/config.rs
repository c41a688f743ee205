//! Recorder configuration
//!
//! Loaded from the JSON file named by `CAPTURE_RECORDER_CONFIG`, falling
//! back to defaults. Every field is optional in the file.

use crate::capture::SyntheticSourceConfig;
use crate::utils::{AppError, AppResult};
use crate::writer::{FileType, VideoSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at a JSON config file
pub const CONFIG_ENV_VAR: &str = "CAPTURE_RECORDER_CONFIG";

/// Name of the recording inside the output directory
pub const DEFAULT_FILE_NAME: &str = "OutputVideo.mp4";

/// Where sample buffers come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSourceKind {
    /// Generated test pattern and tone
    #[default]
    Synthetic,
    /// Default camera and microphone (needs the `native-capture` feature)
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Directory holding the recording
    pub output_dir: PathBuf,

    /// File name of the recording; replaced on every start
    pub file_name: String,

    /// Container type written to `file_name`
    pub file_type: FileType,

    pub video: VideoSettings,

    pub source: CaptureSourceKind,

    pub synthetic: SyntheticSourceConfig,

    /// Camera index for the native source
    pub camera_index: u32,

    /// Thread name of the capture queue
    pub queue_label: String,

    /// How long the demo binary records for
    pub record_seconds: f64,

    /// FFmpeg binary used by the writer
    pub ffmpeg_path: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            file_type: FileType::Mov,
            video: VideoSettings::default(),
            source: CaptureSourceKind::Synthetic,
            synthetic: SyntheticSourceConfig::default(),
            camera_index: 0,
            queue_label: "capture-queue".to_string(),
            record_seconds: 5.0,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl RecorderConfig {
    /// Full path of the recording
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    /// Read a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecorderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Config from `CAPTURE_RECORDER_CONFIG`, or defaults when unset
    pub fn from_env() -> AppResult<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.file_name.trim().is_empty() {
            return Err(AppError::Config("fileName must not be empty".to_string()));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(AppError::Config(format!(
                "video size must be non-zero, got {}x{}",
                self.video.width, self.video.height
            )));
        }
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            return Err(AppError::Config(format!(
                "video size must be even for yuv420p, got {}x{}",
                self.video.width, self.video.height
            )));
        }
        if self.video.average_bit_rate == 0 || self.video.frame_rate == 0 {
            return Err(AppError::Config(
                "video bitrate and frame rate must be non-zero".to_string(),
            ));
        }
        if !self.record_seconds.is_finite() || self.record_seconds <= 0.0 {
            return Err(AppError::Config(format!(
                "recordSeconds must be positive, got {}",
                self.record_seconds
            )));
        }
        Ok(())
    }
}

/// The user's documents directory, else the system temp dir
fn default_output_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Documents"))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}
