//! Playback handoff
//!
//! The controller never touches UI widgets directly; it drives a
//! `Presenter`. `LogPresenter` is the headless implementation: it logs UI
//! transitions and probes finished recordings with FFprobe.

use crate::recorder::state::{FinishedRecording, RecordingFailure};
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// UI surface driven by the capture controller
pub trait Presenter {
    fn set_record_button_title(&mut self, title: &str);

    /// Show the finished recording
    fn present_playback(&mut self, recording: &FinishedRecording);

    fn present_error(&mut self, failure: &RecordingFailure);
}

/// Video metadata returned from FFprobe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_ms: f64,
    pub codec: String,
}

/// Parse a frame rate given as "30/1" or "29.97"
fn parse_frame_rate(rate: &str) -> f64 {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => rate.parse().unwrap_or(0.0),
    }
}

/// Extract video metadata from `ffprobe -print_format json` output
pub fn parse_probe_output(json: &serde_json::Value) -> AppResult<VideoMetadata> {
    let video_stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        })
        .ok_or_else(|| AppError::Recording("No video stream found".to_string()))?;

    let width = video_stream
        .get("width")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let height = video_stream
        .get("height")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let codec = video_stream
        .get("codec_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let fps = video_stream
        .get("r_frame_rate")
        .and_then(|v| v.as_str())
        .map(parse_frame_rate)
        .unwrap_or(0.0);

    // Format duration is more reliable than the stream's
    let duration_secs = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        duration_ms: duration_secs * 1000.0,
        codec,
    })
}

/// Get video metadata using FFprobe
pub fn probe_video(ffprobe: &Path, path: &Path) -> AppResult<VideoMetadata> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| AppError::Recording(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(AppError::Recording(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    parse_probe_output(&json)
}

/// Headless presenter that logs what a UI would show
#[derive(Debug)]
pub struct LogPresenter {
    ffprobe: PathBuf,
    button_title: String,
    last_playback: Option<PathBuf>,
}

impl LogPresenter {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            button_title: String::new(),
            last_playback: None,
        }
    }

    pub fn button_title(&self) -> &str {
        &self.button_title
    }

    pub fn last_playback(&self) -> Option<&Path> {
        self.last_playback.as_deref()
    }
}

impl Default for LogPresenter {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl Presenter for LogPresenter {
    fn set_record_button_title(&mut self, title: &str) {
        tracing::info!("Record button: {}", title);
        self.button_title = title.to_string();
    }

    fn present_playback(&mut self, recording: &FinishedRecording) {
        let path = recording.handle.path();
        tracing::info!("Playing back {}", recording.handle.url());

        match probe_video(&self.ffprobe, path) {
            Ok(meta) => tracing::info!(
                "Recording {}: {}x{} {} @ {:.2}fps, {:.0}ms",
                recording.recording_id,
                meta.width,
                meta.height,
                meta.codec,
                meta.fps,
                meta.duration_ms
            ),
            Err(e) => tracing::warn!("Could not probe {:?}: {}", path, e),
        }
        self.last_playback = Some(path.to_path_buf());
    }

    fn present_error(&mut self, failure: &RecordingFailure) {
        tracing::error!("{}", failure);
        self.last_playback = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_frame_rate_forms() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("1/0"), 0.0);
    }

    #[test]
    fn test_parse_probe_picks_video_stream() {
        let probe = json!({
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                { "codec_type": "video", "codec_name": "h264", "width": 720, "height": 1280, "r_frame_rate": "30/1" }
            ],
            "format": { "duration": "2.500000" }
        });
        let meta = parse_probe_output(&probe).unwrap();
        assert_eq!(meta.width, 720);
        assert_eq!(meta.height, 1280);
        assert_eq!(meta.codec, "h264");
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.duration_ms, 2500.0);
    }

    #[test]
    fn test_parse_probe_without_video() {
        let probe = json!({ "streams": [{ "codec_type": "audio" }] });
        assert!(parse_probe_output(&probe).is_err());
    }
}
