//! FFmpeg-backed container writer
//!
//! Video frames are piped raw into an FFmpeg encoder as they arrive; the
//! encoder is spawned on the first frame, once the input geometry is known.
//! Frames are paced onto the output frame grid by presentation timestamp, so
//! the encoded track keeps real time whatever rate the source delivers at.
//! Audio PCM is spooled to disk, with silence filling timestamp gaps. Finalizing closes the video pipe and runs
//! a mux pass that lines both tracks up against the session's time origin.

use super::{
    ContainerWriter, FileType, TrackSettings, VideoSettings, WriterError, WriterFactory,
    WriterResult, WriterStatus,
};
use crate::capture::{
    AudioChunk, MediaKind, MediaTime, Orientation, PixelFormat, SampleBuffer, SampleFormat,
    SamplePayload,
};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;

/// Frames allowed in flight between `append` and the encoder pipe
const VIDEO_QUEUE_DEPTH: usize = 4;

/// Creates `FfmpegContainerWriter`s
#[derive(Debug, Clone)]
pub struct FfmpegWriterFactory {
    ffmpeg: PathBuf,
    available: OnceLock<bool>,
}

impl FfmpegWriterFactory {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            available: OnceLock::new(),
        }
    }

    /// Check that the FFmpeg binary can be executed.
    ///
    /// Runs `ffmpeg -version` on the first call only.
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let found = Command::new(&self.ffmpeg)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            tracing::debug!("FFmpeg at {:?} available: {}", self.ffmpeg, found);
            found
        })
    }
}

impl Default for FfmpegWriterFactory {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl WriterFactory for FfmpegWriterFactory {
    fn create_writer(&self, path: &Path, file_type: FileType) -> WriterResult<Box<dyn ContainerWriter>> {
        if !self.is_available() {
            return Err(WriterError::ToolNotFound(self.ffmpeg.display().to_string()));
        }
        Ok(Box::new(FfmpegContainerWriter::new(
            self.ffmpeg.clone(),
            path,
            file_type,
        )))
    }
}

/// Input layout of the raw video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VideoGeometry {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    /// Portrait-tagged landscape frames are turned upright
    rotate: bool,
}

impl VideoGeometry {
    fn new(width: u32, height: u32, pixel_format: PixelFormat, orientation: Orientation) -> Self {
        Self {
            width,
            height,
            pixel_format,
            rotate: orientation.is_portrait() && width > height,
        }
    }

    fn same_input(&self, width: u32, height: u32, pixel_format: PixelFormat) -> bool {
        self.width == width && self.height == height && self.pixel_format == pixel_format
    }
}

/// Places frames on a fixed-rate output grid.
///
/// Slot `n` covers `first_pts + n / fps`. A frame lands in the slot nearest
/// its timestamp; a frame whose slot is already filled is skipped, and empty
/// slots before it are filled by repeating the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameGrid {
    fps: u32,
    first_pts: MediaTime,
    next_slot: u64,
}

impl FrameGrid {
    fn new(fps: u32, first_pts: MediaTime) -> Self {
        Self {
            fps: fps.max(1),
            first_pts,
            next_slot: 0,
        }
    }

    fn slot_for(&self, pts: MediaTime) -> u64 {
        let elapsed = pts.saturating_since(self.first_pts).as_nanos();
        let scaled = elapsed * self.fps as u128 + 500_000_000;
        u64::try_from(scaled / 1_000_000_000).unwrap_or(u64::MAX)
    }

    /// Where a frame at `pts` goes: `None` to skip it, otherwise the slot
    /// and how many times the previous frame must be held before it.
    fn place(&self, pts: MediaTime) -> Option<(u64, u64)> {
        let slot = self.slot_for(pts);
        (slot >= self.next_slot).then(|| (slot, slot - self.next_slot))
    }

    fn commit(&mut self, slot: u64) {
        self.next_slot = slot + 1;
    }

    /// Slots filled so far
    fn filled(&self) -> u64 {
        self.next_slot
    }
}

/// One frame for the encoder pipe
struct PacedFrame {
    data: Vec<u8>,
    /// Repeats of the previously written frame that precede this one
    hold_previous: u64,
}

/// Live H.264 encoder fed through stdin
struct VideoEncoder {
    tx: Option<SyncSender<PacedFrame>>,
    pending: Arc<AtomicUsize>,
    thread: Option<JoinHandle<WriterResult<u64>>>,
    geometry: VideoGeometry,
    grid: FrameGrid,
    skipped: u64,
    first_pts: MediaTime,
    path: PathBuf,
}

impl VideoEncoder {
    fn spawn(
        ffmpeg: &Path,
        settings: &VideoSettings,
        geometry: VideoGeometry,
        first_pts: MediaTime,
        path: PathBuf,
        status: Arc<Mutex<WriterStatus>>,
    ) -> WriterResult<Self> {
        let args = encoder_args(settings, &geometry, &path);
        let mut process = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WriterError::Encoder(format!("Failed to start FFmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WriterError::Encoder("Failed to capture FFmpeg stdin".to_string()))?;

        let (tx, rx) = mpsc::sync_channel(VIDEO_QUEUE_DEPTH);
        let pending = Arc::new(AtomicUsize::new(0));
        let thread = {
            let pending = pending.clone();
            std::thread::Builder::new()
                .name("video-encoder".to_string())
                .spawn(move || pump_frames(process, stdin, rx, pending, status))?
        };

        tracing::info!(
            "Started FFmpeg video encoder: {}x{} {} -> {}x{} @ {}bps{}",
            geometry.width,
            geometry.height,
            geometry.pixel_format.ffmpeg_name(),
            settings.width,
            settings.height,
            settings.average_bit_rate,
            if geometry.rotate { " (rotated to portrait)" } else { "" }
        );

        Ok(Self {
            tx: Some(tx),
            pending,
            thread: Some(thread),
            geometry,
            grid: FrameGrid::new(settings.frame_rate, first_pts),
            skipped: 0,
            first_pts,
            path,
        })
    }

    fn is_ready(&self) -> bool {
        self.tx.is_some() && self.pending.load(Ordering::SeqCst) < VIDEO_QUEUE_DEPTH
    }

    /// Queue the frame at `pts` for its grid slot. Frames landing in an
    /// already filled slot are skipped.
    fn push(&mut self, pts: MediaTime, frame: &[u8]) -> WriterResult<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(WriterError::NotReady(MediaKind::Video));
        };

        let Some((slot, hold_previous)) = self.grid.place(pts) else {
            self.skipped += 1;
            tracing::trace!("Video frame at {:?} shares slot {}, skipped", pts, self.grid.filled());
            return Ok(());
        };
        if hold_previous > 0 {
            tracing::debug!("Video gap before {:?}: holding previous frame for {} slots", pts, hold_previous);
        }

        let paced = PacedFrame {
            data: frame.to_vec(),
            hold_previous,
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(paced) {
            Ok(()) => {
                self.grid.commit(slot);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Err(WriterError::NotReady(MediaKind::Video))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Err(WriterError::Encoder("Video encoder stopped".to_string()))
            }
        }
    }

    /// Stop accepting frames; the encoder drains what it has
    fn close_input(&mut self) {
        self.tx = None;
    }

    fn finish(mut self) -> WriterResult<EncodedVideo> {
        self.close_input();
        let frames = match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WriterError::Encoder("Video encoder thread panicked".to_string()))??,
            None => 0,
        };

        tracing::info!(
            "FFmpeg video encoder finished: {} frames ({} slots, {} skipped)",
            frames,
            self.grid.filled(),
            self.skipped
        );
        if frames == 0 {
            return Err(WriterError::NoMedia);
        }

        Ok(EncodedVideo {
            path: self.path.clone(),
            first_pts: self.first_pts,
        })
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        self.tx = None;
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn pump_frames(
    process: Child,
    mut stdin: ChildStdin,
    rx: Receiver<PacedFrame>,
    pending: Arc<AtomicUsize>,
    status: Arc<Mutex<WriterStatus>>,
) -> WriterResult<u64> {
    let mut frames: u64 = 0;
    let mut write_error = None;
    let mut previous: Option<Vec<u8>> = None;

    for paced in rx {
        if write_error.is_none() {
            let held = previous.as_deref().map_or(0, |_| paced.hold_previous);
            let result = (0..held)
                .try_for_each(|_| match previous.as_deref() {
                    Some(frame) => stdin.write_all(frame),
                    None => Ok(()),
                })
                .and_then(|()| stdin.write_all(&paced.data));

            match result {
                Ok(()) => {
                    frames += held + 1;
                    previous = Some(paced.data);
                }
                Err(e) => {
                    tracing::error!("FFmpeg video pipe closed: {}", e);
                    *status.lock() = WriterStatus::Failed;
                    write_error = Some(e);
                }
            }
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }

    // Close stdin to signal EOF
    drop(stdin);
    let output = process.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WriterError::Encoder(format!(
            "FFmpeg video encoder exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    if let Some(e) = write_error {
        return Err(e.into());
    }

    Ok(frames)
}

/// PCM spooled to an intermediate file
struct AudioSpool {
    file: BufWriter<File>,
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    sample_format: SampleFormat,
    first_pts: MediaTime,
    bytes: u64,
}

impl AudioSpool {
    fn frame_bytes(&self) -> u64 {
        (self.sample_format.bytes_per_sample() * self.channels.max(1) as usize) as u64
    }

    /// Timestamp right after the last spooled sample
    fn next_pts(&self) -> MediaTime {
        let frames = self.bytes / self.frame_bytes();
        let nanos = frames as u128 * 1_000_000_000 / self.sample_rate.max(1) as u128;
        MediaTime::from_nanos(self.first_pts.as_nanos().saturating_add(nanos as i64))
    }

    /// Silence needed before a chunk at `pts`. Gaps shorter than half the
    /// chunk are treated as clock jitter.
    fn padding_before(&self, pts: MediaTime, chunk: &AudioChunk) -> u64 {
        let gap = pts.saturating_since(self.next_pts());
        if gap.is_zero() || gap < chunk.duration() / 2 {
            return 0;
        }
        let frames = (gap.as_secs_f64() * self.sample_rate as f64).round() as u64;
        frames * self.frame_bytes()
    }

    fn write_silence(&mut self, bytes: u64) -> std::io::Result<()> {
        const ZEROS: [u8; 4096] = [0; 4096];
        let mut left = bytes;
        while left > 0 {
            let n = left.min(ZEROS.len() as u64) as usize;
            self.file.write_all(&ZEROS[..n])?;
            left -= n as u64;
        }
        self.bytes += bytes;
        Ok(())
    }

    fn finish(mut self) -> WriterResult<SpooledAudio> {
        self.file.flush()?;
        if self.bytes == 0 {
            return Err(WriterError::NoMedia);
        }
        Ok(SpooledAudio {
            path: self.path,
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_format: self.sample_format,
            first_pts: self.first_pts,
        })
    }
}

struct EncodedVideo {
    path: PathBuf,
    first_pts: MediaTime,
}

struct SpooledAudio {
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    sample_format: SampleFormat,
    first_pts: MediaTime,
}

/// Inputs of the final mux pass
struct MuxPlan<'a> {
    video: Option<(&'a Path, Duration)>,
    audio: Option<(&'a SpooledAudio, Duration)>,
    duration: Option<Duration>,
    file_type: FileType,
    output: &'a Path,
}

/// Container writer that encodes and muxes with the FFmpeg CLI
pub struct FfmpegContainerWriter {
    ffmpeg: PathBuf,
    output_path: PathBuf,
    file_type: FileType,
    status: Arc<Mutex<WriterStatus>>,
    video_settings: Option<VideoSettings>,
    audio_enabled: bool,
    workdir: Option<TempDir>,
    origin: Option<MediaTime>,
    end: Option<MediaTime>,
    video: Option<VideoEncoder>,
    audio: Option<AudioSpool>,
    video_finished: bool,
    audio_finished: bool,
}

impl FfmpegContainerWriter {
    pub fn new(ffmpeg: impl Into<PathBuf>, output_path: &Path, file_type: FileType) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            output_path: output_path.to_path_buf(),
            file_type,
            status: Arc::new(Mutex::new(WriterStatus::Unknown)),
            video_settings: None,
            audio_enabled: false,
            workdir: None,
            origin: None,
            end: None,
            video: None,
            audio: None,
            video_finished: false,
            audio_finished: false,
        }
    }

    fn workdir(&self) -> WriterResult<&Path> {
        self.workdir
            .as_ref()
            .map(|d| d.path())
            .ok_or(WriterError::NotWriting(self.status()))
    }

    fn append_video(&mut self, buffer: &SampleBuffer) -> WriterResult<()> {
        let SamplePayload::Video(frame) = buffer.payload() else {
            return Err(WriterError::PayloadMismatch {
                expected: MediaKind::Video,
                actual: buffer.kind(),
            });
        };
        let Some(settings) = self.video_settings.as_ref() else {
            return Err(WriterError::InputRejected(MediaKind::Video));
        };
        if self.video_finished {
            return Err(WriterError::NotReady(MediaKind::Video));
        }

        let expected = frame.pixel_format.frame_size(frame.width, frame.height);
        if frame.data.len() != expected {
            return Err(WriterError::FormatChanged(format!(
                "{}x{} {} frame is {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.pixel_format.ffmpeg_name(),
                frame.data.len(),
                expected
            )));
        }

        match self.video.as_ref() {
            Some(encoder) => {
                if !encoder.geometry.same_input(frame.width, frame.height, frame.pixel_format) {
                    return Err(WriterError::FormatChanged(format!(
                        "video input was {}x{}, got {}x{}",
                        encoder.geometry.width, encoder.geometry.height, frame.width, frame.height
                    )));
                }
            }
            None => {
                let geometry = VideoGeometry::new(
                    frame.width,
                    frame.height,
                    frame.pixel_format,
                    buffer.orientation(),
                );
                let path = self.workdir()?.join("video.mp4");
                let encoder = VideoEncoder::spawn(
                    &self.ffmpeg,
                    settings,
                    geometry,
                    buffer.presentation_timestamp(),
                    path,
                    self.status.clone(),
                )?;
                self.video = Some(encoder);
            }
        }

        match self.video.as_mut() {
            Some(encoder) => encoder.push(buffer.presentation_timestamp(), &frame.data),
            None => Err(WriterError::NotReady(MediaKind::Video)),
        }
    }

    fn append_audio(&mut self, buffer: &SampleBuffer) -> WriterResult<()> {
        let SamplePayload::Audio(chunk) = buffer.payload() else {
            return Err(WriterError::PayloadMismatch {
                expected: MediaKind::Audio,
                actual: buffer.kind(),
            });
        };
        if !self.audio_enabled {
            return Err(WriterError::InputRejected(MediaKind::Audio));
        }
        if self.audio_finished {
            return Err(WriterError::NotReady(MediaKind::Audio));
        }

        if self.audio.is_none() {
            let path = self.workdir()?.join("audio.pcm");
            let file = File::create(&path)?;
            tracing::info!(
                "Spooling audio: {}Hz {}ch {}",
                chunk.sample_rate,
                chunk.channels,
                chunk.sample_format.ffmpeg_name()
            );
            self.audio = Some(AudioSpool {
                file: BufWriter::new(file),
                path,
                sample_rate: chunk.sample_rate,
                channels: chunk.channels,
                sample_format: chunk.sample_format,
                first_pts: buffer.presentation_timestamp(),
                bytes: 0,
            });
        }

        let Some(spool) = self.audio.as_mut() else {
            return Err(WriterError::NotReady(MediaKind::Audio));
        };
        if spool.sample_rate != chunk.sample_rate
            || spool.channels != chunk.channels
            || spool.sample_format != chunk.sample_format
        {
            return Err(WriterError::FormatChanged(format!(
                "audio input was {}Hz {}ch, got {}Hz {}ch",
                spool.sample_rate, spool.channels, chunk.sample_rate, chunk.channels
            )));
        }

        let padding = spool.padding_before(buffer.presentation_timestamp(), chunk);
        if padding > 0 {
            tracing::debug!(
                "Audio gap before {:?}: padding {} bytes of silence",
                buffer.presentation_timestamp(),
                padding
            );
            spool.write_silence(padding)?;
        }

        spool.file.write_all(&chunk.data)?;
        spool.bytes += chunk.data.len() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> WriterResult<PathBuf> {
        let video = self.video.take().map(VideoEncoder::finish).transpose()?;
        let audio = self.audio.take().map(AudioSpool::finish).transpose()?;

        let origin = self
            .origin
            .or_else(|| {
                let firsts = [
                    video.as_ref().map(|v| v.first_pts),
                    audio.as_ref().map(|a| a.first_pts),
                ];
                firsts.into_iter().flatten().min()
            })
            .ok_or(WriterError::NoMedia)?;

        let duration = self
            .end
            .map(|end| end.saturating_since(origin))
            .filter(|d| !d.is_zero());

        let plan = MuxPlan {
            video: video
                .as_ref()
                .map(|v| (v.path.as_path(), v.first_pts.saturating_since(origin))),
            audio: audio
                .as_ref()
                .map(|a| (a, a.first_pts.saturating_since(origin))),
            duration,
            file_type: self.file_type,
            output: &self.output_path,
        };
        let args = mux_args(&plan);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| WriterError::Encoder(format!("Failed to start FFmpeg muxer: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WriterError::Encoder(format!(
                "FFmpeg muxer exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(
            "Muxed {:?} (video: {}, audio: {}, duration: {:?})",
            self.output_path,
            video.is_some(),
            audio.is_some(),
            duration
        );
        Ok(self.output_path.clone())
    }
}

impl ContainerWriter for FfmpegContainerWriter {
    fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn status(&self) -> WriterStatus {
        *self.status.lock()
    }

    fn can_add_input(&self, settings: &TrackSettings) -> bool {
        if self.status() != WriterStatus::Unknown {
            return false;
        }
        match settings {
            TrackSettings::Video(_) => self.video_settings.is_none(),
            TrackSettings::Audio => !self.audio_enabled,
        }
    }

    fn add_input(&mut self, settings: TrackSettings) -> WriterResult<()> {
        if !self.can_add_input(&settings) {
            return Err(WriterError::InputRejected(settings.kind()));
        }
        match settings {
            TrackSettings::Video(video) => self.video_settings = Some(video),
            TrackSettings::Audio => self.audio_enabled = true,
        }
        Ok(())
    }

    fn start_writing(&mut self) -> WriterResult<()> {
        let status = self.status();
        if status != WriterStatus::Unknown {
            return Err(WriterError::NotWriting(status));
        }

        let workdir = tempfile::Builder::new()
            .prefix("capture-recorder-")
            .tempdir()?;
        tracing::debug!("Writer intermediates in {:?}", workdir.path());
        self.workdir = Some(workdir);
        *self.status.lock() = WriterStatus::Writing;
        Ok(())
    }

    fn start_session(&mut self, at: MediaTime) {
        if self.origin.is_none() {
            self.origin = Some(at);
        }
    }

    fn end_session(&mut self, at: MediaTime) {
        self.end = Some(at);
    }

    fn is_ready_for_more_media_data(&self, kind: MediaKind) -> bool {
        if self.status() != WriterStatus::Writing {
            return false;
        }
        match kind {
            MediaKind::Video => {
                self.video_settings.is_some()
                    && !self.video_finished
                    && self.video.as_ref().map_or(true, VideoEncoder::is_ready)
            }
            MediaKind::Audio => self.audio_enabled && !self.audio_finished,
        }
    }

    fn append(&mut self, kind: MediaKind, buffer: &SampleBuffer) -> WriterResult<()> {
        let status = self.status();
        if status != WriterStatus::Writing {
            return Err(WriterError::NotWriting(status));
        }
        match kind {
            MediaKind::Video => self.append_video(buffer),
            MediaKind::Audio => self.append_audio(buffer),
        }
    }

    fn mark_as_finished(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Video => {
                self.video_finished = true;
                if let Some(encoder) = self.video.as_mut() {
                    encoder.close_input();
                }
            }
            MediaKind::Audio => {
                self.audio_finished = true;
                if let Some(spool) = self.audio.as_mut() {
                    if let Err(e) = spool.file.flush() {
                        tracing::warn!("Failed to flush audio spool: {}", e);
                    }
                }
            }
        }
    }

    fn finish_writing(self: Box<Self>) -> WriterResult<PathBuf> {
        let mut this = *self;
        let status = this.status();
        if status != WriterStatus::Writing {
            return Err(WriterError::NotWriting(status));
        }

        let result = this.finalize();
        *this.status.lock() = match result {
            Ok(_) => WriterStatus::Completed,
            Err(_) => WriterStatus::Failed,
        };
        result
    }
}

fn secs(duration: Duration) -> String {
    format!("{:.6}", duration.as_secs_f64())
}

/// Arguments for the live raw-video → H.264 encoder
fn encoder_args(settings: &VideoSettings, geometry: &VideoGeometry, output: &Path) -> Vec<String> {
    let mut filters = Vec::new();
    if geometry.rotate {
        filters.push("transpose=1".to_string());
    }
    filters.push(format!(
        "scale={}:{}:force_original_aspect_ratio=decrease:force_divisible_by=2",
        settings.width, settings.height
    ));
    filters.push(format!(
        "pad={}:{}:(ow-iw)/2:(oh-ih)/2",
        settings.width, settings.height
    ));

    let fps = settings.frame_rate.max(1);
    let bitrate = settings.average_bit_rate.to_string();

    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pixel_format",
        geometry.pixel_format.ffmpeg_name(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend([
        "-video_size".to_string(),
        format!("{}x{}", geometry.width, geometry.height),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-vf".to_string(),
        filters.join(","),
        "-c:v".to_string(),
        settings.codec.ffmpeg_encoder().to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        bitrate.clone(),
        "-maxrate".to_string(),
        bitrate,
        "-bufsize".to_string(),
        (settings.average_bit_rate as u64 * 2).to_string(),
        "-g".to_string(),
        (fps * 2).to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Arguments for the final mux of the intermediates
fn mux_args(plan: &MuxPlan<'_>) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    let mut maps = Vec::new();
    let mut index = 0;

    if let Some((path, offset)) = plan.video {
        args.extend([
            "-itsoffset".to_string(),
            secs(offset),
            "-i".to_string(),
            path.to_string_lossy().to_string(),
        ]);
        maps.push(format!("{}:v:0", index));
        index += 1;
    }

    if let Some((audio, offset)) = plan.audio {
        args.extend([
            "-itsoffset".to_string(),
            secs(offset),
            "-f".to_string(),
            audio.sample_format.ffmpeg_name().to_string(),
            "-ar".to_string(),
            audio.sample_rate.to_string(),
            "-ac".to_string(),
            audio.channels.to_string(),
            "-i".to_string(),
            audio.path.to_string_lossy().to_string(),
        ]);
        maps.push(format!("{}:a:0", index));
    }

    for map in maps {
        args.extend(["-map".to_string(), map]);
    }
    if plan.video.is_some() {
        args.extend(["-c:v".to_string(), "copy".to_string()]);
    }
    if plan.audio.is_some() {
        args.extend(["-c:a".to_string(), "aac".to_string()]);
    }
    if let Some(duration) = plan.duration {
        args.extend(["-t".to_string(), secs(duration)]);
    }

    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        plan.file_type.ffmpeg_format().to_string(),
        plan.output.to_string_lossy().to_string(),
    ]);
    args
}
