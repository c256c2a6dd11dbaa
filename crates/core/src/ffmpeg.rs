//! FFmpeg/FFprobe command utilities.
//!
//! Used by the video stage to measure the voiceover and render the final
//! 1920x1080 video: looped background clip, burned-in captions, voiceover
//! audio.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("media file not found: {0}")]
    MediaNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Render settings
// ---------------------------------------------------------------------------

/// Output frame size of rendered videos.
pub const OUTPUT_WIDTH: u32 = 1920;
pub const OUTPUT_HEIGHT: u32 = 1080;

/// Output frame rate.
pub const OUTPUT_FPS: u32 = 24;

/// Inputs for a single render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub background: PathBuf,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
    pub output: PathBuf,
    /// Length of the voiceover; the render is cut to this.
    pub duration_secs: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a media file and return the parsed JSON output.
pub async fn inspect_media(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::MediaNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Inspect a media file and return its duration in seconds.
///
/// A file with no readable duration is a parse error rather than `0.0`:
/// a zero-length render is never what the caller wants.
pub async fn media_duration_secs(path: &Path) -> Result<f64, FfmpegError> {
    let info = inspect_media(path).await?;
    let duration = parse_duration(&info);
    if duration > 0.0 {
        Ok(duration)
    } else {
        Err(FfmpegError::ParseError(format!(
            "no duration reported for {}",
            path.display()
        )))
    }
}

/// Render the final video in a single ffmpeg pass.
pub async fn render_video(job: &RenderJob) -> Result<(), FfmpegError> {
    for input in [&job.background, &job.audio, &job.subtitles] {
        if !input.exists() {
            return Err(FfmpegError::MediaNotFound(
                input.to_string_lossy().to_string(),
            ));
        }
    }

    let output = tokio::process::Command::new("ffmpeg")
        .args(render_args(job))
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: tail(&String::from_utf8_lossy(&output.stderr), 2000),
        });
    }

    Ok(())
}

/// The ffmpeg argument list for a render.
///
/// The background is looped indefinitely and scaled/cropped to fill the
/// frame; `-t` and `-shortest` cut the output to the voiceover length.
pub fn render_args(job: &RenderJob) -> Vec<String> {
    let video_filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},fps={fps},subtitles={subs}",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
        fps = OUTPUT_FPS,
        subs = escape_filter_path(&job.subtitles),
    );

    vec![
        "-y".into(),
        "-stream_loop".into(),
        "-1".into(),
        "-i".into(),
        job.background.to_string_lossy().into_owned(),
        "-i".into(),
        job.audio.to_string_lossy().into_owned(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-vf".into(),
        video_filter,
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-crf".into(),
        "23".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-ar".into(),
        "48000".into(),
        "-t".into(),
        format!("{:.3}", job.duration_secs),
        "-shortest".into(),
        job.output.to_string_lossy().into_owned(),
    ]
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Escape a path for use inside an ffmpeg filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Parse the media duration in seconds from ffprobe output.
///
/// Format-level duration wins; otherwise the first stream that reports one.
pub fn parse_duration(info: &FfprobeOutput) -> f64 {
    if let Some(secs) = info.format.duration.as_deref().and_then(parse_secs) {
        return secs;
    }
    info
        .streams
        .iter()
        .filter_map(|s| s.duration.as_deref().and_then(parse_secs))
        .next()
        .unwrap_or(0.0)
}

/// Whether the media info contains at least one video stream.
pub fn has_video_stream(info: &FfprobeOutput) -> bool {
    info
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("video"))
}

fn parse_secs(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0)
}

/// Last `max` bytes of ffmpeg's stderr, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
