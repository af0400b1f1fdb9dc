use crate::error::{SplitError, Tool};
use crate::signal::CancelToken;
use crate::tools::ffprobe_info::VideoMetadata;
use crate::tools::process_runner::{RunLimits, run_tool};
use crate::tools::tool_paths::ToolPaths;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

const FALLBACK_WIDTH: u32 = 1280;
const FALLBACK_HEIGHT: u32 = 720;
const FALLBACK_SAMPLE_RATE: u32 = 48_000;

/// Extract `[start, start + duration)` of `source` into `destination`.
#[derive(Debug, Clone, Copy)]
pub struct CutRequest<'a> {
    pub source: &'a Path,
    pub start: f64,
    pub duration: f64,
    pub destination: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilentAudio {
    pub sample_rate: u32,
    pub channels: u32,
}

impl SilentAudio {
    fn channel_layout(self) -> &'static str {
        match self.channels {
            1 => "mono",
            6 => "5.1",
            8 => "7.1",
            _ => "stereo",
        }
    }
}

/// Black frames (plus silence when the source has audio) appended to a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct FillerSpec {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub audio: Option<SilentAudio>,
}

impl FillerSpec {
    /// Stream-copied clips keep the source's geometry, rate and audio layout.
    #[must_use]
    pub fn for_source(metadata: &VideoMetadata, duration: f64) -> Self {
        let (width, height) = if metadata.width > 0 && metadata.height > 0 {
            (metadata.width, metadata.height)
        } else {
            warn!(
                "Source dimensions unknown, filler uses {FALLBACK_WIDTH}x{FALLBACK_HEIGHT}"
            );
            (FALLBACK_WIDTH, FALLBACK_HEIGHT)
        };

        Self {
            duration,
            width,
            height,
            frame_rate: metadata.frame_rate,
            audio: metadata.has_audio.then(|| SilentAudio {
                sample_rate: metadata.audio_sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE),
                channels: metadata.audio_channels.unwrap_or(2),
            }),
        }
    }
}

/// Runs the cut and pad steps of an export.
pub trait MediaEncoder: Send + Sync {
    fn cut(&self, request: &CutRequest<'_>, cancel: &CancelToken) -> Result<(), SplitError>;

    /// Write `clip` followed by `filler` to `destination`.
    fn append_filler(
        &self,
        clip: &Path,
        filler: &FillerSpec,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<(), SplitError>;
}

fn base_args() -> Vec<String> {
    ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Input-side seek plus stream copy: starts on the keyframe at `start`.
#[must_use]
pub fn build_cut_args(request: &CutRequest<'_>) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-ss".to_string(),
        format!("{:.6}", request.start.max(0.0)),
        "-i".to_string(),
        request.source.to_string_lossy().to_string(),
        "-t".to_string(),
        format!("{:.6}", request.duration.max(0.0)),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "0:a?".to_string(),
        "-sn".to_string(),
        "-dn".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        request.destination.to_string_lossy().to_string(),
    ]);
    args
}

#[must_use]
pub fn build_pad_args(clip: &Path, filler: &FillerSpec, destination: &Path) -> Vec<String> {
    let duration = format!("{:.6}", filler.duration);
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        clip.to_string_lossy().to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-t".to_string(),
        duration.clone(),
        "-i".to_string(),
        format!(
            "color=c=black:s={}x{}:r={:.6}",
            filler.width, filler.height, filler.frame_rate
        ),
    ]);

    let filter = match filler.audio {
        Some(audio) => {
            args.extend([
                "-f".to_string(),
                "lavfi".to_string(),
                "-t".to_string(),
                duration,
                "-i".to_string(),
                format!(
                    "anullsrc=channel_layout={}:sample_rate={}",
                    audio.channel_layout(),
                    audio.sample_rate
                ),
            ]);
            "[0:v]setsar=1[v0];[1:v]setsar=1[v1];[v0][0:a:0][v1][2:a]concat=n=2:v=1:a=1[v][a]"
        }
        None => "[0:v]setsar=1[v0];[1:v]setsar=1[v1];[v0][v1]concat=n=2:v=1:a=0[v]",
    };

    args.extend(["-filter_complex".to_string(), filter.to_string()]);
    args.extend(["-map".to_string(), "[v]".to_string()]);
    if filler.audio.is_some() {
        args.extend(["-map".to_string(), "[a]".to_string()]);
    }
    args.push(destination.to_string_lossy().to_string());
    args
}

/// ffmpeg-backed [`MediaEncoder`].
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    #[must_use]
    pub fn new(paths: &ToolPaths) -> Self {
        Self {
            ffmpeg: paths.ffmpeg.clone(),
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, args: &[String], cancel: &CancelToken) -> Result<(), SplitError> {
        run_tool(
            Tool::Ffmpeg,
            &self.ffmpeg,
            args,
            RunLimits {
                cancel: Some(cancel),
                timeout: self.timeout,
            },
        )
        .map(|_| ())
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn cut(&self, request: &CutRequest<'_>, cancel: &CancelToken) -> Result<(), SplitError> {
        debug!(
            "Cutting {:.3}s+{:.3}s -> {}",
            request.start,
            request.duration,
            request.destination.display()
        );
        self.run(&build_cut_args(request), cancel)
    }

    fn append_filler(
        &self,
        clip: &Path,
        filler: &FillerSpec,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<(), SplitError> {
        debug!(
            "Padding {} with {:.3}s of filler -> {}",
            clip.display(),
            filler.duration,
            destination.display()
        );
        self.run(&build_pad_args(clip, filler, destination), cancel)
    }
}
