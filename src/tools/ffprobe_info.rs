use crate::error::{SplitError, Tool};
use crate::signal::CancelToken;
use crate::tools::process_runner::{RunLimits, run_tool};
use crate::tools::tool_paths::ToolPaths;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source properties read once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub duration_seconds: f64,
    pub has_audio: bool,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// One decoded frame as reported by the prober.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub pict_type: Option<String>,
    pub pts_time: Option<f64>,
    pub best_effort_time: Option<f64>,
}

impl FrameInfo {
    /// Intra-coded frames are safe cut points.
    #[must_use]
    pub fn is_keyframe(&self) -> bool {
        self.pict_type.as_deref() == Some("I")
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<f64> {
        self.pts_time.or(self.best_effort_time)
    }
}

/// Reads stream metadata and frame timestamps for a media file.
pub trait MediaProber: Send + Sync {
    fn video_metadata(&self, path: &Path) -> Result<VideoMetadata, SplitError>;

    /// Frames of the first video stream, at least every keyframe.
    fn frames(&self, path: &Path) -> Result<Vec<FrameInfo>, SplitError>;
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    side_data_list: Option<Vec<SideData>>,
    tags: Option<StreamTags>,
}

#[derive(Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

impl StreamInfo {
    /// Display Matrix first, legacy `rotate` tag as fallback.
    fn rotation(&self) -> Option<f64> {
        self.side_data_list
            .iter()
            .flatten()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .filter(|r| r.is_finite())
    }

    /// Decoders apply the rotation, so a quarter turn swaps the frame size.
    fn display_size(&self) -> (u32, u32) {
        let width = self.width.unwrap_or(0);
        let height = self.height.unwrap_or(0);
        let quarter_turn = self
            .rotation()
            .is_some_and(|r| (r.round() as i64).rem_euclid(180) == 90);
        if quarter_turn {
            (height, width)
        } else {
            (width, height)
        }
    }
}

#[derive(Deserialize)]
struct FramesOutput {
    #[serde(default)]
    frames: Vec<FrameEntry>,
}

#[derive(Deserialize)]
struct FrameEntry {
    pict_type: Option<String>,
    pts_time: Option<String>,
    best_effort_timestamp_time: Option<String>,
}

/// ffprobe-backed [`MediaProber`].
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: PathBuf,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl FfprobeProber {
    #[must_use]
    pub fn new(paths: &ToolPaths) -> Self {
        Self {
            ffprobe: paths.ffprobe.clone(),
            timeout: None,
            cancel: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn run(&self, args: Vec<String>) -> Result<Vec<u8>, SplitError> {
        let output = run_tool(
            Tool::Ffprobe,
            &self.ffprobe,
            &args,
            RunLimits {
                cancel: self.cancel.as_ref(),
                timeout: self.timeout,
            },
        )?;
        Ok(output.stdout)
    }
}

impl MediaProber for FfprobeProber {
    fn video_metadata(&self, path: &Path) -> Result<VideoMetadata, SplitError> {
        let stdout = self.run(vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ])?;
        let metadata = parse_metadata_json(&stdout)?;
        debug!(
            "Probed {}: {:.3}s, {}x{} @ {:.3}fps, audio={}",
            path.display(),
            metadata.duration_seconds,
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            metadata.has_audio
        );
        Ok(metadata)
    }

    fn frames(&self, path: &Path) -> Result<Vec<FrameInfo>, SplitError> {
        let stdout = self.run(vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-skip_frame".to_string(),
            "nokey".to_string(),
            "-show_frames".to_string(),
            "-show_entries".to_string(),
            "frame=pict_type,pts_time,best_effort_timestamp_time".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ])?;
        parse_frames_json(&stdout)
    }
}

fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse frame rate strings such as "30/1" or "30000/1001".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.trim().parse().ok()?;
        let den: f64 = den_str.trim().parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.trim().parse::<f64>().ok().filter(|r| *r > 0.0)
}

pub(crate) fn parse_metadata_json(raw: &[u8]) -> Result<VideoMetadata, SplitError> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)
        .map_err(|e| SplitError::Probe(format!("unparsable ffprobe output: {e}")))?;
    let streams = probe.streams.unwrap_or_default();

    let video_stream = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SplitError::Probe("no video stream".to_string()))?;
    let audio_stream = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    // Container duration first, stream duration as fallback.
    let duration_seconds = parse_seconds(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .or_else(|| parse_seconds(video_stream.duration.as_deref()))
        .filter(|d| *d > 0.0)
        .ok_or_else(|| SplitError::Probe("duration unavailable".to_string()))?;

    // r_frame_rate overstates variable-rate phone footage.
    let frame_rate = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);
    let (width, height) = video_stream.display_size();

    Ok(VideoMetadata {
        duration_seconds,
        has_audio: audio_stream.is_some(),
        audio_sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.trim().parse().ok()),
        audio_channels: audio_stream.and_then(|s| s.channels),
        width,
        height,
        frame_rate,
    })
}

pub(crate) fn parse_frames_json(raw: &[u8]) -> Result<Vec<FrameInfo>, SplitError> {
    let output: FramesOutput = serde_json::from_slice(raw)
        .map_err(|e| SplitError::Probe(format!("unparsable ffprobe frame list: {e}")))?;

    Ok(output
        .frames
        .into_iter()
        .map(|f| FrameInfo {
            pict_type: f.pict_type,
            pts_time: parse_seconds(f.pts_time.as_deref()),
            best_effort_time: parse_seconds(f.best_effort_timestamp_time.as_deref()),
        })
        .collect())
}
