use crate::config::UserSettings;
use std::path::{Path, PathBuf};

/// Locations of the ffmpeg/ffprobe binaries, injected into the prober and encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl ToolPaths {
    /// Explicit paths win. Without an explicit ffprobe, a binary sitting next to
    /// the configured ffmpeg is preferred over the one on PATH.
    #[must_use]
    pub fn from_settings(settings: &UserSettings) -> Self {
        let ffmpeg = settings
            .ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let ffprobe = settings
            .ffprobe_path
            .clone()
            .or_else(|| sibling_ffprobe(&ffmpeg))
            .unwrap_or_else(|| PathBuf::from("ffprobe"));

        Self { ffmpeg, ffprobe }
    }
}

fn sibling_ffprobe(ffmpeg: &Path) -> Option<PathBuf> {
    let dir = ffmpeg.parent().filter(|p| !p.as_os_str().is_empty())?;
    let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    let candidate = dir.join(name);
    candidate.is_file().then_some(candidate)
}
