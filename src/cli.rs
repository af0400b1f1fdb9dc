use crate::config::UserSettings;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "video-splitter")]
#[command(
    author,
    version,
    about = "Split a video into fixed-length parts cut at keyframes"
)]
pub struct Cli {
    /// Video to split
    #[arg(required = true)]
    pub input: PathBuf,

    /// Directory for the parts (defaults to the video's directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Length of each part in seconds
    #[arg(short = 'd', long = "duration")]
    pub segment_duration: Option<u32>,

    /// Shift every boundary by this many seconds
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f64>,

    /// Keep a slightly long final part without asking
    #[arg(long)]
    pub allow_long_last: bool,

    /// Number of parts exported in parallel
    #[arg(short = 'j', long = "workers")]
    pub max_workers: Option<usize>,

    /// Kill ffmpeg/ffprobe runs that take longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Container extension of the parts (defaults to the video's)
    #[arg(long = "ext")]
    pub extension: Option<String>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long)]
    pub ffprobe: Option<PathBuf>,

    /// Store the effective options as the new defaults
    #[arg(long)]
    pub save_defaults: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Flags given on the command line override the stored settings.
    pub fn apply_to(&self, settings: &mut UserSettings) {
        if let Some(duration) = self.segment_duration {
            settings.segment_duration_secs = duration;
        }
        if let Some(offset) = self.offset {
            settings.offset_secs = offset;
        }
        if self.allow_long_last {
            settings.allow_long_last_part = true;
        }
        if let Some(workers) = self.max_workers {
            settings.max_workers = workers;
        }
        if let Some(timeout) = self.timeout {
            settings.tool_timeout_secs = Some(timeout);
        }
        if let Some(ext) = &self.extension {
            settings.output_extension = Some(ext.trim_start_matches('.').to_string());
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            settings.ffmpeg_path = Some(ffmpeg.clone());
        }
        if let Some(ffprobe) = &self.ffprobe {
            settings.ffprobe_path = Some(ffprobe.clone());
        }
    }
}
