use crate::error::SplitError;
use crate::tools::validate_file_exists;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SEGMENT_DURATION_SECS: u32 = 60;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const FALLBACK_OUTPUT_EXTENSION: &str = "mp4";

/// Persisted defaults, stored in `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub segment_duration_secs: u32,
    pub offset_secs: f64,
    pub max_workers: usize,
    /// Accept a slightly long final part without asking.
    pub allow_long_last_part: bool,
    /// `None` keeps the source container's extension.
    pub output_extension: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Per-invocation deadline for ffmpeg/ffprobe.
    pub tool_timeout_secs: Option<u64>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            segment_duration_secs: DEFAULT_SEGMENT_DURATION_SECS,
            offset_secs: 0.0,
            max_workers: DEFAULT_MAX_WORKERS,
            allow_long_last_part: false,
            output_extension: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            tool_timeout_secs: None,
        }
    }
}

impl UserSettings {
    #[must_use]
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: UserSettings,
}

/// Everything one split run needs. Read-only once the run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub segment_duration_secs: u32,
    pub offset_secs: f64,
    pub max_workers: usize,
    pub output_extension: Option<String>,
}

impl RunConfig {
    /// Output directory defaults to the directory holding the source.
    #[must_use]
    pub fn new(source_path: &Path, output_dir: Option<&Path>, settings: &UserSettings) -> Self {
        let output_dir = output_dir.map_or_else(
            || {
                source_path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or(Path::new("."))
                    .to_path_buf()
            },
            Path::to_path_buf,
        );

        Self {
            source_path: source_path.to_path_buf(),
            output_dir,
            segment_duration_secs: settings.segment_duration_secs,
            offset_secs: settings.offset_secs,
            max_workers: settings.max_workers,
            output_extension: settings.output_extension.clone(),
        }
    }

    #[must_use]
    pub fn segment_duration(&self) -> f64 {
        f64::from(self.segment_duration_secs)
    }

    pub fn validate(&self) -> Result<(), SplitError> {
        if self.segment_duration_secs == 0 {
            return Err(SplitError::InvalidConfig(
                "segment duration must be greater than zero".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(SplitError::InvalidConfig(
                "at least one worker is required".to_string(),
            ));
        }
        if !self.offset_secs.is_finite() {
            return Err(SplitError::InvalidConfig(format!(
                "offset must be a finite number, got {}",
                self.offset_secs
            )));
        }
        if let Some(ext) = &self.output_extension
            && (ext.is_empty() || ext.contains(['/', '\\', '.']))
        {
            return Err(SplitError::InvalidConfig(format!(
                "invalid output extension: {ext:?}"
            )));
        }
        validate_file_exists(&self.source_path)?;
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(SplitError::InvalidConfig(format!(
                "output path is not a directory: {}",
                self.output_dir.display()
            )));
        }
        Ok(())
    }

    /// File stem of the source, used as the base of every part name.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
            .to_string()
    }

    #[must_use]
    pub fn extension(&self) -> String {
        self.output_extension
            .clone()
            .or_else(|| {
                self.source_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_OUTPUT_EXTENSION.to_string())
            .to_lowercase()
    }
}
