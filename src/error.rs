//! Error taxonomy for probing, planning and exporting segments.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Keep only the last N bytes of captured stderr.
pub const MAX_STDERR_BYTES: usize = 64 * 1024;

/// External tools the splitter shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ffmpeg => write!(f, "ffmpeg"),
            Self::Ffprobe => write!(f, "ffprobe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Shutdown signal (Ctrl-C) or an explicit `CancelToken::cancel`.
    Interrupted,
    DeadlineExceeded(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "interrupted"),
            Self::DeadlineExceeded(limit) => {
                write!(f, "deadline of {:.1}s exceeded", limit.as_secs_f64())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("{tool} not available at {}", path.display())]
    ToolUnavailable { tool: Tool, path: PathBuf },

    #[error("{tool} failed (code {code}): {}", summarize_tool_failure(stderr, Some(*code)))]
    ToolExecutionFailed {
        tool: Tool,
        code: i32,
        stderr: String,
    },

    #[error("tool reported success but produced no output: {}", path.display())]
    MissingOutput { path: PathBuf },

    #[error("invalid time range [{start:.3}, {end:.3}) for a {duration:.3}s video")]
    InvalidTimeRange { start: f64, end: f64, duration: f64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("canceled: {0}")]
    Canceled(CancelReason),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read source video: {0}")]
    Probe(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl SplitError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}

/// One-line summary of a failed tool run. Known ffmpeg exit codes get a fixed
/// message, everything else falls back to the last meaningful stderr line.
#[must_use]
pub fn summarize_tool_failure(stderr: &str, exit_code: Option<i32>) -> String {
    if let Some(summary) = exit_code.and_then(known_exit_code_summary) {
        let detail = last_meaningful_line(stderr);
        return match detail {
            Some(line) => format!("{summary} {line}"),
            None => summary.to_string(),
        };
    }
    match last_meaningful_line(stderr) {
        Some(line) => line.to_string(),
        None => match exit_code {
            Some(code) => format!("exited with code {code} and no diagnostic output"),
            None => "terminated without diagnostic output".to_string(),
        },
    }
}

/// Exit codes from ffmpeg.c.
fn known_exit_code_summary(code: i32) -> Option<&'static str> {
    match code {
        1 => Some("Processing failed."),
        69 => Some("Rate limit exceeded."),
        123 | 255 => Some("Processing was stopped."),
        _ => None,
    }
}

const SUMMARY_MAX_CHARS: usize = 160;

fn last_meaningful_line(stderr: &str) -> Option<String> {
    let line = stderr
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty() && !l.starts_with("Conversion failed"))?;
    if line.chars().count() <= SUMMARY_MAX_CHARS {
        Some(line.to_string())
    } else {
        let truncated: String = line.chars().take(SUMMARY_MAX_CHARS - 1).collect();
        Some(format!("{truncated}…"))
    }
}

/// Drop the front of `buf` so that at most [`MAX_STDERR_BYTES`] remain.
pub(crate) fn truncate_front(buf: &mut Vec<u8>) {
    if buf.len() > MAX_STDERR_BYTES {
        let excess = buf.len() - MAX_STDERR_BYTES;
        buf.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_known_exit_code_with_detail() {
        let s = summarize_tool_failure("frame=1\nInvalid argument\n", Some(1));
        assert_eq!(s, "Processing failed. Invalid argument");
    }

    #[test]
    fn test_summary_skips_conversion_failed_trailer() {
        let s = summarize_tool_failure(
            "input.mp4: No such file or directory\nConversion failed!\n",
            Some(42),
        );
        assert_eq!(s, "input.mp4: No such file or directory");
    }

    #[test]
    fn test_summary_without_output() {
        assert_eq!(
            summarize_tool_failure("  \n", Some(7)),
            "exited with code 7 and no diagnostic output"
        );
        assert_eq!(summarize_tool_failure("", Some(255)), "Processing was stopped.");
    }

    #[test]
    fn test_summary_truncates_long_lines() {
        let long = "x".repeat(400);
        let s = summarize_tool_failure(&long, None);
        assert_eq!(s.chars().count(), SUMMARY_MAX_CHARS);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn test_truncate_front_keeps_tail() {
        let mut buf = vec![b'a'; MAX_STDERR_BYTES];
        buf.extend_from_slice(b"tail");
        truncate_front(&mut buf);
        assert_eq!(buf.len(), MAX_STDERR_BYTES);
        assert!(buf.ends_with(b"tail"));
    }

    #[test]
    fn test_execution_failed_display_uses_summary() {
        let e = SplitError::ToolExecutionFailed {
            tool: Tool::Ffmpeg,
            code: 1,
            stderr: "Unknown encoder 'foo'".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "ffmpeg failed (code 1): Processing failed. Unknown encoder 'foo'"
        );
    }

    #[test]
    fn test_canceled_display() {
        let e = SplitError::Canceled(CancelReason::DeadlineExceeded(Duration::from_secs(3)));
        assert!(e.is_canceled());
        assert_eq!(e.to_string(), "canceled: deadline of 3.0s exceeded");
    }
}
