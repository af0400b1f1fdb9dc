//! Cancellable execution of ffmpeg/ffprobe.
//!
//! Output pipes are drained on background threads while the calling thread
//! polls the child, the cancel token and the optional deadline.

use crate::error::{CancelReason, SplitError, Tool, truncate_front};
use crate::signal::CancelToken;
use log::{debug, warn};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Limits applied to a single invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLimits<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub timeout: Option<Duration>,
}

fn drain<R: Read + Send + 'static>(mut reader: R, keep_tail: bool) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut collected = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    collected.extend_from_slice(&chunk[..n]);
                    if keep_tail {
                        truncate_front(&mut collected);
                    }
                }
            }
        }
        collected
    })
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_with_limits(
    child: &mut Child,
    tool: Tool,
    limits: RunLimits<'_>,
) -> Result<ExitStatus, SplitError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                kill_and_reap(child);
                return Err(SplitError::io(format!("failed to wait for {tool}"), e));
            }
        }

        if limits.cancel.is_some_and(CancelToken::is_canceled) {
            warn!("Stopping {tool} [{}]: interrupted", child.id());
            kill_and_reap(child);
            return Err(SplitError::Canceled(CancelReason::Interrupted));
        }

        if let Some(limit) = limits.timeout
            && started.elapsed() >= limit
        {
            warn!(
                "Stopping {tool} [{}]: exceeded {:.1}s",
                child.id(),
                limit.as_secs_f64()
            );
            kill_and_reap(child);
            return Err(SplitError::Canceled(CancelReason::DeadlineExceeded(limit)));
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Run `program` with `args` and wait for it, honouring `limits`.
///
/// A missing binary maps to [`SplitError::ToolUnavailable`], a non-zero exit
/// to [`SplitError::ToolExecutionFailed`] carrying the stderr tail.
pub fn run_tool(
    tool: Tool,
    program: &Path,
    args: &[String],
    limits: RunLimits<'_>,
) -> Result<ToolOutput, SplitError> {
    if limits.cancel.is_some_and(CancelToken::is_canceled) {
        return Err(SplitError::Canceled(CancelReason::Interrupted));
    }

    debug!("Running {} {}", program.display(), args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SplitError::ToolUnavailable {
                    tool,
                    path: program.to_path_buf(),
                }
            } else {
                SplitError::io(format!("failed to start {tool}"), e)
            }
        })?;

    let stdout_handle = child.stdout.take().map(|s| drain(s, false));
    let stderr_handle = child.stderr.take().map(|s| drain(s, true));

    let status = wait_with_limits(&mut child, tool, limits);

    let stdout = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr_bytes = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = String::from_utf8_lossy(&stderr_bytes).to_string();

    let status = status?;
    if status.success() {
        Ok(ToolOutput { stdout, stderr })
    } else {
        Err(SplitError::ToolExecutionFailed {
            tool,
            code: status.code().unwrap_or(-1),
            stderr,
        })
    }
}
