use super::segment_planner::SegmentPlan;
use crate::error::{CancelReason, SplitError};
use crate::signal::CancelToken;
use crate::tools::{CutRequest, FillerSpec, MediaEncoder, VideoMetadata, has_content};
use log::{debug, error, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Exported,
    /// Output existed before the run.
    Skipped,
    Failed,
    Canceled,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exported => write!(f, "exported"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Outcome of one part.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub index: usize,
    pub output_path: PathBuf,
    pub status: ExportStatus,
    pub error: Option<String>,
}

impl ExportResult {
    #[must_use]
    pub fn skipped(plan: &SegmentPlan) -> Self {
        Self {
            index: plan.index,
            output_path: plan.output_path.clone(),
            status: ExportStatus::Skipped,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(plan: &SegmentPlan, error: &SplitError) -> Self {
        let status = if error.is_canceled() {
            ExportStatus::Canceled
        } else {
            ExportStatus::Failed
        };
        Self {
            index: plan.index,
            output_path: plan.output_path.clone(),
            status,
            error: Some(error.to_string()),
        }
    }

    /// Exported now or already present.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExportStatus::Exported | ExportStatus::Skipped)
    }
}

/// Cuts one planned part out of the source and pads it when needed.
pub struct SegmentExporter {
    source: PathBuf,
    metadata: VideoMetadata,
    encoder: Arc<dyn MediaEncoder>,
    cancel: CancelToken,
}

impl SegmentExporter {
    pub fn new(
        source: &Path,
        metadata: VideoMetadata,
        encoder: Arc<dyn MediaEncoder>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source: source.to_path_buf(),
            metadata,
            encoder,
            cancel,
        }
    }

    #[must_use]
    pub fn export(&self, plan: &SegmentPlan) -> ExportResult {
        match self.export_inner(plan) {
            Ok(()) => {
                info!("Part {} exported: {}", plan.index, plan.output_path.display());
                ExportResult {
                    index: plan.index,
                    output_path: plan.output_path.clone(),
                    status: ExportStatus::Exported,
                    error: None,
                }
            }
            Err(e) if e.is_canceled() => {
                warn!("Part {} {e}", plan.index);
                ExportResult::failed(plan, &e)
            }
            Err(e) => {
                error!("Part {} failed: {e}", plan.index);
                ExportResult::failed(plan, &e)
            }
        }
    }

    fn export_inner(&self, plan: &SegmentPlan) -> Result<(), SplitError> {
        if self.cancel.is_canceled() {
            return Err(SplitError::Canceled(CancelReason::Interrupted));
        }

        debug!(
            "Part {}: cutting [{:.3}, {:.3})",
            plan.index, plan.start, plan.end
        );
        let cut = self.encoder.cut(
            &CutRequest {
                source: &self.source,
                start: plan.start,
                duration: plan.duration(),
                destination: &plan.output_path,
            },
            &self.cancel,
        );

        // A partial file would be taken for a finished part on the next run.
        if let Err(e) = cut {
            remove_if_exists(&plan.output_path);
            return Err(e);
        }
        if !has_content(&plan.output_path) {
            remove_if_exists(&plan.output_path);
            return Err(SplitError::MissingOutput {
                path: plan.output_path.clone(),
            });
        }

        if plan.needs_padding() {
            self.pad(plan)?;
        }
        Ok(())
    }

    /// Concatenate filler onto the cut clip through a temporary file, replacing
    /// the clip only once the padded file is complete.
    fn pad(&self, plan: &SegmentPlan) -> Result<(), SplitError> {
        debug!(
            "Part {}: padding with {:.3}s of filler",
            plan.index, plan.pad_duration
        );
        let filler = FillerSpec::for_source(&self.metadata, plan.pad_duration);
        let temp_path = temp_path_for(&plan.output_path);

        let result = self
            .encoder
            .append_filler(&plan.output_path, &filler, &temp_path, &self.cancel)
            .and_then(|()| {
                if has_content(&temp_path) {
                    Ok(())
                } else {
                    Err(SplitError::MissingOutput {
                        path: temp_path.clone(),
                    })
                }
            })
            .and_then(|()| {
                fs::rename(&temp_path, &plan.output_path).map_err(|e| {
                    SplitError::io(
                        format!("cannot replace {}", plan.output_path.display()),
                        e,
                    )
                })
            });

        if result.is_err() {
            remove_if_exists(&temp_path);
        }
        result
    }
}

/// Hidden sibling of `target` keeping its extension so ffmpeg picks the same muxer.
fn temp_path_for(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map_or_else(|| "part".to_string(), |s| s.to_string_lossy().to_string());
    let name = match target.extension() {
        Some(ext) => format!(
            ".{stem}.{}.{}",
            Uuid::new_v4().simple(),
            ext.to_string_lossy()
        ),
        None => format!(".{stem}.{}", Uuid::new_v4().simple()),
    };
    target.with_file_name(name)
}

fn remove_if_exists(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        warn!("Cannot remove {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Tool;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedEncoder {
        fail_cut: bool,
        fail_pad: bool,
        empty_cut: bool,
        pad_targets: Mutex<Vec<PathBuf>>,
    }

    impl MediaEncoder for ScriptedEncoder {
        fn cut(&self, request: &CutRequest<'_>, _cancel: &CancelToken) -> Result<(), SplitError> {
            if self.fail_cut {
                fs::write(request.destination, b"partial").unwrap();
                return Err(SplitError::ToolExecutionFailed {
                    tool: Tool::Ffmpeg,
                    code: 1,
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            let body: &[u8] = if self.empty_cut { b"" } else { b"cut" };
            fs::write(request.destination, body).unwrap();
            Ok(())
        }

        fn append_filler(
            &self,
            clip: &Path,
            _filler: &FillerSpec,
            destination: &Path,
            _cancel: &CancelToken,
        ) -> Result<(), SplitError> {
            self.pad_targets.lock().unwrap().push(destination.to_path_buf());
            let mut body = fs::read(clip).unwrap();
            body.extend_from_slice(b"+filler");
            fs::write(destination, body).unwrap();
            if self.fail_pad {
                return Err(SplitError::ToolExecutionFailed {
                    tool: Tool::Ffmpeg,
                    code: 255,
                    stderr: String::new(),
                });
            }
            Ok(())
        }
    }

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            duration_seconds: 125.0,
            has_audio: true,
            audio_sample_rate: Some(48_000),
            audio_channels: Some(2),
            width: 640,
            height: 360,
            frame_rate: 25.0,
        }
    }

    fn plan(dir: &Path, pad_duration: f64) -> SegmentPlan {
        SegmentPlan {
            index: 3,
            start: 120.0,
            end: 125.0,
            pad_duration,
            output_path: dir.join("clip-part3.mp4"),
            skip: false,
        }
    }

    fn exporter(encoder: ScriptedEncoder) -> (SegmentExporter, Arc<ScriptedEncoder>) {
        let encoder = Arc::new(encoder);
        let exporter = SegmentExporter::new(
            Path::new("clip.mp4"),
            metadata(),
            Arc::clone(&encoder) as Arc<dyn MediaEncoder>,
            CancelToken::new(),
        );
        (exporter, encoder)
    }

    #[test]
    fn test_export_without_padding() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, encoder) = exporter(ScriptedEncoder::default());
        let plan = plan(dir.path(), 0.0);

        let result = exporter.export(&plan);
        assert_eq!(result.status, ExportStatus::Exported);
        assert!(result.error.is_none());
        assert_eq!(fs::read(&plan.output_path).unwrap(), b"cut");
        assert!(encoder.pad_targets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_padding_goes_through_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, encoder) = exporter(ScriptedEncoder::default());
        let plan = plan(dir.path(), 55.0);

        let result = exporter.export(&plan);
        assert!(result.is_success());
        assert_eq!(fs::read(&plan.output_path).unwrap(), b"cut+filler");

        let targets = encoder.pad_targets.lock().unwrap();
        assert_eq!(targets.len(), 1);
        assert_ne!(targets[0], plan.output_path);
        assert_eq!(targets[0].extension().unwrap(), "mp4");
        assert!(!targets[0].exists());
    }

    #[test]
    fn test_failed_pad_keeps_cut_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, encoder) = exporter(ScriptedEncoder {
            fail_pad: true,
            ..ScriptedEncoder::default()
        });
        let plan = plan(dir.path(), 55.0);

        let result = exporter.export(&plan);
        assert_eq!(result.status, ExportStatus::Failed);
        assert!(result.error.unwrap().contains("Processing was stopped."));
        assert_eq!(fs::read(&plan.output_path).unwrap(), b"cut");
        assert!(!encoder.pad_targets.lock().unwrap()[0].exists());
    }

    #[test]
    fn test_failed_cut_skips_padding_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, encoder) = exporter(ScriptedEncoder {
            fail_cut: true,
            ..ScriptedEncoder::default()
        });
        let plan = plan(dir.path(), 55.0);

        let result = exporter.export(&plan);
        assert_eq!(result.status, ExportStatus::Failed);
        assert!(result.error.unwrap().contains("Invalid data found"));
        assert!(!plan.output_path.exists());
        assert!(encoder.pad_targets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_output_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, _) = exporter(ScriptedEncoder {
            empty_cut: true,
            ..ScriptedEncoder::default()
        });
        let result = exporter.export(&plan(dir.path(), 0.0));
        assert_eq!(result.status, ExportStatus::Failed);
        assert!(result.error.unwrap().contains("produced no output"));
    }

    #[test]
    fn test_canceled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let (exporter, _) = exporter(ScriptedEncoder::default());
        exporter.cancel.cancel();
        let plan = plan(dir.path(), 0.0);

        let result = exporter.export(&plan);
        assert_eq!(result.status, ExportStatus::Canceled);
        assert!(!plan.output_path.exists());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("/out/clip-part3.mkv"));
        assert_eq!(temp.parent(), Some(Path::new("/out")));
        let name = temp.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".clip-part3."));
        assert!(name.ends_with(".mkv"));
    }
}
