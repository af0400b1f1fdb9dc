use super::keyframe_index::KeyframeIndex;
use super::segment_exporter::{ExportResult, ExportStatus, SegmentExporter};
use super::segment_planner::{OutputLayout, SegmentPlan, SegmentPlanner};
use crate::config::RunConfig;
use crate::error::SplitError;
use crate::signal::CancelToken;
use crate::tools::{MediaEncoder, MediaProber, ensure_directory_exists};
use log::{error, info};
use rayon::ThreadPoolBuilder;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::mpsc;

/// What a run produced. `results` holds exactly one entry per planned part.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total_parts: usize,
    pub results: Vec<ExportResult>,
}

impl RunSummary {
    fn count(&self, status: ExportStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    #[must_use]
    pub fn exported(&self) -> usize {
        self.count(ExportStatus::Exported)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(ExportStatus::Skipped)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(ExportStatus::Failed)
    }

    #[must_use]
    pub fn canceled(&self) -> usize {
        self.count(ExportStatus::Canceled)
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Every part is on disk.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.total_parts
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExportResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Plans a source and exports its parts on a fixed-size worker pool.
pub struct ExportCoordinator {
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn MediaEncoder>,
    cancel: CancelToken,
}

impl ExportCoordinator {
    pub fn new(
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn MediaEncoder>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            prober,
            encoder,
            cancel,
        }
    }

    /// Split `config.source_path` into parts under `config.output_dir`.
    ///
    /// Only configuration and source-metadata errors abort the run. Per-part
    /// failures end up in the summary. `progress` receives
    /// `(completed, total_parts)` after each dispatched part finishes, where
    /// parts skipped because they already exist are part of the total but are
    /// never counted as completed.
    pub fn run(
        &self,
        config: &RunConfig,
        progress: &mut dyn FnMut(usize, usize),
        confirm_long_last: &dyn Fn(f64) -> bool,
    ) -> Result<RunSummary, SplitError> {
        config.validate()?;
        ensure_directory_exists(&config.output_dir)?;

        let metadata = self.prober.video_metadata(&config.source_path)?;
        info!(
            "Source {}: {:.3}s, audio={}",
            config.source_path.display(),
            metadata.duration_seconds,
            metadata.has_audio
        );

        let keyframes = KeyframeIndex::build(self.prober.as_ref(), &config.source_path);
        let planner = SegmentPlanner::new(keyframes, OutputLayout::from_config(config));
        let plans = planner.plan(
            metadata.duration_seconds,
            config.segment_duration(),
            config.offset_secs,
            confirm_long_last,
        );
        let total_parts = plans.len();

        let (existing, pending): (Vec<SegmentPlan>, Vec<SegmentPlan>) =
            plans.into_iter().partition(|p| p.skip);
        let mut results: Vec<ExportResult> = existing
            .iter()
            .map(|plan| {
                info!(
                    "Skipping part {}: {} already exists",
                    plan.index,
                    plan.output_path.display()
                );
                ExportResult::skipped(plan)
            })
            .collect();

        if !pending.is_empty() {
            let exporter = Arc::new(SegmentExporter::new(
                &config.source_path,
                metadata,
                Arc::clone(&self.encoder),
                self.cancel.clone(),
            ));
            results.extend(dispatch(
                &exporter,
                pending,
                config.max_workers,
                total_parts,
                progress,
            )?);
        }

        let summary = RunSummary {
            total_parts,
            results,
        };
        info!(
            "Run finished: {} parts, {} exported, {} skipped, {} failed, {} canceled",
            summary.total_parts,
            summary.exported(),
            summary.skipped(),
            summary.failed(),
            summary.canceled()
        );
        Ok(summary)
    }
}

/// Submit every plan to a pool of `max_workers` threads and collect results in
/// completion order. The calling thread is the only one touching `progress`.
fn dispatch(
    exporter: &Arc<SegmentExporter>,
    plans: Vec<SegmentPlan>,
    max_workers: usize,
    total_parts: usize,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<Vec<ExportResult>, SplitError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .thread_name(|i| format!("segment-worker-{i}"))
        .panic_handler(|_| error!("Segment worker panicked"))
        .build()?;

    let dispatched: Vec<SegmentPlan> = plans.clone();
    let (tx, rx) = mpsc::channel::<ExportResult>();
    for plan in plans {
        let tx = tx.clone();
        let exporter = Arc::clone(exporter);
        pool.spawn(move || {
            let result = exporter.export(&plan);
            let _ = tx.send(result);
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(dispatched.len());
    for result in rx {
        results.push(result);
        progress(results.len(), total_parts);
    }

    // A panicking job drops its sender without reporting.
    let reported: BTreeSet<usize> = results.iter().map(|r| r.index).collect();
    for plan in dispatched.iter().filter(|p| !reported.contains(&p.index)) {
        error!("Part {} produced no result", plan.index);
        results.push(ExportResult {
            index: plan.index,
            output_path: plan.output_path.clone(),
            status: ExportStatus::Failed,
            error: Some("worker terminated unexpectedly".to_string()),
        });
    }

    Ok(results)
}
