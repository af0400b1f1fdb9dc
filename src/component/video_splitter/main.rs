use super::export_coordinator::{ExportCoordinator, RunSummary};
use super::segment_exporter::ExportStatus;
use crate::config::{Config, RunConfig};
use crate::signal::CancelToken;
use crate::tools::{FfmpegEncoder, FfprobeProber, ToolPaths};
use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// 影片分割器
///
/// 確認最後片段長度、顯示進度條並輸出摘要
pub struct VideoSplitter {
    config: Config,
    cancel: CancelToken,
}

impl VideoSplitter {
    pub const fn new(config: Config, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    /// 執行一次分割
    pub fn run(&self, input: &Path, output_dir: Option<&Path>) -> Result<RunSummary> {
        println!("{}", style("=== 影片分割 ===").cyan().bold());

        let settings = &self.config.settings;
        let run_config = RunConfig::new(input, output_dir, settings);
        let paths = ToolPaths::from_settings(settings);
        let timeout = settings.tool_timeout();

        let prober = FfprobeProber::new(&paths)
            .with_timeout(timeout)
            .with_cancel(self.cancel.clone());
        let encoder = FfmpegEncoder::new(&paths).with_timeout(timeout);
        let coordinator =
            ExportCoordinator::new(Arc::new(prober), Arc::new(encoder), self.cancel.clone());

        println!(
            "{}",
            style(format!(
                "將 {} 分割為每段 {} 秒（{} 個工作執行緒）→ {}",
                input.display(),
                run_config.segment_duration_secs,
                run_config.max_workers,
                run_config.output_dir.display()
            ))
            .dim()
        );

        let allow_long_last = settings.allow_long_last_part;
        let segment_duration = run_config.segment_duration();
        let confirm = move |length: f64| {
            allow_long_last || confirm_long_last_part(length, segment_duration)
        };

        let mut progress_bar: Option<ProgressBar> = None;
        let summary = {
            let mut on_progress = |completed: usize, total: usize| {
                let bar = progress_bar.get_or_insert_with(|| new_progress_bar(total));
                bar.set_position(completed as u64);
            };
            coordinator
                .run(&run_config, &mut on_progress, &confirm)
                .with_context(|| format!("無法分割 {}", input.display()))?
        };

        if let Some(bar) = progress_bar {
            if self.cancel.is_canceled() {
                bar.abandon_with_message("已中斷");
            } else {
                bar.finish_with_message("完成");
            }
        }

        self.print_summary(&summary);
        Ok(summary)
    }

    fn print_summary(&self, summary: &RunSummary) {
        println!();
        println!("{}", style("=== 影片分割摘要 ===").cyan().bold());
        for line in summary_lines(summary) {
            println!("{line}");
        }

        info!(
            "Split finished - exported: {}, skipped: {}, failed: {}, canceled: {}",
            summary.exported(),
            summary.skipped(),
            summary.failed(),
            summary.canceled()
        );
    }
}

const fn status_label(status: ExportStatus) -> &'static str {
    match status {
        ExportStatus::Exported => "已匯出",
        ExportStatus::Skipped => "已跳過",
        ExportStatus::Failed => "失敗",
        ExportStatus::Canceled => "已取消",
    }
}

/// 摘要各行，失敗片段依序號排列
fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        format!("  總計: {} 個片段", summary.total_parts),
        format!("  成功: {} 個", style(summary.exported()).green()),
    ];
    if summary.skipped() > 0 {
        lines.push(format!("  跳過: {} 個（已存在）", style(summary.skipped()).yellow()));
    }
    if summary.failed() > 0 {
        lines.push(format!("  失敗: {} 個", style(summary.failed()).red()));
    }
    if summary.canceled() > 0 {
        lines.push(format!("  取消: {} 個", style(summary.canceled()).yellow()));
    }

    let mut failures: Vec<_> = summary.failures().collect();
    failures.sort_by_key(|r| r.index);
    lines.extend(failures.into_iter().map(|failure| {
        format!(
            "  {} 片段 {}（{}）: {}",
            style("✗").red(),
            failure.index,
            status_label(failure.status),
            failure.error.as_deref().unwrap_or("未知錯誤")
        )
    }));
    lines
}

fn confirm_long_last_part(length: f64, segment_duration: f64) -> bool {
    Confirm::new()
        .with_prompt(format!(
            "最後片段長度為 {length:.1} 秒（而非 {segment_duration:.0} 秒），是否保留此長度？"
        ))
        .default(true)
        .interact()
        .unwrap_or_else(|e| {
            warn!("Cannot ask about the last part ({e}), clamping it");
            false
        })
}

fn new_progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("#>-"));
    bar.set_style(style);
    bar.set_message("匯出中");
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::video_splitter::ExportResult;
    use std::path::PathBuf;

    fn result(index: usize, status: ExportStatus, error: Option<&str>) -> ExportResult {
        ExportResult {
            index,
            output_path: PathBuf::from(format!("/out/clip-part{index}.mp4")),
            status,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_summary_lines_lists_failures_in_order() {
        console::set_colors_enabled(false);
        let summary = RunSummary {
            total_parts: 4,
            results: vec![
                result(3, ExportStatus::Failed, Some("ffmpeg exited with code 1")),
                result(1, ExportStatus::Exported, None),
                result(4, ExportStatus::Canceled, Some("canceled by user")),
                result(2, ExportStatus::Skipped, None),
            ],
        };

        let lines = summary_lines(&summary);
        assert_eq!(lines[0], "  總計: 4 個片段");
        assert!(lines.iter().any(|l| l == "  跳過: 1 個（已存在）"));
        assert!(lines.iter().any(|l| l == "  失敗: 1 個"));

        let failed = lines.iter().position(|l| l.contains("片段 3（失敗）")).unwrap();
        let canceled = lines.iter().position(|l| l.contains("片段 4（已取消）")).unwrap();
        assert!(failed < canceled);
        assert!(lines[failed].ends_with("ffmpeg exited with code 1"));
    }

    #[test]
    fn test_summary_lines_clean_run() {
        console::set_colors_enabled(false);
        let summary = RunSummary {
            total_parts: 2,
            results: vec![
                result(1, ExportStatus::Exported, None),
                result(2, ExportStatus::Exported, None),
            ],
        };

        let lines = summary_lines(&summary);
        assert_eq!(lines, vec!["  總計: 2 個片段", "  成功: 2 個"]);
    }
}
