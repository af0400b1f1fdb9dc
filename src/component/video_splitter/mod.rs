//! 依關鍵影格分割影片
//!
//! A. 取得影片長度與音訊格式（ffprobe）
//! B. 建立關鍵影格索引
//! C. 規劃對齊關鍵影格的固定長度片段
//! D. 以 ffmpeg 平行切割（必要時補黑畫面）

mod export_coordinator;
mod keyframe_index;
mod main;
mod segment_exporter;
mod segment_planner;

pub use export_coordinator::{ExportCoordinator, RunSummary};
pub use keyframe_index::KeyframeIndex;
pub use main::VideoSplitter;
pub use segment_exporter::{ExportResult, ExportStatus, SegmentExporter};
pub use segment_planner::{
    LONG_LAST_TOLERANCE, OutputLayout, SegmentPlan, SegmentPlanner, layout_in, part_count,
};
