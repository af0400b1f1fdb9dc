use super::keyframe_index::KeyframeIndex;
use crate::config::RunConfig;
use crate::error::SplitError;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// A final part up to this many times the nominal length may be kept whole.
pub const LONG_LAST_TOLERANCE: f64 = 1.1;

/// Padding shorter than this is dropped; ffmpeg cannot produce it anyway.
const MIN_PAD_SECONDS: f64 = 0.001;

/// Where part files go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    pub base_name: String,
    pub extension: String,
}

impl OutputLayout {
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            base_name: config.base_name(),
            extension: config.extension(),
        }
    }

    /// `<dir>/<base>-part<N>.<ext>`, 1-based.
    #[must_use]
    pub fn part_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}-part{index}.{}", self.base_name, self.extension))
    }
}

/// One resolved output segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    /// 1-based part number.
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub pad_duration: f64,
    pub output_path: PathBuf,
    /// Output already on disk; the coordinator does not export it again.
    pub skip: bool,
}

impl SegmentPlan {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn needs_padding(&self) -> bool {
        self.pad_duration > 0.0
    }
}

pub struct SegmentPlanner {
    keyframes: KeyframeIndex,
    layout: OutputLayout,
}

impl SegmentPlanner {
    #[must_use]
    pub const fn new(keyframes: KeyframeIndex, layout: OutputLayout) -> Self {
        Self { keyframes, layout }
    }

    /// Split `video_duration` into `ceil(video_duration / segment_duration)`
    /// parts, snapping each start to the nearest keyframe before applying
    /// `offset`.
    ///
    /// `confirm_long_last` is asked only when the final part overshoots the
    /// nominal length by at most [`LONG_LAST_TOLERANCE`]. Declining clamps the
    /// part and leaves the remainder uncovered.
    pub fn plan(
        &self,
        video_duration: f64,
        segment_duration: f64,
        offset: f64,
        confirm_long_last: &dyn Fn(f64) -> bool,
    ) -> Vec<SegmentPlan> {
        let num_parts = part_count(video_duration, segment_duration);
        info!(
            "Planning {num_parts} parts of {segment_duration:.3}s for a {video_duration:.3}s video (offset {offset:+.3}s, {} keyframes)",
            self.keyframes.len()
        );

        (0..num_parts)
            .map(|i| {
                let is_last = i + 1 == num_parts;
                let (start, end, pad_duration) = if is_last {
                    self.last_range(i, video_duration, segment_duration, offset, confirm_long_last)
                } else {
                    self.inner_range(i, video_duration, segment_duration, offset)
                };

                let index = i + 1;
                let output_path = self.layout.part_path(index);
                let skip = output_path.exists();
                debug!(
                    "Part {index}: [{start:.3}, {end:.3}) pad {pad_duration:.3}s{}",
                    if skip { " (exists)" } else { "" }
                );

                SegmentPlan {
                    index,
                    start,
                    end,
                    pad_duration,
                    output_path,
                    skip,
                }
            })
            .collect()
    }

    fn snapped_start(&self, i: usize, video_duration: f64, segment_duration: f64, offset: f64) -> f64 {
        let nominal = nominal_start(i, segment_duration);
        (self.keyframes.nearest(nominal) + offset).clamp(0.0, video_duration)
    }

    fn inner_range(
        &self,
        i: usize,
        video_duration: f64,
        segment_duration: f64,
        offset: f64,
    ) -> (f64, f64, f64) {
        let start = self.snapped_start(i, video_duration, segment_duration, offset);
        let end = (start + segment_duration).min(video_duration);

        if start >= end || end > video_duration {
            let fallback_start = nominal_start(i, segment_duration);
            let fallback_end = (fallback_start + segment_duration).min(video_duration);
            log_correction(
                &SplitError::InvalidTimeRange {
                    start,
                    end,
                    duration: video_duration,
                },
                i + 1,
                fallback_start,
                fallback_end,
            );
            return (fallback_start, fallback_end, 0.0);
        }

        (start, end, 0.0)
    }

    fn last_range(
        &self,
        i: usize,
        video_duration: f64,
        segment_duration: f64,
        offset: f64,
        confirm_long_last: &dyn Fn(f64) -> bool,
    ) -> (f64, f64, f64) {
        let mut start = self.snapped_start(i, video_duration, segment_duration, offset);
        if start >= video_duration {
            let fallback_start = nominal_start(i, segment_duration);
            log_correction(
                &SplitError::InvalidTimeRange {
                    start,
                    end: video_duration,
                    duration: video_duration,
                },
                i + 1,
                fallback_start,
                video_duration,
            );
            start = fallback_start;
        }

        let actual = video_duration - start;
        if actual < segment_duration {
            let pad = segment_duration - actual;
            let pad = if pad < MIN_PAD_SECONDS { 0.0 } else { pad };
            return (start, video_duration, pad);
        }

        if actual > segment_duration && actual <= segment_duration * LONG_LAST_TOLERANCE {
            if confirm_long_last(actual) {
                info!("Final part kept at {actual:.3}s");
                return (start, video_duration, 0.0);
            }
            warn!(
                "Final part clamped to {segment_duration:.3}s, last {:.3}s of the video are not exported",
                actual - segment_duration
            );
        }

        (start, start + segment_duration, 0.0)
    }
}

fn nominal_start(i: usize, segment_duration: f64) -> f64 {
    i as f64 * segment_duration
}

/// Number of parts, never less than one.
#[must_use]
pub fn part_count(video_duration: f64, segment_duration: f64) -> usize {
    let parts = (video_duration / segment_duration).ceil();
    if parts.is_finite() && parts >= 1.0 {
        parts as usize
    } else {
        1
    }
}

fn log_correction(error: &SplitError, index: usize, start: f64, end: f64) {
    warn!("Part {index}: {error}, using unsnapped range [{start:.3}, {end:.3})");
}

/// Layout rooted at `dir` without going through a [`RunConfig`].
#[must_use]
pub fn layout_in(dir: &Path, base_name: &str, extension: &str) -> OutputLayout {
    OutputLayout {
        output_dir: dir.to_path_buf(),
        base_name: base_name.to_string(),
        extension: extension.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;

    const EPS: f64 = 1e-9;

    fn planner(keyframes: &[f64], dir: &Path) -> SegmentPlanner {
        SegmentPlanner::new(
            KeyframeIndex::from_timestamps(keyframes.iter().copied()),
            layout_in(dir, "clip", "mp4"),
        )
    }

    fn never(_: f64) -> bool {
        panic!("confirmation must not be requested")
    }

    #[test]
    fn test_three_parts_with_padded_final() {
        let dir = tempfile::tempdir().unwrap();
        let plans = planner(&[], dir.path()).plan(125.0, 60.0, 0.0, &never);

        assert_eq!(plans.len(), 3);
        let ranges: Vec<_> = plans.iter().map(|p| (p.start, p.end, p.pad_duration)).collect();
        assert_eq!(ranges, vec![(0.0, 60.0, 0.0), (60.0, 120.0, 0.0), (120.0, 125.0, 55.0)]);
        assert_eq!(plans[2].output_path, dir.path().join("clip-part3.mp4"));
        assert!(plans.iter().all(|p| !p.skip));
    }

    #[test]
    fn test_exact_multiple_has_no_padding() {
        let dir = tempfile::tempdir().unwrap();
        let plans = planner(&[], dir.path()).plan(60.0, 60.0, 0.0, &never);
        assert_eq!(plans.len(), 1);
        assert_eq!((plans[0].start, plans[0].end, plans[0].pad_duration), (0.0, 60.0, 0.0));
    }

    #[test]
    fn test_short_video_yields_one_padded_part() {
        let dir = tempfile::tempdir().unwrap();
        let plans = planner(&[], dir.path()).plan(10.0, 60.0, 0.0, &never);
        assert_eq!(plans.len(), 1);
        assert!((plans[0].pad_duration - 50.0).abs() < EPS);
    }

    #[test]
    fn test_declined_long_last_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let asked = Cell::new(None);
        let plans = planner(&[0.0, 60.0], dir.path()).plan(125.0, 60.0, 0.0, &|len| {
            asked.set(Some(len));
            false
        });

        let last = plans.last().unwrap();
        assert!((asked.get().unwrap() - 65.0).abs() < EPS);
        assert!((last.start - 60.0).abs() < EPS);
        assert!((last.end - 120.0).abs() < EPS);
        assert!(last.pad_duration.abs() < EPS);
    }

    #[test]
    fn test_accepted_long_last_keeps_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let plans = planner(&[0.0, 60.0], dir.path()).plan(125.0, 60.0, 0.0, &|_| true);
        let last = plans.last().unwrap();
        assert!((last.end - 125.0).abs() < EPS);
        assert!((last.duration() - 65.0).abs() < EPS);
    }

    #[test]
    fn test_far_overshoot_clamps_without_asking() {
        let dir = tempfile::tempdir().unwrap();
        // Final start snaps back to 40s: 85s remain, beyond the tolerance.
        let plans = planner(&[0.0, 40.0], dir.path()).plan(125.0, 60.0, 0.0, &never);
        let last = plans.last().unwrap();
        assert!((last.start - 40.0).abs() < EPS);
        assert!((last.end - 100.0).abs() < EPS);
    }

    #[test]
    fn test_starts_snap_to_keyframes() {
        let dir = tempfile::tempdir().unwrap();
        let plans = planner(&[0.0, 9.8, 20.4, 29.0], dir.path()).plan(30.0, 10.0, 0.0, &never);
        let starts: Vec<f64> = plans.iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![0.0, 9.8, 20.4]);
        assert!((plans[1].end - 19.8).abs() < EPS);
        assert!((plans[2].end - 30.0).abs() < EPS);
        assert!((plans[2].pad_duration - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_offset_shifts_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let plans = planner(&[], dir.path()).plan(30.0, 10.0, -2.0, &never);
        assert!((plans[0].start - 0.0).abs() < EPS);
        assert!((plans[1].start - 8.0).abs() < EPS);
        assert!((plans[2].start - 18.0).abs() < EPS);
    }

    #[test]
    fn test_degenerate_inner_range_falls_back_to_nominal() {
        let dir = tempfile::tempdir().unwrap();
        // A large offset pushes every start to the end of the video.
        let plans = planner(&[], dir.path()).plan(25.0, 10.0, 100.0, &never);
        assert!((plans[1].start - 10.0).abs() < EPS);
        assert!((plans[1].end - 20.0).abs() < EPS);
        // Final part falls back too and is padded.
        assert!((plans[2].start - 20.0).abs() < EPS);
        assert!((plans[2].pad_duration - 5.0).abs() < EPS);
    }

    #[test]
    fn test_part_count_and_uniform_length() {
        let dir = tempfile::tempdir().unwrap();
        let planner = planner(&[], dir.path());
        for (duration, segment) in [(1.0, 60.0), (59.9, 60.0), (61.0, 60.0), (600.0, 60.0), (7.5, 2.0)] {
            let plans = planner.plan(duration, segment, 0.0, &|_| false);
            assert_eq!(plans.len(), (duration / segment).ceil() as usize);
            for (i, plan) in plans.iter().enumerate() {
                assert_eq!(plan.index, i + 1);
                assert!(plan.start >= 0.0 && plan.start < plan.end);
                assert!((plan.duration() + plan.pad_duration - segment).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_existing_output_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clip-part2.mp4"), b"done").unwrap();
        let plans = planner(&[], dir.path()).plan(125.0, 60.0, 0.0, &never);
        let skipped: Vec<usize> = plans.iter().filter(|p| p.skip).map(|p| p.index).collect();
        assert_eq!(skipped, vec![2]);
    }
}
