use crate::tools::{FrameInfo, MediaProber};
use log::{debug, warn};
use std::path::Path;

/// Sorted, deduplicated keyframe timestamps of one source, in seconds.
///
/// An empty index is valid: lookups then return the query unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeIndex {
    timestamps: Vec<f64>,
}

impl KeyframeIndex {
    /// Probe `path` for keyframes. Probe failures are logged and produce an
    /// empty index.
    pub fn build(prober: &dyn MediaProber, path: &Path) -> Self {
        match prober.frames(path) {
            Ok(frames) => {
                let index = Self::from_frames(&frames);
                debug!(
                    "Indexed {} keyframes out of {} frames in {}",
                    index.len(),
                    frames.len(),
                    path.display()
                );
                index
            }
            Err(e) => {
                warn!(
                    "Keyframe probe failed for {}, boundaries will not be snapped: {e}",
                    path.display()
                );
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn from_frames(frames: &[FrameInfo]) -> Self {
        Self::from_timestamps(
            frames
                .iter()
                .filter(|f| f.is_keyframe())
                .filter_map(FrameInfo::timestamp),
        )
    }

    /// Negative and non-finite values are dropped.
    pub fn from_timestamps(timestamps: impl IntoIterator<Item = f64>) -> Self {
        let mut timestamps: Vec<f64> = timestamps
            .into_iter()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .collect();
        timestamps.sort_by(f64::total_cmp);
        timestamps.dedup();
        Self { timestamps }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    #[must_use]
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Keyframe closest to `t`. Equal distances resolve to the earlier one.
    #[must_use]
    pub fn nearest(&self, t: f64) -> f64 {
        let idx = self.timestamps.partition_point(|&k| k < t);
        let before = idx.checked_sub(1).map(|i| self.timestamps[i]);
        let after = self.timestamps.get(idx).copied();

        match (before, after) {
            (None, None) => t,
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (Some(b), Some(a)) => {
                if t - b <= a - t {
                    b
                } else {
                    a
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SplitError, Tool};
    use std::path::PathBuf;

    struct FailingProber;

    impl MediaProber for FailingProber {
        fn video_metadata(&self, _path: &Path) -> Result<crate::tools::VideoMetadata, SplitError> {
            Err(SplitError::Probe("unused".to_string()))
        }

        fn frames(&self, _path: &Path) -> Result<Vec<FrameInfo>, SplitError> {
            Err(SplitError::ToolUnavailable {
                tool: Tool::Ffprobe,
                path: PathBuf::from("ffprobe"),
            })
        }
    }

    fn frame(pict_type: &str, pts: Option<f64>, best_effort: Option<f64>) -> FrameInfo {
        FrameInfo {
            pict_type: Some(pict_type.to_string()),
            pts_time: pts,
            best_effort_time: best_effort,
        }
    }

    #[test]
    fn test_empty_index_returns_query() {
        let index = KeyframeIndex::default();
        assert!(index.is_empty());
        assert!((index.nearest(42.5) - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nearest_picks_closest() {
        let index = KeyframeIndex::from_timestamps([0.0, 2.0, 4.0, 10.0]);
        assert!((index.nearest(3.1) - 4.0).abs() < f64::EPSILON);
        assert!((index.nearest(2.9) - 2.0).abs() < f64::EPSILON);
        assert!((index.nearest(100.0) - 10.0).abs() < f64::EPSILON);
        assert!((index.nearest(-5.0) - 0.0).abs() < f64::EPSILON);
        assert!((index.nearest(4.0) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nearest_tie_prefers_earlier() {
        let index = KeyframeIndex::from_timestamps([2.0, 4.0]);
        assert!((index.nearest(3.0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_timestamps_sorts_and_dedups() {
        let index = KeyframeIndex::from_timestamps([4.0, 0.0, 2.0, 2.0, -1.0, f64::NAN]);
        assert_eq!(index.timestamps(), &[0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_from_frames_keeps_intra_frames_only() {
        let frames = vec![
            frame("I", Some(0.0), None),
            frame("P", Some(0.5), None),
            frame("B", Some(0.6), None),
            frame("I", None, Some(2.0)),
            frame("I", None, None),
        ];
        let index = KeyframeIndex::from_frames(&frames);
        assert_eq!(index.timestamps(), &[0.0, 2.0]);
    }

    #[test]
    fn test_probe_failure_yields_empty_index() {
        let index = KeyframeIndex::build(&FailingProber, Path::new("missing.mp4"));
        assert!(index.is_empty());
    }
}
