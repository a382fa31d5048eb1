use thiserror::Error;

use crate::shared::constants::{BYTES_PER_MB, MAX_UPLOAD_BYTES, SEGMENT_CEILING_BYTES};

/// A trailing remainder shorter than this is folded into the previous segment.
pub const MIN_TRAILING_SEGMENT_SECS: f64 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum PlanError {
    #[error("audio duration must be positive, got {0}")]
    InvalidDuration(f64),
    #[error(
        "estimated segment duration rounds to zero ({duration:.1}s of audio in {size_mb:.1}MB); \
         the file's bitrate is too high to split"
    )]
    SegmentTooShort { duration: f64, size_mb: f64 },
}

/// Time-based split of one file into segments of a fixed nominal duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub total_duration: f64,
    pub segment_duration: u64,
    pub segment_count: usize,
}

impl SplitPlan {
    /// `(start, duration)` of each segment. The last one takes the remainder,
    /// which can run up to `MIN_TRAILING_SEGMENT_SECS` past the nominal duration.
    pub fn segment_bounds(&self) -> Vec<(f64, f64)> {
        let step = self.segment_duration as f64;
        let last = self.segment_count.saturating_sub(1);
        (0..self.segment_count)
            .map(|i| {
                let start = i as f64 * step;
                if i == last {
                    (start, self.total_duration - start)
                } else {
                    (start, step)
                }
            })
            .collect()
    }
}

/// Decides whether a file fits one recognition request or must be split.
///
/// Splitting assumes a roughly constant bitrate, so real segment sizes can land
/// slightly over or under the ceiling.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    upload_limit_bytes: u64,
    ceiling_bytes: u64,
}

impl ChunkPlanner {
    pub fn new(upload_limit_bytes: u64, ceiling_bytes: u64) -> Self {
        Self {
            upload_limit_bytes,
            ceiling_bytes,
        }
    }

    pub fn upload_limit_bytes(&self) -> u64 {
        self.upload_limit_bytes
    }

    pub fn requires_split(&self, size_bytes: u64) -> bool {
        size_bytes > self.upload_limit_bytes
    }

    /// `segment_duration = floor(duration * ceiling / size)`,
    /// `segment_count = ceil(duration / segment_duration)`, minus one when the
    /// trailing remainder is too short to be worth its own request.
    pub fn plan_split(&self, size_bytes: u64, duration: f64) -> Result<SplitPlan, PlanError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PlanError::InvalidDuration(duration));
        }
        let size_mb = size_bytes as f64 / BYTES_PER_MB as f64;
        let ceiling_mb = self.ceiling_bytes as f64 / BYTES_PER_MB as f64;

        let segment_duration = (duration * ceiling_mb / size_mb).floor();
        if !segment_duration.is_finite() || segment_duration < 1.0 {
            return Err(PlanError::SegmentTooShort { duration, size_mb });
        }
        let segment_duration = segment_duration as u64;
        let step = segment_duration as f64;
        let mut segment_count = (duration / step).ceil() as usize;
        let tail = duration - (segment_count - 1) as f64 * step;
        if segment_count > 1 && tail < MIN_TRAILING_SEGMENT_SECS {
            segment_count -= 1;
        }

        log::debug!(
            "Split plan: {size_mb:.1}MB, {duration:.1}s -> {segment_count} x {segment_duration}s"
        );

        Ok(SplitPlan {
            total_duration: duration,
            segment_duration,
            segment_count,
        })
    }
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES, SEGMENT_CEILING_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const MB: u64 = BYTES_PER_MB;

    #[rstest]
    #[case::small(MB, false)]
    #[case::at_limit(25 * MB, false)]
    #[case::just_over(25 * MB + 1, true)]
    #[case::large(400 * MB, true)]
    fn test_requires_split(#[case] size: u64, #[case] expected: bool) {
        assert_eq!(ChunkPlanner::default().requires_split(size), expected);
    }

    #[test]
    fn test_forty_megabyte_wav_splits_in_two() {
        let plan = ChunkPlanner::default().plan_split(40 * MB, 1200.0).unwrap();
        assert_eq!(plan.segment_duration, 600);
        assert_eq!(plan.segment_count, 2);
        assert_eq!(plan.segment_bounds(), vec![(0.0, 600.0), (600.0, 600.0)]);
    }

    #[test]
    fn test_last_segment_takes_remainder() {
        let plan = ChunkPlanner::default().plan_split(50 * MB, 1000.0).unwrap();
        assert_eq!(plan.segment_duration, 400);
        assert_eq!(plan.segment_count, 3);
        let bounds = plan.segment_bounds();
        assert_relative_eq!(bounds[2].0, 800.0);
        assert_relative_eq!(bounds[2].1, 200.0);
        let total: f64 = bounds.iter().map(|(_, d)| d).sum();
        assert_relative_eq!(total, 1000.0);
    }

    #[rstest]
    #[case(26 * MB, 60.0)]
    #[case(26 * MB, 3600.0)]
    #[case(40 * MB, 1200.0)]
    #[case(97 * MB + 12345, 5432.1)]
    #[case(500 * MB, 36000.0)]
    #[case(2048 * MB, 86399.0)]
    fn test_segments_fit_ceiling_at_constant_bitrate(#[case] size: u64, #[case] duration: f64) {
        let planner = ChunkPlanner::default();
        let plan = planner.plan_split(size, duration).unwrap();
        let bytes_per_sec = size as f64 / duration;
        let tolerance = 1.0 + 1e-9;
        for (_, seg_duration) in plan.segment_bounds() {
            assert!(seg_duration > 0.0);
            assert!(seg_duration * bytes_per_sec <= SEGMENT_CEILING_BYTES as f64 * tolerance);
        }
        let covered: f64 = plan.segment_bounds().iter().map(|(_, d)| d).sum();
        assert_relative_eq!(covered, duration, max_relative = 1e-9);
    }

    #[test]
    fn test_float_residue_does_not_create_sliver_segment() {
        let plan = ChunkPlanner::default()
            .plan_split(40 * MB, 1200.0000001)
            .unwrap();
        assert_eq!(plan.segment_duration, 600);
        assert_eq!(plan.segment_count, 2);
        let bounds = plan.segment_bounds();
        assert_relative_eq!(bounds[1].0, 600.0);
        assert_relative_eq!(bounds[1].1, 600.0000001, epsilon = 1e-9);
    }

    #[test]
    fn test_short_tail_merged_but_longer_tail_kept() {
        let planner = ChunkPlanner::default();
        assert_eq!(planner.plan_split(40 * MB, 1200.4).unwrap().segment_count, 2);
        assert_eq!(planner.plan_split(40 * MB, 1200.6).unwrap().segment_count, 3);
    }

    #[test]
    fn test_zero_segment_duration_fails_fast() {
        let err = ChunkPlanner::default().plan_split(30_000 * MB, 1.0).unwrap_err();
        assert!(matches!(err, PlanError::SegmentTooShort { .. }));
        assert!(err.to_string().contains("too high"));
    }

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-5.0)]
    #[case::nan(f64::NAN)]
    fn test_invalid_duration_rejected(#[case] duration: f64) {
        assert!(matches!(
            ChunkPlanner::default().plan_split(30 * MB, duration),
            Err(PlanError::InvalidDuration(_))
        ));
    }
}
