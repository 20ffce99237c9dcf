//! Scene boundary selection over a similarity sequence.
//!
//! A sampled frame starts a new scene when its similarity with the previous
//! sampled frame is unusually low. Two criteria are combined with a logical
//! OR:
//!
//! - **Threshold**: `similarity <= mean - alpha * std_dev`, using the
//!   population standard deviation of the whole sequence.
//! - **Percentile**: `similarity <= P(rank)`, where the rank is derived from
//!   the desired number of cuts per minute (`rank = round(100 * fpm / 60)`,
//!   clamped to [0, 100]) and `P` is the linearly interpolated percentile of
//!   the sequence.
//!
//! Scene changes are reported in input order with the criterion that fired.

use std::fmt::{self, Display, Formatter};

use crate::{error::SceneShiftError, similarity::SimilarityPoint};

/// Summary statistics of a similarity sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation (divide by `n`).
    pub std_dev: f64,
    /// Smallest similarity.
    pub min: f64,
    /// Largest similarity.
    pub max: f64,
    /// Number of points.
    pub count: usize,
}

impl Statistics {
    /// Compute statistics over `scores`. Returns `None` for an empty slice.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let count = scores.len();
        let n = count as f64;

        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &score in scores {
            sum += score;
            min = min.min(score);
            max = max.max(score);
        }
        let mean = sum / n;

        let mut squared = 0.0;
        for &score in scores {
            let delta = score - mean;
            squared += delta * delta;
        }

        Some(Self {
            mean,
            std_dev: (squared / n).sqrt(),
            min,
            max,
            count,
        })
    }
}

/// Which criterion selected a scene change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneTrigger {
    /// At or below `mean - alpha * std_dev`.
    Threshold,
    /// Above the threshold but at or below the percentile value.
    Percentile,
}

impl Display for SceneTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SceneTrigger::Threshold => write!(f, "threshold"),
            SceneTrigger::Percentile => write!(f, "percentile"),
        }
    }
}

/// One detected scene boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneChange {
    /// Whole-second timestamp of the first frame of the new scene.
    pub timestamp: u64,
    /// Similarity of that frame with its predecessor.
    pub similarity: f64,
    /// Criterion that selected it.
    pub trigger: SceneTrigger,
}

/// Full result of segmenting one similarity sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Sequence statistics.
    pub statistics: Statistics,
    /// `mean - alpha * std_dev`.
    pub threshold: f64,
    /// Rank computed from the frames-per-minute parameter before clamping.
    pub requested_percentile_rank: f64,
    /// Rank actually used, in [0, 100].
    pub percentile_rank: f64,
    /// Percentile of the sequence at [`percentile_rank`](Self::percentile_rank).
    pub percentile_value: f64,
    /// Scene changes in ascending timestamp order.
    pub changes: Vec<SceneChange>,
}

impl Segmentation {
    /// Whether the requested percentile rank fell outside [0, 100].
    pub fn rank_was_clamped(&self) -> bool {
        self.requested_percentile_rank != self.percentile_rank
    }

    /// Timestamps of the scene changes.
    pub fn timestamps(&self) -> Vec<u64> {
        self.changes.iter().map(|change| change.timestamp).collect()
    }

    /// Number of changes selected by `trigger`.
    pub fn count_by(&self, trigger: SceneTrigger) -> usize {
        self.changes
            .iter()
            .filter(|change| change.trigger == trigger)
            .count()
    }
}

/// Unclamped percentile rank for a desired number of cuts per minute.
///
/// Exact halves round to the even neighbour.
pub fn requested_percentile_rank(frame_per_minute: f64) -> f64 {
    ((1.0 / 60.0) * 100.0 * frame_per_minute).round_ties_even()
}

/// Percentile rank for `frame_per_minute`, clamped to [0, 100].
pub fn percentile_rank(frame_per_minute: f64) -> f64 {
    requested_percentile_rank(frame_per_minute).clamp(0.0, 100.0)
}

/// Linearly interpolated percentile of `scores` at `rank` (0..=100).
///
/// The sorted position is `rank / 100 * (n - 1)`; values between two
/// neighbours are interpolated. `rank` is clamped to [0, 100].
///
/// # Errors
///
/// [`SceneShiftError::EmptySimilaritySequence`] if `scores` is empty.
pub fn percentile(scores: &[f64], rank: f64) -> Result<f64, SceneShiftError> {
    if scores.is_empty() {
        return Err(SceneShiftError::EmptySimilaritySequence);
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(interpolate_sorted(&sorted, rank.clamp(0.0, 100.0)))
}

fn interpolate_sorted(sorted: &[f64], rank: f64) -> f64 {
    let last = sorted.len() - 1;
    let position = rank / 100.0 * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn check_finite(name: &'static str, value: f64) -> Result<(), SceneShiftError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SceneShiftError::InvalidParameter {
            name,
            value,
            reason: "must be finite",
        })
    }
}

/// Select scene boundaries from a similarity sequence.
///
/// # Errors
///
/// - [`SceneShiftError::InvalidParameter`] if `alpha` or `frame_per_minute`
///   is not finite.
/// - [`SceneShiftError::EmptySimilaritySequence`] if `points` is empty.
///
/// # Example
///
/// ```
/// use sceneshift::{segment, SimilarityPoint};
///
/// let points: Vec<_> = [(1.0, 0.95), (2.0, 0.10), (3.0, 0.92), (4.0, 0.93)]
///     .into_iter()
///     .map(|(t, s)| SimilarityPoint::new(t, s))
///     .collect();
/// let segmentation = segment(&points, 1.0, 0.0)?;
/// assert_eq!(segmentation.timestamps(), vec![2]);
/// # Ok::<(), sceneshift::SceneShiftError>(())
/// ```
pub fn segment(
    points: &[SimilarityPoint],
    alpha: f64,
    frame_per_minute: f64,
) -> Result<Segmentation, SceneShiftError> {
    check_finite("alpha", alpha)?;
    check_finite("frame_per_minute", frame_per_minute)?;

    let scores: Vec<f64> = points.iter().map(|point| point.similarity).collect();
    let statistics =
        Statistics::from_scores(&scores).ok_or(SceneShiftError::EmptySimilaritySequence)?;
    let threshold = statistics.mean - alpha * statistics.std_dev;

    let requested_rank = requested_percentile_rank(frame_per_minute);
    let rank = requested_rank.clamp(0.0, 100.0);
    if rank != requested_rank {
        log::warn!(
            "Percentile rank {requested_rank} from {frame_per_minute} frames per minute is out of range; using {rank}"
        );
    }
    let percentile_value = percentile(&scores, rank)?;

    let changes: Vec<SceneChange> = points
        .iter()
        .filter_map(|point| {
            let trigger = if point.similarity <= threshold {
                SceneTrigger::Threshold
            } else if point.similarity <= percentile_value {
                SceneTrigger::Percentile
            } else {
                return None;
            };
            Some(SceneChange {
                timestamp: point.timestamp,
                similarity: point.similarity,
                trigger,
            })
        })
        .collect();

    log::debug!(
        "Segmented {} points: mean {:.4}, std {:.4}, threshold {:.4}, p{} = {:.4}, {} changes",
        statistics.count,
        statistics.mean,
        statistics.std_dev,
        threshold,
        rank,
        percentile_value,
        changes.len(),
    );

    Ok(Segmentation {
        statistics,
        threshold,
        requested_percentile_rank: requested_rank,
        percentile_rank: rank,
        percentile_value,
        changes,
    })
}

/// Timestamps of scene changes in a similarity sequence.
///
/// Shorthand for [`segment`] followed by [`Segmentation::timestamps`].
pub fn detect_from_similarities(
    points: &[SimilarityPoint],
    alpha: f64,
    frame_per_minute: f64,
) -> Result<Vec<u64>, SceneShiftError> {
    Ok(segment(points, alpha, frame_per_minute)?.timestamps())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(pairs: &[(u64, f64)]) -> Vec<SimilarityPoint> {
        pairs
            .iter()
            .map(|&(timestamp, similarity)| SimilarityPoint::new(timestamp as f64, similarity))
            .collect()
    }

    #[test]
    fn statistics_use_population_deviation() {
        let statistics = Statistics::from_scores(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((statistics.mean - 5.0).abs() < 1e-12);
        assert!((statistics.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(statistics.min, 2.0);
        assert_eq!(statistics.max, 9.0);
        assert!(Statistics::from_scores(&[]).is_none());
    }

    #[test]
    fn rank_follows_cuts_per_minute() {
        assert_eq!(percentile_rank(0.0), 0.0);
        assert_eq!(percentile_rank(1.0), 2.0);
        assert_eq!(percentile_rank(3.0), 5.0);
        assert_eq!(percentile_rank(6.0), 10.0);
        assert_eq!(percentile_rank(60.0), 100.0);
    }

    #[test]
    fn rank_is_clamped() {
        assert_eq!(requested_percentile_rank(120.0), 200.0);
        assert_eq!(percentile_rank(120.0), 100.0);
        assert_eq!(percentile_rank(-6.0), 0.0);
    }

    #[test]
    fn percentile_interpolates() {
        let scores = [0.4, 0.1, 0.3, 0.2];
        assert!((percentile(&scores, 0.0).unwrap() - 0.1).abs() < 1e-12);
        assert!((percentile(&scores, 100.0).unwrap() - 0.4).abs() < 1e-12);
        assert!((percentile(&scores, 50.0).unwrap() - 0.25).abs() < 1e-12);
        assert!((percentile(&scores, 10.0).unwrap() - 0.13).abs() < 1e-12);
        assert!(percentile(&[], 50.0).is_err());
    }

    #[test]
    fn single_sharp_drop_is_found() {
        let input = points(&[(1, 0.95), (2, 0.10), (3, 0.92), (4, 0.93)]);
        let segmentation = segment(&input, 1.0, 0.0).unwrap();
        assert_eq!(segmentation.timestamps(), vec![2]);
        assert_eq!(segmentation.changes[0].trigger, SceneTrigger::Threshold);
        assert!((segmentation.statistics.mean - 0.725).abs() < 1e-9);
    }

    #[test]
    fn percentile_catches_points_above_threshold() {
        let input = points(&[(1, 0.9), (2, 0.8), (3, 0.85), (4, 0.95), (5, 0.9)]);
        // Huge alpha disables the threshold; rank 100 selects everything.
        let segmentation = segment(&input, 100.0, 60.0).unwrap();
        assert_eq!(segmentation.timestamps(), vec![1, 2, 3, 4, 5]);
        assert_eq!(segmentation.count_by(SceneTrigger::Percentile), 5);
        assert_eq!(segmentation.count_by(SceneTrigger::Threshold), 0);
    }

    #[test]
    fn constant_sequence_selects_every_point() {
        let input = points(&[(1, 0.5), (2, 0.5), (3, 0.5)]);
        let segmentation = segment(&input, 1.0, 0.0).unwrap();
        assert_eq!(segmentation.statistics.std_dev, 0.0);
        assert_eq!(segmentation.percentile_value, 0.5);
        assert_eq!(segmentation.timestamps(), vec![1, 2, 3]);
    }

    #[test]
    fn percentile_of_constant_scores_is_the_constant() {
        let scores = [0.7; 5];
        for rank in [0.0, 2.0, 37.0, 50.0, 100.0] {
            assert_eq!(percentile(&scores, rank).unwrap(), 0.7);
        }
    }

    #[test]
    fn larger_alpha_never_adds_changes() {
        let input = points(&[
            (1, 0.97),
            (2, 0.40),
            (3, 0.91),
            (4, 0.75),
            (5, 0.99),
            (6, 0.62),
            (7, 0.88),
        ]);
        let mut previous = usize::MAX;
        for alpha in [-1.0, 0.0, 0.5, 1.0, 2.0, 4.0] {
            let count = segment(&input, alpha, 0.0).unwrap().changes.len();
            assert!(count <= previous, "alpha {alpha} produced {count} > {previous}");
            previous = count;
        }
    }

    #[test]
    fn out_of_range_rank_is_recorded() {
        let input = points(&[(1, 0.2), (2, 0.9)]);
        let segmentation = segment(&input, 1.0, 300.0).unwrap();
        assert!(segmentation.rank_was_clamped());
        assert_eq!(segmentation.percentile_rank, 100.0);
        assert_eq!(segmentation.timestamps(), vec![1, 2]);

        let segmentation = segment(&input, 1.0, -10.0).unwrap();
        assert!(segmentation.rank_was_clamped());
        assert_eq!(segmentation.percentile_rank, 0.0);
    }

    #[test]
    fn empty_input_is_an_error() {
        let error = segment(&[], 1.0, 0.0).unwrap_err();
        assert!(matches!(error, SceneShiftError::EmptySimilaritySequence));
    }

    #[test]
    fn non_finite_parameters_are_rejected() {
        let input = points(&[(1, 0.5)]);
        assert!(matches!(
            segment(&input, f64::NAN, 0.0),
            Err(SceneShiftError::InvalidParameter { name: "alpha", .. })
        ));
        assert!(matches!(
            segment(&input, 1.0, f64::INFINITY),
            Err(SceneShiftError::InvalidParameter {
                name: "frame_per_minute",
                ..
            })
        ));
    }

    #[test]
    fn single_point_is_always_a_change() {
        // One point: std 0, threshold equals the point itself.
        let input = points(&[(7, 0.3)]);
        assert_eq!(detect_from_similarities(&input, 1.0, 0.0).unwrap(), vec![7]);
    }
}
