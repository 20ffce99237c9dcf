//! Consecutive-frame similarity.
//!
//! [`SimilaritySequencer`] consumes sampled frames in timestamp order and
//! compares each frame's embedding with the embedding of the previously
//! sampled frame. Only that one previous embedding is retained, so memory
//! use is constant no matter how long the video is.
//!
//! Each emitted [`SimilarityPoint`] is keyed by the frame's timestamp
//! truncated toward zero to whole seconds. With a sampling interval of at
//! least one second these keys are strictly increasing; a source that breaks
//! that ordering is reported as [`SceneShiftError::TimestampCollision`]
//! rather than silently overwriting an earlier point.

use crate::{
    configuration::DetectionOptions,
    embedding::{Embedding, FrameEmbedder},
    error::SceneShiftError,
    progress::{OperationType, ProgressTracker},
    video::Frame,
};

/// Similarity between one sampled frame and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityPoint {
    /// Frame timestamp truncated toward zero to whole seconds.
    pub timestamp: u64,
    /// Untruncated frame timestamp in seconds.
    pub source_timestamp: f64,
    /// Cosine similarity with the previous sampled frame, in [-1, 1].
    pub similarity: f64,
}

impl SimilarityPoint {
    /// Build a point from a timestamp in seconds, applying the whole-second
    /// truncation.
    pub fn new(source_timestamp: f64, similarity: f64) -> Self {
        Self {
            timestamp: truncate_seconds(source_timestamp),
            source_timestamp,
            similarity,
        }
    }
}

/// Truncate toward zero to whole seconds. Negative and NaN timestamps map to 0.
pub fn truncate_seconds(seconds: f64) -> u64 {
    // `as` saturates: NaN and negatives become 0.
    seconds.trunc() as u64
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`, accumulated in `f64`.
///
/// The result is clamped to [-1, 1] to absorb rounding overshoot.
///
/// # Errors
///
/// - [`SceneShiftError::EmbeddingDimensionMismatch`] if the lengths differ.
/// - [`SceneShiftError::DegenerateEmbedding`] (with timestamp `0.0`) if
///   either norm is zero or not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SceneShiftError> {
    cosine_similarity_at(a, b, 0.0)
}

fn cosine_similarity_at(a: &[f32], b: &[f32], timestamp: f64) -> Result<f64, SceneShiftError> {
    if a.len() != b.len() {
        return Err(SceneShiftError::EmbeddingDimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 || !denominator.is_finite() || !dot.is_finite() {
        return Err(SceneShiftError::DegenerateEmbedding { timestamp });
    }

    Ok((dot / denominator).clamp(-1.0, 1.0))
}

/// Streaming single-slot similarity calculator.
pub struct SimilaritySequencer<'e, E: FrameEmbedder + ?Sized> {
    embedder: &'e E,
    previous: Option<Vec<f32>>,
    last_timestamp: Option<u64>,
    frames_seen: u64,
}

impl<'e, E: FrameEmbedder + ?Sized> SimilaritySequencer<'e, E> {
    /// Create a sequencer that embeds frames with `embedder`.
    pub fn new(embedder: &'e E) -> Self {
        Self {
            embedder,
            previous: None,
            last_timestamp: None,
            frames_seen: 0,
        }
    }

    /// Embed a sampled frame and compare it with the previous one.
    ///
    /// Returns `None` for the first frame.
    pub fn push(&mut self, frame: &Frame) -> Result<Option<SimilarityPoint>, SceneShiftError> {
        let embedding = self.embedder.embed(&frame.image)?;
        self.push_embedding(frame.timestamp, embedding)
    }

    /// Compare a pre-computed embedding with the previous one.
    ///
    /// Callers must supply embeddings in timestamp order.
    pub fn push_embedding(
        &mut self,
        timestamp: f64,
        embedding: Embedding,
    ) -> Result<Option<SimilarityPoint>, SceneShiftError> {
        let current = embedding.flatten();
        self.frames_seen += 1;

        let key = truncate_seconds(timestamp);
        if let Some(last) = self.last_timestamp
            && key <= last
        {
            return Err(SceneShiftError::TimestampCollision { timestamp: key });
        }
        self.last_timestamp = Some(key);

        let point = match &self.previous {
            None => None,
            Some(previous) => {
                if previous.len() != current.len() {
                    return Err(SceneShiftError::EmbeddingDimensionMismatch {
                        expected: previous.len(),
                        actual: current.len(),
                    });
                }
                let similarity = cosine_similarity_at(&current, previous, timestamp)?;
                Some(SimilarityPoint::new(timestamp, similarity))
            }
        };

        self.previous = Some(current);
        Ok(point)
    }

    /// Number of frames pushed so far.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

/// Embed and compare every frame of an already sampled sequence.
///
/// Cancellation is checked before each frame; progress is reported under
/// [`OperationType::Embedding`]. `expected_frames` only feeds progress
/// percentages.
pub fn similarity_sequence<I, E>(
    frames: I,
    embedder: &E,
    options: &DetectionOptions,
    expected_frames: Option<u64>,
) -> Result<Vec<SimilarityPoint>, SceneShiftError>
where
    I: IntoIterator<Item = Result<Frame, SceneShiftError>>,
    E: FrameEmbedder + ?Sized,
{
    let mut sequencer = SimilaritySequencer::new(embedder);
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Embedding,
        expected_frames,
        options.batch_size,
    );
    let mut points = Vec::new();

    for frame in frames {
        if options.is_cancelled() {
            return Err(SceneShiftError::Cancelled);
        }
        let frame = frame?;
        if let Some(point) = sequencer.push(&frame)? {
            points.push(point);
        }
        tracker.advance(Some(frame.timestamp));
    }

    tracker.finish();
    log::debug!(
        "Compared {} sampled frames with {} ({} similarity points)",
        sequencer.frames_seen(),
        embedder.name(),
        points.len(),
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgb, RgbImage};

    use super::*;
    use crate::embedding::FnEmbedder;

    fn frame(timestamp: f64, shade: u8) -> Frame {
        Frame::new(
            timestamp,
            DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([shade, 0, 0]))),
        )
    }

    /// Embeds the red value of the first pixel as `[red, 1]`.
    fn red_embedder() -> FnEmbedder<impl Fn(&DynamicImage) -> Result<Embedding, SceneShiftError>>
    {
        FnEmbedder::new(|image: &DynamicImage| {
            let red = image.to_rgb8().get_pixel(0, 0)[0] as f32;
            Ok(Embedding::new(vec![red, 1.0]))
        })
    }

    #[test]
    fn cosine_of_known_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_is_scale_invariant() {
        let a = [0.3, -1.2, 4.0];
        let b = [0.6, -2.4, 8.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_norm_fails_loudly() {
        let error = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(error, SceneShiftError::DegenerateEmbedding { .. }));
    }

    #[test]
    fn length_mismatch_is_reported() {
        let error = cosine_similarity(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            error,
            SceneShiftError::EmbeddingDimensionMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn first_frame_emits_nothing() {
        let embedder = red_embedder();
        let mut sequencer = SimilaritySequencer::new(&embedder);
        assert_eq!(sequencer.push(&frame(0.0, 10)).unwrap(), None);
        let point = sequencer.push(&frame(1.7, 10)).unwrap().unwrap();
        assert_eq!(point.timestamp, 1);
        assert!((point.source_timestamp - 1.7).abs() < 1e-12);
        assert!((point.similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn compares_with_previous_sampled_frame_only() {
        let embedder = FnEmbedder::new(|image: &DynamicImage| {
            let red = image.to_rgb8().get_pixel(0, 0)[0];
            // Orthogonal embeddings for "dark" and "bright" frames.
            Ok(Embedding::new(if red < 128 {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            }))
        });
        let frames = vec![
            Ok(frame(0.0, 0)),
            Ok(frame(1.0, 0)),
            Ok(frame(2.0, 255)),
            Ok(frame(3.0, 255)),
        ];
        let points =
            similarity_sequence(frames, &embedder, &DetectionOptions::new(), None).unwrap();
        let timestamps: Vec<u64> = points.iter().map(|point| point.timestamp).collect();
        let similarities: Vec<f64> = points.iter().map(|point| point.similarity).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
        assert!((similarities[0] - 1.0).abs() < 1e-12);
        assert!(similarities[1].abs() < 1e-12);
        assert!((similarities[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_embedding_carries_timestamp() {
        let embedder = FnEmbedder::new(|image: &DynamicImage| {
            let red = image.to_rgb8().get_pixel(0, 0)[0] as f32;
            Ok(Embedding::new(vec![red, 0.0]))
        });
        let mut sequencer = SimilaritySequencer::new(&embedder);
        sequencer.push(&frame(0.0, 50)).unwrap();
        let error = sequencer.push(&frame(2.5, 0)).unwrap_err();
        match error {
            SceneShiftError::DegenerateEmbedding { timestamp } => {
                assert!((timestamp - 2.5).abs() < 1e-12)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shape_change_mid_stream_is_rejected() {
        let embedder = red_embedder();
        let mut sequencer = SimilaritySequencer::new(&embedder);
        sequencer
            .push_embedding(0.0, Embedding::new(vec![1.0, 2.0]))
            .unwrap();
        let error = sequencer
            .push_embedding(1.0, Embedding::new(vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(matches!(
            error,
            SceneShiftError::EmbeddingDimensionMismatch { .. }
        ));
    }

    #[test]
    fn multi_dimensional_embeddings_are_flattened() {
        let embedder = red_embedder();
        let mut sequencer = SimilaritySequencer::new(&embedder);
        let shaped = |values: Vec<f32>| Embedding::from_shape(vec![1, 2, 1, 1], values).unwrap();
        sequencer.push_embedding(0.0, shaped(vec![1.0, 0.0])).unwrap();
        let point = sequencer
            .push_embedding(1.0, Embedding::new(vec![1.0, 0.0]))
            .unwrap()
            .unwrap();
        assert!((point.similarity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn truncation_collision_is_an_error() {
        let embedder = red_embedder();
        let mut sequencer = SimilaritySequencer::new(&embedder);
        sequencer.push(&frame(1.1, 10)).unwrap();
        let error = sequencer.push(&frame(1.9, 20)).unwrap_err();
        assert!(matches!(
            error,
            SceneShiftError::TimestampCollision { timestamp: 1 }
        ));
    }

    #[test]
    fn one_second_spacing_never_collides() {
        // Worst case: frames just below and above a whole second.
        let embedder = red_embedder();
        let mut sequencer = SimilaritySequencer::new(&embedder);
        let mut keys = Vec::new();
        for timestamp in [0.999, 1.999, 2.999, 3.9995] {
            if let Some(point) = sequencer.push(&frame(timestamp, 10)).unwrap() {
                keys.push(point.timestamp);
            }
        }
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn truncation_is_toward_zero() {
        assert_eq!(truncate_seconds(2.999), 2);
        assert_eq!(truncate_seconds(0.0), 0);
        assert_eq!(truncate_seconds(-0.5), 0);
        assert_eq!(truncate_seconds(f64::NAN), 0);
    }

    #[test]
    fn cancellation_stops_the_sequence() {
        let token = crate::progress::CancellationToken::new();
        token.cancel();
        let options = DetectionOptions::new().with_cancellation(token);
        let frames = vec![Ok(frame(0.0, 1)), Ok(frame(1.0, 1))];
        let error = similarity_sequence(frames, &red_embedder(), &options, None).unwrap_err();
        assert!(matches!(error, SceneShiftError::Cancelled));
    }
}
