//! Parallel frame embedding.
//!
//! Decoding stays sequential (one demuxer, one decoder), but embedding is
//! usually the expensive step. [`parallel_similarity_sequence`] pulls sampled
//! frames into fixed-size batches, embeds each batch across the rayon pool
//! and feeds the embeddings back to a [`SimilaritySequencer`] in timestamp
//! order. At most one batch of decoded frames is held in memory.
//!
//! Enabled with the `rayon` feature and used internally by
//! [`SceneDetector`](crate::SceneDetector).

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::configuration::DetectionOptions;
use crate::embedding::{Embedding, FrameEmbedder};
use crate::error::SceneShiftError;
use crate::progress::{OperationType, ProgressTracker};
use crate::similarity::{SimilarityPoint, SimilaritySequencer};
use crate::video::Frame;

/// Frames per worker thread gathered before each parallel embedding pass.
const FRAMES_PER_THREAD: usize = 2;

/// Parallel counterpart of [`similarity_sequence`](crate::similarity_sequence).
///
/// Produces the same points in the same order; only the embedding calls run
/// concurrently.
pub(crate) fn parallel_similarity_sequence<I, E>(
    frames: I,
    embedder: &E,
    options: &DetectionOptions,
    expected_frames: Option<u64>,
) -> Result<Vec<SimilarityPoint>, SceneShiftError>
where
    I: IntoIterator<Item = Result<Frame, SceneShiftError>>,
    E: FrameEmbedder + ?Sized,
{
    let batch_len = (::rayon::current_num_threads() * FRAMES_PER_THREAD).max(1);
    let mut sequencer = SimilaritySequencer::new(embedder);
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Embedding,
        expected_frames,
        options.batch_size,
    );
    let mut points = Vec::new();
    let mut batch: Vec<Frame> = Vec::with_capacity(batch_len);
    let mut frames = frames.into_iter();

    loop {
        batch.clear();
        for frame in frames.by_ref() {
            if options.is_cancelled() {
                return Err(SceneShiftError::Cancelled);
            }
            batch.push(frame?);
            if batch.len() == batch_len {
                break;
            }
        }
        if batch.is_empty() {
            break;
        }

        // Indexed collect keeps the batch order.
        let embeddings: Vec<Embedding> = batch
            .par_iter()
            .map(|frame| embedder.embed(&frame.image))
            .collect::<Result<_, _>>()?;

        for (frame, embedding) in batch.iter().zip(embeddings) {
            if let Some(point) = sequencer.push_embedding(frame.timestamp, embedding)? {
                points.push(point);
            }
            tracker.advance(Some(frame.timestamp));
        }

        if batch.len() < batch_len {
            break;
        }
    }

    tracker.finish();
    log::debug!(
        "Compared {} sampled frames with {} on {} threads ({} similarity points)",
        sequencer.frames_seen(),
        embedder.name(),
        ::rayon::current_num_threads(),
        points.len(),
    );
    Ok(points)
}
