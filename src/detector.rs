//! End-to-end scene change detection.
//!
//! [`SceneDetector`] ties the pipeline together: it opens the video, samples
//! frames with the configured debounce interval, embeds each sampled frame,
//! computes consecutive similarities and segments them. The embedder is owned
//! by the detector and reused for every video it processes, so an expensive
//! model is loaded once.
//!
//! # Example
//!
//! ```no_run
//! use sceneshift::{ColorHistogramEmbedder, DetectionOptions, SceneDetector, SceneShiftError};
//!
//! let detector = SceneDetector::new(ColorHistogramEmbedder::new())
//!     .with_options(DetectionOptions::new().with_alpha(1.5).with_frame_per_minute(2.0));
//! let cuts = detector.detect_scene_changes("input.mp4")?;
//! println!("scene changes at {cuts:?} seconds");
//! # Ok::<(), SceneShiftError>(())
//! ```

use std::path::Path;

use crate::{
    configuration::DetectionOptions,
    embedding::FrameEmbedder,
    error::SceneShiftError,
    metadata::VideoMetadata,
    progress::{OperationType, ProgressTracker},
    segmenter::{Segmentation, segment},
    similarity::SimilarityPoint,
    video::{Frame, VideoFile},
};

/// Everything computed for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAnalysis {
    /// Consecutive-frame similarities in timestamp order.
    pub similarities: Vec<SimilarityPoint>,
    /// Statistics, cut-offs and selected scene changes.
    pub segmentation: Segmentation,
    /// Container metadata, when the frames came from a file.
    pub metadata: Option<VideoMetadata>,
}

impl SceneAnalysis {
    /// Whole-second timestamps of the detected scene changes.
    pub fn scene_changes(&self) -> Vec<u64> {
        self.segmentation.timestamps()
    }
}

/// Reusable scene change detector.
pub struct SceneDetector<E> {
    embedder: E,
    options: DetectionOptions,
}

impl<E: FrameEmbedder> SceneDetector<E> {
    /// Create a detector with default options (`alpha = 0`,
    /// `frame_per_minute = 0`, one-second sampling).
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            options: DetectionOptions::default(),
        }
    }

    /// Replace the detection options.
    #[must_use]
    pub fn with_options(mut self, options: DetectionOptions) -> Self {
        self.options = options;
        self
    }

    /// The current detection options.
    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    /// The embedder used for every frame.
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Detect scene changes in a video file.
    ///
    /// Returns the whole-second timestamps of the first sampled frame of each
    /// new scene, in ascending order.
    ///
    /// # Errors
    ///
    /// - [`SceneShiftError::InvalidParameter`] for non-finite tuning values or
    ///   an interval below one second.
    /// - [`SceneShiftError::FileOpen`] / [`SceneShiftError::NoVideoStream`] if
    ///   the video cannot be read.
    /// - [`SceneShiftError::EmptySimilaritySequence`] if fewer than two frames
    ///   were sampled.
    /// - Any embedder or decoding error.
    pub fn detect_scene_changes<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u64>, SceneShiftError> {
        Ok(self.analyze(path)?.scene_changes())
    }

    /// Run the full pipeline and keep the intermediate results.
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<SceneAnalysis, SceneShiftError> {
        self.options.validate()?;
        let path = path.as_ref();

        let mut video = VideoFile::open(path)?;
        let metadata = video.metadata().clone();
        let interval = self.options.sample_interval;
        let expected = metadata.estimated_samples(interval);

        log::info!(
            "Detecting scene changes in {} ({}x{}, {:.2}s, sampling every {interval}s with {})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.duration.as_secs_f64(),
            self.embedder.name(),
        );

        let frames = video.sampled_frames(interval, self.options.frame_output.clone())?;
        let similarities = self.similarities(frames, expected)?;
        let segmentation = self.segment(&similarities)?;

        log::info!(
            "Found {} scene changes in {}",
            segmentation.changes.len(),
            path.display(),
        );

        Ok(SceneAnalysis {
            similarities,
            segmentation,
            metadata: Some(metadata),
        })
    }

    /// Run the pipeline over frames from any source.
    ///
    /// The frames are debounced with the configured interval first, so an
    /// unsampled stream can be passed directly.
    pub fn analyze_frames<I>(&self, frames: I) -> Result<SceneAnalysis, SceneShiftError>
    where
        I: IntoIterator<Item = Result<Frame, SceneShiftError>>,
    {
        self.options.validate()?;
        let sampled = crate::sampler::FrameSampler::with_interval(
            frames.into_iter(),
            self.options.sample_interval,
        );
        let similarities = self.similarities(sampled, None)?;
        let segmentation = self.segment(&similarities)?;
        Ok(SceneAnalysis {
            similarities,
            segmentation,
            metadata: None,
        })
    }

    fn similarities<I>(
        &self,
        frames: I,
        expected: Option<u64>,
    ) -> Result<Vec<SimilarityPoint>, SceneShiftError>
    where
        I: IntoIterator<Item = Result<Frame, SceneShiftError>>,
    {
        #[cfg(feature = "rayon")]
        {
            crate::rayon::parallel_similarity_sequence(frames, &self.embedder, &self.options, expected)
        }
        #[cfg(not(feature = "rayon"))]
        {
            crate::similarity::similarity_sequence(frames, &self.embedder, &self.options, expected)
        }
    }

    fn segment(&self, similarities: &[SimilarityPoint]) -> Result<Segmentation, SceneShiftError> {
        if self.options.is_cancelled() {
            return Err(SceneShiftError::Cancelled);
        }
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::Segmentation,
            Some(similarities.len() as u64),
            self.options.batch_size,
        );
        let segmentation = segment(
            similarities,
            self.options.alpha,
            self.options.frame_per_minute,
        )?;
        tracker.finish();
        Ok(segmentation)
    }
}

/// Detect scene changes in one video with a borrowed embedder.
///
/// Uses one-second sampling. Equivalent to building a [`SceneDetector`] with
/// the given `alpha` and `frame_per_minute`.
pub fn detect_scene_changes<P, E>(
    path: P,
    embedder: &E,
    alpha: f64,
    frame_per_minute: f64,
) -> Result<Vec<u64>, SceneShiftError>
where
    P: AsRef<Path>,
    E: FrameEmbedder + ?Sized,
{
    SceneDetector::new(embedder)
        .with_options(
            DetectionOptions::new()
                .with_alpha(alpha)
                .with_frame_per_minute(frame_per_minute),
        )
        .detect_scene_changes(path)
}
