//! # sceneshift
//!
//! Find scene changes in videos by comparing frame embeddings.
//!
//! `sceneshift` samples a video at a fixed minimum interval, turns each
//! sampled frame into a feature vector with a pluggable [`FrameEmbedder`],
//! computes the cosine similarity of every sampled frame with the one before
//! it, and flags the frames whose similarity is unusually low as the start of
//! a new scene. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Detect Scene Changes
//!
//! ```no_run
//! use sceneshift::{ColorHistogramEmbedder, detect_scene_changes};
//!
//! let embedder = ColorHistogramEmbedder::new();
//! let cuts = detect_scene_changes("input.mp4", &embedder, 1.0, 0.0).unwrap();
//! for second in cuts {
//!     println!("new scene at {second}s");
//! }
//! ```
//!
//! ### Inspect the Similarity Curve
//!
//! ```no_run
//! use sceneshift::{ColorHistogramEmbedder, DetectionOptions, SceneDetector};
//!
//! let detector = SceneDetector::new(ColorHistogramEmbedder::new())
//!     .with_options(DetectionOptions::new().with_alpha(2.0).with_frame_per_minute(1.0));
//! let analysis = detector.analyze("input.mp4").unwrap();
//! for point in &analysis.similarities {
//!     println!("{:>6}s  {:.4}", point.timestamp, point.similarity);
//! }
//! println!("threshold {:.4}", analysis.segmentation.threshold);
//! ```
//!
//! ### Bring Your Own Embedder
//!
//! ```
//! use image::DynamicImage;
//! use sceneshift::{Embedding, FrameEmbedder, SceneShiftError};
//!
//! struct MeanColour;
//!
//! impl FrameEmbedder for MeanColour {
//!     fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
//!         let rgb = image.to_rgb8();
//!         let mut sums = [0.0f32; 3];
//!         for pixel in rgb.pixels() {
//!             for channel in 0..3 {
//!                 sums[channel] += pixel[channel] as f32;
//!             }
//!         }
//!         Ok(Embedding::new(sums.to_vec()))
//!     }
//! }
//! ```
//!
//! ## How Scene Changes Are Selected
//!
//! Given similarities `s` with mean `μ` and population standard deviation
//! `σ`, a sampled frame starts a new scene when either
//!
//! - `s <= μ - alpha · σ`, or
//! - `s` is at or below the `round(100 · frame_per_minute / 60)`-th
//!   percentile of the sequence.
//!
//! Timestamps are reported in whole seconds, truncated toward zero.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Embed sampled frames in parallel on the rayon thread pool |
//! | `onnx` | `OnnxEmbedder`, a pooled-feature extractor backed by ONNX Runtime |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
mod conversion;
pub mod detector;
pub mod embedding;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod sampler;
pub mod segmenter;
pub mod similarity;
pub mod video;

pub use configuration::{DetectionOptions, FrameOutputOptions};
pub use detector::{SceneAnalysis, SceneDetector, detect_scene_changes};
pub use embedding::{ColorHistogramEmbedder, Embedding, FnEmbedder, FrameEmbedder};
pub use error::SceneShiftError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use metadata::VideoMetadata;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxEmbedder, OnnxEmbedderOptions};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use sampler::{DEFAULT_SAMPLE_INTERVAL, Debounce, FrameSampler};
pub use segmenter::{
    SceneChange, SceneTrigger, Segmentation, Statistics, detect_from_similarities, percentile,
    percentile_rank, segment,
};
pub use similarity::{SimilarityPoint, SimilaritySequencer, cosine_similarity, similarity_sequence};
pub use video::{Frame, VideoFile, VideoFrames};
