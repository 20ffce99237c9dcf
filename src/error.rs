//! Error types for the `sceneshift` crate.
//!
//! This module defines [`SceneShiftError`], the unified error type returned by
//! all fallible operations in the crate. Each failure mode of the detection
//! pipeline has its own variant so callers can tell an unreadable input apart
//! from a degenerate embedding or an empty similarity sequence.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `sceneshift` operations.
///
/// Every public method that can fail returns `Result<T, SceneShiftError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SceneShiftError {
    /// The video source could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A tuning parameter was rejected before any processing started.
    #[error("Invalid value for {name}: {value} ({reason})")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The value that was supplied.
        value: f64,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// Fewer than two frames were sampled, so there is nothing to segment.
    #[error("Similarity sequence must be non-empty (need at least two sampled frames)")]
    EmptySimilaritySequence,

    /// An embedding had zero (or non-finite) norm, so cosine similarity is
    /// undefined.
    #[error("Degenerate embedding for frame at {timestamp:.3}s: norm is zero or not finite")]
    DegenerateEmbedding {
        /// Timestamp (seconds) of the frame whose comparison failed.
        timestamp: f64,
    },

    /// Two consecutive embeddings had different flattened lengths.
    #[error("Embedding dimension mismatch: expected {expected} values, got {actual}")]
    EmbeddingDimensionMismatch {
        /// Length of the previous embedding.
        expected: usize,
        /// Length of the current embedding.
        actual: usize,
    },

    /// An embedding's declared shape does not match its value count.
    #[error("Embedding shape {shape:?} does not describe {len} values")]
    InvalidEmbeddingShape {
        /// Declared shape.
        shape: Vec<usize>,
        /// Number of values supplied.
        len: usize,
    },

    /// The embedding collaborator failed (model load or inference).
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Two sampled frames truncated to the same whole second.
    #[error("Sampled frames collide at {timestamp}s after truncation to whole seconds")]
    TimestampCollision {
        /// The colliding truncated timestamp.
        timestamp: u64,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for SceneShiftError {
    fn from(error: FfmpegError) -> Self {
        SceneShiftError::FfmpegError(error.to_string())
    }
}
