//! Detection configuration.
//!
//! [`DetectionOptions`] is a builder that carries the segmentation tuning
//! knobs (`alpha`, `frame_per_minute`), the sampling interval, decoded frame
//! size, progress callbacks and cancellation tokens through a detection run
//! without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sceneshift::{CancellationToken, DetectionOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = DetectionOptions::new()
//!     .with_alpha(1.5)
//!     .with_frame_per_minute(2.0)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(10);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::SceneShiftError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::sampler::DEFAULT_SAMPLE_INTERVAL;

/// Decoded frame size settings.
///
/// Controls the resolution of the RGB frames handed to the embedder. When no
/// dimensions are set the source resolution is used. Setting one dimension
/// together with [`maintain_aspect_ratio`](FrameOutputOptions::maintain_aspect_ratio)
/// computes the other automatically. Embedders resize internally anyway, so
/// downscaling here mostly saves conversion work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutputOptions {
    /// Target width. `None` keeps the source width.
    pub width: Option<u32>,
    /// Target height. `None` keeps the source height.
    pub height: Option<u32>,
    /// When `true` and only one dimension is specified, the other is
    /// computed to preserve the source aspect ratio.
    pub maintain_aspect_ratio: bool,
}

impl Default for FrameOutputOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl FrameOutputOptions {
    /// Resolve the final output dimensions given the source size.
    ///
    /// Returns `(width, height)`.
    pub(crate) fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w.max(1), h.max(1)),
            (Some(w), None) if self.maintain_aspect_ratio && source_width > 0 => {
                let ratio = w as f64 / source_width as f64;
                let h = (source_height as f64 * ratio).round() as u32;
                (w.max(1), h.max(1))
            }
            (Some(w), None) => (w.max(1), source_height),
            (None, Some(h)) if self.maintain_aspect_ratio && source_height > 0 => {
                let ratio = h as f64 / source_height as f64;
                let w = (source_width as f64 * ratio).round() as u32;
                (w.max(1), h.max(1))
            }
            (None, Some(h)) => (source_width, h.max(1)),
            (None, None) => (source_width, source_height),
        }
    }
}

/// Configuration for a detection run.
///
/// All fields have defaults matching the classic entry point: `alpha = 0`,
/// `frame_per_minute = 0`, one sampled frame per second, source resolution,
/// no progress callback and no cancellation.
#[derive(Clone)]
pub struct DetectionOptions {
    /// Standard deviations below the mean similarity that count as a cut.
    pub(crate) alpha: f64,
    /// Drives the percentile cutoff: rank = round(frame_per_minute / 60 * 100).
    pub(crate) frame_per_minute: f64,
    /// Minimum gap in seconds between sampled frames.
    pub(crate) sample_interval: f64,
    /// Frame output settings (resolution).
    pub(crate) frame_output: FrameOutputOptions,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N sampled frames).
    pub(crate) batch_size: u64,
}

impl Debug for DetectionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DetectionOptions")
            .field("alpha", &self.alpha)
            .field("frame_per_minute", &self.frame_per_minute)
            .field("sample_interval", &self.sample_interval)
            .field("frame_output", &self.frame_output)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            alpha: 0.0,
            frame_per_minute: 0.0,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            frame_output: FrameOutputOptions::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set how many standard deviations below the mean similarity a score
    /// must fall to be flagged. `0` flags everything at or below the mean.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the percentile driver. Each unit adds roughly 1.67 percentile
    /// points; values above 60 saturate at the 100th percentile.
    #[must_use]
    pub fn with_frame_per_minute(mut self, frame_per_minute: f64) -> Self {
        self.frame_per_minute = frame_per_minute;
        self
    }

    /// Set the minimum gap between sampled frames, in seconds.
    ///
    /// Must be at least one second so whole-second timestamps never collide;
    /// smaller values are rejected when the run starts.
    #[must_use]
    pub fn with_sample_interval(mut self, seconds: f64) -> Self {
        self.sample_interval = seconds;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the run stops before the next sampled
    /// frame and returns [`SceneShiftError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set a custom decode resolution. `None` keeps the source value.
    #[must_use]
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.frame_output.width = width;
        self.frame_output.height = height;
        self
    }

    /// Set the complete frame output configuration.
    #[must_use]
    pub fn with_frame_output(mut self, options: FrameOutputOptions) -> Self {
        self.frame_output = options;
        self
    }

    /// The configured `alpha`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// The configured `frame_per_minute`.
    pub fn frame_per_minute(&self) -> f64 {
        self.frame_per_minute
    }

    /// The configured sampling interval in seconds.
    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    /// Check every numeric knob before any frame is decoded.
    pub fn validate(&self) -> Result<(), SceneShiftError> {
        if !self.alpha.is_finite() {
            return Err(SceneShiftError::InvalidParameter {
                name: "alpha",
                value: self.alpha,
                reason: "must be a finite number",
            });
        }
        if !self.frame_per_minute.is_finite() {
            return Err(SceneShiftError::InvalidParameter {
                name: "frame_per_minute",
                value: self.frame_per_minute,
                reason: "must be a finite number",
            });
        }
        if !self.sample_interval.is_finite() || self.sample_interval < DEFAULT_SAMPLE_INTERVAL {
            return Err(SceneShiftError::InvalidParameter {
                name: "sample_interval",
                value: self.sample_interval,
                reason: "must be a finite number of at least 1.0 seconds",
            });
        }
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
