//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a detection run,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for detailed progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sceneshift::{
//!     CancellationToken, ColorHistogramEmbedder, DetectionOptions, ProgressCallback,
//!     ProgressInfo, SceneDetector, SceneShiftError,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let options = DetectionOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_cancellation(CancellationToken::new());
//! let detector = SceneDetector::new(ColorHistogramEmbedder::new()).with_options(options);
//! let changes = detector.detect_scene_changes("input.mp4")?;
//! # Ok::<(), SceneShiftError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The stage of the detection pipeline currently reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Embedding sampled frames and comparing neighbours.
    Embedding,
    /// Computing thresholds over the similarity sequence.
    Segmentation,
}

/// A snapshot of detection progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`DetectionOptions::with_batch_size`](crate::DetectionOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which stage is being performed.
    pub operation: OperationType,
    /// How many sampled frames have been processed so far.
    pub current: u64,
    /// Total sampled frames expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the stage started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Timestamp of the sampled frame just processed.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates during detection.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks may be
/// invoked from rayon workers when the `rayon` feature is enabled.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// run. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during a detection run.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated detection run before its next sampled frame.
///
/// # Example
///
/// ```
/// use sceneshift::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts processed items for one pipeline stage and forwards snapshots to
/// the callback every `every` items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    expected: Option<u64>,
    processed: u64,
    every: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        expected: Option<u64>,
        every: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            expected,
            processed: 0,
            every: every.max(1),
            started: Instant::now(),
        }
    }

    /// Count one sampled frame; report on every `every`-th.
    pub(crate) fn advance(&mut self, timestamp_seconds: Option<f64>) {
        self.processed += 1;
        if self.processed % self.every == 0 {
            self.callback.on_progress(&self.snapshot(timestamp_seconds));
        }
    }

    /// Report the final count regardless of cadence.
    pub(crate) fn finish(&mut self) {
        self.callback.on_progress(&self.snapshot(None));
    }

    fn snapshot(&self, timestamp_seconds: Option<f64>) -> ProgressInfo {
        let elapsed = self.started.elapsed();
        // `expected` comes from the container duration and can undershoot.
        let expected = self.expected.filter(|&expected| expected > 0);

        let percentage = expected
            .map(|expected| (100.0 * self.processed as f32 / expected as f32).min(100.0));
        let estimated_remaining = expected.filter(|_| self.processed > 0).map(|expected| {
            let left = expected.saturating_sub(self.processed);
            elapsed.mul_f64(left as f64 / self.processed as f64)
        });

        ProgressInfo {
            operation: self.operation,
            current: self.processed,
            total: self.expected,
            percentage,
            elapsed,
            estimated_remaining,
            current_timestamp: timestamp_seconds
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(Duration::from_secs_f64),
        }
    }
}
