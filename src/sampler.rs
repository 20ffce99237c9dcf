//! Time-based frame sampling.
//!
//! The sampler is a greedy debounce, not a fixed-rate resampler: a frame is
//! kept when at least `interval` seconds have passed since the last kept
//! frame, and every other frame is dropped. Gaps between kept frames are
//! therefore at least `interval`, rarely exactly `interval`, and drift
//! relative to wall-clock seconds.
//!
//! [`FrameSampler`] wraps any fallible frame iterator. The FFmpeg decoder
//! applies the same [`Debounce`] before colour conversion so that dropped
//! frames never pay for an RGB copy.
//!
//! # Example
//!
//! ```
//! use image::DynamicImage;
//! use sceneshift::{Frame, FrameSampler, SceneShiftError};
//!
//! let frames = [0.0, 0.4, 1.0, 1.9, 2.2].map(|timestamp| {
//!     Ok::<_, SceneShiftError>(Frame::new(timestamp, DynamicImage::new_rgb8(2, 2)))
//! });
//! let kept: Vec<f64> = FrameSampler::new(frames.into_iter())
//!     .map(|frame| frame.map(|frame| frame.timestamp))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(kept, vec![0.0, 1.0, 2.2]);
//! # Ok::<(), SceneShiftError>(())
//! ```

use crate::{error::SceneShiftError, video::Frame};

/// Default minimum gap between sampled frames, in seconds.
pub const DEFAULT_SAMPLE_INTERVAL: f64 = 1.0;

/// Sits below any real timestamp so the first frame is always kept.
const INITIAL_TIMESTAMP: f64 = -1.0;

/// Greedy "at least `interval` since the last kept timestamp" gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Debounce {
    interval: f64,
    last_emitted: f64,
}

impl Debounce {
    /// Create a gate that keeps frames at least `interval` seconds apart.
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            last_emitted: INITIAL_TIMESTAMP,
        }
    }

    /// Decide whether a frame at `timestamp` is kept, recording it if so.
    pub fn admit(&mut self, timestamp: f64) -> bool {
        if timestamp - self.last_emitted >= self.interval {
            self.last_emitted = timestamp;
            true
        } else {
            false
        }
    }

    /// Timestamp of the last kept frame, if any.
    pub fn last_emitted(&self) -> Option<f64> {
        (self.last_emitted != INITIAL_TIMESTAMP).then_some(self.last_emitted)
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

/// Iterator adapter that keeps one frame per rolling sampling window.
///
/// Source errors are passed through unchanged and end the sampled sequence.
pub struct FrameSampler<I> {
    source: I,
    debounce: Debounce,
    done: bool,
}

impl<I> FrameSampler<I>
where
    I: Iterator<Item = Result<Frame, SceneShiftError>>,
{
    /// Sample `source` at the default one-second interval.
    pub fn new(source: I) -> Self {
        Self::with_interval(source, DEFAULT_SAMPLE_INTERVAL)
    }

    /// Sample `source`, keeping frames at least `interval` seconds apart.
    pub fn with_interval(source: I, interval: f64) -> Self {
        Self {
            source,
            debounce: Debounce::new(interval),
            done: false,
        }
    }
}

impl<I> Iterator for FrameSampler<I>
where
    I: Iterator<Item = Result<Frame, SceneShiftError>>,
{
    type Item = Result<Frame, SceneShiftError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for item in self.source.by_ref() {
            match item {
                Ok(frame) => {
                    if self.debounce.admit(frame.timestamp) {
                        return Some(Ok(frame));
                    }
                }
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }

        self.done = true;
        None
    }
}
