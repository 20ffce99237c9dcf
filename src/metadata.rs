//! Video metadata types.
//!
//! [`VideoMetadata`] is extracted once when a [`VideoFile`](crate::VideoFile)
//! is opened and cached for its lifetime. The detector uses it to estimate
//! how many frames will be sampled, which drives progress percentages.

use std::time::Duration;

/// Metadata for the video stream being analysed.
///
/// # Example
///
/// ```no_run
/// use sceneshift::VideoFile;
///
/// let video = VideoFile::open("input.mp4").unwrap();
/// let metadata = video.metadata();
/// println!("{}x{} @ {:.2} fps, {:?}", metadata.width, metadata.height,
///     metadata.frames_per_second, metadata.duration);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, computed from duration and frame rate.
    pub frame_count: u64,
    /// Container duration. Zero when the container does not report one.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska,webm"`).
    pub format: String,
}

impl VideoMetadata {
    /// Upper-bound estimate of frames the sampler will keep at `interval`
    /// seconds, or `None` when the duration is unknown.
    pub fn estimated_samples(&self, interval: f64) -> Option<u64> {
        if self.duration.is_zero() || !interval.is_finite() || interval <= 0.0 {
            return None;
        }
        Some((self.duration.as_secs_f64() / interval).floor() as u64 + 1)
    }
}
