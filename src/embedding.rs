//! Frame embeddings.
//!
//! The detector never looks at pixels itself: every sampled frame goes
//! through a [`FrameEmbedder`], an explicitly constructed and reusable
//! handle that maps an image to a fixed-shape [`Embedding`]. Swap in a
//! neural feature extractor ([`OnnxEmbedder`](crate::OnnxEmbedder) with the
//! `onnx` feature), the model-free [`ColorHistogramEmbedder`], or any closure
//! wrapped in [`FnEmbedder`].
//!
//! # Example
//!
//! ```
//! use image::DynamicImage;
//! use sceneshift::{Embedding, FnEmbedder, FrameEmbedder, SceneShiftError};
//!
//! // Mean brightness plus a constant, as a toy two-dimensional embedding.
//! let embedder = FnEmbedder::new(|image: &DynamicImage| {
//!     let luma = image.to_luma8();
//!     let mean = luma.pixels().map(|p| p[0] as f32).sum::<f32>() / luma.len().max(1) as f32;
//!     Ok(Embedding::new(vec![mean, 1.0]))
//! });
//! let embedding = embedder.embed(&DynamicImage::new_rgb8(4, 4))?;
//! assert_eq!(embedding.as_slice(), &[0.0, 1.0]);
//! # Ok::<(), SceneShiftError>(())
//! ```

use std::sync::Arc;

use image::{DynamicImage, imageops::FilterType};

use crate::error::SceneShiftError;

/// A fixed-length feature vector with an optional multi-dimensional shape.
///
/// Values are stored row-major; [`as_slice`](Embedding::as_slice) is the
/// flattened view used for similarity, so flattening never copies or loses
/// data.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Embedding {
    /// A one-dimensional embedding.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// An embedding with an explicit shape, e.g. `[1, 2048, 1, 1]` from a
    /// pooled CNN.
    ///
    /// # Errors
    ///
    /// [`SceneShiftError::InvalidEmbeddingShape`] if the product of `shape`
    /// differs from `values.len()`.
    pub fn from_shape(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, SceneShiftError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(SceneShiftError::InvalidEmbeddingShape {
                shape,
                len: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    /// Declared shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flattened, row-major view of the values.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Consume the embedding, returning the flattened values.
    pub fn flatten(self) -> Vec<f32> {
        self.values
    }

    /// Number of values after flattening.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when the embedding holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean norm, accumulated in `f64`.
    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|&value| f64::from(value) * f64::from(value))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Maps a decoded frame to an [`Embedding`].
///
/// Implementations must be deterministic for a given image and must always
/// produce the same shape. They are shared across rayon workers when the
/// `rayon` feature is enabled, hence the `Send + Sync` bound.
pub trait FrameEmbedder: Send + Sync {
    /// Embed one frame.
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError>;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<E: FrameEmbedder + ?Sized> FrameEmbedder for &E {
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
        (**self).embed(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<E: FrameEmbedder + ?Sized> FrameEmbedder for Box<E> {
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
        (**self).embed(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<E: FrameEmbedder + ?Sized> FrameEmbedder for Arc<E> {
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
        (**self).embed(image)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapts a closure into a [`FrameEmbedder`].
pub struct FnEmbedder<F> {
    name: String,
    function: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&DynamicImage) -> Result<Embedding, SceneShiftError> + Send + Sync,
{
    /// Wrap `function`.
    pub fn new(function: F) -> Self {
        Self {
            name: "closure".to_string(),
            function,
        }
    }

    /// Set the name reported in logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> FrameEmbedder for FnEmbedder<F>
where
    F: Fn(&DynamicImage) -> Result<Embedding, SceneShiftError> + Send + Sync,
{
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
        (self.function)(image)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Model-free embedder built from per-channel colour histograms.
///
/// The frame is downscaled to a small square thumbnail, split into a
/// `grid × grid` layout, and each cell contributes one normalised histogram
/// per RGB channel. The resulting shape is `[grid * grid, 3, bins]`. It is
/// far cruder than a learned feature extractor but needs no model file and
/// is never all zeros, so cosine similarity is always defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorHistogramEmbedder {
    bins: usize,
    grid: u32,
    thumbnail_size: u32,
}

impl Default for ColorHistogramEmbedder {
    fn default() -> Self {
        Self {
            bins: 16,
            grid: 2,
            thumbnail_size: 64,
        }
    }
}

impl ColorHistogramEmbedder {
    /// Create an embedder with 16 bins per channel over a 2×2 grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bins per channel. Clamped to 1..=256.
    #[must_use]
    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins.clamp(1, 256);
        self
    }

    /// Set the grid side. Clamped to 1..=8.
    #[must_use]
    pub fn grid(mut self, grid: u32) -> Self {
        self.grid = grid.clamp(1, 8);
        self
    }

    /// Set the thumbnail side length. Raised to at least one pixel per cell.
    #[must_use]
    pub fn thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }

    /// Number of values per embedding.
    pub fn dimension(&self) -> usize {
        (self.grid * self.grid) as usize * 3 * self.bins
    }
}

impl FrameEmbedder for ColorHistogramEmbedder {
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SceneShiftError::EmbeddingError(
                "cannot embed an empty image".to_string(),
            ));
        }

        let side = self.thumbnail_size.max(self.grid);
        let thumbnail = image.resize_exact(side, side, FilterType::Triangle).to_rgb8();
        let cell_side = side / self.grid;
        let cells = (self.grid * self.grid) as usize;
        let mut values = vec![0.0f32; self.dimension()];
        let mut counts = vec![0u32; cells];

        for (x, y, pixel) in thumbnail.enumerate_pixels() {
            let cell_x = (x / cell_side).min(self.grid - 1);
            let cell_y = (y / cell_side).min(self.grid - 1);
            let cell = (cell_y * self.grid + cell_x) as usize;
            counts[cell] += 1;
            for channel in 0..3 {
                let bin = pixel[channel] as usize * self.bins / 256;
                values[(cell * 3 + channel) * self.bins + bin] += 1.0;
            }
        }

        for (cell, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let start = cell * 3 * self.bins;
            for value in &mut values[start..start + 3 * self.bins] {
                *value /= count as f32;
            }
        }

        Embedding::from_shape(vec![cells, 3, self.bins], values)
    }

    fn name(&self) -> &str {
        "color-histogram"
    }
}
