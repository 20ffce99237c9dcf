//! ONNX Runtime feature extractor.
//!
//! [`OnnxEmbedder`] runs an image classifier exported to ONNX with its
//! classification head removed (for example ResNet-50 truncated after global
//! average pooling, output `[1, 2048, 1, 1]`) and returns the pooled features
//! as an [`Embedding`] with the model's output shape.
//!
//! This module is available when the `onnx` feature is enabled.
//!
//! ## Preprocessing
//!
//! 1. Resize to `input_size × input_size` (bilinear, no crop)
//! 2. Convert to RGB float32 in [0, 1]
//! 3. Normalise with ImageNet means `[0.485, 0.456, 0.406]` and standard
//!    deviations `[0.229, 0.224, 0.225]`
//! 4. Layout: NCHW with a batch of one
//!
//! # Example
//!
//! ```no_run
//! use sceneshift::{OnnxEmbedder, OnnxEmbedderOptions, SceneDetector, SceneShiftError};
//!
//! let embedder = OnnxEmbedder::new("resnet50_features.onnx", OnnxEmbedderOptions::default())?;
//! let detector = SceneDetector::new(embedder);
//! let cuts = detector.detect_scene_changes("input.mp4")?;
//! # Ok::<(), SceneShiftError>(())
//! ```

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, imageops::FilterType};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;

use crate::embedding::{Embedding, FrameEmbedder};
use crate::error::SceneShiftError;

/// Default square input side for ImageNet classifiers.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Settings for [`OnnxEmbedder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnnxEmbedderOptions {
    /// Number of ONNX Runtime intra-op threads (default: 4).
    pub num_threads: usize,
    /// Square input side expected by the model (default: 224).
    pub input_size: u32,
}

impl Default for OnnxEmbedderOptions {
    fn default() -> Self {
        Self {
            num_threads: 4,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl OnnxEmbedderOptions {
    /// Set the intra-op thread count. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads.max(1);
        self
    }

    /// Set the model's square input side.
    #[must_use]
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size.max(1);
        self
    }
}

/// Pooled-feature extractor backed by an ONNX Runtime session.
///
/// The session is loaded once and reused for every frame; inference calls
/// are serialised through a mutex, so sharing one embedder between rayon
/// workers is safe but does not run the model concurrently.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    options: OnnxEmbedderOptions,
}

impl OnnxEmbedder {
    /// Load a model from disk.
    ///
    /// # Errors
    ///
    /// [`SceneShiftError::FileOpen`] if the model file is missing, and
    /// [`SceneShiftError::EmbeddingError`] if ONNX Runtime rejects it.
    pub fn new(
        model_path: impl AsRef<Path>,
        options: OnnxEmbedderOptions,
    ) -> Result<Self, SceneShiftError> {
        let model_path = model_path.as_ref();
        crate::video::ensure_readable_file(model_path)?;

        log::debug!(
            "Loading ONNX model {} ({} threads, {}px input)",
            model_path.display(),
            options.num_threads,
            options.input_size,
        );

        let session = Session::builder()
            .map_err(runtime_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime_error)?
            .with_intra_threads(options.num_threads)
            .map_err(runtime_error)?
            .commit_from_file(model_path)
            .map_err(runtime_error)?;

        Ok(Self {
            session: Mutex::new(session),
            options,
        })
    }

    /// Options the embedder was built with.
    pub fn options(&self) -> &OnnxEmbedderOptions {
        &self.options
    }
}

impl FrameEmbedder for OnnxEmbedder {
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, SceneShiftError> {
        let size = self.options.input_size as usize;
        let pixel_values = preprocess_image(image, self.options.input_size);
        let tensor =
            Tensor::from_array(([1usize, 3, size, size], pixel_values)).map_err(runtime_error)?;

        let mut session = self.session.lock().map_err(|_| {
            SceneShiftError::EmbeddingError("ONNX session lock poisoned".to_string())
        })?;
        let outputs = session.run(ort::inputs![tensor]).map_err(runtime_error)?;
        let features = outputs[0]
            .try_extract_array::<f32>()
            .map_err(runtime_error)?;

        let shape = features.shape().to_vec();
        let values: Vec<f32> = features.iter().copied().collect();
        Embedding::from_shape(shape, values)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

fn runtime_error(error: impl std::fmt::Display) -> SceneShiftError {
    SceneShiftError::EmbeddingError(format!("ONNX Runtime: {error}"))
}

/// Resize, normalise and lay out an image as a flat NCHW float buffer.
pub fn preprocess_image(image: &DynamicImage, size: u32) -> Vec<f32> {
    let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let side = size as usize;
    let plane = side * side;
    let mut pixel_values = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * side + x as usize;
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            pixel_values[channel * plane + offset] =
                (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }

    pixel_values
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn preprocess_layout_is_channel_first() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 6, Rgb([255, 0, 128])));
        let values = preprocess_image(&image, 4);
        assert_eq!(values.len(), 3 * 16);

        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!(values[..16].iter().all(|v| (v - red).abs() < 1e-5));
        assert!(values[16..32].iter().all(|v| (v - green).abs() < 1e-5));
    }

    #[test]
    fn missing_model_is_a_file_error() {
        let error = OnnxEmbedder::new("no_such_model.onnx", OnnxEmbedderOptions::default())
            .err()
            .expect("expected an error");
        assert!(matches!(error, SceneShiftError::FileOpen { .. }));
    }

    #[test]
    fn options_clamp() {
        let options = OnnxEmbedderOptions::default()
            .with_threads(0)
            .with_input_size(0);
        assert_eq!(options.num_threads, 1);
        assert_eq!(options.input_size, 1);
    }
}
