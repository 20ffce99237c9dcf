//! Scene change detection example.
//!
//! Usage:
//!   cargo run --example detect_scenes -- <input_file> [alpha] [frames_per_minute]
//!
//! With `--features onnx` and `SCENESHIFT_MODEL` set to a feature-extractor
//! ONNX file, the neural embedder is used instead of colour histograms.

use std::error::Error;

use sceneshift::{ColorHistogramEmbedder, DetectionOptions, FrameEmbedder, SceneDetector};

fn embedder() -> Result<Box<dyn FrameEmbedder>, Box<dyn Error>> {
    #[cfg(feature = "onnx")]
    if let Ok(model) = std::env::var("SCENESHIFT_MODEL") {
        let embedder =
            sceneshift::OnnxEmbedder::new(model, sceneshift::OnnxEmbedderOptions::default())?;
        return Ok(Box::new(embedder));
    }
    Ok(Box::new(ColorHistogramEmbedder::new()))
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next().unwrap_or_else(|| "input.mp4".to_string());
    let alpha: f64 = args.next().map(|value| value.parse()).transpose()?.unwrap_or(1.0);
    let frames_per_minute: f64 = args.next().map(|value| value.parse()).transpose()?.unwrap_or(0.0);

    let embedder = embedder()?;
    println!("Detecting scenes in {input_path} with {}...", embedder.name());

    let detector = SceneDetector::new(embedder).with_options(
        DetectionOptions::new()
            .with_alpha(alpha)
            .with_frame_per_minute(frames_per_minute),
    );
    let analysis = detector.analyze(&input_path)?;

    println!("Found {} scene change(s):", analysis.segmentation.changes.len());
    for (i, change) in analysis.segmentation.changes.iter().enumerate() {
        println!(
            "  {:>3}. {:>6}s  |  similarity {:.4}  |  {}",
            i + 1,
            change.timestamp,
            change.similarity,
            change.trigger,
        );
    }

    println!("Done!");
    Ok(())
}
