//! Print the similarity curve of a video as CSV, marking detected cuts.
//!
//! Usage:
//!   cargo run --example similarity_report -- <input_file> [interval_seconds] > curve.csv

use std::error::Error;

use sceneshift::{ColorHistogramEmbedder, DetectionOptions, SceneDetector};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next().unwrap_or_else(|| "input.mp4".to_string());
    let interval: f64 = args.next().map(|value| value.parse()).transpose()?.unwrap_or(1.0);

    let detector = SceneDetector::new(ColorHistogramEmbedder::new().bins(32))
        .with_options(DetectionOptions::new().with_sample_interval(interval));
    let analysis = detector.analyze(&input_path)?;
    let cuts = analysis.scene_changes();

    println!("timestamp,source_timestamp,similarity,cut");
    for point in &analysis.similarities {
        println!(
            "{},{:.3},{:.6},{}",
            point.timestamp,
            point.source_timestamp,
            point.similarity,
            u8::from(cuts.contains(&point.timestamp)),
        );
    }

    let statistics = &analysis.segmentation.statistics;
    eprintln!(
        "{} points, mean {:.4}, std {:.4}, min {:.4}, threshold {:.4}",
        statistics.count,
        statistics.mean,
        statistics.std_dev,
        statistics.min,
        analysis.segmentation.threshold,
    );
    Ok(())
}
