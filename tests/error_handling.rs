//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for the failure
//! conditions of a detection run.

use std::path::Path;

use image::DynamicImage;
use sceneshift::{
    ColorHistogramEmbedder, DetectionOptions, Embedding, FnEmbedder, Frame, SceneDetector,
    SceneShiftError, SimilarityPoint, VideoFile, detect_from_similarities, detect_scene_changes,
};

fn frame(timestamp: f64) -> Result<Frame, SceneShiftError> {
    Ok(Frame::new(timestamp, DynamicImage::new_rgb8(4, 4)))
}

#[test]
fn open_nonexistent_file() {
    let result = VideoFile::open("this_file_does_not_exist.mp4");
    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = VideoFile::open(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn detect_on_missing_file_fails_fast() {
    let embedder = FnEmbedder::new(|_: &DynamicImage| -> Result<Embedding, SceneShiftError> {
        panic!("no frame should be embedded")
    });
    let error = detect_scene_changes("missing/video.mp4", &embedder, 0.0, 0.0).unwrap_err();
    assert!(matches!(error, SceneShiftError::FileOpen { .. }));
}

#[test]
fn audio_only_file_has_no_video_stream() {
    let path = "tests/fixtures/audio_only.m4a";
    if !Path::new(path).exists() {
        return;
    }

    let error = VideoFile::open(path).unwrap_err();
    assert!(
        matches!(error, SceneShiftError::NoVideoStream),
        "unexpected error: {error}"
    );
}

#[test]
fn too_short_video_is_an_empty_sequence() {
    let path = "tests/fixtures/short_clip.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let error = detect_scene_changes(path, &ColorHistogramEmbedder::new(), 0.0, 0.0).unwrap_err();
    assert!(
        matches!(error, SceneShiftError::EmptySimilaritySequence),
        "unexpected error: {error}"
    );
}

#[test]
fn empty_similarity_sequence() {
    let error = detect_from_similarities(&[], 0.0, 0.0).unwrap_err();
    assert!(matches!(error, SceneShiftError::EmptySimilaritySequence));
    assert!(error.to_string().contains("non-empty"));
}

#[test]
fn nan_alpha_is_rejected_before_segmentation() {
    let points = [SimilarityPoint::new(1.0, 0.5)];
    let error = detect_from_similarities(&points, f64::NAN, 0.0).unwrap_err();
    assert!(matches!(
        error,
        SceneShiftError::InvalidParameter { name: "alpha", .. }
    ));
}

#[test]
fn zero_embedding_fails_loudly() {
    let embedder = FnEmbedder::new(|_: &DynamicImage| Ok(Embedding::new(vec![0.0, 0.0, 0.0])));
    let detector = SceneDetector::new(embedder);
    let error = detector
        .analyze_frames(vec![frame(0.0), frame(1.0), frame(2.0)])
        .unwrap_err();
    match error {
        SceneShiftError::DegenerateEmbedding { timestamp } => assert_eq!(timestamp, 1.0),
        other => panic!("expected a degenerate embedding error, got {other}"),
    }
}

#[test]
fn embedder_errors_propagate() {
    let embedder = FnEmbedder::new(|_: &DynamicImage| {
        Err(SceneShiftError::EmbeddingError("model exploded".to_string()))
    });
    let error = SceneDetector::new(embedder)
        .analyze_frames(vec![frame(0.0), frame(1.0)])
        .unwrap_err();
    assert!(error.to_string().contains("model exploded"));
}

#[test]
fn inconsistent_embedding_length_is_reported() {
    let embedder = FnEmbedder::new(|image: &DynamicImage| {
        let length = image.width() as usize;
        Ok(Embedding::new(vec![1.0; length]))
    });
    let frames = vec![
        Ok(Frame::new(0.0, DynamicImage::new_rgb8(4, 4))),
        Ok(Frame::new(1.0, DynamicImage::new_rgb8(8, 4))),
    ];
    let error = SceneDetector::new(embedder).analyze_frames(frames).unwrap_err();
    assert!(matches!(
        error,
        SceneShiftError::EmbeddingDimensionMismatch {
            expected: 4,
            actual: 8
        }
    ));
}

#[test]
fn invalid_interval_is_rejected() {
    let detector = SceneDetector::new(ColorHistogramEmbedder::new())
        .with_options(DetectionOptions::new().with_sample_interval(0.25));
    let error = detector.analyze_frames(vec![frame(0.0)]).unwrap_err();
    assert!(error.to_string().contains("sample_interval"));
}
