//! Frame sampling integration tests.

use image::DynamicImage;
use sceneshift::{Debounce, Frame, FrameSampler, SceneShiftError};

fn source(timestamps: &[f64]) -> Vec<Result<Frame, SceneShiftError>> {
    timestamps
        .iter()
        .map(|&timestamp| Ok(Frame::new(timestamp, DynamicImage::new_rgb8(1, 1))))
        .collect()
}

fn sampled(timestamps: &[f64], interval: f64) -> Vec<f64> {
    FrameSampler::with_interval(source(timestamps).into_iter(), interval)
        .map(|frame| frame.expect("synthetic frame").timestamp)
        .collect()
}

#[test]
fn thirty_fps_keeps_one_frame_per_second() {
    let timestamps: Vec<f64> = (0..90).map(|index| index as f64 / 30.0).collect();
    let kept = sampled(&timestamps, 1.0);
    assert_eq!(kept.len(), 3);
    assert_eq!(kept[0], 0.0);
    assert!((kept[1] - 1.0).abs() < 1e-9);
    assert!((kept[2] - 2.0).abs() < 1e-9);
}

#[test]
fn gaps_are_at_least_the_interval() {
    // Irregular timestamps, as produced by variable frame rate content.
    let timestamps = [0.0, 0.3, 0.9, 1.05, 1.6, 2.2, 2.4, 3.3, 3.9, 4.35, 6.0];
    let kept = sampled(&timestamps, 1.0);
    assert_eq!(kept, vec![0.0, 1.05, 2.2, 3.3, 4.35, 6.0]);
    for pair in kept.windows(2) {
        assert!(pair[1] - pair[0] >= 1.0);
    }
}

#[test]
fn first_frame_is_always_kept() {
    assert_eq!(sampled(&[0.0], 1.0), vec![0.0]);
    assert_eq!(sampled(&[7.5, 7.6], 1.0), vec![7.5]);
}

#[test]
fn longer_intervals_skip_more() {
    let timestamps: Vec<f64> = (0..100).map(|index| index as f64 * 0.1).collect();
    assert_eq!(sampled(&timestamps, 2.0).len(), 5);
}

#[test]
fn empty_source_yields_nothing() {
    assert!(sampled(&[], 1.0).is_empty());
}

#[test]
fn errors_end_the_sequence() {
    let mut frames = source(&[0.0, 1.0]);
    frames.push(Err(SceneShiftError::VideoDecodeError("bad packet".into())));
    frames.extend(source(&[2.0, 3.0]));

    let results: Vec<_> = FrameSampler::new(frames.into_iter()).collect();
    assert_eq!(results.len(), 3);
    assert!(results[2].is_err());
}

#[test]
fn debounce_tracks_last_emitted() {
    let mut debounce = Debounce::new(1.0);
    assert_eq!(debounce.last_emitted(), None);
    assert!(debounce.admit(0.0));
    assert!(!debounce.admit(0.99));
    assert!(debounce.admit(1.0));
    assert_eq!(debounce.last_emitted(), Some(1.0));
}
