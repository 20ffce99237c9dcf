//! Decoder integration tests.
//!
//! Each test encodes a tiny MPEG-2 clip into an MPEG-TS file in a temporary
//! directory, so the FFmpeg decode path runs without checked-in fixtures.
//! The TS muxer starts its clock well after zero, which makes these clips a
//! good check that timestamps are measured from the start of the stream.

use std::path::Path;

use ffmpeg_next::{
    Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    format::{Pixel, context::Output},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use sceneshift::{
    ColorHistogramEmbedder, DetectionOptions, FrameOutputOptions, SceneDetector, VideoFile,
    detect_scene_changes,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const FPS: i32 = 25;

const RED: [u8; 3] = [220, 20, 20];
const BLUE: [u8; 3] = [20, 20, 220];

fn write_pending_packets(
    encoder: &mut ffmpeg_next::encoder::Encoder,
    output: &mut Output,
    stream_index: usize,
    stream_time_base: Rational,
) -> Result<(), ffmpeg_next::Error> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(Rational::new(1, FPS), stream_time_base);
        packet.write_interleaved(output)?;
    }
    Ok(())
}

/// Encode `seconds` of solid-colour video, picking each frame's colour from
/// its presentation time. Returns `false` when the encoder is unavailable.
fn write_clip(
    path: &Path,
    seconds: u32,
    colour_at: impl Fn(f64) -> [u8; 3],
) -> Result<bool, ffmpeg_next::Error> {
    ffmpeg_next::init()?;
    let Some(codec) = ffmpeg_next::encoder::find(Id::MPEG2VIDEO) else {
        eprintln!("Skipping: MPEG-2 encoder not available");
        return Ok(false);
    };

    let mut output = ffmpeg_next::format::output(&path)?;
    let mut stream = output.add_stream(codec)?;
    let stream_index = stream.index();

    let mut encoder = CodecContext::from_parameters(stream.parameters())?
        .encoder()
        .video()?;
    encoder.set_width(WIDTH);
    encoder.set_height(HEIGHT);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_time_base(Rational::new(1, FPS));
    encoder.set_frame_rate(Some(Rational::new(FPS, 1)));
    let mut encoder = encoder.open_as(codec)?;
    stream.set_parameters(&encoder);

    output.write_header()?;
    let stream_time_base = output
        .stream(stream_index)
        .expect("stream was just added")
        .time_base();

    let mut scaler = ScalingContext::get(
        Pixel::RGB24,
        WIDTH,
        HEIGHT,
        Pixel::YUV420P,
        WIDTH,
        HEIGHT,
        ScalingFlags::BILINEAR,
    )?;

    let total_frames = seconds as i64 * FPS as i64;
    for index in 0..total_frames {
        let colour = colour_at(index as f64 / FPS as f64);
        let mut rgb = VideoFrame::new(Pixel::RGB24, WIDTH, HEIGHT);
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        for row in 0..HEIGHT as usize {
            for column in 0..WIDTH as usize {
                let offset = row * stride + column * 3;
                data[offset..offset + 3].copy_from_slice(&colour);
            }
        }

        let mut yuv = VideoFrame::empty();
        scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(index));
        encoder.send_frame(&yuv)?;
        write_pending_packets(&mut encoder, &mut output, stream_index, stream_time_base)?;
    }

    encoder.send_eof()?;
    write_pending_packets(&mut encoder, &mut output, stream_index, stream_time_base)?;
    output.write_trailer()?;
    Ok(true)
}

#[test]
fn decoded_timestamps_start_at_zero() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("red.ts");
    if !write_clip(&path, 3, |_| RED).expect("write clip") {
        return;
    }

    let mut video = VideoFile::open(&path).expect("open clip");
    assert_eq!(video.metadata().width, WIDTH);
    assert_eq!(video.metadata().height, HEIGHT);

    let frames: Vec<_> = video
        .frames(FrameOutputOptions::default())
        .expect("frames")
        .collect::<Result<_, _>>()
        .expect("decode");
    assert_eq!(frames.len(), 75);
    assert!(
        frames[0].timestamp.abs() < 1e-9,
        "first frame at {}s",
        frames[0].timestamp
    );
    assert!(
        frames
            .windows(2)
            .all(|pair| pair[1].timestamp > pair[0].timestamp)
    );

    let pixel = frames[0].image.to_rgb8().get_pixel(WIDTH / 2, HEIGHT / 2).0;
    assert!(pixel[0] > 150 && pixel[2] < 80, "unexpected colour {pixel:?}");
}

#[test]
fn sampled_frames_land_on_whole_seconds() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("red.ts");
    if !write_clip(&path, 3, |_| RED).expect("write clip") {
        return;
    }

    let mut video = VideoFile::open(&path).expect("open clip");
    let timestamps: Vec<f64> = video
        .sampled_frames(1.0, FrameOutputOptions::default())
        .expect("sampled frames")
        .map(|frame| frame.expect("decode").timestamp)
        .collect();
    assert_eq!(timestamps.len(), 3, "sampled at {timestamps:?}");
    for (second, timestamp) in timestamps.iter().enumerate() {
        assert!((timestamp - second as f64).abs() < 1e-9, "sampled at {timestamps:?}");
    }
}

#[test]
fn cut_second_is_measured_from_stream_start() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("two_scenes.ts");
    let written = write_clip(&path, 8, |seconds| if seconds < 5.0 { RED } else { BLUE })
        .expect("write clip");
    if !written {
        return;
    }

    let cuts = detect_scene_changes(&path, &ColorHistogramEmbedder::new(), 0.0, 0.0)
        .expect("detect");
    assert_eq!(cuts, vec![5]);
}

#[test]
fn downscaled_analysis_keeps_keys() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("two_scenes.ts");
    let written = write_clip(&path, 8, |seconds| if seconds < 5.0 { RED } else { BLUE })
        .expect("write clip");
    if !written {
        return;
    }

    let detector = SceneDetector::new(ColorHistogramEmbedder::new())
        .with_options(DetectionOptions::new().with_resolution(Some(32), None));
    let analysis = detector.analyze(&path).expect("analyze");
    let keys: Vec<u64> = analysis.similarities.iter().map(|point| point.timestamp).collect();
    assert_eq!(keys, vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(analysis.scene_changes(), vec![5]);
    assert_eq!(
        analysis.metadata.as_ref().map(|metadata| metadata.format.as_str()),
        Some("mpegts")
    );
}
