//! Internal conversion helpers.
//!
//! Pixel-plane copying and timestamp rescaling shared by the decoder.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Bytes per pixel of the RGB24 frames handed to embedders.
pub(crate) const RGB_BYTES_PER_PIXEL: usize = 3;

/// Copy the first plane of a packed RGB frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3); the
/// padding is stripped so the result can go straight into
/// [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * RGB_BYTES_PER_PIXEL;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Usable stream start offset in time-base units.
///
/// Unset (`AV_NOPTS_VALUE`) and negative starts count as zero.
pub(crate) fn stream_start_offset(start_time: i64) -> i64 {
    if start_time == ffmpeg_next::ffi::AV_NOPTS_VALUE || start_time < 0 {
        0
    } else {
        start_time
    }
}

/// Rescale a PTS value to seconds measured from the start of the stream.
pub(crate) fn pts_to_stream_seconds(pts: i64, start: i64, time_base: Rational) -> f64 {
    pts_to_seconds(pts.saturating_sub(start), time_base)
}

/// Rational frame rate to frames per second; `0.0` when undefined.
pub(crate) fn rational_to_fps(rate: Rational) -> f64 {
    if rate.denominator() == 0 {
        0.0
    } else {
        rate.numerator() as f64 / rate.denominator() as f64
    }
}
