//! FFmpeg-backed video source.
//!
//! [`VideoFile`] opens a media file, locates the best video stream and caches
//! its [`VideoMetadata`]. [`VideoFile::frames`] and
//! [`VideoFile::sampled_frames`] return a lazy [`VideoFrames`] iterator that
//! decodes one packet at a time and yields [`Frame`] values in decode order,
//! so a full scan never buffers more than the frame being handed out.
//!
//! # Example
//!
//! ```no_run
//! use sceneshift::{FrameOutputOptions, SceneShiftError, VideoFile};
//!
//! let mut video = VideoFile::open("input.mp4")?;
//! for frame in video.sampled_frames(1.0, FrameOutputOptions::default())? {
//!     let frame = frame?;
//!     println!("{:.3}s {}x{}", frame.timestamp, frame.image.width(), frame.image.height());
//! }
//! # Ok::<(), SceneShiftError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use image::{DynamicImage, RgbImage};

use crate::{
    configuration::FrameOutputOptions, conversion, error::SceneShiftError,
    metadata::VideoMetadata, sampler::Debounce,
};

/// A decoded frame and its presentation time.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Presentation timestamp in seconds.
    pub timestamp: f64,
    /// Decoded pixels.
    pub image: DynamicImage,
}

impl Frame {
    /// Pair an image with its timestamp in seconds.
    pub fn new(timestamp: f64, image: DynamicImage) -> Self {
        Self { timestamp, image }
    }
}

/// An opened video file.
///
/// Holds the demuxer context and cached metadata. Decoding happens through
/// the iterators returned by [`frames`](VideoFile::frames) and
/// [`sampled_frames`](VideoFile::sampled_frames), which borrow the file
/// mutably for their lifetime.
pub struct VideoFile {
    input_context: Input,
    video_stream_index: usize,
    metadata: VideoMetadata,
    file_path: PathBuf,
}

impl Debug for VideoFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFile")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoFile {
    /// Open a video file for decoding.
    ///
    /// The path is checked before FFmpeg is touched, so a missing file fails
    /// fast with [`SceneShiftError::FileOpen`].
    ///
    /// # Errors
    ///
    /// - [`SceneShiftError::FileOpen`] if the path is not a readable file or
    ///   FFmpeg cannot open it.
    /// - [`SceneShiftError::NoVideoStream`] if the file has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SceneShiftError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        ensure_readable_file(path)?;

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| SceneShiftError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| SceneShiftError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(SceneShiftError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                SceneShiftError::FileOpen {
                    path: file_path.clone(),
                    reason: format!(
                        "Failed to read video codec parameters for stream {video_stream_index}: {error}"
                    ),
                }
            })?;
        let video_decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| SceneShiftError::FileOpen {
                    path: file_path.clone(),
                    reason: format!(
                        "Failed to create video decoder for stream {video_stream_index}: {error}"
                    ),
                })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let mut frames_per_second = conversion::rational_to_fps(stream.avg_frame_rate());
        if frames_per_second <= 0.0 {
            frames_per_second = conversion::rational_to_fps(stream.rate());
        }

        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: video_decoder.width(),
            height: video_decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        log::debug!(
            "Video stream {}: {}x{} @ {:.3} fps, {:?} [{}]",
            video_stream_index,
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.duration,
            metadata.codec,
        );

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            file_path,
        })
    }

    /// Cached metadata for the video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Decode every frame from the start of the stream.
    pub fn frames(
        &mut self,
        output: FrameOutputOptions,
    ) -> Result<VideoFrames<'_>, SceneShiftError> {
        VideoFrames::new(self, None, output)
    }

    /// Decode the stream, converting only frames at least `interval`
    /// seconds after the previously yielded one.
    pub fn sampled_frames(
        &mut self,
        interval: f64,
        output: FrameOutputOptions,
    ) -> Result<VideoFrames<'_>, SceneShiftError> {
        VideoFrames::new(self, Some(Debounce::new(interval)), output)
    }
}

/// Reject paths that are missing or not regular files.
pub(crate) fn ensure_readable_file(path: &Path) -> Result<(), SceneShiftError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(SceneShiftError::FileOpen {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        }),
        Err(error) => Err(SceneShiftError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("{} does not exist or is unreadable: {error}", path.display()),
        }),
    }
}

/// Consecutive packet read failures tolerated before giving up.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 64;

/// Whether a `receive_frame` failure only means the decoder wants more
/// input (or has been fully drained).
fn decoder_needs_input(error: &FfmpegError) -> bool {
    matches!(error, FfmpegError::Eof | FfmpegError::Other { errno: EAGAIN })
}

/// Source pixel layout the current scaler was built for.
type ScalerKey = (Pixel, u32, u32);

/// A lazy iterator over decoded video frames.
///
/// Frames are decoded one at a time as [`next()`](Iterator::next) is called
/// and converted to RGB8 at the resolution chosen by
/// [`FrameOutputOptions`]. The scaler is built from the first decoded frame
/// and rebuilt if the decoder changes pixel format or size mid-stream.
pub struct VideoFrames<'a> {
    video: &'a mut VideoFile,
    decoder: VideoDecoder,
    scaler: Option<(ScalerKey, ScalingContext)>,
    debounce: Option<Debounce>,
    time_base: Rational,
    start_offset: i64,
    frames_per_second: f64,
    output: FrameOutputOptions,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    decoded_count: u64,
    read_errors: u32,
    eof_sent: bool,
    done: bool,
}

impl<'a> VideoFrames<'a> {
    fn new(
        video: &'a mut VideoFile,
        debounce: Option<Debounce>,
        output: FrameOutputOptions,
    ) -> Result<Self, SceneShiftError> {
        let stream = video
            .input_context
            .stream(video.video_stream_index)
            .ok_or(SceneShiftError::NoVideoStream)?;
        let time_base = stream.time_base();
        let start_offset = conversion::stream_start_offset(stream.start_time());
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        // Rewind so repeated scans over the same file start from the top.
        if let Err(error) = video.input_context.seek(0, ..0) {
            log::debug!("Rewind before decoding failed (continuing): {error}");
        }

        let frames_per_second = video.metadata.frames_per_second;

        Ok(Self {
            video,
            decoder,
            scaler: None,
            debounce,
            time_base,
            start_offset,
            frames_per_second,
            output,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            decoded_count: 0,
            read_errors: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Timestamp of the frame currently in `decoded_frame`, in seconds from
    /// the start of the stream.
    ///
    /// Falls back to the frame index over the nominal frame rate when the
    /// container provides no usable timestamp.
    fn current_timestamp(&self) -> f64 {
        match self.decoded_frame.timestamp().or(self.decoded_frame.pts()) {
            Some(pts) => {
                conversion::pts_to_stream_seconds(pts, self.start_offset, self.time_base).max(0.0)
            }
            None if self.frames_per_second > 0.0 => {
                self.decoded_count as f64 / self.frames_per_second
            }
            None => self.decoded_count as f64,
        }
    }

    /// Scale and convert the current `decoded_frame` to an RGB image.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, SceneShiftError> {
        let key = (
            self.decoded_frame.format(),
            self.decoded_frame.width(),
            self.decoded_frame.height(),
        );
        let (target_width, target_height) = self.output.resolve_dimensions(key.1, key.2);

        let rebuild = !matches!(&self.scaler, Some((current, _)) if *current == key);
        if rebuild {
            let context = ScalingContext::get(
                key.0,
                key.1,
                key.2,
                Pixel::RGB24,
                target_width,
                target_height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((key, context));
        }

        let Some((_, scaler)) = self.scaler.as_mut() else {
            return Err(SceneShiftError::VideoDecodeError(
                "Scaler was not initialised".to_string(),
            ));
        };
        scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;

        let buffer = conversion::frame_to_rgb_buffer(&self.rgb_frame, target_width, target_height);
        let image = RgbImage::from_raw(target_width, target_height, buffer).ok_or_else(|| {
            SceneShiftError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }
}

impl VideoFrames<'_> {
    /// Read the next packet and hand it to the decoder, or signal EOF once
    /// the demuxer runs dry.
    fn feed_decoder(&mut self) -> Result<(), SceneShiftError> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.video.input_context) {
            Ok(()) => {
                self.read_errors = 0;
                if packet.stream() == self.video.video_stream_index {
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|error| SceneShiftError::VideoDecodeError(error.to_string()))?;
                }
            }
            Err(FfmpegError::Eof) => {
                self.decoder.send_eof()?;
                self.eof_sent = true;
            }
            Err(error) => {
                self.read_errors += 1;
                if self.read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    return Err(SceneShiftError::VideoDecodeError(format!(
                        "Giving up after {} consecutive packet read errors: {error}",
                        self.read_errors
                    )));
                }
                log::debug!("Skipping unreadable packet: {error}");
            }
        }
        Ok(())
    }
}

impl Iterator for VideoFrames<'_> {
    type Item = Result<Frame, SceneShiftError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.decoder.receive_frame(&mut self.decoded_frame) {
                Ok(()) => {}
                Err(error) if decoder_needs_input(&error) => {
                    if self.eof_sent {
                        log::debug!("Decoder drained after {} frames", self.decoded_count);
                        self.done = true;
                        return None;
                    }
                    if let Err(error) = self.feed_decoder() {
                        self.done = true;
                        return Some(Err(error));
                    }
                    continue;
                }
                Err(error) => {
                    self.done = true;
                    return Some(Err(SceneShiftError::VideoDecodeError(format!(
                        "Failed to decode frame {}: {error}",
                        self.decoded_count + 1
                    ))));
                }
            }

            let timestamp = self.current_timestamp();
            self.decoded_count += 1;

            let keep = self
                .debounce
                .as_mut()
                .is_none_or(|debounce| debounce.admit(timestamp));
            if !keep {
                continue;
            }

            return match self.convert_current_frame() {
                Ok(image) => Some(Ok(Frame::new(timestamp, image))),
                Err(error) => {
                    self.done = true;
                    Some(Err(error))
                }
            };
        }
    }
}
