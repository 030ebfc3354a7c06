//! Sequential, pull-based video decoding.
//!
//! [`FrameDecoder`] implements [`Iterator`] and decodes frames on demand.
//! Each call to [`next()`](Iterator::next) reads and decodes just enough
//! packets to produce the next frame in decode order, so a source is never
//! buffered in memory. The decoder owns its demuxer and codec context:
//! dropping it, whether after exhaustion, an early `break`, or an error,
//! closes the file.
//!
//! The sampler itself only depends on the [`FrameSource`] trait, so any
//! other producer of frames can stand in for FFmpeg.
//!
//! # Example
//!
//! ```no_run
//! use frame_sampler::{FrameDecoder, PixelFormat};
//!
//! let decoder = FrameDecoder::open("input.mp4", PixelFormat::Rgb8)?;
//! for (index, result) in decoder.enumerate() {
//!     let image = result?;
//!     println!("frame {index}: {}x{}", image.width(), image.height());
//! }
//! # Ok::<(), frame_sampler::SamplerError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::DynamicImage;

use crate::{configuration::PixelFormat, conversion, error::SamplerError};

/// Something that can open a path and yield its frames in order.
///
/// The returned iterator is the decode session for one source: it is
/// drained until it returns `None` or an error, then dropped.
pub trait FrameSource {
    /// Iterator over the decoded frames of one source.
    type Frames: Iterator<Item = Result<DynamicImage, SamplerError>>;

    /// Start a decode session for the video at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or holds no video.
    fn open(&self, path: &Path) -> Result<Self::Frames, SamplerError>;
}

/// [`FrameSource`] backed by FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameSource {
    /// Pixel format frames are converted into.
    pub pixel_format: PixelFormat,
}

impl FfmpegFrameSource {
    /// Create a source that decodes into `pixel_format`.
    pub fn new(pixel_format: PixelFormat) -> Self {
        Self { pixel_format }
    }
}

impl FrameSource for FfmpegFrameSource {
    type Frames = FrameDecoder;

    fn open(&self, path: &Path) -> Result<FrameDecoder, SamplerError> {
        FrameDecoder::open(path, self.pixel_format)
    }
}

/// Basic properties of the decoded video stream.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second, or 0.0 when the container does not say.
    pub frames_per_second: f64,
    /// Frame count reported by the container, if any. Only an estimate:
    /// the decoder may produce more or fewer frames.
    pub estimated_frames: Option<u64>,
    /// Codec name (e.g. `"h264"`).
    pub codec: String,
}

/// A lazy iterator over every frame of a video file, in decode order.
///
/// Fused: once it has returned `None` or an `Err`, it returns `None`
/// forever. A packet read that fails before the end of the file still
/// flushes the frames the decoder already holds, then yields one
/// [`SamplerError::VideoDecodeError`] instead of ending quietly.
pub struct FrameDecoder {
    input_context: Input,
    decoder: VideoDecoder,
    /// Built on the first frame and rebuilt if the stream changes size or
    /// pixel layout mid-way.
    scaler: Option<ScalingContext>,
    video_stream_index: usize,
    pixel_format: PixelFormat,
    info: StreamInfo,
    path: PathBuf,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    frames_yielded: u64,
    eof_sent: bool,
    /// Set when reading packets failed with anything but end of file.
    read_error: Option<String>,
    done: bool,
}

impl FrameDecoder {
    /// Open `path` and prepare to decode its best video stream.
    ///
    /// Initializes FFmpeg (idempotent) before opening the file.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::FileOpen`] if the file cannot be opened or
    /// its codec cannot be set up, and [`SamplerError::NoVideoStream`] if
    /// it has no video.
    pub fn open<P: AsRef<Path>>(path: P, pixel_format: PixelFormat) -> Result<Self, SamplerError> {
        let path = path.as_ref().to_path_buf();

        log::debug!("Opening decode session for {}", path.display());

        ffmpeg_next::init().map_err(|error| SamplerError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| SamplerError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        let (video_stream_index, decoder, frames_per_second, estimated_frames) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or(SamplerError::NoVideoStream)?;

            let decoder_context =
                CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                    SamplerError::FileOpen {
                        path: path.clone(),
                        reason: format!("Failed to read video codec parameters: {error}"),
                    }
                })?;
            let decoder =
                decoder_context
                    .decoder()
                    .video()
                    .map_err(|error| SamplerError::FileOpen {
                        path: path.clone(),
                        reason: format!("Failed to create video decoder: {error}"),
                    })?;

            let frame_rate = stream.avg_frame_rate();
            let frames_per_second = if frame_rate.denominator() != 0 {
                frame_rate.numerator() as f64 / frame_rate.denominator() as f64
            } else {
                0.0
            };
            let estimated_frames = u64::try_from(stream.frames()).ok().filter(|&n| n > 0);

            (stream.index(), decoder, frames_per_second, estimated_frames)
        };

        let info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            estimated_frames,
            codec: decoder
                .codec()
                .map(|codec| codec.name().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        };

        log::debug!(
            "Video stream {} of {}: {}x{} @ {:.2} fps [{}]",
            video_stream_index,
            path.display(),
            info.width,
            info.height,
            info.frames_per_second,
            info.codec,
        );

        Ok(Self {
            input_context,
            decoder,
            scaler: None,
            video_stream_index,
            pixel_format,
            info,
            path,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            frames_yielded: 0,
            eof_sent: false,
            read_error: None,
            done: false,
        })
    }

    /// Properties of the stream being decoded.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Number of frames yielded so far.
    pub fn frames_yielded(&self) -> u64 {
        self.frames_yielded
    }

    fn scaler_matches(scaler: &ScalingContext, frame: &VideoFrame) -> bool {
        let input = scaler.input();
        input.format == frame.format()
            && input.width == frame.width()
            && input.height == frame.height()
    }

    /// Scale `decoded_frame` into the output pixel format and wrap it as an
    /// image at the source resolution.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, SamplerError> {
        let target: Pixel = self.pixel_format.to_ffmpeg_pixel();

        let needs_scaler = match &self.scaler {
            Some(scaler) => !Self::scaler_matches(scaler, &self.decoded_frame),
            None => true,
        };
        if needs_scaler {
            self.scaler = Some(ScalingContext::get(
                self.decoded_frame.format(),
                self.decoded_frame.width(),
                self.decoded_frame.height(),
                target,
                self.decoded_frame.width(),
                self.decoded_frame.height(),
                ScalingFlags::BILINEAR,
            )?);
        }

        let Some(scaler) = self.scaler.as_mut() else {
            return Err(SamplerError::VideoDecodeError(
                "Scaler was not initialised".to_string(),
            ));
        };
        scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;

        conversion::frame_to_image(&self.scaled_frame, self.pixel_format)
    }

    /// Called once the decoder is drained.
    fn end_of_stream(&mut self) -> Option<Result<DynamicImage, SamplerError>> {
        self.done = true;
        read_failure(self.read_error.take())
    }

    fn fail(&mut self, error: SamplerError) -> Option<Result<DynamicImage, SamplerError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for FrameDecoder {
    type Item = Result<DynamicImage, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.decoder.receive_frame(&mut self.decoded_frame) {
                Ok(()) => {
                    return match self.convert_current_frame() {
                        Ok(image) => {
                            self.frames_yielded += 1;
                            Some(Ok(image))
                        }
                        Err(error) => self.fail(error),
                    };
                }
                Err(FfmpegError::Eof) => return self.end_of_stream(),
                Err(FfmpegError::Other {
                    errno: ffmpeg_next::ffi::EAGAIN,
                }) => {
                    // Decoder needs more input.
                }
                Err(error) => {
                    return self.fail(SamplerError::VideoDecodeError(error.to_string()));
                }
            }

            if self.eof_sent {
                return self.end_of_stream();
            }

            let mut packet = Packet::empty();
            let flush = match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            return self.fail(SamplerError::VideoDecodeError(error.to_string()));
                        }
                    }
                    false
                }
                Err(FfmpegError::Eof) => true,
                Err(error) => {
                    log::warn!(
                        "Read error in {} after {} frame(s), flushing decoder: {error}",
                        self.path.display(),
                        self.frames_yielded
                    );
                    self.read_error = Some(error.to_string());
                    true
                }
            };

            if flush {
                if let Err(error) = self.decoder.send_eof() {
                    return self.fail(SamplerError::from(error));
                }
                self.eof_sent = true;
            }
        }
    }
}

/// The item to yield after the decoder is drained.
fn read_failure(read_error: Option<String>) -> Option<Result<DynamicImage, SamplerError>> {
    read_error.map(|reason| {
        Err(SamplerError::VideoDecodeError(format!(
            "Reading packets failed before end of file: {reason}"
        )))
    })
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        log::debug!(
            "Closed decode session for {} after {} frame(s)",
            self.path.display(),
            self.frames_yielded
        );
    }
}
