//! Sampling configuration.
//!
//! [`SampleConfiguration`] carries the run-wide settings (frame interval,
//! output root, image encoding) and [`VideoSource`] names one input video.
//! Both are immutable once a run starts.
//!
//! # Example
//!
//! ```no_run
//! use frame_sampler::{FrameFormat, SampleConfiguration, VideoSource};
//!
//! let configuration = SampleConfiguration::new(25, "frames")?
//!     .with_frame_format(FrameFormat::Png);
//! let sources = vec![VideoSource::new("intro", "videos/intro.mp4")];
//! # Ok::<(), frame_sampler::SamplerError>(())
//! ```

use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::format::Pixel;
use image::ImageFormat;

use crate::error::SamplerError;

/// Sample every 50th frame unless told otherwise.
pub const DEFAULT_FRAME_INTERVAL: u64 = 50;

/// Directory under which each source gets its own output folder.
pub const DEFAULT_OUTPUT_ROOT: &str = "extracted_frames";

/// JPEG quality used for saved frames, the same as OpenCV's `imwrite`
/// default.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// The built-in set of videos sampled by the `frame-sampler` binary.
pub fn default_sources() -> Vec<VideoSource> {
    vec![
        VideoSource::new("NZ10", "testing_video/NZD10_resized_video_640x640.mp4"),
        VideoSource::new("NZ20", "testing_video/NZD20_resized_video_640x640.mp4"),
        VideoSource::new("NZ50", "testing_video/NZD50_resized_video_640x640.mp4"),
    ]
}

/// A labelled video file to sample.
///
/// The label is used both as the name of the source's output directory and
/// as the prefix of every file written into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    /// Short identifier for the source.
    pub label: String,
    /// Path to the video file.
    pub path: PathBuf,
}

impl VideoSource {
    /// Create a new source.
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Check that the label is usable as a single path component.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::InvalidLabel`] for empty labels, `.` and
    /// `..`, and labels containing a path separator.
    pub fn validate_label(&self) -> Result<(), SamplerError> {
        let reason = if self.label.is_empty() {
            Some("label is empty")
        } else if self.label == "." || self.label == ".." {
            Some("label refers to a relative directory")
        } else if self.label.contains(['/', '\\']) {
            Some("label contains a path separator")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SamplerError::InvalidLabel {
                label: self.label.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Validate every label in `sources` and make sure no two share one.
pub(crate) fn validate_sources(sources: &[VideoSource]) -> Result<(), SamplerError> {
    let mut seen = HashSet::with_capacity(sources.len());
    for source in sources {
        source.validate_label()?;
        if !seen.insert(source.label.as_str()) {
            return Err(SamplerError::DuplicateLabel(source.label.clone()));
        }
    }
    Ok(())
}

/// Output pixel format for decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb8,
    /// 8-bit RGBA with alpha pre-set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    /// Map to the corresponding FFmpeg pixel format constant.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Image encoding used for saved frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// JPEG, written with [`SampleConfiguration::jpeg_quality`]. The default.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
    /// Uncompressed BMP.
    Bmp,
    /// TIFF.
    Tiff,
}

impl FrameFormat {
    /// File extension written after the frame index, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpg",
            FrameFormat::Png => "png",
            FrameFormat::Bmp => "bmp",
            FrameFormat::Tiff => "tiff",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            FrameFormat::Jpeg => ImageFormat::Jpeg,
            FrameFormat::Png => ImageFormat::Png,
            FrameFormat::Bmp => ImageFormat::Bmp,
            FrameFormat::Tiff => ImageFormat::Tiff,
        }
    }
}

impl Display for FrameFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// What to do when a source's video file cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenFailurePolicy {
    /// Log a warning and treat the source as having zero frames. Its output
    /// directory is still created. This is the default.
    #[default]
    Skip,
    /// Abort the whole run with [`SamplerError::FileOpen`].
    Fail,
}

/// Run-wide sampling settings.
///
/// Construct with [`SampleConfiguration::new`], which guarantees a non-zero
/// frame interval, then adjust with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleConfiguration {
    frame_interval: u64,
    output_root: PathBuf,
    frame_format: FrameFormat,
    pixel_format: PixelFormat,
    jpeg_quality: u8,
    open_failure: OpenFailurePolicy,
}

impl Default for SampleConfiguration {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            frame_format: FrameFormat::default(),
            pixel_format: PixelFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            open_failure: OpenFailurePolicy::default(),
        }
    }
}

impl SampleConfiguration {
    /// Create a configuration that saves every `frame_interval`-th frame
    /// under `output_root`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::InvalidInterval`] if `frame_interval` is zero.
    pub fn new(frame_interval: u64, output_root: impl Into<PathBuf>) -> Result<Self, SamplerError> {
        if frame_interval == 0 {
            return Err(SamplerError::InvalidInterval);
        }
        Ok(Self {
            frame_interval,
            output_root: output_root.into(),
            ..Self::default()
        })
    }

    /// Set the image encoding of saved frames.
    #[must_use]
    pub fn with_frame_format(mut self, format: FrameFormat) -> Self {
        self.frame_format = format;
        self
    }

    /// Set the pixel format frames are decoded into.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the JPEG quality (1-100). Values outside the range are clamped.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Choose how unreadable video files are handled.
    #[must_use]
    pub fn with_open_failure(mut self, policy: OpenFailurePolicy) -> Self {
        self.open_failure = policy;
        self
    }

    /// Sampling period. Always at least 1.
    pub fn frame_interval(&self) -> u64 {
        self.frame_interval
    }

    /// Root under which per-source directories are created.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Image encoding of saved frames.
    pub fn frame_format(&self) -> FrameFormat {
        self.frame_format
    }

    /// Pixel format frames are decoded into.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// JPEG quality used when [`frame_format`](Self::frame_format) is JPEG.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Policy for video files that cannot be opened.
    pub fn open_failure(&self) -> OpenFailurePolicy {
        self.open_failure
    }

    /// Directory that receives the frames of `source`.
    pub fn output_directory(&self, source: &VideoSource) -> PathBuf {
        self.output_root.join(&source.label)
    }

    /// Whether the frame at `index` is saved.
    pub fn is_sampled(&self, index: u64) -> bool {
        index % self.frame_interval == 0
    }
}
