//! # frame-sampler
//!
//! Sample every Nth frame from a set of video files and write the sampled
//! frames as images, one output directory per video.
//!
//! Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate and frames are
//! encoded with the [`image`](https://crates.io/crates/image) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use frame_sampler::{FrameSampler, SampleConfiguration, VideoSource};
//!
//! let configuration = SampleConfiguration::new(50, "extracted_frames")?;
//! let sources = vec![VideoSource::new("A", "videos/a.mp4")];
//!
//! let report = FrameSampler::new(configuration).run(&sources)?;
//! for summary in &report.sources {
//!     println!(
//!         "{}: {} frames saved to {}",
//!         summary.label,
//!         summary.saved_count(),
//!         summary.output_directory.display(),
//!     );
//! }
//! # Ok::<(), frame_sampler::SamplerError>(())
//! ```
//!
//! A source with 120 frames sampled every 50 frames produces `A_00000.jpg`,
//! `A_00050.jpg` and `A_00100.jpg` in `extracted_frames/A/`.
//!
//! ## Features
//!
//! - **Sequential sampling**: frames are counted in decode order from 0 and
//!   every frame whose index is a multiple of the interval is saved
//! - **Streaming decode**: [`FrameDecoder`] is a lazy iterator, so a video
//!   is never held in memory
//! - **Configurable output**: JPEG (with quality), PNG, BMP or TIFF; RGB8,
//!   RGBA8 or GRAY8 pixels
//! - **Explicit failure policy**: unreadable files are skipped with a
//!   warning or abort the run, see [`OpenFailurePolicy`]
//! - **Progress events** through [`SampleObserver`]
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
mod conversion;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod progress;
pub mod sampler;

pub use configuration::{
    DEFAULT_FRAME_INTERVAL, DEFAULT_JPEG_QUALITY, DEFAULT_OUTPUT_ROOT, FrameFormat,
    OpenFailurePolicy, PixelFormat, SampleConfiguration, VideoSource, default_sources,
};
pub use decoder::{FfmpegFrameSource, FrameDecoder, FrameSource, StreamInfo};
pub use error::SamplerError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use progress::SampleObserver;
pub use sampler::{FrameSampler, SamplingReport, SourceStatus, SourceSummary, frame_file_name};
