//! Error types for the `frame-sampler` crate.
//!
//! This module defines [`SamplerError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry the path or label
//! involved so a failed run can be diagnosed from the message alone.

use std::path::PathBuf;

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `frame-sampler` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SamplerError {
    /// A frame interval of zero was provided.
    #[error("Frame interval must be greater than zero")]
    InvalidInterval,

    /// A source label cannot be used as a directory name and file prefix.
    #[error("Invalid source label {label:?}: {reason}")]
    InvalidLabel {
        /// The rejected label.
        label: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two sources share a label and would write into the same directory.
    #[error("Duplicate source label {0:?}")]
    DuplicateLabel(String),

    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path of the video source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The per-source output directory could not be created.
    #[error("Failed to create output directory {path}: {reason}")]
    OutputDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A sampled frame could not be written to disk.
    #[error("Failed to write frame to {path}: {reason}")]
    FrameWrite {
        /// Destination image path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

impl From<FfmpegError> for SamplerError {
    fn from(error: FfmpegError) -> Self {
        SamplerError::FfmpegError(error.to_string())
    }
}
