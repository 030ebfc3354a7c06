//! The frame sampler.
//!
//! [`FrameSampler`] walks a list of [`VideoSource`]s one at a time. For
//! each source it creates `{output_root}/{label}/`, opens a decode session,
//! drains it, and writes every frame whose index is a multiple of the
//! configured interval as `{label}_{index:05}.{ext}`. Indices count every
//! decoded frame from 0, saved or not.
//!
//! # Example
//!
//! ```no_run
//! use frame_sampler::{FrameSampler, SampleConfiguration, VideoSource};
//!
//! let configuration = SampleConfiguration::new(50, "extracted_frames")?;
//! let sources = vec![
//!     VideoSource::new("A", "videos/a.mp4"),
//!     VideoSource::new("B", "videos/b.mp4"),
//! ];
//!
//! let report = FrameSampler::new(configuration).run(&sources)?;
//! println!("{} frames saved", report.total_saved());
//! # Ok::<(), frame_sampler::SamplerError>(())
//! ```

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use image::{DynamicImage, ImageError, codecs::jpeg::JpegEncoder};

use crate::{
    configuration::{self, FrameFormat, OpenFailurePolicy, SampleConfiguration, VideoSource},
    decoder::{FfmpegFrameSource, FrameSource},
    error::SamplerError,
    progress::{NoOpObserver, SampleObserver},
};

/// Name of the file frame `index` of source `label` is saved as.
///
/// Indices are zero-padded to five digits; larger indices keep all their
/// digits.
///
/// ```
/// use frame_sampler::{FrameFormat, frame_file_name};
///
/// assert_eq!(frame_file_name("A", 50, FrameFormat::Jpeg), "A_00050.jpg");
/// ```
pub fn frame_file_name(label: &str, index: u64, format: FrameFormat) -> String {
    format!("{label}_{index:05}.{}", format.extension())
}

/// How processing of a source ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// Every frame was decoded.
    Completed,
    /// The video could not be opened; no frames were decoded.
    Unreadable(String),
    /// Decoding failed part-way; frames saved before the failure are kept.
    Truncated(String),
}

/// Outcome of sampling one source.
#[derive(Debug, Clone)]
#[must_use]
pub struct SourceSummary {
    /// Label of the source.
    pub label: String,
    /// Directory the frames were written to. Always exists afterwards.
    pub output_directory: PathBuf,
    /// Total number of frames decoded.
    pub frames_decoded: u64,
    /// Indices of the saved frames, in increasing order.
    pub saved_indices: Vec<u64>,
    /// How processing ended.
    pub status: SourceStatus,
}

impl SourceSummary {
    /// Number of frames written to disk.
    pub fn saved_count(&self) -> usize {
        self.saved_indices.len()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
#[must_use]
pub struct SamplingReport {
    /// One summary per source, in processing order.
    pub sources: Vec<SourceSummary>,
    /// Wall-clock time the run took.
    pub elapsed: Duration,
}

impl SamplingReport {
    /// Frames written across all sources.
    pub fn total_saved(&self) -> usize {
        self.sources.iter().map(SourceSummary::saved_count).sum()
    }

    /// Frames decoded across all sources.
    pub fn total_decoded(&self) -> u64 {
        self.sources.iter().map(|summary| summary.frames_decoded).sum()
    }
}

/// Samples frames from video sources into per-source directories.
///
/// Sources are processed strictly one at a time, in the order given.
pub struct FrameSampler<S = FfmpegFrameSource> {
    configuration: SampleConfiguration,
    frame_source: S,
    observer: Arc<dyn SampleObserver>,
}

impl FrameSampler<FfmpegFrameSource> {
    /// Create a sampler that decodes with FFmpeg.
    pub fn new(configuration: SampleConfiguration) -> Self {
        let frame_source = FfmpegFrameSource::new(configuration.pixel_format());
        Self::with_frame_source(configuration, frame_source)
    }
}

impl<S: FrameSource> FrameSampler<S> {
    /// Create a sampler that reads frames from `frame_source`.
    pub fn with_frame_source(configuration: SampleConfiguration, frame_source: S) -> Self {
        Self {
            configuration,
            frame_source,
            observer: Arc::new(NoOpObserver),
        }
    }

    /// Attach an observer for progress events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SampleObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The configuration this sampler runs with.
    pub fn configuration(&self) -> &SampleConfiguration {
        &self.configuration
    }

    /// Sample every source in order.
    ///
    /// All labels are validated before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::InvalidLabel`] or
    /// [`SamplerError::DuplicateLabel`] before any side effect, and
    /// otherwise the first fatal error of [`sample_source`](Self::sample_source).
    /// A fatal error aborts the remaining sources.
    pub fn run(&self, sources: &[VideoSource]) -> Result<SamplingReport, SamplerError> {
        configuration::validate_sources(sources)?;

        let start_time = Instant::now();
        let mut summaries = Vec::with_capacity(sources.len());
        for source in sources {
            summaries.push(self.sample_source(source)?);
        }

        let report = SamplingReport {
            sources: summaries,
            elapsed: start_time.elapsed(),
        };

        log::info!(
            "Sampled {} source(s): {} of {} frame(s) saved in {:.2?}",
            report.sources.len(),
            report.total_saved(),
            report.total_decoded(),
            report.elapsed,
        );
        self.observer.on_run_complete(&report);

        Ok(report)
    }

    /// Sample a single source.
    ///
    /// The output directory is created first, so it exists even when the
    /// source yields no frames. A decode failure part-way through ends the
    /// source with [`SourceStatus::Truncated`] rather than an error.
    ///
    /// # Errors
    ///
    /// - [`SamplerError::InvalidLabel`] if the label is not a usable name.
    /// - [`SamplerError::OutputDirectory`] if the directory cannot be created.
    /// - The open error, when the video cannot be opened and the policy is
    ///   [`OpenFailurePolicy::Fail`].
    /// - [`SamplerError::FrameWrite`] if a frame cannot be written.
    pub fn sample_source(&self, source: &VideoSource) -> Result<SourceSummary, SamplerError> {
        source.validate_label()?;

        let output_directory = self.configuration.output_directory(source);
        fs::create_dir_all(&output_directory).map_err(|error| SamplerError::OutputDirectory {
            path: output_directory.clone(),
            reason: error.to_string(),
        })?;

        log::info!(
            "Processing {}: {}",
            source.label,
            source.path.display()
        );
        self.observer.on_source_start(source);

        let mut summary = SourceSummary {
            label: source.label.clone(),
            output_directory,
            frames_decoded: 0,
            saved_indices: Vec::new(),
            status: SourceStatus::Completed,
        };

        let frames = match self.frame_source.open(&source.path) {
            Ok(frames) => frames,
            Err(error) => match self.configuration.open_failure() {
                OpenFailurePolicy::Fail => return Err(error),
                OpenFailurePolicy::Skip => {
                    let reason = error.to_string();
                    log::warn!("Skipping {}: {reason}", source.label);
                    self.observer.on_source_unreadable(source, &reason);
                    summary.status = SourceStatus::Unreadable(reason);
                    log::info!(
                        "Done: 0 frame(s) saved to {}",
                        summary.output_directory.display()
                    );
                    self.observer.on_source_complete(&summary);
                    return Ok(summary);
                }
            },
        };

        // The decode session lives only inside this call and is dropped on
        // every return path, including a failed write.
        self.drain(frames, &mut summary)?;

        log::info!(
            "Done: {} frame(s) saved to {}",
            summary.saved_count(),
            summary.output_directory.display()
        );
        self.observer.on_source_complete(&summary);

        Ok(summary)
    }

    fn drain(&self, frames: S::Frames, summary: &mut SourceSummary) -> Result<(), SamplerError> {
        for (index, result) in (0_u64..).zip(frames) {
            let image = match result {
                Ok(image) => image,
                Err(error) => {
                    let reason = error.to_string();
                    log::warn!(
                        "Decoding {} stopped after {} frame(s): {reason}",
                        summary.label,
                        summary.frames_decoded
                    );
                    summary.status = SourceStatus::Truncated(reason);
                    break;
                }
            };

            summary.frames_decoded += 1;
            self.observer.on_frame_decoded(&summary.label, index);

            if !self.configuration.is_sampled(index) {
                continue;
            }

            let file_name = frame_file_name(&summary.label, index, self.configuration.frame_format());
            let path = summary.output_directory.join(file_name);
            self.write_frame(&image, &path)?;

            log::debug!("Saved {}", path.display());
            summary.saved_indices.push(index);
            self.observer.on_frame_saved(&summary.label, index, &path);
        }

        Ok(())
    }

    fn write_frame(&self, image: &DynamicImage, path: &Path) -> Result<(), SamplerError> {
        let write_error = |reason: String| SamplerError::FrameWrite {
            path: path.to_path_buf(),
            reason,
        };
        let image_error = |error: ImageError| write_error(error.to_string());

        match self.configuration.frame_format() {
            FrameFormat::Jpeg => {
                let file = File::create(path).map_err(|error| write_error(error.to_string()))?;
                let mut writer = BufWriter::new(file);
                let encoder =
                    JpegEncoder::new_with_quality(&mut writer, self.configuration.jpeg_quality());

                // JPEG has no alpha channel.
                if image.color().has_alpha() {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                        .write_with_encoder(encoder)
                        .map_err(image_error)?;
                } else {
                    image.write_with_encoder(encoder).map_err(image_error)?;
                }

                writer
                    .flush()
                    .map_err(|error| write_error(error.to_string()))
            }
            format => image
                .save_with_format(path, format.image_format())
                .map_err(image_error),
        }
    }
}
