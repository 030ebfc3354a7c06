//! Progress reporting.
//!
//! A [`SampleObserver`] receives an event when a source starts, for every
//! decoded frame, each time a frame is saved, when a source turns out to be
//! unreadable, when a source completes, and once when the whole run
//! completes. Observers are **infallible**: they watch the run but cannot
//! change its outcome.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frame_sampler::{FrameSampler, SampleConfiguration, SampleObserver, SourceSummary};
//!
//! struct PrintSummaries;
//!
//! impl SampleObserver for PrintSummaries {
//!     fn on_source_complete(&self, summary: &SourceSummary) {
//!         println!("{}: {} saved", summary.label, summary.saved_count());
//!     }
//! }
//!
//! let sampler = FrameSampler::new(SampleConfiguration::default())
//!     .with_observer(Arc::new(PrintSummaries));
//! ```

use std::path::Path;

use crate::{
    configuration::VideoSource,
    sampler::{SamplingReport, SourceSummary},
};

/// Receives progress events from a [`FrameSampler`](crate::FrameSampler).
///
/// Every method has an empty default, so implementations only override the
/// events they care about. Implementations must be [`Send`] and [`Sync`] so
/// they can share state with terminal widgets such as progress bars.
pub trait SampleObserver: Send + Sync {
    /// A source is about to be opened.
    fn on_source_start(&self, _source: &VideoSource) {}

    /// A frame was decoded. Called for every frame, saved or not.
    fn on_frame_decoded(&self, _label: &str, _index: u64) {}

    /// Frame `index` of the source `label` was written to `path`.
    fn on_frame_saved(&self, _label: &str, _index: u64, _path: &Path) {}

    /// The source could not be opened and was skipped.
    fn on_source_unreadable(&self, _source: &VideoSource, _reason: &str) {}

    /// The source has been fully processed and its decoder released.
    fn on_source_complete(&self, _summary: &SourceSummary) {}

    /// Every source has been processed.
    fn on_run_complete(&self, _report: &SamplingReport) {}
}

/// Discards all events. This is the default when no observer is attached.
#[derive(Debug, Default)]
pub(crate) struct NoOpObserver;

impl SampleObserver for NoOpObserver {}
