//! FrameSampler integration tests.
//!
//! These drive the sampler with an in-memory frame source so every property
//! can be checked without video fixtures.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use frame_sampler::{
    FrameFormat, FrameSampler, FrameSource, OpenFailurePolicy, SampleConfiguration,
    SampleObserver, SamplerError, SamplingReport, SourceStatus, SourceSummary, VideoSource,
};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use log::{LevelFilter, Log, Metadata, Record};

// ── synthetic frame source ─────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SyntheticVideo {
    frames: u64,
    /// Yield a decode error instead of this frame.
    fail_at: Option<u64>,
    /// Yield a decode error after the last frame, like a read failure
    /// reported once the decoder has been drained.
    trailing_error: bool,
    alpha: bool,
}

impl SyntheticVideo {
    fn with_frames(frames: u64) -> Self {
        Self {
            frames,
            fail_at: None,
            trailing_error: false,
            alpha: false,
        }
    }
}

#[derive(Default)]
struct SyntheticSource {
    videos: HashMap<PathBuf, SyntheticVideo>,
    open_sessions: Arc<AtomicUsize>,
    sessions_started: Arc<AtomicUsize>,
}

impl SyntheticSource {
    fn with_video(mut self, path: &str, video: SyntheticVideo) -> Self {
        self.videos.insert(PathBuf::from(path), video);
        self
    }
}

struct SyntheticFrames {
    video: SyntheticVideo,
    next: u64,
    open_sessions: Arc<AtomicUsize>,
}

impl Iterator for SyntheticFrames {
    type Item = Result<DynamicImage, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.video.frames {
            if self.video.trailing_error && self.next == self.video.frames {
                self.next += 1;
                return Some(Err(SamplerError::VideoDecodeError(
                    "Reading packets failed before end of file: Input/output error".to_string(),
                )));
            }
            return None;
        }
        let index = self.next;
        self.next += 1;

        if self.video.fail_at == Some(index) {
            self.next = self.video.frames;
            return Some(Err(SamplerError::VideoDecodeError(format!(
                "corrupt packet at frame {index}"
            ))));
        }

        let shade = (index % 256) as u8;
        let image = if self.video.alpha {
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([shade, 0, 0, 128])))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([shade, 64, 128])))
        };
        Some(Ok(image))
    }
}

impl Drop for SyntheticFrames {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FrameSource for SyntheticSource {
    type Frames = SyntheticFrames;

    fn open(&self, path: &Path) -> Result<SyntheticFrames, SamplerError> {
        let video = self
            .videos
            .get(path)
            .copied()
            .ok_or_else(|| SamplerError::FileOpen {
                path: path.to_path_buf(),
                reason: "No such file or directory".to_string(),
            })?;

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticFrames {
            video,
            next: 0,
            open_sessions: Arc::clone(&self.open_sessions),
        })
    }
}

fn file_names(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(directory)
        .expect("Failed to read output directory")
        .map(|entry| {
            entry
                .expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

// ── sampling scenarios ─────────────────────────────────────────────

#[test]
fn interval_fifty_over_one_hundred_twenty_frames() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video("a.mp4", SyntheticVideo::with_frames(120));
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let report = sampler
        .run(&[VideoSource::new("A", "a.mp4")])
        .expect("Run should succeed");

    let summary = &report.sources[0];
    assert_eq!(summary.saved_indices, vec![0, 50, 100]);
    assert_eq!(summary.frames_decoded, 120);
    assert_eq!(summary.status, SourceStatus::Completed);
    assert_eq!(summary.output_directory, temporary_directory.path().join("A"));
    assert_eq!(
        file_names(&summary.output_directory),
        vec!["A_00000.jpg", "A_00050.jpg", "A_00100.jpg"]
    );
}

#[test]
fn unreadable_source_yields_empty_directory() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let sampler = FrameSampler::with_frame_source(configuration, SyntheticSource::default());

    let report = sampler
        .run(&[VideoSource::new("B", "missing.mp4")])
        .expect("Unreadable sources are skipped by default");

    let summary = &report.sources[0];
    assert!(summary.output_directory.is_dir());
    assert!(file_names(&summary.output_directory).is_empty());
    assert_eq!(summary.saved_count(), 0);
    assert_eq!(summary.frames_decoded, 0);
    match &summary.status {
        SourceStatus::Unreadable(reason) => assert!(
            reason.contains("missing.mp4"),
            "Reason should name the path: {reason}"
        ),
        other => panic!("Expected Unreadable, got {other:?}"),
    }
}

#[test]
fn interval_one_saves_every_frame() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(1, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video("c.mp4", SyntheticVideo::with_frames(5));
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let report = sampler
        .run(&[VideoSource::new("C", "c.mp4")])
        .expect("Run should succeed");

    let summary = &report.sources[0];
    assert_eq!(summary.saved_indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(file_names(&summary.output_directory).len(), 5);
}

#[test]
fn saved_indices_are_multiples_of_interval() {
    let cases = [(0, 3), (1, 3), (3, 3), (4, 3), (10, 1), (99, 10), (100, 10), (101, 10)];

    for (total_frames, interval) in cases {
        let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
        let configuration = SampleConfiguration::new(interval, temporary_directory.path())
            .expect("Valid interval");
        let source = SyntheticSource::default()
            .with_video("v.mp4", SyntheticVideo::with_frames(total_frames));
        let sampler = FrameSampler::with_frame_source(configuration, source);

        let summary = sampler
            .sample_source(&VideoSource::new("V", "v.mp4"))
            .expect("Sampling should succeed");

        let expected: Vec<u64> = (0..total_frames).filter(|i| i % interval == 0).collect();
        assert_eq!(
            summary.saved_indices, expected,
            "total={total_frames} interval={interval}"
        );
        assert_eq!(
            summary.saved_count() as u64,
            total_frames.div_ceil(interval),
            "total={total_frames} interval={interval}"
        );
        assert_eq!(file_names(&summary.output_directory).len(), expected.len());
    }
}

#[test]
fn rerun_overwrites_with_identical_files() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let sources = [VideoSource::new("A", "a.mp4")];
    let run = || {
        let configuration =
            SampleConfiguration::new(10, temporary_directory.path()).expect("Valid interval");
        let source =
            SyntheticSource::default().with_video("a.mp4", SyntheticVideo::with_frames(35));
        FrameSampler::with_frame_source(configuration, source)
            .run(&sources)
            .expect("Run should succeed")
    };

    let first = run();
    let directory = first.sources[0].output_directory.clone();
    let first_names = file_names(&directory);
    let first_bytes: Vec<Vec<u8>> = first_names
        .iter()
        .map(|name| fs::read(directory.join(name)).expect("Failed to read frame"))
        .collect();

    let _second = run();
    let second_names = file_names(&directory);
    let second_bytes: Vec<Vec<u8>> = second_names
        .iter()
        .map(|name| fs::read(directory.join(name)).expect("Failed to read frame"))
        .collect();

    assert_eq!(first_names, vec!["A_00000.jpg", "A_00010.jpg", "A_00020.jpg", "A_00030.jpg"]);
    assert_eq!(first_names, second_names);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn sources_are_processed_in_order() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default()
        .with_video("a.mp4", SyntheticVideo::with_frames(120))
        .with_video("c.mp4", SyntheticVideo::with_frames(60));
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let report = sampler
        .run(&[
            VideoSource::new("A", "a.mp4"),
            VideoSource::new("B", "missing.mp4"),
            VideoSource::new("C", "c.mp4"),
        ])
        .expect("Run should succeed");

    let labels: Vec<&str> = report.sources.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C"]);
    assert_eq!(report.total_saved(), 5);
    assert_eq!(report.total_decoded(), 180);
}

// ── failure handling ───────────────────────────────────────────────

#[test]
fn fail_policy_surfaces_open_error() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration = SampleConfiguration::new(50, temporary_directory.path())
        .expect("Valid interval")
        .with_open_failure(OpenFailurePolicy::Fail);
    let sampler = FrameSampler::with_frame_source(configuration, SyntheticSource::default());

    let result = sampler.run(&[VideoSource::new("B", "missing.mp4")]);
    assert!(matches!(result, Err(SamplerError::FileOpen { .. })));
    // The directory is created before the open is attempted.
    assert!(temporary_directory.path().join("B").is_dir());
}

#[test]
fn decode_failure_truncates_source() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(3, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video(
        "d.mp4",
        SyntheticVideo {
            frames: 20,
            fail_at: Some(7),
            trailing_error: false,
            alpha: false,
        },
    );
    let open_sessions = Arc::clone(&source.open_sessions);
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let summary = sampler
        .sample_source(&VideoSource::new("D", "d.mp4"))
        .expect("A mid-stream decode error is not fatal");

    assert_eq!(summary.saved_indices, vec![0, 3, 6]);
    assert_eq!(summary.frames_decoded, 7);
    assert!(matches!(summary.status, SourceStatus::Truncated(_)));
    assert_eq!(open_sessions.load(Ordering::SeqCst), 0);
}

#[test]
fn read_error_after_last_frame_truncates_source() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(5, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video(
        "g.mp4",
        SyntheticVideo {
            frames: 12,
            fail_at: None,
            trailing_error: true,
            alpha: false,
        },
    );
    let open_sessions = Arc::clone(&source.open_sessions);
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let summary = sampler
        .sample_source(&VideoSource::new("G", "g.mp4"))
        .expect("A read error is not fatal");

    // Every buffered frame is still sampled before the error is reported.
    assert_eq!(summary.frames_decoded, 12);
    assert_eq!(summary.saved_indices, vec![0, 5, 10]);
    match &summary.status {
        SourceStatus::Truncated(reason) => {
            assert!(reason.contains("Input/output error"), "{reason}");
        }
        other => panic!("Expected Truncated, got {other:?}"),
    }
    assert_eq!(open_sessions.load(Ordering::SeqCst), 0);
}

#[test]
fn write_failure_is_fatal_and_releases_session() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    // A directory where the first frame should go makes the write fail.
    fs::create_dir_all(temporary_directory.path().join("A").join("A_00000.jpg"))
        .expect("Failed to create blocking directory");

    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default()
        .with_video("a.mp4", SyntheticVideo::with_frames(120))
        .with_video("b.mp4", SyntheticVideo::with_frames(120));
    let open_sessions = Arc::clone(&source.open_sessions);
    let sessions_started = Arc::clone(&source.sessions_started);
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let result = sampler.run(&[
        VideoSource::new("A", "a.mp4"),
        VideoSource::new("B", "b.mp4"),
    ]);

    match result {
        Err(SamplerError::FrameWrite { path, .. }) => {
            assert!(path.ends_with("A/A_00000.jpg"), "Unexpected path: {}", path.display());
        }
        other => panic!("Expected FrameWrite error, got {other:?}"),
    }
    assert_eq!(open_sessions.load(Ordering::SeqCst), 0);
    // The run stops at the first fatal error.
    assert_eq!(sessions_started.load(Ordering::SeqCst), 1);
    assert!(!temporary_directory.path().join("B").exists());
}

#[test]
fn unusable_output_root_is_fatal() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let root_file = temporary_directory.path().join("not_a_directory");
    fs::write(&root_file, b"occupied").expect("Failed to write file");

    let configuration = SampleConfiguration::new(50, &root_file).expect("Valid interval");
    let source = SyntheticSource::default().with_video("a.mp4", SyntheticVideo::with_frames(10));
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let result = sampler.run(&[VideoSource::new("A", "a.mp4")]);
    let error = result.expect_err("Output directory creation should fail");
    assert!(matches!(error, SamplerError::OutputDirectory { .. }));
    assert!(
        error.to_string().contains("Failed to create output directory"),
        "Unexpected message: {error}"
    );
}

#[test]
fn duplicate_labels_rejected_before_side_effects() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video("a.mp4", SyntheticVideo::with_frames(10));
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let result = sampler.run(&[
        VideoSource::new("A", "a.mp4"),
        VideoSource::new("A", "a.mp4"),
    ]);

    assert!(matches!(result, Err(SamplerError::DuplicateLabel(label)) if label == "A"));
    assert!(!temporary_directory.path().join("A").exists());
}

#[test]
fn path_like_label_rejected() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let sampler = FrameSampler::with_frame_source(configuration, SyntheticSource::default());

    let result = sampler.sample_source(&VideoSource::new("../escape", "a.mp4"));
    assert!(matches!(result, Err(SamplerError::InvalidLabel { .. })));
    assert!(!temporary_directory.path().join("..").join("escape").exists());
}

#[test]
fn skipped_source_logs_completion_line() {
    install_capturing_logger();
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let sampler = FrameSampler::with_frame_source(configuration, SyntheticSource::default());

    let summary = sampler
        .sample_source(&VideoSource::new("H", "missing.mp4"))
        .expect("Unreadable sources are skipped by default");

    let expected = format!(
        "Done: 0 frame(s) saved to {}",
        summary.output_directory.display()
    );
    let messages = LOGGER.messages.lock().expect("Poisoned");
    assert!(
        messages.iter().any(|message| message == &expected),
        "Missing {expected:?} in {messages:?}"
    );
}

// ── configuration access ───────────────────────────────────────────

#[test]
fn sampler_exposes_its_configuration() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration = SampleConfiguration::new(7, temporary_directory.path())
        .expect("Valid interval")
        .with_frame_format(FrameFormat::Bmp);
    let sampler =
        FrameSampler::with_frame_source(configuration.clone(), SyntheticSource::default());

    assert_eq!(sampler.configuration(), &configuration);
    assert_eq!(sampler.configuration().frame_interval(), 7);
    assert_eq!(sampler.configuration().output_root(), temporary_directory.path());
    assert_eq!(sampler.configuration().frame_format(), FrameFormat::Bmp);
}

// ── output encoding ────────────────────────────────────────────────

#[test]
fn alpha_frames_are_flattened_for_jpeg() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(2, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video(
        "e.mp4",
        SyntheticVideo {
            frames: 3,
            fail_at: None,
            trailing_error: false,
            alpha: true,
        },
    );
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let summary = sampler
        .sample_source(&VideoSource::new("E", "e.mp4"))
        .expect("RGBA frames should still encode as JPEG");

    assert_eq!(summary.saved_indices, vec![0, 2]);
    let image = image::open(summary.output_directory.join("E_00002.jpg"))
        .expect("Saved frame should be a readable image");
    assert_eq!((image.width(), image.height()), (8, 6));
    assert!(!image.color().has_alpha());
}

#[test]
fn png_output_uses_png_extension() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration = SampleConfiguration::new(4, temporary_directory.path())
        .expect("Valid interval")
        .with_frame_format(FrameFormat::Png);
    let source = SyntheticSource::default().with_video("f.mp4", SyntheticVideo::with_frames(9));
    let sampler = FrameSampler::with_frame_source(configuration, source);

    let summary = sampler
        .sample_source(&VideoSource::new("F", "f.mp4"))
        .expect("Sampling should succeed");

    assert_eq!(
        file_names(&summary.output_directory),
        vec!["F_00000.png", "F_00004.png", "F_00008.png"]
    );
    let image = image::open(summary.output_directory.join("F_00004.png"))
        .expect("Saved frame should be a readable image")
        .to_rgb8();
    assert_eq!(image.get_pixel(0, 0), &Rgb([4, 64, 128]));
}

// ── observer ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
    decoded: AtomicU64,
}

impl RecordingObserver {
    fn record(&self, event: String) {
        self.events.lock().expect("Poisoned").push(event);
    }
}

impl SampleObserver for RecordingObserver {
    fn on_source_start(&self, source: &VideoSource) {
        self.record(format!("start {}", source.label));
    }

    fn on_frame_decoded(&self, _label: &str, index: u64) {
        assert_eq!(self.decoded.fetch_add(1, Ordering::SeqCst), index);
    }

    fn on_frame_saved(&self, label: &str, index: u64, path: &Path) {
        assert!(path.exists(), "Frame should be on disk before the event");
        self.record(format!("saved {label} {index}"));
    }

    fn on_source_unreadable(&self, source: &VideoSource, _reason: &str) {
        self.record(format!("unreadable {}", source.label));
    }

    fn on_source_complete(&self, summary: &SourceSummary) {
        self.record(format!("complete {} {}", summary.label, summary.saved_count()));
    }

    fn on_run_complete(&self, report: &SamplingReport) {
        self.record(format!("finished {}", report.total_saved()));
    }
}

#[test]
fn observer_receives_events_in_order() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let configuration =
        SampleConfiguration::new(50, temporary_directory.path()).expect("Valid interval");
    let source = SyntheticSource::default().with_video("a.mp4", SyntheticVideo::with_frames(120));
    let observer = Arc::new(RecordingObserver::default());
    let sampler = FrameSampler::with_frame_source(configuration, source)
        .with_observer(Arc::clone(&observer) as Arc<dyn SampleObserver>);

    let report = sampler
        .run(&[
            VideoSource::new("A", "a.mp4"),
            VideoSource::new("B", "missing.mp4"),
        ])
        .expect("Run should succeed");
    assert_eq!(report.sources.len(), 2);

    let events = observer.events.lock().expect("Poisoned").clone();
    assert_eq!(
        events,
        vec![
            "start A",
            "saved A 0",
            "saved A 50",
            "saved A 100",
            "complete A 3",
            "start B",
            "unreadable B",
            "complete B 0",
            "finished 3",
        ]
    );
    // Only A decodes anything; every one of its frames is reported.
    assert_eq!(observer.decoded.load(Ordering::SeqCst), 120);
}

// ── logging ────────────────────────────────────────────────────────

struct CapturingLogger {
    messages: Mutex<Vec<String>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= LevelFilter::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.messages
                .lock()
                .expect("Poisoned")
                .push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    messages: Mutex::new(Vec::new()),
};

fn install_capturing_logger() {
    // Only the first call installs it; later calls keep the same logger.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Info);
}
