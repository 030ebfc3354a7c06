use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::Parser;
use colored::Colorize;
use frame_sampler::{
    FfmpegLogLevel, FrameSampler, SampleConfiguration, SampleObserver, SamplingReport,
    SourceStatus, SourceSummary, VideoSource,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Samples the built-in video set into extracted_frames/<label>/.\n\nExamples:\n  frame-sampler\n  frame-sampler --progress --quiet\n  frame-sampler --json --ffmpeg-log-level error";

#[derive(Debug, Parser)]
#[command(
    name = "frame-sampler",
    version,
    about = "Save every Nth frame of the built-in video set as images",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// Do not print a line for every saved frame.
    #[arg(long)]
    quiet: bool,

    /// Show a spinner while decoding.
    #[arg(long)]
    progress: bool,

    /// Print the final report as JSON instead of progress lines.
    #[arg(long)]
    json: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, value_parser = parse_log_level)]
    ffmpeg_log_level: Option<FfmpegLogLevel>,
}

fn parse_log_level(value: &str) -> Result<FfmpegLogLevel, String> {
    value.parse()
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Prints progress lines, optionally alongside a spinner.
struct ConsoleObserver {
    quiet: bool,
    spinner_style: Option<ProgressStyle>,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    fn new(quiet: bool, spinner_style: Option<ProgressStyle>) -> Self {
        Self {
            quiet,
            spinner_style,
            spinner: Mutex::new(None),
        }
    }

    /// Print through the spinner when one is active so it is not clobbered.
    fn print(&self, line: String) {
        match self.spinner.lock().ok().as_deref().and_then(Option::as_ref) {
            Some(spinner) => spinner.println(line),
            None => println!("{line}"),
        }
    }

    fn clear_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }
}

impl SampleObserver for ConsoleObserver {
    fn on_source_start(&self, source: &VideoSource) {
        println!(
            "\n{} {}: {}",
            "processing".cyan().bold(),
            source.label,
            source.path.display()
        );

        if let Some(style) = &self.spinner_style {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(style.clone());
            spinner.set_prefix(source.label.clone());
            spinner.enable_steady_tick(Duration::from_millis(100));
            if let Ok(mut slot) = self.spinner.lock() {
                *slot = Some(spinner);
            }
        }
    }

    fn on_frame_decoded(&self, _label: &str, index: u64) {
        if let Ok(slot) = self.spinner.lock() {
            if let Some(spinner) = slot.as_ref() {
                spinner.set_position(index + 1);
            }
        }
    }

    fn on_frame_saved(&self, _label: &str, _index: u64, path: &Path) {
        if self.quiet {
            return;
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.print(format!("Saved: {file_name}"));
    }

    fn on_source_unreadable(&self, source: &VideoSource, reason: &str) {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("could not open {} ({reason}), no frames read", source.path.display()).yellow()
        );
    }

    fn on_source_complete(&self, summary: &SourceSummary) {
        self.clear_spinner();

        if let SourceStatus::Truncated(reason) = &summary.status {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!(
                    "decoding {} stopped early after {} frame(s): {reason}",
                    summary.label, summary.frames_decoded
                )
                .yellow()
            );
        }

        println!(
            "{} {}",
            "done:".green().bold(),
            format!(
                "{} frame(s) saved to {}",
                summary.saved_count(),
                summary.output_directory.display()
            )
            .green()
        );
    }

    fn on_run_complete(&self, _report: &SamplingReport) {
        println!("\n{}", "All videos processed!".green().bold());
    }
}

fn status_json(status: &SourceStatus) -> serde_json::Value {
    match status {
        SourceStatus::Completed => json!({ "state": "completed" }),
        SourceStatus::Unreadable(reason) => json!({ "state": "unreadable", "reason": reason }),
        SourceStatus::Truncated(reason) => json!({ "state": "truncated", "reason": reason }),
    }
}

fn report_json(report: &SamplingReport) -> serde_json::Value {
    json!({
        "elapsed_seconds": report.elapsed.as_secs_f64(),
        "total_saved": report.total_saved(),
        "total_decoded": report.total_decoded(),
        "sources": report.sources.iter().map(|summary| json!({
            "label": summary.label,
            "output_directory": summary.output_directory.display().to_string(),
            "frames_decoded": summary.frames_decoded,
            "saved_indices": summary.saved_indices,
            "status": status_json(&summary.status),
        })).collect::<Vec<_>>(),
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(level) = cli.ffmpeg_log_level {
        frame_sampler::set_ffmpeg_log_level(level);
    }

    let configuration = SampleConfiguration::default();
    let sources = frame_sampler::default_sources();
    let mut sampler = FrameSampler::new(configuration);

    if !cli.json {
        let spinner_style = if cli.progress {
            Some(ProgressStyle::with_template(
                "{spinner:.green} {prefix}: frame {pos} [{elapsed}]",
            )?)
        } else {
            None
        };
        sampler = sampler.with_observer(Arc::new(ConsoleObserver::new(cli.quiet, spinner_style)));
    }

    let report = sampler.run(&sources)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
