use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use sceneshift::{
    ColorHistogramEmbedder, DetectionOptions, FfmpegLogLevel, FrameEmbedder, ProgressCallback,
    ProgressInfo, SceneAnalysis, SceneDetector, VideoFile,
};

#[cfg(feature = "onnx")]
use sceneshift::{OnnxEmbedder, OnnxEmbedderOptions};

const CLI_AFTER_HELP: &str = "Examples:\n  sceneshift detect input.mp4\n  sceneshift detect input.mp4 --alpha 1.5 --frames-per-minute 2 --progress\n  sceneshift detect input.mp4 --json --show-similarities\n  sceneshift metadata input.mp4 --json\n  sceneshift completions zsh > _sceneshift";

#[derive(Debug, Parser)]
#[command(
    name = "sceneshift",
    version,
    about = "Detect scene changes in videos by comparing frame embeddings",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output (same as RUST_LOG=debug).
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while frames are embedded.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect scene changes and print their timestamps in seconds.
    #[command(
        about = "Detect scene changes",
        after_help = "Examples:\n  sceneshift detect input.mp4\n  sceneshift detect input.mp4 --alpha 2 --interval 2 --json"
    )]
    Detect {
        /// Input video path.
        input: PathBuf,

        /// Standard deviations below the mean similarity that count as a cut.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        alpha: f64,

        /// Desired cuts per minute; sets the percentile cut-off.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        frames_per_minute: f64,

        /// Minimum seconds between sampled frames (at least 1).
        #[arg(long, default_value_t = sceneshift::DEFAULT_SAMPLE_INTERVAL)]
        interval: f64,

        /// Histogram bins per channel for the built-in colour embedder.
        #[arg(long, default_value_t = 16)]
        bins: usize,

        /// ONNX feature extractor to use instead of the colour embedder.
        #[cfg(feature = "onnx")]
        #[arg(long)]
        model: Option<PathBuf>,

        /// Output results as machine-readable JSON.
        #[arg(long)]
        json: bool,

        /// Also print every consecutive-frame similarity.
        #[arg(long)]
        show_similarities: bool,
    },

    /// Print video metadata.
    #[command(
        about = "Print video metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  sceneshift metadata input.mp4\n  sceneshift metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Drives an indicatif bar from pipeline progress reports.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total.max(info.current));
        }
        self.bar.set_position(info.current);
        let message = match info.current_timestamp {
            Some(at) => format!("{:?} at {:.0}s", info.operation, at.as_secs_f64()),
            None => format!("{:?}", info.operation),
        };
        self.bar.set_message(message);
    }
}

fn init_logging(global: &GlobalOptions) {
    let default_level = if global.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        sceneshift::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_embedder(
    model: Option<PathBuf>,
    bins: usize,
) -> Result<Box<dyn FrameEmbedder>, Box<dyn std::error::Error>> {
    match model {
        Some(path) => Ok(Box::new(OnnxEmbedder::new(
            path,
            OnnxEmbedderOptions::default(),
        )?)),
        None => Ok(Box::new(ColorHistogramEmbedder::new().bins(bins))),
    }
}

#[cfg(not(feature = "onnx"))]
fn build_embedder(bins: usize) -> Result<Box<dyn FrameEmbedder>, Box<dyn std::error::Error>> {
    Ok(Box::new(ColorHistogramEmbedder::new().bins(bins)))
}

fn format_timecode(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

fn analysis_json(analysis: &SceneAnalysis, show_similarities: bool) -> serde_json::Value {
    let segmentation = &analysis.segmentation;
    let mut payload = json!({
        "scene_changes": segmentation.timestamps(),
        "changes": segmentation.changes.iter().map(|change| json!({
            "timestamp": change.timestamp,
            "similarity": change.similarity,
            "trigger": change.trigger.to_string(),
        })).collect::<Vec<_>>(),
        "statistics": {
            "count": segmentation.statistics.count,
            "mean": segmentation.statistics.mean,
            "std_dev": segmentation.statistics.std_dev,
            "min": segmentation.statistics.min,
            "max": segmentation.statistics.max,
        },
        "threshold": segmentation.threshold,
        "percentile_rank": segmentation.percentile_rank,
        "percentile_value": segmentation.percentile_value,
    });
    if show_similarities {
        payload["similarities"] = analysis
            .similarities
            .iter()
            .map(|point| json!({ "timestamp": point.timestamp, "similarity": point.similarity }))
            .collect();
    }
    payload
}

fn print_analysis(analysis: &SceneAnalysis, show_similarities: bool) {
    let segmentation = &analysis.segmentation;
    if show_similarities {
        for point in &analysis.similarities {
            let line = format!("{:>8}s  {:.4}", point.timestamp, point.similarity);
            if point.similarity <= segmentation.threshold {
                println!("{}", line.red());
            } else {
                println!("{line}");
            }
        }
        println!();
    }

    println!(
        "{} mean {:.4}, std {:.4}, threshold {:.4}, p{} {:.4}",
        "stats".cyan().bold(),
        segmentation.statistics.mean,
        segmentation.statistics.std_dev,
        segmentation.threshold,
        segmentation.percentile_rank,
        segmentation.percentile_value,
    );
    if segmentation.rank_was_clamped() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "percentile rank {} clamped to {}",
                segmentation.requested_percentile_rank, segmentation.percentile_rank
            )
            .yellow()
        );
    }

    if segmentation.changes.is_empty() {
        println!("{}", "no scene changes found".yellow());
        return;
    }
    for change in &segmentation.changes {
        println!(
            "{} {} ({}s, similarity {:.4}, {})",
            "scene".green().bold(),
            format_timecode(change.timestamp),
            change.timestamp,
            change.similarity,
            change.trigger,
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Detect {
            input,
            alpha,
            frames_per_minute,
            interval,
            bins,
            #[cfg(feature = "onnx")]
            model,
            json,
            show_similarities,
        } => {
            #[cfg(feature = "onnx")]
            let embedder = build_embedder(model, bins)?;
            #[cfg(not(feature = "onnx"))]
            let embedder = build_embedder(bins)?;

            let mut options = DetectionOptions::new()
                .with_alpha(alpha)
                .with_frame_per_minute(frames_per_minute)
                .with_sample_interval(interval);
            let progress = if cli.global.progress {
                let progress = Arc::new(BarProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let detector = SceneDetector::new(embedder).with_options(options);
            let analysis = detector.analyze(&input)?;
            if let Some(progress) = progress {
                progress.bar.finish_and_clear();
            }

            if json {
                let payload = analysis_json(&analysis, show_similarities);
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_analysis(&analysis, show_similarities);
            }
        }
        Commands::Metadata { input, json } => {
            let video = VideoFile::open(&input)?;
            let metadata = video.metadata();
            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "format": metadata.format,
                    "codec": metadata.codec,
                    "width": metadata.width,
                    "height": metadata.height,
                    "frames_per_second": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "estimated_samples": metadata.estimated_samples(sceneshift::DEFAULT_SAMPLE_INTERVAL),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} {}", "file".cyan().bold(), input.display());
                println!("Format: {}", metadata.format);
                println!(
                    "Video: {}x{} {} @ {:.3} fps",
                    metadata.width, metadata.height, metadata.codec, metadata.frames_per_second
                );
                println!(
                    "Duration: {:.3}s ({} frames)",
                    metadata.duration.as_secs_f64(),
                    metadata.frame_count
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "sceneshift", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
