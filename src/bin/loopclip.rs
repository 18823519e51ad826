use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use loopclip::{
    DestinationKey, DirectoryPublisher, EncodedPreview, FfmpegLoader, FfmpegLogLevel, MediaSource,
    OperationType, PreviewOptions, PreviewPipeline, ProgressCallback, ProgressInfo,
    ResourceLoader, SamplePlan, planner,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  loopclip preview squat.mp4 --out squat.gif --progress\n  loopclip publish squat.mp4 --root previews --category legs --id squat-01\n  loopclip plan 12.5 --retry --json\n  loopclip probe https://example.com/clip.mp4 --relay 'https://relay.example.com/?url={url}'\n  loopclip completions zsh > _loopclip";

#[derive(Debug, Parser)]
#[command(
    name = "loopclip",
    version,
    about = "Turn exercise-demonstration videos into looping GIF previews",
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
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

/// Knobs shared by every command that produces a preview.
#[derive(Debug, Args, Clone)]
struct PreviewArgs {
    /// Output width in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,
    /// Output height in pixels.
    #[arg(long, default_value_t = 320)]
    height: u32,
    /// Number of frames to sample (default: derived from duration, 8-30).
    #[arg(long)]
    frames: Option<usize>,
    /// Delay between frames in milliseconds.
    #[arg(long, default_value_t = 100)]
    delay: u32,
    /// Palette quality, 1 (best) to 30 (fastest).
    #[arg(long, default_value_t = 10)]
    quality: i32,
    /// Number of repeats; 0 loops forever.
    #[arg(long, default_value_t = 0)]
    loop_count: u16,
    /// Fewest distinct frames a preview may contain.
    #[arg(long, default_value_t = 3)]
    min_unique: usize,
    /// Seconds a single seek may take.
    #[arg(long, default_value = "5")]
    seek_timeout: String,
    /// Seconds the encode session may take.
    #[arg(long, default_value = "60")]
    encode_timeout: String,
    /// Seconds opening the input may take.
    #[arg(long, default_value = "15")]
    open_timeout: String,
    /// Encoder worker threads.
    #[arg(long, default_value_t = 2)]
    workers: usize,
    /// Relay template for network inputs; `{url}` is replaced by the input.
    #[arg(long)]
    relay: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encode a preview GIF to a file.
    #[command(
        about = "Encode a looping GIF preview",
        after_help = "Examples:\n  loopclip preview squat.mp4 --out squat.gif\n  loopclip preview plank.mp4 --out plank.gif --width 240 --height 240 --frames 12 --json"
    )]
    Preview {
        /// Input video path or URL.
        input: String,
        /// Output GIF path.
        #[arg(long)]
        out: PathBuf,
        /// Print a machine-readable summary.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        tuning: PreviewArgs,
    },

    /// Encode a preview and publish it to a directory-backed blob store.
    #[command(
        about = "Encode and publish a preview",
        after_help = "Examples:\n  loopclip publish lunge.mp4 --root previews --category legs --id lunge\n  loopclip publish lunge.mp4 --root /srv/cdn --category legs --id lunge --base-url https://cdn.example.com"
    )]
    Publish {
        /// Input video path or URL.
        input: String,
        /// Root directory of the blob store.
        #[arg(long)]
        root: PathBuf,
        /// Category identifier (first key segment).
        #[arg(long)]
        category: String,
        /// Resource identifier (file stem).
        #[arg(long)]
        id: String,
        /// Public URL prefix for the root directory.
        #[arg(long)]
        base_url: Option<String>,
        /// Print a machine-readable summary.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        tuning: PreviewArgs,
    },

    /// Print the sampling plan for a duration.
    #[command(
        about = "Show planned sample timestamps",
        after_help = "Examples:\n  loopclip plan 10\n  loopclip plan 0:42 --frames 12 --json"
    )]
    Plan {
        /// Clip duration in seconds or [hh:]mm:ss.
        duration: String,
        /// Explicit frame count.
        #[arg(long)]
        frames: Option<usize>,
        /// Show the fixed-interval retry plan instead.
        #[arg(long)]
        retry: bool,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print video metadata.
    #[command(about = "Print video metadata", visible_alias = "info")]
    Probe {
        /// Input video path or URL.
        input: String,
        /// Relay template for network inputs.
        #[arg(long)]
        relay: Option<String>,
        /// Seconds opening the input may take.
        #[arg(long, default_value = "15")]
        open_timeout: String,
        /// Output as JSON.
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

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" | "off" => Some(FfmpegLogLevel::Quiet),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "debug" => Some(FfmpegLogLevel::Debug),
        _ => None,
    }
}

/// Parse seconds (`12.5`) or a `[hh:]mm:ss` timecode.
fn parse_seconds(value: &str) -> Result<f64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    Ok((hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds)
}

fn parse_timeout(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let seconds = parse_seconds(value)?;
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(format!("timeout must be positive: {value}").into());
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|error| format!("timeout out of range: {value} ({error})").into())
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn build_loader(relay: Option<&str>) -> FfmpegLoader {
    match relay {
        Some(template) => FfmpegLoader::new().with_relay(template),
        None => FfmpegLoader::new(),
    }
}

fn build_options(
    tuning: &PreviewArgs,
    global: &GlobalOptions,
) -> Result<PreviewOptions, Box<dyn std::error::Error>> {
    let mut options = PreviewOptions::new()
        .with_size(tuning.width, tuning.height)
        .with_frame_delay_ms(tuning.delay)
        .with_palette_quality(tuning.quality)
        .with_loop_count(tuning.loop_count)
        .with_minimum_unique_frames(tuning.min_unique)
        .with_seek_timeout(parse_timeout(&tuning.seek_timeout)?)
        .with_encode_timeout(parse_timeout(&tuning.encode_timeout)?)
        .with_open_timeout(parse_timeout(&tuning.open_timeout)?)
        .with_encoder_workers(tuning.workers);

    if let Some(frames) = tuning.frames {
        options = options.with_frame_count(frames);
    }
    if global.progress {
        options = options.with_progress(Arc::new(TerminalProgress::new()?));
    }

    options.validate()?;
    Ok(options)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init()?;

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        loopclip::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

/// Progress bar shared by the capture, encode and publish stages.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg:>10.cyan.bold} [{bar:30}] {pos}/{len} {elapsed}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let stage = match info.operation {
            OperationType::FrameCapture => "capture",
            OperationType::Encoding => "encode",
            OperationType::Publishing => "publish",
            _ => "working",
        };
        self.bar.set_message(stage);
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn plan_for(
    duration: f64,
    frames: Option<usize>,
    retry: bool,
) -> Result<SamplePlan, Box<dyn std::error::Error>> {
    Ok(if retry {
        planner::plan_fixed_interval(duration)?
    } else {
        planner::plan(duration, frames)?
    })
}

fn preview_summary(preview: &EncodedPreview) -> serde_json::Value {
    json!({
        "frame_count": preview.frame_count,
        "width": preview.width,
        "height": preview.height,
        "bytes": preview.payload.len(),
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Preview {
            input,
            out,
            json,
            tuning,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let options = build_options(&tuning, &cli.global)?;
            let loader = build_loader(tuning.relay.as_deref());
            let preview = PreviewPipeline::new(options)?.transcode(&loader, &input)?;
            fs::write(&out, &preview.payload)?;

            if json {
                let mut payload = preview_summary(&preview);
                payload["path"] = json!(out.display().to_string());
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} ({} frames, {}x{}, {} bytes)",
                    "saved".green().bold(),
                    out.display(),
                    preview.frame_count,
                    preview.width,
                    preview.height,
                    preview.payload.len(),
                );
            }
        }
        Commands::Publish {
            input,
            root,
            category,
            id,
            base_url,
            json,
            tuning,
        } => {
            let options = build_options(&tuning, &cli.global)?;
            let loader = build_loader(tuning.relay.as_deref());
            let key = DestinationKey::new(category, id, EncodedPreview::EXTENSION)?;

            let mut publisher =
                DirectoryPublisher::new(root).with_overwrite(cli.global.overwrite);
            if let Some(base_url) = base_url {
                publisher = publisher.with_base_url(base_url);
            }

            let published = PreviewPipeline::new(options)?
                .transcode_and_publish(&loader, &input, &publisher, &key)?;

            if json {
                let payload = json!({
                    "url": published.url,
                    "key": published.key.to_string(),
                    "preview": published.preview.as_ref().map(preview_summary),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} {}", "published".green().bold(), published.url);
            }
        }
        Commands::Plan {
            duration,
            frames,
            retry,
            json,
        } => {
            let duration = parse_seconds(&duration)?;
            let plan = plan_for(duration, frames, retry)?;
            if json {
                let payload = json!({
                    "duration_seconds": plan.duration(),
                    "strategy": format!("{:?}", plan.strategy()),
                    "timestamps": plan.timestamps(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} samples ({:?}) over {:.3}s",
                    plan.len(),
                    plan.strategy(),
                    plan.duration()
                );
                for (index, timestamp) in plan.timestamps().iter().enumerate() {
                    println!("{index:>3}  {timestamp:.3}s");
                }
            }
        }
        Commands::Probe {
            input,
            relay,
            open_timeout,
            json,
        } => {
            let loader = build_loader(relay.as_deref());
            let source = loader.open(&input, parse_timeout(&open_timeout)?)?;
            let info = source.info().clone();
            drop(source);
            let planned = planner::derive_frame_count(info.duration);

            if json {
                let payload = json!({
                    "duration_seconds": info.duration,
                    "width": info.width,
                    "height": info.height,
                    "planned_frames": planned,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Duration: {:.3}s", info.duration);
                println!("Video: {}x{}", info.width, info.height);
                println!("Planned frames: {planned}");
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "loopclip", &mut std::io::stdout());
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
