use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framebatch::{
    CropMode, DatasetOptions, DecoderLogLevel, OperationType, ProgressCallback, ProgressInfo,
    ResizeProcessor, Sample, ScratchFormat, SequenceDataset, SequenceKind, SequenceSource,
    VideoReader,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  framebatch inspect clips/ --json\n  framebatch load scene_042/ --max-long-side 1022 --crop center\n  framebatch load clip.mp4 --progress --verbose\n  framebatch completions zsh > _framebatch";

#[derive(Debug, Parser)]
#[command(
    name = "framebatch",
    version,
    about = "Inspect and load frame-sequence datasets as tensor batches",
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
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<DecoderLogLevel>,

    /// Extra video extensions to recognize, replacing the default (mp4).
    #[arg(long = "video-ext", global = true, value_delimiter = ',')]
    video_extensions: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the sequences of a dataset without decoding them.
    #[command(
        about = "List dataset sequences",
        visible_alias = "ls",
        after_help = "Examples:\n  framebatch inspect clips/\n  framebatch inspect clip.mp4 --json"
    )]
    Inspect {
        /// Dataset root: a video file, a directory of videos, or a directory of .npy frames.
        root: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Load samples and print their batch shapes.
    #[command(
        about = "Load samples",
        after_help = "Examples:\n  framebatch load clips/ --index 3\n  framebatch load scene_042/ --crop center --scratch-root /mnt/large --json"
    )]
    Load {
        /// Dataset root.
        root: PathBuf,

        /// Load only the sample at this index.
        #[arg(long)]
        index: Option<usize>,

        /// Upper bound for the long side of processed frames.
        #[arg(long, default_value_t = framebatch::DEFAULT_MAX_LONG_SIDE)]
        max_long_side: u32,

        /// Crop mode (none, center).
        #[arg(long, default_value = "none")]
        crop: String,

        /// Directory for intermediate frames instead of the system temp dir.
        #[arg(long)]
        scratch_root: Option<PathBuf>,

        /// Image format of intermediate frames (png, jpeg).
        #[arg(long, default_value = "png")]
        scratch_format: String,

        /// Standardize tensors with ImageNet mean and std.
        #[arg(long)]
        imagenet: bool,

        /// Output one JSON object per sample.
        #[arg(long)]
        json: bool,

        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_crop_mode(value: &str) -> Option<CropMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" | "resize" => Some(CropMode::None),
        "center" | "centre" => Some(CropMode::Center),
        _ => None,
    }
}

fn parse_scratch_format(value: &str) -> Option<ScratchFormat> {
    match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => Some(ScratchFormat::Png),
        "jpg" | "jpeg" => Some(ScratchFormat::Jpeg),
        _ => None,
    }
}

fn operation_label(operation: OperationType) -> &'static str {
    match operation {
        OperationType::FrameExtraction => "decoding",
        OperationType::ArrayConversion => "converting",
        OperationType::FrameProcessing => "processing",
        _ => "working",
    }
}

fn source_label(source: &SequenceSource) -> &'static str {
    match source {
        SequenceSource::Video(_) => "video",
        SequenceSource::VideoFolder(_) => "video folder",
        SequenceSource::FrameFolder(_) => "frame folder",
    }
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    if let Some(level) = global.ffmpeg_log_level {
        framebatch::set_decoder_log_level(level);
    } else if !global.verbose {
        framebatch::set_decoder_log_level(DecoderLogLevel::Error);
    }
}

fn dataset_options(global: &GlobalOptions) -> DatasetOptions {
    DatasetOptions::new().with_video_extensions(&global.video_extensions)
}

/// Forwards progress snapshots to an `indicatif` bar.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:>10} {bar:40.cyan/blue} {pos}/{len} {elapsed_precise}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(operation_label(info.operation));
    }
}

fn sample_json(index: usize, sample: &Sample) -> Value {
    let (frames, channels, height, width) = sample.shape();
    json!({
        "index": index,
        "scene_name": sample.scene_name,
        "shape": [frames, channels, height, width],
        "mean": sample.batch.mean(),
        "extraction": sample.extraction.as_ref().map(|report| json!({
            "expected": report.expected,
            "extracted": report.extracted,
            "dropped": report.dropped,
        })),
    })
}

fn print_sample(index: usize, sample: &Sample) {
    let (frames, channels, height, width) = sample.shape();
    println!(
        "{} {} {}",
        format!("[{index}]").cyan().bold(),
        sample.scene_name.bold(),
        format!("{frames}x{channels}x{height}x{width}").green()
    );
    if let Some(report) = sample.extraction.as_ref().filter(|report| report.is_truncated()) {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "{} of {} frames could not be decoded",
                report.dropped,
                report.expected.unwrap_or_default()
            )
            .yellow()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Inspect { root, json } => {
            let dataset = SequenceDataset::open_with_options(&root, dataset_options(&cli.global))?;
            let kind = dataset.source().sequence_kind();

            let mut sequences = Vec::with_capacity(dataset.len());
            for (index, path) in dataset.sequence_paths().iter().enumerate() {
                let video = match kind {
                    SequenceKind::Video => Some(VideoReader::open(path).map(|reader| {
                        let metadata = reader.metadata();
                        json!({
                            "width": metadata.width,
                            "height": metadata.height,
                            "frames_per_second": metadata.frames_per_second,
                            "frame_count": metadata.frame_count,
                            "duration_seconds": metadata.duration.as_secs_f64(),
                            "codec": metadata.codec,
                        })
                    })),
                    SequenceKind::FrameFolder => None,
                };
                sequences.push((index, dataset.scene_name(index)?, path, video));
            }

            if json {
                let payload = json!({
                    "root": root.display().to_string(),
                    "kind": source_label(dataset.source()),
                    "sequences": sequences.iter().map(|(index, scene_name, path, video)| json!({
                        "index": index,
                        "scene_name": scene_name,
                        "path": path.display().to_string(),
                        "video": video.as_ref().map(|video| match video {
                            Ok(metadata) => metadata.clone(),
                            Err(error) => json!({ "error": error.to_string() }),
                        }),
                    })).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} ({} sequence(s))",
                    source_label(dataset.source()).bold(),
                    root.display(),
                    dataset.len()
                );
                for (index, scene_name, path, video) in &sequences {
                    let detail = match video {
                        Some(Ok(metadata)) => format!(
                            "{}x{} {} frames",
                            metadata["width"], metadata["height"], metadata["frame_count"]
                        ),
                        Some(Err(error)) => format!("{}", error.to_string().red()),
                        None => String::new(),
                    };
                    println!(
                        "{} {} {} {}",
                        format!("[{index}]").cyan().bold(),
                        scene_name,
                        path.display().to_string().dimmed(),
                        detail
                    );
                }
            }
        }
        Commands::Load {
            root,
            index,
            max_long_side,
            crop,
            scratch_root,
            scratch_format,
            imagenet,
            json,
            progress,
        } => {
            let crop_mode =
                parse_crop_mode(&crop).ok_or(format!("unsupported --crop: {crop}"))?;
            let scratch_format = parse_scratch_format(&scratch_format)
                .ok_or(format!("unsupported --scratch-format: {scratch_format}"))?;

            let mut options = dataset_options(&cli.global)
                .with_max_long_side(max_long_side)
                .with_crop_mode(crop_mode)
                .with_scratch_format(scratch_format);
            if let Some(scratch_root) = scratch_root {
                options = options.with_scratch_root(scratch_root);
            }

            let terminal_progress = if progress {
                let terminal_progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(terminal_progress.clone());
                Some(terminal_progress)
            } else {
                None
            };

            let processor = if imagenet {
                ResizeProcessor::new().with_imagenet_normalization()
            } else {
                ResizeProcessor::new()
            };
            let dataset =
                SequenceDataset::open_with_options(&root, options)?.with_processor(processor);

            let indices: Vec<usize> = match index {
                Some(index) => vec![index],
                None => (0..dataset.len()).collect(),
            };

            for index in indices {
                let sample = dataset.get(index)?;
                if let Some(terminal_progress) = &terminal_progress {
                    terminal_progress.bar.finish_and_clear();
                    terminal_progress.bar.reset();
                }
                if json {
                    println!("{}", serde_json::to_string(&sample_json(index, &sample))?);
                } else {
                    print_sample(index, &sample);
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framebatch", &mut std::io::stdout());
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
