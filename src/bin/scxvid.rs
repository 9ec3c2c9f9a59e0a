use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use scxvid::{
    FfmpegLogLevel, FfmpegStatsBackend, Pipeline, PipelineOptions, ProgressCallback,
    ProgressInfo, RunSummary, ScxvidError, StatsCodec,
};

const USAGE: &str = "SCXvid - a standalone port of the AviSynth SCXvid plugin.\n\n\
Usage: scxvid {output_log_file} < {input_file}\n\n\
Only YUV420P Y4M input is supported.\n";

const CLI_AFTER_HELP: &str = "Examples:\n  ffmpeg -i input.mkv -f yuv4mpegpipe -pix_fmt yuv420p - | scxvid keyframes.log\n  scxvid --codec mpeg4 --progress keyframes.log < input.y4m\n  scxvid --completions zsh > _scxvid";

#[derive(Debug, Parser)]
#[command(
    name = "scxvid",
    version,
    about = "Write Xvid first-pass statistics (scene changes) for a Y4M stream read from stdin",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Statistics log to write.
    log_file: Option<PathBuf>,

    /// Encoder producing the statistics (auto, xvid, mpeg4).
    #[arg(long, default_value = "auto")]
    codec: String,

    /// Encoder thread count (0 lets FFmpeg decide).
    #[arg(long)]
    threads: Option<usize>,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, default_value = "error")]
    ffmpeg_log_level: String,

    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a frame counter on stderr.
    #[arg(long)]
    progress: bool,

    /// Print a machine-readable run summary to stdout.
    #[arg(long)]
    json: bool,

    /// Generate a shell completion script and exit.
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

fn parse_codec(value: &str) -> Result<StatsCodec, String> {
    StatsCodec::from_name(value).ok_or(format!("unsupported --codec: {value}"))
}

fn parse_log_level(value: &str) -> Result<FfmpegLogLevel, String> {
    FfmpegLogLevel::from_name(value).ok_or(format!("unsupported --ffmpeg-log-level: {value}"))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_target(false)
        .init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frames [{elapsed_precise}] {msg}",
        )?);
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.frames_encoded);
        self.bar
            .set_message(format!("{:.1} fps", info.frames_per_second));
    }
}

fn print_summary(summary: &RunSummary, log_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = &summary.header.geometry;
    let payload = json!({
        "log_file": log_file.display().to_string(),
        "width": geometry.width(),
        "height": geometry.height(),
        "frame_size": geometry.frame_size(),
        "frame_rate": summary
            .header
            .frame_rate
            .map(|(numerator, denominator)| format!("{numerator}:{denominator}")),
        "colorspace": summary.header.colorspace,
        "frames": summary.frames_encoded,
        "bitstream_bytes": summary.bitstream_bytes,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "scxvid", &mut io::stdout());
        return Ok(());
    }

    let Some(log_file) = cli.log_file else {
        print!("{USAGE}");
        io::stdout().flush()?;
        return Ok(());
    };

    init_logging(cli.verbose);
    scxvid::set_ffmpeg_log_level(parse_log_level(&cli.ffmpeg_log_level)?);

    let mut backend = FfmpegStatsBackend::new().codec(parse_codec(&cli.codec)?);
    if let Some(threads) = cli.threads {
        backend = backend.threads(threads);
    }

    let mut options = PipelineOptions::new(log_file.clone());
    let progress = if cli.progress {
        let progress = Arc::new(TerminalProgress::new()?);
        options = options
            .with_progress(progress.clone())
            .with_progress_interval(10);
        Some(progress)
    } else {
        None
    };

    let mut pipeline = Pipeline::new(backend, options);
    let result = pipeline.run(io::stdin().lock());

    if let Some(progress) = &progress {
        progress.bar.finish_and_clear();
    }

    let summary = result?;
    if cli.verbose {
        eprintln!(
            "{} {} frames -> {}",
            "done".green().bold(),
            summary.frames_encoded,
            log_file.display()
        );
    }
    if cli.json {
        print_summary(&summary, &log_file)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => match error.downcast_ref::<ScxvidError>() {
            Some(failure) => {
                eprintln!("{} {}: {failure}", "error:".red().bold(), failure.phase());
                ExitCode::from(failure.exit_code())
            }
            None => {
                eprintln!("{} {error}", "error:".red().bold());
                ExitCode::FAILURE
            }
        },
    }
}
