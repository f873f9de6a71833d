use std::{path::PathBuf, process, sync::Arc};

use clap::Parser;
use colored::Colorize;
use framepipe::{
    DEFAULT_FRAME_CAP, FfmpegBackend, Pipeline, PipelineConfig, PipelineError, ProgressCallback,
    ProgressInfo, RunSummary, StopReason, log_level_from_env, set_ffmpeg_log_level,
};
use indicatif::{ProgressBar, ProgressStyle};

const CLI_AFTER_HELP: &str = "Writes frame1.ppm .. frame5.ppm into the current directory.\n\nEnvironment:\n  RUST_LOG=debug              library diagnostics\n  FRAMEPIPE_FFMPEG_LOG=error  FFmpeg's own verbosity";

#[derive(Debug, Parser)]
#[command(
    name = "framedump",
    version,
    about = "Dump the first frames of a media file's video stream as PPM images",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Media file to read.
    input: PathBuf,
}

struct BarProgress {
    bar: ProgressBar,
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.current);
        if let Some(sequence) = info.sequence_number {
            self.bar.set_message(format!("frame{sequence}.ppm"));
        }
    }
}

fn progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
    bar.set_style(style.progress_chars("##-"));
    Ok(bar)
}

fn describe_stop(reason: Option<StopReason>) -> &'static str {
    match reason {
        Some(StopReason::FrameCapReached) => "frame cap reached",
        Some(StopReason::EndOfStream) => "end of stream",
        None => "stopped",
    }
}

fn report(summary: &RunSummary) {
    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Wrote {} frame(s) ({})",
            summary.frames_delivered - summary.frames_dropped,
            describe_stop(summary.stop_reason)
        )
        .green()
    );
    if summary.frames_dropped > 0 {
        eprintln!(
            "{} {} frame(s) could not be written",
            "warning:".yellow().bold(),
            summary.frames_dropped
        );
    }
    if summary.decode_errors > 0 {
        eprintln!(
            "{} skipped {} corrupt packet(s)",
            "warning:".yellow().bold(),
            summary.decode_errors
        );
    }
}

fn run(cli: Cli) -> Result<RunSummary, PipelineError> {
    let bar = progress_bar(DEFAULT_FRAME_CAP).unwrap_or_else(|_| ProgressBar::new(DEFAULT_FRAME_CAP));
    let config = PipelineConfig::extract_to(".")
        .with_format_dump(true)
        .with_progress(Arc::new(BarProgress { bar: bar.clone() }));

    let result = Pipeline::open(FfmpegBackend::new(), &cli.input, config).and_then(Pipeline::run);
    match &result {
        Ok(_) => bar.finish_with_message("done"),
        Err(_) => bar.abandon(),
    }
    result
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Some(level) = log_level_from_env() {
        set_ffmpeg_log_level(level);
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) => report(&summary),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            if let Some(stage) = error.stage() {
                eprintln!("{} {stage}", "stage:".dimmed());
            }
            process::exit(error.exit_code());
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use framepipe::StopReason;

    use super::{Cli, describe_stop};

    #[test]
    fn takes_exactly_one_path() {
        let cli = Cli::try_parse_from(["framedump", "movie.mkv"]).unwrap();
        assert_eq!(cli.input.to_str(), Some("movie.mkv"));

        assert!(Cli::try_parse_from(["framedump"]).is_err());
        assert!(Cli::try_parse_from(["framedump", "a.mp4", "b.mp4"]).is_err());
    }

    #[test]
    fn stop_reasons_read_naturally() {
        assert_eq!(describe_stop(Some(StopReason::FrameCapReached)), "frame cap reached");
        assert_eq!(describe_stop(Some(StopReason::EndOfStream)), "end of stream");
        assert_eq!(describe_stop(None), "stopped");
    }
}
