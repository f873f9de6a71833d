use std::{path::PathBuf, process};

use clap::Parser;
use colored::Colorize;
use framepipe::{
    FfmpegBackend, MacroquadSurface, MediaProbe, Pipeline, PipelineConfig, PipelineError,
    PresentationFormat, Step, log_level_from_env, set_ffmpeg_log_level,
};
use macroquad::prelude::{Conf, next_frame};

const FALLBACK_SIZE: (u32, u32) = (640, 480);

#[derive(Debug, Parser)]
#[command(
    name = "frameplay",
    version,
    about = "Play the video stream of a media file in a window"
)]
struct Cli {
    /// Media file to play.
    input: PathBuf,
}

fn window_conf() -> Conf {
    let cli = Cli::parse();
    let (width, height) = MediaProbe::video_stream(&cli.input)
        .ok()
        .filter(|stream| stream.width > 0 && stream.height > 0)
        .map_or(FALLBACK_SIZE, |stream| (stream.width, stream.height));

    Conf {
        window_title: format!("frameplay - {}", cli.input.display()),
        window_width: i32::try_from(width).unwrap_or(FALLBACK_SIZE.0 as i32),
        window_height: i32::try_from(height).unwrap_or(FALLBACK_SIZE.1 as i32),
        window_resizable: false,
        ..Default::default()
    }
}

fn exit_with(error: PipelineError) -> ! {
    eprintln!("{} {error}", "error:".red().bold());
    if let Some(stage) = error.stage() {
        eprintln!("{} {stage}", "stage:".dimmed());
    }
    process::exit(error.exit_code());
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Some(level) = log_level_from_env() {
        set_ffmpeg_log_level(level);
    }

    let cli = Cli::parse();
    let config = PipelineConfig::display(PresentationFormat::Rgba, MacroquadSurface::open)
        .with_format_dump(true);
    let mut pipeline = match Pipeline::open(FfmpegBackend::new(), &cli.input, config) {
        Ok(pipeline) => pipeline,
        Err(error) => exit_with(error),
    };

    loop {
        match pipeline.step() {
            Ok(Step::Presented(_)) => next_frame().await,
            Ok(Step::Finished(_)) => break,
            Ok(_) => {}
            Err(error) => exit_with(pipeline.fail(error)),
        }
    }

    match pipeline.finish() {
        Ok(summary) => println!(
            "{} {}",
            "done:".green().bold(),
            format!("played {} frame(s)", summary.frames_delivered).green()
        ),
        Err(error) => exit_with(error),
    }
}
