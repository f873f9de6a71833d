//! FFmpeg initialisation and log level configuration.
//!
//! FFmpeg keeps its own console logging, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade used by this crate. The
//! helpers here let the binaries (and library users) tune it without
//! importing `ffmpeg-next` directly.
//!
//! Because the command-line tools take no flags, the level is read from the
//! [`FFMPEG_LOG_ENV`] environment variable:
//!
//! ```text
//! FRAMEPIPE_FFMPEG_LOG=error framedump input.mp4
//! ```
//!
//! Rust-side diagnostics are configured separately through `RUST_LOG`, which
//! the binaries hand to `env_logger`.

use std::str::FromStr;

use ffmpeg_next::util::log::Level;

use crate::error::PipelineError;

/// Environment variable consulted by [`log_level_from_env`].
pub const FFMPEG_LOG_ENV: &str = "FRAMEPIPE_FFMPEG_LOG";

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level causes
/// FFmpeg to suppress all messages below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log conditions the process cannot recover from.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (FFmpeg's default).
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "panic" => Ok(FfmpegLogLevel::Panic),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            "trace" => Ok(FfmpegLogLevel::Trace),
            other => Err(format!("unknown FFmpeg log level: {other}")),
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
///
/// This controls what FFmpeg prints to stderr. It does **not** affect
/// Rust-side `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Read the FFmpeg log level from [`FFMPEG_LOG_ENV`].
///
/// Returns `None` when the variable is unset. An unparseable value is
/// reported with a warning and ignored.
pub fn log_level_from_env() -> Option<FfmpegLogLevel> {
    let value = std::env::var(FFMPEG_LOG_ENV).ok()?;
    match value.parse() {
        Ok(level) => Some(level),
        Err(reason) => {
            log::warn!("Ignoring {FFMPEG_LOG_ENV}: {reason}");
            None
        }
    }
}

/// Initialise the FFmpeg libraries. Safe to call more than once.
pub(crate) fn initialize() -> Result<(), PipelineError> {
    ffmpeg_next::init().map_err(|error| {
        PipelineError::FfmpegError(format!("FFmpeg initialisation failed: {error}"))
    })
}
