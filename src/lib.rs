//! # framepipe
//!
//! Decode the primary video stream of a media file and deliver its frames,
//! either to disk as PPM images or to a window.
//!
//! `framepipe` sequences three capabilities it does not implement itself:
//! container demultiplexing, video decoding and pixel-format conversion.
//! The production implementation is [`FfmpegBackend`], powered by FFmpeg
//! through the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Dump the first five frames
//!
//! ```no_run
//! use framepipe::{FfmpegBackend, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::open(FfmpegBackend::new(), "input.mp4", PipelineConfig::extract_to("."))?;
//! let summary = pipeline.run()?;
//! assert!(summary.frames_delivered <= 5);
//! # Ok::<(), framepipe::PipelineError>(())
//! ```
//!
//! ### Drive the loop yourself
//!
//! ```no_run
//! use framepipe::{FfmpegBackend, Pipeline, PipelineConfig, Step};
//!
//! let config = PipelineConfig::extract_to("frames").with_frame_cap(None);
//! let mut pipeline = Pipeline::open(FfmpegBackend::new(), "input.mkv", config)?;
//! loop {
//!     match pipeline.step() {
//!         Ok(Step::Finished(reason)) => {
//!             println!("stopped: {reason:?}");
//!             break;
//!         }
//!         Ok(Step::Presented(sequence)) => println!("frame {sequence}"),
//!         Ok(_) => {}
//!         Err(error) => return Err(pipeline.fail(error)),
//!     }
//! }
//! pipeline.finish()?;
//! # Ok::<(), framepipe::PipelineError>(())
//! ```
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `display` | `MacroquadSurface` and the `frameplay` binary |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod backend;
pub mod config;
pub mod converter;
#[cfg(feature = "display")]
pub mod display;
pub mod error;
pub mod ffmpeg;
pub mod ffmpeg_backend;
pub mod frame;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod session;
pub mod sink;
pub mod stream;

pub use backend::{
    DecodeStatus, EncodedPacket, FrameScaler, MediaBackend, MediaContainer, RawVideoFrame,
    VideoDecoder,
};
pub use config::{DEFAULT_FRAME_CAP, PipelineConfig, SinkConfig};
pub use converter::{ConversionKey, FrameConverter, ScalingPolicy};
#[cfg(feature = "display")]
pub use display::MacroquadSurface;
pub use error::{PipelineError, PipelineStage};
pub use ffmpeg::{FFMPEG_LOG_ENV, FfmpegLogLevel, log_level_from_env, set_ffmpeg_log_level};
pub use ffmpeg_backend::{FfmpegBackend, FfmpegContainer, FfmpegDecoder, FfmpegScaler};
pub use frame::{PresentationFormat, PresentationFrame};
pub use pipeline::{Pipeline, PipelineState, RunSummary, Step, StopReason};
pub use probe::MediaProbe;
pub use progress::{ProgressCallback, ProgressInfo};
pub use session::{DecodeSession, Submission};
pub use sink::{DEFAULT_EXTENSION, DisplayOpener, DisplaySink, DisplaySurface, FileSink, OutputSink};
pub use stream::{StreamDescriptor, select_video_stream, video_streams};
