//! Pipeline configuration.
//!
//! [`PipelineConfig`] is a builder that picks the output sink and threads
//! the frame cap, scaling policy and progress callback through
//! [`Pipeline::open`](crate::Pipeline::open).
//!
//! # Example
//!
//! ```no_run
//! use framepipe::{FfmpegBackend, Pipeline, PipelineConfig, ScalingPolicy};
//!
//! let config = PipelineConfig::extract_to("frames")
//!     .with_frame_cap(Some(10))
//!     .with_scaling(ScalingPolicy::Bicubic);
//!
//! let summary = Pipeline::open(FfmpegBackend::new(), "input.mp4", config)?.run()?;
//! println!("wrote {} frames", summary.frames_delivered);
//! # Ok::<(), framepipe::PipelineError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::PathBuf,
    sync::Arc,
};

use crate::{
    converter::ScalingPolicy,
    error::PipelineError,
    frame::PresentationFormat,
    progress::{NoOpProgress, ProgressCallback},
    sink::{DEFAULT_EXTENSION, DisplayOpener, DisplaySink, DisplaySurface, FileSink, OutputSink},
};

/// Number of frames an extraction run writes unless told otherwise.
pub const DEFAULT_FRAME_CAP: u64 = 5;

/// Which sink to build, and how.
pub enum SinkConfig {
    /// Write PPM images into `directory`.
    File {
        /// Output directory. Must exist.
        directory: PathBuf,
        /// File extension, without the dot.
        extension: String,
    },
    /// Show frames on a display surface.
    Display {
        /// Pixel format the surface accepts.
        format: PresentationFormat,
        /// Opens the surface once the stream size is known.
        opener: Box<dyn DisplayOpener>,
    },
}

impl Debug for SinkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SinkConfig::File {
                directory,
                extension,
            } => f
                .debug_struct("File")
                .field("directory", directory)
                .field("extension", extension)
                .finish(),
            SinkConfig::Display { format, .. } => f
                .debug_struct("Display")
                .field("format", format)
                .finish_non_exhaustive(),
        }
    }
}

impl SinkConfig {
    /// Presentation format frames must be converted to for this sink.
    pub fn presentation_format(&self) -> PresentationFormat {
        match self {
            SinkConfig::File { .. } => PresentationFormat::Rgb24,
            SinkConfig::Display { format, .. } => *format,
        }
    }

    /// Build the sink for a `width x height` stream.
    pub(crate) fn build(self, width: u32, height: u32) -> Result<OutputSink, PipelineError> {
        match self {
            SinkConfig::File {
                directory,
                extension,
            } => Ok(OutputSink::File(FileSink::new(directory, &extension)?)),
            SinkConfig::Display { format, opener } => {
                let surface = opener.open(width, height).map_err(|error| match error {
                    PipelineError::SinkInit(_) => error,
                    other => PipelineError::SinkInit(other.to_string()),
                })?;
                if surface.pixel_format() != format {
                    return Err(PipelineError::SinkInit(format!(
                        "display surface accepts {:?}, pipeline converts to {format:?}",
                        surface.pixel_format()
                    )));
                }
                Ok(OutputSink::Display(DisplaySink::new(surface, width, height)?))
            }
        }
    }
}

/// Configuration for one playback run.
pub struct PipelineConfig {
    pub(crate) sink: SinkConfig,
    /// Stop after this many delivered frames. `None` runs to end-of-stream.
    pub(crate) frame_cap: Option<u64>,
    pub(crate) scaling: ScalingPolicy,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Fire the progress callback every N delivered frames.
    pub(crate) batch_size: u64,
    /// Pull frames still buffered in the decoder after end-of-stream.
    pub(crate) drain: bool,
    /// Print the container description when it is opened.
    pub(crate) dump_format: bool,
}

impl Debug for PipelineConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineConfig")
            .field("sink", &self.sink)
            .field("frame_cap", &self.frame_cap)
            .field("scaling", &self.scaling)
            .field("has_progress", &true)
            .field("batch_size", &self.batch_size)
            .field("drain", &self.drain)
            .field("dump_format", &self.dump_format)
            .finish()
    }
}

impl PipelineConfig {
    fn with_sink(sink: SinkConfig, frame_cap: Option<u64>) -> Self {
        Self {
            sink,
            frame_cap,
            scaling: ScalingPolicy::default(),
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
            drain: true,
            dump_format: false,
        }
    }

    /// Write frames into `directory` as PPM images, stopping after
    /// [`DEFAULT_FRAME_CAP`] frames.
    pub fn extract_to<P: Into<PathBuf>>(directory: P) -> Self {
        Self::with_sink(
            SinkConfig::File {
                directory: directory.into(),
                extension: DEFAULT_EXTENSION.to_string(),
            },
            Some(DEFAULT_FRAME_CAP),
        )
    }

    /// Show frames on a surface opened by `opener`, with no frame cap.
    ///
    /// `format` must match what the surface accepts; the check happens when
    /// the pipeline opens.
    pub fn display<F>(format: PresentationFormat, opener: F) -> Self
    where
        F: FnOnce(u32, u32) -> Result<Box<dyn DisplaySurface>, PipelineError> + 'static,
    {
        Self::with_sink(
            SinkConfig::Display {
                format,
                opener: Box::new(opener),
            },
            None,
        )
    }

    /// Set or clear the frame cap. `Some(0)` delivers nothing.
    #[must_use]
    pub fn with_frame_cap(mut self, cap: Option<u64>) -> Self {
        self.frame_cap = cap;
        self
    }

    /// Set the file extension for the file sink. Ignored for display.
    #[must_use]
    pub fn with_extension(mut self, ext: &str) -> Self {
        if let SinkConfig::File { extension, .. } = &mut self.sink {
            *extension = ext.trim_start_matches('.').to_string();
        }
        self
    }

    /// Set the interpolation policy.
    #[must_use]
    pub fn with_scaling(mut self, scaling: ScalingPolicy) -> Self {
        self.scaling = scaling;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Control whether buffered frames are drained at end-of-stream.
    /// Defaults to `true`.
    #[must_use]
    pub fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }

    /// Control whether the container description is printed on open.
    /// Defaults to `false`.
    #[must_use]
    pub fn with_format_dump(mut self, dump: bool) -> Self {
        self.dump_format = dump;
        self
    }

    /// The configured frame cap.
    pub fn frame_cap(&self) -> Option<u64> {
        self.frame_cap
    }

    /// The configured sink.
    pub fn sink(&self) -> &SinkConfig {
        &self.sink
    }
}
