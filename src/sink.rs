//! Output sinks.
//!
//! The pipeline delivers every converted frame to exactly one
//! [`OutputSink`], chosen before the packet loop starts:
//!
//! - [`FileSink`] writes each frame as a binary PPM (`P6`) image named
//!   `frame<sequence>.<ext>`. A failed write drops that frame only.
//! - [`DisplaySink`] pushes each frame to a fixed-size [`DisplaySurface`].
//!   A surface failure ends the run.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{
    error::PipelineError,
    frame::{PresentationFormat, PresentationFrame},
};

/// Default file extension for dumped frames.
pub const DEFAULT_EXTENSION: &str = "ppm";

/// Largest sample value written in the PPM header.
const PPM_MAX_VALUE: u32 = 255;

/// A live, double-buffered rendering surface of fixed size.
///
/// [`present`](DisplaySurface::present) fills the back buffer; the surface
/// owner swaps buffers. At most one frame is in flight.
pub trait DisplaySurface {
    /// `(width, height)` the surface was created with.
    fn dimensions(&self) -> (u32, u32);

    /// Pixel format the surface accepts.
    fn pixel_format(&self) -> PresentationFormat;

    /// Show `frame`. Blocks only as long as the underlying call does.
    fn present(&mut self, frame: &PresentationFrame) -> Result<(), PipelineError>;
}

/// Opens a [`DisplaySurface`] once the stream geometry is known.
///
/// Implemented for any `FnOnce(u32, u32) -> Result<Box<dyn DisplaySurface>, PipelineError>`.
pub trait DisplayOpener {
    /// Open a surface of `width x height`.
    fn open(self: Box<Self>, width: u32, height: u32) -> Result<Box<dyn DisplaySurface>, PipelineError>;
}

impl<F> DisplayOpener for F
where
    F: FnOnce(u32, u32) -> Result<Box<dyn DisplaySurface>, PipelineError>,
{
    fn open(self: Box<Self>, width: u32, height: u32) -> Result<Box<dyn DisplaySurface>, PipelineError> {
        (*self)(width, height)
    }
}

/// Writes frames to disk as binary PPM images.
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
    extension: String,
    files_written: u64,
}

impl FileSink {
    /// Create a sink writing into `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SinkInit`] if `directory` does not exist or
    /// is not a directory.
    pub fn new<P: AsRef<Path>>(directory: P, extension: &str) -> Result<Self, PipelineError> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(PipelineError::SinkInit(format!(
                "output directory {} does not exist",
                directory.display()
            )));
        }

        let extension = extension.trim_start_matches('.');
        let extension = if extension.is_empty() {
            DEFAULT_EXTENSION
        } else {
            extension
        };

        Ok(Self {
            directory,
            extension: extension.to_string(),
            files_written: 0,
        })
    }

    /// Path the frame with `sequence_number` is written to.
    pub fn frame_path(&self, sequence_number: u64) -> PathBuf {
        self.directory
            .join(format!("frame{sequence_number}.{}", self.extension))
    }

    /// Number of files written successfully.
    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    /// Write `frame` to [`frame_path`](FileSink::frame_path).
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Conversion`] if the frame is not RGB24 or its
    ///   payload is not exactly `width * height * 3` bytes. Nothing is
    ///   written.
    /// - [`PipelineError::FrameWrite`] if the file cannot be created or
    ///   written. A partially written file is removed.
    pub fn present(
        &mut self,
        frame: &PresentationFrame,
        width: u32,
        height: u32,
        sequence_number: u64,
    ) -> Result<(), PipelineError> {
        let expected = width as usize * height as usize * 3;
        if frame.format() != PresentationFormat::Rgb24
            || frame.width() != width
            || frame.height() != height
            || frame.len() != expected
        {
            return Err(PipelineError::Conversion(format!(
                "file sink needs a {width}x{height} RGB24 frame ({expected} bytes), got {:?} {}x{} ({} bytes)",
                frame.format(),
                frame.width(),
                frame.height(),
                frame.len(),
            )));
        }

        let path = self.frame_path(sequence_number);
        if let Err(source) = write_ppm(&path, frame.data(), width, height) {
            discard_partial(&path);
            return Err(PipelineError::FrameWrite { path, source });
        }

        self.files_written += 1;
        log::debug!("Wrote frame {sequence_number} to {}", path.display());
        Ok(())
    }
}

/// Remove whatever a failed write left at `path`. A dropped frame leaves no file.
fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed partial frame {}", path.display()),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => log::warn!("Failed to remove partial frame {}: {error}", path.display()),
    }
}

fn write_ppm(path: &Path, pixels: &[u8], width: u32, height: u32) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write!(writer, "P6\n{width} {height}\n{PPM_MAX_VALUE}\n")?;
    writer.write_all(pixels)?;
    writer.flush()
}

/// Pushes frames to a [`DisplaySurface`].
pub struct DisplaySink {
    surface: Box<dyn DisplaySurface>,
    width: u32,
    height: u32,
    frames_shown: u64,
}

impl Debug for DisplaySink {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DisplaySink")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames_shown", &self.frames_shown)
            .finish_non_exhaustive()
    }
}

impl DisplaySink {
    /// Wrap an open surface.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SinkInit`] if the surface size differs from
    /// `width x height`.
    pub fn new(surface: Box<dyn DisplaySurface>, width: u32, height: u32) -> Result<Self, PipelineError> {
        let (surface_width, surface_height) = surface.dimensions();
        if (surface_width, surface_height) != (width, height) {
            return Err(PipelineError::SinkInit(format!(
                "display surface is {surface_width}x{surface_height}, stream is {width}x{height}"
            )));
        }

        Ok(Self {
            surface,
            width,
            height,
            frames_shown: 0,
        })
    }

    /// Pixel format the surface accepts.
    pub fn pixel_format(&self) -> PresentationFormat {
        self.surface.pixel_format()
    }

    /// Number of frames presented.
    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    /// Push `frame` to the surface.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Display`] if the frame does not match the
    /// surface, or if the surface fails.
    pub fn present(&mut self, frame: &PresentationFrame, width: u32, height: u32) -> Result<(), PipelineError> {
        if (width, height) != (self.width, self.height)
            || (frame.width(), frame.height()) != (self.width, self.height)
            || frame.format() != self.surface.pixel_format()
        {
            return Err(PipelineError::Display(format!(
                "frame {:?} {}x{} does not fit the {:?} {}x{} surface",
                frame.format(),
                frame.width(),
                frame.height(),
                self.surface.pixel_format(),
                self.width,
                self.height,
            )));
        }

        self.surface.present(frame).map_err(|error| match error {
            PipelineError::Display(_) => error,
            other => PipelineError::Display(other.to_string()),
        })?;
        self.frames_shown += 1;
        Ok(())
    }
}

/// The active output, selected once per run.
#[derive(Debug)]
pub enum OutputSink {
    /// Write frames to disk.
    File(FileSink),
    /// Show frames on screen.
    Display(DisplaySink),
}

impl OutputSink {
    /// Deliver one frame.
    ///
    /// `sequence_number` is the 1-based delivery count; the file sink uses it
    /// to name the output.
    pub fn present(
        &mut self,
        frame: &PresentationFrame,
        width: u32,
        height: u32,
        sequence_number: u64,
    ) -> Result<(), PipelineError> {
        match self {
            OutputSink::File(sink) => sink.present(frame, width, height, sequence_number),
            OutputSink::Display(sink) => sink.present(frame, width, height),
        }
    }

    /// Pixel format the sink expects.
    pub fn pixel_format(&self) -> PresentationFormat {
        match self {
            OutputSink::File(_) => PresentationFormat::Rgb24,
            OutputSink::Display(sink) => sink.pixel_format(),
        }
    }
}
