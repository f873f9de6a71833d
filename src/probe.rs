//! Lightweight stream probing.
//!
//! [`MediaProbe`] opens a container, copies out its stream descriptors and
//! closes it again. Useful when something has to be sized before a
//! [`Pipeline`](crate::Pipeline) exists, such as a display window.

use std::path::Path;

use crate::{
    backend::{MediaBackend, MediaContainer},
    error::PipelineError,
    ffmpeg_backend::FfmpegBackend,
    stream::{StreamDescriptor, select_video_stream},
};

/// Lightweight stream probe.
///
/// # Example
///
/// ```no_run
/// use framepipe::MediaProbe;
///
/// let video = MediaProbe::video_stream("input.mp4")?;
/// println!("{}x{} {:?}", video.width, video.height, video.codec);
/// # Ok::<(), framepipe::PipelineError>(())
/// ```
pub struct MediaProbe;

impl MediaProbe {
    /// Every stream in the container at `path`, in index order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FileOpen`] if the file cannot be opened.
    pub fn streams<P: AsRef<Path>>(path: P) -> Result<Vec<StreamDescriptor>, PipelineError> {
        Self::streams_with(&mut FfmpegBackend::new(), path.as_ref())
    }

    /// The stream a pipeline over `path` would play.
    ///
    /// # Errors
    ///
    /// [`PipelineError::FileOpen`] or [`PipelineError::NoVideoStream`].
    pub fn video_stream<P: AsRef<Path>>(path: P) -> Result<StreamDescriptor, PipelineError> {
        let streams = Self::streams(path)?;
        select_video_stream(&streams).cloned()
    }

    /// Probe through an arbitrary backend.
    pub fn streams_with<B: MediaBackend>(
        backend: &mut B,
        path: &Path,
    ) -> Result<Vec<StreamDescriptor>, PipelineError> {
        let mut container = backend.open_container(path)?;
        let streams = container.streams().to_vec();
        if let Err(error) = container.close() {
            log::warn!("Failed to close probed container {}: {error}", path.display());
        }
        Ok(streams)
    }
}
