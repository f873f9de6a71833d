//! Error types for the `framepipe` crate.
//!
//! This module defines [`PipelineError`], the unified error type returned by
//! every fallible operation in the crate, and [`PipelineStage`], which names
//! the acquisition step an initialisation failure belongs to.
//!
//! Errors fall into two groups. Recoverable errors ([`PipelineError::Decode`]
//! on a single packet, [`PipelineError::FrameWrite`] on a single frame) are
//! skipped by the pipeline driver. Everything else ends the run.

use std::{fmt, io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The acquisition stages walked by [`Pipeline::open`](crate::Pipeline::open),
/// in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Opening and probing the media container.
    OpenContainer,
    /// Locating the first video stream.
    SelectStream,
    /// Resolving and opening the decoder.
    OpenDecoder,
    /// Creating the conversion context and presentation buffer.
    CreateConverter,
    /// Opening the output sink.
    InitSink,
    /// The packet loop.
    Run,
    /// Releasing resources after the loop.
    Teardown,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::OpenContainer => "open container",
            PipelineStage::SelectStream => "select video stream",
            PipelineStage::OpenDecoder => "open decoder",
            PipelineStage::CreateConverter => "create converter",
            PipelineStage::InitSink => "initialise output sink",
            PipelineStage::Run => "packet loop",
            PipelineStage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// The unified error type for all `framepipe` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The media container could not be opened or probed.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the pipeline.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container does not expose any stream classified as video.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// No decoder implementation exists for the stream's codec.
    #[error("Unsupported codec: {codec}")]
    CodecUnsupported {
        /// Name of the codec identifier that could not be resolved.
        codec: String,
    },

    /// The resolved decoder refused the stream's parameters.
    #[error("Failed to open codec: {0}")]
    CodecOpen(String),

    /// The conversion context could not be created.
    #[error("Failed to create conversion context: {0}")]
    ConverterInit(String),

    /// The output sink could not be initialised.
    #[error("Failed to initialise output sink: {0}")]
    SinkInit(String),

    /// A single packet could not be decoded.
    #[error("Failed to decode video packet: {0}")]
    Decode(String),

    /// A decoded frame could not be converted to the presentation format.
    #[error("Frame conversion failed: {0}")]
    Conversion(String),

    /// A frame could not be written to disk by the file sink.
    #[error("Failed to write frame to {path}: {source}")]
    FrameWrite {
        /// Destination file.
        path: PathBuf,
        /// The underlying I/O failure.
        source: IoError,
    },

    /// The display surface rejected a frame or became unavailable.
    #[error("Display error: {0}")]
    Display(String),

    /// A packet was submitted to a decode session that has been closed.
    #[error("Decode session is closed")]
    SessionClosed,

    /// A packet from another stream reached the decode session.
    #[error("Packet from stream {actual} submitted to decoder bound to stream {expected}")]
    StreamMismatch {
        /// Stream index the session is bound to.
        expected: usize,
        /// Stream index of the offending packet.
        actual: usize,
    },

    /// The pipeline has already released its resources.
    #[error("Pipeline is closed")]
    PipelineClosed,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for PipelineError {
    fn from(error: FfmpegError) -> Self {
        PipelineError::FfmpegError(error.to_string())
    }
}

impl PipelineError {
    /// Whether the pipeline driver skips this error and keeps going.
    ///
    /// Only a corrupt packet and a failed frame write are recoverable; the
    /// packet or frame involved is dropped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Decode(_) | PipelineError::FrameWrite { .. }
        )
    }

    /// The acquisition stage this error is reported against, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::FileOpen { .. } => Some(PipelineStage::OpenContainer),
            PipelineError::NoVideoStream => Some(PipelineStage::SelectStream),
            PipelineError::CodecUnsupported { .. } | PipelineError::CodecOpen(_) => {
                Some(PipelineStage::OpenDecoder)
            }
            PipelineError::ConverterInit(_) => Some(PipelineStage::CreateConverter),
            PipelineError::SinkInit(_) => Some(PipelineStage::InitSink),
            PipelineError::Decode(_)
            | PipelineError::Conversion(_)
            | PipelineError::FrameWrite { .. }
            | PipelineError::Display(_)
            | PipelineError::SessionClosed
            | PipelineError::StreamMismatch { .. } => Some(PipelineStage::Run),
            PipelineError::PipelineClosed
            | PipelineError::FfmpegError(_)
            | PipelineError::IoError(_) => None,
        }
    }

    /// Process exit code for this error.
    ///
    /// Each fatal class maps to its own code. `2` is left to the argument
    /// parser for usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::FileOpen { .. } => 3,
            PipelineError::NoVideoStream => 4,
            PipelineError::CodecUnsupported { .. } => 5,
            PipelineError::CodecOpen(_) => 6,
            PipelineError::ConverterInit(_) => 7,
            PipelineError::SinkInit(_) => 8,
            PipelineError::Conversion(_) => 9,
            PipelineError::Display(_) => 10,
            _ => 1,
        }
    }
}
