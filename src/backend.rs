//! Capability traits at the decode/convert seams.
//!
//! The pipeline never demuxes, decodes or converts anything itself. It drives
//! a [`MediaBackend`], which hands out a container, a decoder bound to one
//! stream, and a scaler bound to one conversion key. The production backend
//! is [`FfmpegBackend`](crate::FfmpegBackend); tests plug in fakes.

use std::path::Path;

use ffmpeg_next::format::Pixel;

use crate::{
    converter::ConversionKey, error::PipelineError, frame::PresentationFrame,
    stream::StreamDescriptor,
};

/// Factory for the three external capabilities the pipeline sequences.
pub trait MediaBackend {
    /// Compressed packet read from the container.
    type Packet: EncodedPacket;
    /// Decoded frame in the stream's native format.
    type Frame: RawVideoFrame;
    /// Open container.
    type Container: MediaContainer<Packet = Self::Packet>;
    /// Decoder bound to one stream.
    type Decoder: VideoDecoder<Packet = Self::Packet, Frame = Self::Frame>;
    /// Conversion context bound to one [`ConversionKey`].
    type Scaler: FrameScaler<Frame = Self::Frame>;

    /// Open and probe the container at `path`.
    ///
    /// Fails with [`PipelineError::FileOpen`].
    fn open_container(&mut self, path: &Path) -> Result<Self::Container, PipelineError>;

    /// Resolve and open a decoder for `stream`.
    ///
    /// Fails with [`PipelineError::CodecUnsupported`] when no decoder exists
    /// for the codec, or [`PipelineError::CodecOpen`] when the decoder
    /// refuses the stream's parameters.
    fn open_decoder(
        &mut self,
        container: &Self::Container,
        stream: &StreamDescriptor,
    ) -> Result<Self::Decoder, PipelineError>;

    /// Create a conversion context for `key`.
    ///
    /// Fails with [`PipelineError::ConverterInit`].
    fn create_scaler(&mut self, key: &ConversionKey) -> Result<Self::Scaler, PipelineError>;
}

/// An open media container.
pub trait MediaContainer {
    /// Packet type produced by [`read_packet`](MediaContainer::read_packet).
    type Packet: EncodedPacket;

    /// Every stream in the container, in index order.
    fn streams(&self) -> &[StreamDescriptor];

    /// Read the next packet, or `None` at end-of-stream.
    fn read_packet(&mut self) -> Result<Option<Self::Packet>, PipelineError>;

    /// Print a human-readable description of the container to stderr.
    fn dump_format(&self, _path: &Path) {}

    /// Release the container. Reading after this is a contract violation.
    fn close(&mut self) -> Result<(), PipelineError>;
}

/// A compressed, container-framed chunk of one stream's data.
pub trait EncodedPacket {
    /// Index of the stream the packet belongs to.
    fn stream_index(&self) -> usize;
}

/// A raw decoded picture.
pub trait RawVideoFrame {
    /// An unpopulated frame, ready to be filled by a decoder.
    fn empty() -> Self;
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Memory layout of the pixel data.
    fn pixel_format(&self) -> Pixel;
}

/// Result of feeding a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The output frame was fully overwritten with a new picture.
    FrameReady,
    /// The decoder needs more input; the output frame was not touched.
    Pending,
}

/// A stateful decoder bound to one stream.
///
/// Implementations must leave the output frame untouched unless they return
/// [`DecodeStatus::FrameReady`].
pub trait VideoDecoder {
    /// Compressed input.
    type Packet;
    /// Decoded output.
    type Frame;

    /// Feed one packet and pull at most one frame.
    ///
    /// A corrupt packet is reported as [`PipelineError::Decode`]; any other
    /// error is fatal to the run.
    fn decode(
        &mut self,
        packet: &Self::Packet,
        frame: &mut Self::Frame,
    ) -> Result<DecodeStatus, PipelineError>;

    /// After end-of-stream, pull one frame still buffered inside the decoder.
    fn drain(&mut self, frame: &mut Self::Frame) -> Result<DecodeStatus, PipelineError>;

    /// Release the codec instance.
    fn close(&mut self) -> Result<(), PipelineError>;
}

/// A pixel-format conversion context.
pub trait FrameScaler {
    /// Decoded input.
    type Frame;

    /// Convert `source` into `destination`, overwriting its pixel data.
    fn scale(
        &mut self,
        source: &Self::Frame,
        destination: &mut PresentationFrame,
    ) -> Result<(), PipelineError>;
}
