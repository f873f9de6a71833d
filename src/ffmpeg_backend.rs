//! The FFmpeg implementation of the capability traits.
//!
//! [`FfmpegBackend`] opens containers with libavformat, decoders with
//! libavcodec and conversion contexts with libswscale, all through
//! `ffmpeg-next`.

use std::{collections::VecDeque, mem, path::Path};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::{Id as CodecId, context::Context as CodecContext},
    decoder::Video as FfmpegVideoDecoder,
    format::{Pixel, context::Input, stream::Stream},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::Context as ScalingContext,
    util::error::EAGAIN,
};

use crate::{
    backend::{
        DecodeStatus, EncodedPacket, FrameScaler, MediaBackend, MediaContainer, RawVideoFrame,
        VideoDecoder,
    },
    converter::ConversionKey,
    error::PipelineError,
    frame::{PresentationFormat, PresentationFrame},
    stream::StreamDescriptor,
};

/// Opens media through the FFmpeg libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    /// Create the backend. FFmpeg itself is initialised on first open.
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    type Packet = Packet;
    type Frame = VideoFrame;
    type Container = FfmpegContainer;
    type Decoder = FfmpegDecoder;
    type Scaler = FfmpegScaler;

    fn open_container(&mut self, path: &Path) -> Result<FfmpegContainer, PipelineError> {
        FfmpegContainer::open(path)
    }

    fn open_decoder(
        &mut self,
        container: &FfmpegContainer,
        stream: &StreamDescriptor,
    ) -> Result<FfmpegDecoder, PipelineError> {
        FfmpegDecoder::open(container, stream)
    }

    fn create_scaler(&mut self, key: &ConversionKey) -> Result<FfmpegScaler, PipelineError> {
        FfmpegScaler::new(key)
    }
}

/// An open libavformat input context.
pub struct FfmpegContainer {
    input: Option<Input>,
    streams: Vec<StreamDescriptor>,
}

impl FfmpegContainer {
    /// Open and probe the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FileOpen`] if FFmpeg cannot open the file or
    /// read its stream information.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        log::debug!("Opening container: {}", path.display());

        crate::ffmpeg::initialize().map_err(|error| PipelineError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let input = ffmpeg_next::format::input(path).map_err(|error| PipelineError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let streams: Vec<StreamDescriptor> = input.streams().map(|stream| describe(&stream)).collect();
        log::debug!(
            "Container {} has {} streams ({})",
            input.format().name(),
            streams.len(),
            streams
                .iter()
                .map(|stream| format!("{}:{:?}", stream.index, stream.medium))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            input: Some(input),
            streams,
        })
    }

    fn input(&self) -> Result<&Input, PipelineError> {
        self.input.as_ref().ok_or(PipelineError::PipelineClosed)
    }
}

fn describe(stream: &Stream) -> StreamDescriptor {
    let parameters = stream.parameters();
    let medium = parameters.medium();
    let codec = parameters.id();
    if medium != Type::Video {
        return StreamDescriptor::other(stream.index(), medium, codec);
    }

    let (width, height, pixel_format) = video_geometry(stream).unwrap_or_else(|| {
        log::debug!(
            "No geometry for video stream {} ({codec:?}); leaving it empty",
            stream.index()
        );
        (0, 0, Pixel::None)
    });
    StreamDescriptor::video(stream.index(), codec, width, height, pixel_format)
}

fn video_geometry(stream: &Stream) -> Option<(u32, u32, Pixel)> {
    let decoder = CodecContext::from_parameters(stream.parameters())
        .ok()?
        .decoder()
        .video()
        .ok()?;
    Some((decoder.width(), decoder.height(), decoder.format()))
}

impl MediaContainer for FfmpegContainer {
    type Packet = Packet;

    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, PipelineError> {
        let input = self.input.as_mut().ok_or(PipelineError::PipelineClosed)?;
        let mut packet = Packet::empty();
        match packet.read(input) {
            Ok(()) => Ok(Some(packet)),
            Err(FfmpegError::Eof) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn dump_format(&self, path: &Path) {
        if let Some(input) = self.input.as_ref() {
            ffmpeg_next::format::context::input::dump(input, 0, path.to_str());
        }
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        if self.input.take().is_some() {
            log::debug!("Closed container");
        }
        Ok(())
    }
}

impl EncodedPacket for Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }
}

impl RawVideoFrame for VideoFrame {
    fn empty() -> Self {
        VideoFrame::empty()
    }

    fn width(&self) -> u32 {
        VideoFrame::width(self)
    }

    fn height(&self) -> u32 {
        VideoFrame::height(self)
    }

    fn pixel_format(&self) -> Pixel {
        self.format()
    }
}

fn is_again(error: &FfmpegError) -> bool {
    matches!(error, FfmpegError::Other { errno } if *errno == EAGAIN)
}

/// A libavcodec video decoder bound to one stream.
///
/// Frames are received into a private scratch frame and swapped into the
/// caller's frame only on success. Frames pulled out to make room for a
/// packet wait in `pending` and are handed out before anything newer.
pub struct FfmpegDecoder {
    decoder: Option<FfmpegVideoDecoder>,
    scratch: VideoFrame,
    pending: VecDeque<VideoFrame>,
    eof_sent: bool,
}

impl FfmpegDecoder {
    /// Resolve and open a decoder for `stream`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::CodecUnsupported`] if FFmpeg has no decoder for
    ///   the codec.
    /// - [`PipelineError::CodecOpen`] if the decoder refuses the stream's
    ///   parameters.
    pub fn open(container: &FfmpegContainer, stream: &StreamDescriptor) -> Result<Self, PipelineError> {
        let codec = resolve(stream.codec)?;

        let input = container.input()?;
        let ffmpeg_stream = input
            .stream(stream.index)
            .ok_or_else(|| {
                PipelineError::CodecOpen(format!("stream {} is not in the container", stream.index))
            })?;

        let context = CodecContext::from_parameters(ffmpeg_stream.parameters())
            .map_err(|error| PipelineError::CodecOpen(error.to_string()))?;
        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(|error| PipelineError::CodecOpen(format!("{}: {error}", codec.name())))?;

        log::debug!(
            "Opened {} decoder for stream {} ({}x{}, {:?})",
            codec.name(),
            stream.index,
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(Self {
            decoder: Some(decoder),
            scratch: VideoFrame::empty(),
            pending: VecDeque::new(),
            eof_sent: false,
        })
    }

    fn receive(
        decoder: &mut FfmpegVideoDecoder,
        scratch: &mut VideoFrame,
        pending: &mut VecDeque<VideoFrame>,
        frame: &mut VideoFrame,
    ) -> Result<DecodeStatus, PipelineError> {
        if let Some(queued) = pending.pop_front() {
            *frame = queued;
            return Ok(DecodeStatus::FrameReady);
        }

        match decoder.receive_frame(scratch) {
            Ok(()) => {
                mem::swap(frame, scratch);
                Ok(DecodeStatus::FrameReady)
            }
            Err(FfmpegError::Eof) => Ok(DecodeStatus::Pending),
            Err(error) if is_again(&error) => Ok(DecodeStatus::Pending),
            Err(error) => Err(PipelineError::Decode(error.to_string())),
        }
    }
}

/// Send one packet, pulling frames out into `pending` for as long as the
/// decoder reports a full output queue.
///
/// Returns `false` if the decoder has already been flushed. A decoder that is
/// full but yields no frame loses the packet, which is reported as a
/// [`PipelineError::Decode`].
fn send_with_backpressure<D, F>(
    decoder: &mut D,
    send: impl Fn(&mut D) -> Result<(), FfmpegError>,
    receive: impl Fn(&mut D) -> Result<F, FfmpegError>,
    pending: &mut VecDeque<F>,
) -> Result<bool, PipelineError> {
    loop {
        match send(decoder) {
            Ok(()) => return Ok(true),
            Err(FfmpegError::Eof) => return Ok(false),
            Err(error) if is_again(&error) => match receive(decoder) {
                Ok(frame) => pending.push_back(frame),
                Err(receive_error) => {
                    return Err(PipelineError::Decode(format!(
                        "decoder output is full but no frame could be received: {receive_error}"
                    )));
                }
            },
            Err(error) => return Err(PipelineError::Decode(error.to_string())),
        }
    }
}

fn resolve(codec: CodecId) -> Result<ffmpeg_next::Codec, PipelineError> {
    ffmpeg_next::decoder::find(codec).ok_or_else(|| PipelineError::CodecUnsupported {
        codec: codec.name().to_string(),
    })
}

impl VideoDecoder for FfmpegDecoder {
    type Packet = Packet;
    type Frame = VideoFrame;

    fn decode(&mut self, packet: &Packet, frame: &mut VideoFrame) -> Result<DecodeStatus, PipelineError> {
        let decoder = self.decoder.as_mut().ok_or(PipelineError::SessionClosed)?;

        let sent = send_with_backpressure(
            decoder,
            |decoder| decoder.send_packet(packet),
            |decoder| {
                let mut buffered = VideoFrame::empty();
                decoder.receive_frame(&mut buffered).map(|()| buffered)
            },
            &mut self.pending,
        )?;
        if !sent && self.pending.is_empty() {
            return Ok(DecodeStatus::Pending);
        }

        Self::receive(decoder, &mut self.scratch, &mut self.pending, frame)
    }

    fn drain(&mut self, frame: &mut VideoFrame) -> Result<DecodeStatus, PipelineError> {
        let decoder = self.decoder.as_mut().ok_or(PipelineError::SessionClosed)?;

        if !self.eof_sent && self.pending.is_empty() {
            self.eof_sent = true;
            if let Err(error) = decoder.send_eof() {
                log::debug!("send_eof failed: {error}");
            }
        }

        Self::receive(decoder, &mut self.scratch, &mut self.pending, frame)
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        self.decoder = None;
        self.pending.clear();
        Ok(())
    }
}

/// A libswscale context plus the scaled frame it writes into.
///
/// The scaled frame carries FFmpeg's row padding; [`scale`](FrameScaler::scale)
/// copies it row by row into the tightly packed presentation buffer.
pub struct FfmpegScaler {
    context: ScalingContext,
    scaled: VideoFrame,
    format: PresentationFormat,
}

impl FfmpegScaler {
    /// Create a conversion context for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConverterInit`] if libswscale does not
    /// support the format pair.
    pub fn new(key: &ConversionKey) -> Result<Self, PipelineError> {
        let context = ScalingContext::get(
            key.source_format,
            key.source_width,
            key.source_height,
            key.destination_format.to_ffmpeg_pixel(),
            key.destination_width,
            key.destination_height,
            key.scaling.to_ffmpeg_flags(),
        )
        .map_err(|error| {
            PipelineError::ConverterInit(format!(
                "{:?} -> {:?}: {error}",
                key.source_format, key.destination_format
            ))
        })?;

        Ok(Self {
            context,
            scaled: VideoFrame::empty(),
            format: key.destination_format,
        })
    }
}

impl FrameScaler for FfmpegScaler {
    type Frame = VideoFrame;

    fn scale(&mut self, source: &VideoFrame, destination: &mut PresentationFrame) -> Result<(), PipelineError> {
        self.context.run(source, &mut self.scaled)?;

        let (width, height) = (destination.width(), destination.height());
        for plane in 0..self.format.plane_count() {
            let (row_bytes, rows) = self.format.plane_geometry(plane, width, height);
            let stride = self.scaled.stride(plane);
            let data = self.scaled.data(plane);
            let target = destination.plane_mut(plane);

            if stride == row_bytes {
                target.copy_from_slice(&data[..row_bytes * rows]);
                continue;
            }
            for row in 0..rows {
                let source_start = row * stride;
                let target_start = row * row_bytes;
                target[target_start..target_start + row_bytes]
                    .copy_from_slice(&data[source_start..source_start + row_bytes]);
            }
        }
        Ok(())
    }
}
