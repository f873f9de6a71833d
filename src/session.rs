//! Decode session.
//!
//! [`DecodeSession`] owns the codec instance bound to the selected video
//! stream together with the decoded-frame buffer it fills. The buffer is
//! allocated once and overwritten by every successful decode; the reference
//! handed out by [`Submission::FrameReady`] borrows the session, so it cannot
//! outlive the next call to [`submit`](DecodeSession::submit).

use crate::{
    backend::{DecodeStatus, EncodedPacket, MediaBackend, RawVideoFrame, VideoDecoder},
    error::PipelineError,
    stream::StreamDescriptor,
};

/// Outcome of submitting one packet.
#[derive(Debug)]
pub enum Submission<'a, F> {
    /// The decoder produced a frame. Valid until the next submit.
    FrameReady(&'a F),
    /// The decoder buffered the packet and needs more input.
    NoFrameYet,
    /// The packet was corrupt and has been skipped.
    DecodeError(String),
}

impl<F> Submission<'_, F> {
    /// Whether a frame is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, Submission::FrameReady(_))
    }
}

/// A codec instance bound to one stream.
pub struct DecodeSession<D: VideoDecoder> {
    decoder: Option<D>,
    frame: Option<D::Frame>,
    stream_index: usize,
    packets_submitted: u64,
    frames_decoded: u64,
    decode_errors: u64,
}

impl<D> DecodeSession<D>
where
    D: VideoDecoder,
    D::Packet: EncodedPacket,
    D::Frame: RawVideoFrame,
{
    /// Resolve and open a decoder for `stream` through `backend`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::CodecUnsupported`] if no decoder exists for the
    ///   stream's codec.
    /// - [`PipelineError::CodecOpen`] if the decoder refuses the stream.
    pub fn open<B>(
        backend: &mut B,
        container: &B::Container,
        stream: &StreamDescriptor,
    ) -> Result<Self, PipelineError>
    where
        B: MediaBackend<Decoder = D>,
    {
        log::debug!(
            "Opening decoder for stream {} (codec={:?})",
            stream.index,
            stream.codec
        );
        let decoder = backend.open_decoder(container, stream)?;
        Ok(Self::new(decoder, stream))
    }

    /// Wrap an already opened decoder.
    pub fn new(decoder: D, stream: &StreamDescriptor) -> Self {
        Self {
            decoder: Some(decoder),
            frame: Some(D::Frame::empty()),
            stream_index: stream.index,
            packets_submitted: 0,
            frames_decoded: 0,
            decode_errors: 0,
        }
    }

    /// Index of the stream this session is bound to.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Feed one packet to the decoder.
    ///
    /// A corrupt packet is not an error here: it comes back as
    /// [`Submission::DecodeError`] and the caller moves on.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::SessionClosed`] after [`close`](DecodeSession::close).
    /// - [`PipelineError::StreamMismatch`] if `packet` belongs to another
    ///   stream; the decoder never sees it.
    /// - Any non-recoverable error reported by the decoder.
    pub fn submit(&mut self, packet: &D::Packet) -> Result<Submission<'_, D::Frame>, PipelineError> {
        let (Some(decoder), Some(frame)) = (self.decoder.as_mut(), self.frame.as_mut()) else {
            return Err(PipelineError::SessionClosed);
        };

        let actual = packet.stream_index();
        if actual != self.stream_index {
            return Err(PipelineError::StreamMismatch {
                expected: self.stream_index,
                actual,
            });
        }

        self.packets_submitted += 1;
        let status = decoder.decode(packet, frame);
        Self::settle(status, frame, &mut self.frames_decoded, &mut self.decode_errors)
    }

    /// Pull a frame still buffered in the decoder after end-of-stream.
    ///
    /// Returns [`Submission::NoFrameYet`] once the decoder is empty.
    pub fn drain(&mut self) -> Result<Submission<'_, D::Frame>, PipelineError> {
        let (Some(decoder), Some(frame)) = (self.decoder.as_mut(), self.frame.as_mut()) else {
            return Err(PipelineError::SessionClosed);
        };

        let status = decoder.drain(frame);
        Self::settle(status, frame, &mut self.frames_decoded, &mut self.decode_errors)
    }

    fn settle<'a>(
        status: Result<DecodeStatus, PipelineError>,
        frame: &'a D::Frame,
        frames_decoded: &mut u64,
        decode_errors: &mut u64,
    ) -> Result<Submission<'a, D::Frame>, PipelineError> {
        match status {
            Ok(DecodeStatus::FrameReady) => {
                *frames_decoded += 1;
                Ok(Submission::FrameReady(frame))
            }
            Ok(DecodeStatus::Pending) => Ok(Submission::NoFrameYet),
            Err(PipelineError::Decode(reason)) => {
                *decode_errors += 1;
                Ok(Submission::DecodeError(reason))
            }
            Err(error) => Err(error),
        }
    }

    /// Drop the decoded-frame buffer.
    pub fn release_frame(&mut self) {
        self.frame = None;
    }

    /// Release the codec instance.
    ///
    /// Calling this again after a successful close does nothing and returns
    /// `Ok(())`.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        match self.decoder.take() {
            Some(mut decoder) => {
                log::debug!("Closing decoder for stream {}", self.stream_index);
                decoder.close()
            }
            None => Ok(()),
        }
    }

    /// Whether [`close`](DecodeSession::close) has run.
    pub fn is_closed(&self) -> bool {
        self.decoder.is_none()
    }

    /// Packets accepted by [`submit`](DecodeSession::submit).
    pub fn packets_submitted(&self) -> u64 {
        self.packets_submitted
    }

    /// Frames produced so far, including drained ones.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Packets skipped as corrupt.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }
}

impl<D: VideoDecoder> Drop for DecodeSession<D> {
    fn drop(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            if let Err(error) = decoder.close() {
                log::warn!("Failed to close decoder on drop: {error}");
            }
        }
    }
}
