//! The pipeline driver.
//!
//! [`Pipeline`] owns every resource of one playback run and walks them
//! through a fixed life cycle:
//!
//! ```text
//! Uninitialized -> Opened -> Running -> Draining -> Closed
//! ```
//!
//! [`Pipeline::open`] acquires the container, selects the video stream,
//! opens the decode session, creates the converter and opens the sink. Any
//! failure there releases what was already acquired and is returned as is;
//! [`PipelineError::stage`] tells which step failed.
//!
//! Each [`step`](Pipeline::step) reads one packet. Packets from other
//! streams are dropped untouched. Video packets go through the decode
//! session; a finished frame is converted into the reused presentation
//! buffer and handed to the sink. The packet is released before the next
//! read on every path.
//!
//! Teardown releases the buffers, the decode session and the container, in
//! that order. Every step runs even if an earlier one fails.
//!
//! # Example
//!
//! ```no_run
//! use framepipe::{FfmpegBackend, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::open(FfmpegBackend::new(), "input.mp4", PipelineConfig::extract_to("."))?;
//! let summary = pipeline.run()?;
//! println!("{} frames written", summary.frames_delivered);
//! # Ok::<(), framepipe::PipelineError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
};

use crate::{
    backend::{EncodedPacket, MediaBackend, MediaContainer},
    config::{PipelineConfig, SinkConfig},
    converter::{ConversionKey, FrameConverter, ScalingPolicy},
    error::PipelineError,
    frame::PresentationFrame,
    progress::ProgressTracker,
    session::{DecodeSession, Submission},
    sink::OutputSink,
    stream::{StreamDescriptor, select_video_stream},
};

/// Life-cycle state of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing acquired yet. Only exists while [`Pipeline::open`] is
    /// running: `open` either hands back a pipeline in
    /// [`Opened`](PipelineState::Opened) or releases everything and returns
    /// the error, so no [`Pipeline`] value ever reports this state.
    Uninitialized,
    /// Every resource acquired; the loop has not started.
    Opened,
    /// Inside the packet loop.
    Running,
    /// Releasing resources.
    Draining,
    /// Everything released.
    Closed,
}

/// Why the packet loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The container ran out of packets (and the decoder out of frames).
    EndOfStream,
    /// The configured number of frames was delivered.
    FrameCapReached,
}

/// What one [`Pipeline::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// The packet belonged to another stream and was released.
    Skipped,
    /// The decoder needs more input.
    Pending,
    /// The packet was corrupt and was skipped.
    Corrupt,
    /// A frame reached the sink.
    Presented(u64),
    /// A frame was converted but the file sink could not write it.
    Dropped(u64),
    /// The loop is over; call [`Pipeline::finish`].
    Finished(StopReason),
}

/// Counters for one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Packets read from the container, all streams.
    pub packets_read: u64,
    /// Packets that belonged to the selected video stream.
    pub video_packets: u64,
    /// Frames produced by the decoder.
    pub frames_decoded: u64,
    /// Frames handed to the sink (the frame counter).
    pub frames_delivered: u64,
    /// Delivered frames the file sink failed to write.
    pub frames_dropped: u64,
    /// Packets skipped as corrupt.
    pub decode_errors: u64,
    /// Why the loop stopped. `None` if it never ran to completion.
    pub stop_reason: Option<StopReason>,
}

/// One playback run over a single container.
pub struct Pipeline<B: MediaBackend> {
    state: PipelineState,
    container: Option<B::Container>,
    stream: StreamDescriptor,
    session: DecodeSession<B::Decoder>,
    converter: Option<FrameConverter<B::Scaler>>,
    presentation: Option<PresentationFrame>,
    sink: OutputSink,
    frame_cap: Option<u64>,
    drain: bool,
    end_of_packets: bool,
    stop_reason: Option<StopReason>,
    packets_read: u64,
    video_packets: u64,
    frames_delivered: u64,
    frames_dropped: u64,
    progress: ProgressTracker,
}

impl<B: MediaBackend> Debug for Pipeline<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("stream", &self.stream)
            .field("sink", &self.sink)
            .field("frame_cap", &self.frame_cap)
            .field("frames_delivered", &self.frames_delivered)
            .finish_non_exhaustive()
    }
}

/// Resources acquired after the container, handed back by `assemble`.
struct Assembly<B: MediaBackend> {
    stream: StreamDescriptor,
    session: DecodeSession<B::Decoder>,
    converter: FrameConverter<B::Scaler>,
    presentation: PresentationFrame,
    sink: OutputSink,
}

impl<B: MediaBackend> Pipeline<B> {
    /// Acquire every resource for a run over the container at `path`.
    ///
    /// # Errors
    ///
    /// The error of the first stage that failed:
    /// [`FileOpen`](PipelineError::FileOpen),
    /// [`NoVideoStream`](PipelineError::NoVideoStream),
    /// [`CodecUnsupported`](PipelineError::CodecUnsupported),
    /// [`CodecOpen`](PipelineError::CodecOpen),
    /// [`ConverterInit`](PipelineError::ConverterInit) or
    /// [`SinkInit`](PipelineError::SinkInit).
    pub fn open<P: AsRef<Path>>(
        mut backend: B,
        path: P,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        log::debug!("Opening pipeline for {}", path.display());

        let mut container = backend.open_container(path)?;
        if config.dump_format {
            container.dump_format(path);
        }

        let PipelineConfig {
            sink,
            frame_cap,
            scaling,
            progress,
            batch_size,
            drain,
            ..
        } = config;

        let assembly = match Self::assemble(&mut backend, &container, sink, scaling) {
            Ok(assembly) => assembly,
            Err(error) => {
                log::debug!("Pipeline setup failed: {error}");
                if let Err(close_error) = container.close() {
                    log::warn!("Failed to close container after setup error: {close_error}");
                }
                return Err(error);
            }
        };

        log::info!(
            "Pipeline opened: {} (stream {}, {}x{}, {:?}, frame cap {:?})",
            path.display(),
            assembly.stream.index,
            assembly.stream.width,
            assembly.stream.height,
            assembly.stream.codec,
            frame_cap,
        );

        Ok(Self {
            state: PipelineState::Opened,
            container: Some(container),
            stream: assembly.stream,
            session: assembly.session,
            converter: Some(assembly.converter),
            presentation: Some(assembly.presentation),
            sink: assembly.sink,
            frame_cap,
            drain,
            end_of_packets: false,
            stop_reason: None,
            packets_read: 0,
            video_packets: 0,
            frames_delivered: 0,
            frames_dropped: 0,
            progress: ProgressTracker::new(progress, frame_cap, batch_size),
        })
    }

    fn assemble(
        backend: &mut B,
        container: &B::Container,
        sink: SinkConfig,
        scaling: ScalingPolicy,
    ) -> Result<Assembly<B>, PipelineError> {
        let stream = select_video_stream(container.streams())?.clone();
        log::debug!(
            "Selected video stream {} ({}x{}, {:?})",
            stream.index,
            stream.width,
            stream.height,
            stream.pixel_format
        );

        let mut session = DecodeSession::open(backend, container, &stream)?;

        let key = ConversionKey::for_stream(&stream, sink.presentation_format(), scaling);
        let converter = match FrameConverter::create(backend, key) {
            Ok(converter) => converter,
            Err(error) => {
                Self::close_session(&mut session);
                return Err(error);
            }
        };
        let presentation = converter.allocate_destination();

        let sink = match sink.build(stream.width, stream.height) {
            Ok(sink) => sink,
            Err(error) => {
                drop(converter);
                Self::close_session(&mut session);
                return Err(error);
            }
        };

        Ok(Assembly {
            stream,
            session,
            converter,
            presentation,
            sink,
        })
    }

    fn close_session(session: &mut DecodeSession<B::Decoder>) {
        session.release_frame();
        if let Err(error) = session.close() {
            log::warn!("Failed to close decoder after setup error: {error}");
        }
    }

    /// Current life-cycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The selected video stream.
    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    /// The decode session.
    pub fn session(&self) -> &DecodeSession<B::Decoder> {
        &self.session
    }

    /// The reused presentation buffer. `None` after teardown.
    pub fn presentation_frame(&self) -> Option<&PresentationFrame> {
        self.presentation.as_ref()
    }

    /// The active sink.
    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Frames delivered to the sink so far.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    fn cap_reached(&self) -> bool {
        self.frame_cap
            .is_some_and(|cap| self.frames_delivered >= cap)
    }

    fn stop(&mut self, reason: StopReason) -> Step {
        if self.stop_reason.is_none() {
            log::debug!("Packet loop stopped: {reason:?}");
        }
        self.stop_reason = Some(reason);
        Step::Finished(reason)
    }

    /// Run one iteration of the packet loop.
    ///
    /// Once this returns [`Step::Finished`] every further call returns the
    /// same value without reading anything.
    ///
    /// # Errors
    ///
    /// A fatal error from the container, the decode session, the converter
    /// or a display sink. Recoverable errors come back as
    /// [`Step::Corrupt`] or [`Step::Dropped`] instead. After an error, hand
    /// it to [`fail`](Pipeline::fail).
    pub fn step(&mut self) -> Result<Step, PipelineError> {
        match self.state {
            PipelineState::Opened => {
                log::debug!("Entering packet loop");
                self.progress.start();
                self.state = PipelineState::Running;
            }
            PipelineState::Running => {}
            PipelineState::Uninitialized | PipelineState::Draining | PipelineState::Closed => {
                return match self.stop_reason {
                    Some(reason) => Ok(Step::Finished(reason)),
                    None => Err(PipelineError::PipelineClosed),
                };
            }
        }

        if let Some(reason) = self.stop_reason {
            return Ok(Step::Finished(reason));
        }
        if self.cap_reached() {
            return Ok(self.stop(StopReason::FrameCapReached));
        }
        if self.end_of_packets {
            return self.drain_step();
        }

        let container = self
            .container
            .as_mut()
            .ok_or(PipelineError::PipelineClosed)?;
        let packet = match container.read_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                log::debug!("End of stream after {} packets", self.packets_read);
                return self.end_of_stream();
            }
            Err(error) => {
                log::warn!("Packet read failed, treating as end of stream: {error}");
                return self.end_of_stream();
            }
        };
        self.packets_read += 1;

        if packet.stream_index() != self.session.stream_index() {
            return Ok(Step::Skipped);
        }
        self.video_packets += 1;

        let step = match self.session.submit(&packet)? {
            Submission::FrameReady(frame) => Self::deliver(
                self.converter.as_mut(),
                self.presentation.as_mut(),
                &mut self.sink,
                &self.stream,
                &mut self.frames_delivered,
                &mut self.frames_dropped,
                &mut self.progress,
                frame,
            )?,
            Submission::NoFrameYet => Step::Pending,
            Submission::DecodeError(reason) => {
                log::warn!(
                    "Skipping corrupt packet {} on stream {}: {reason}",
                    self.packets_read,
                    self.stream.index
                );
                Step::Corrupt
            }
        };
        drop(packet);
        Ok(step)
    }

    fn end_of_stream(&mut self) -> Result<Step, PipelineError> {
        self.end_of_packets = true;
        if self.drain {
            self.drain_step()
        } else {
            Ok(self.stop(StopReason::EndOfStream))
        }
    }

    fn drain_step(&mut self) -> Result<Step, PipelineError> {
        if !self.drain {
            return Ok(self.stop(StopReason::EndOfStream));
        }

        match self.session.drain()? {
            Submission::FrameReady(frame) => Self::deliver(
                self.converter.as_mut(),
                self.presentation.as_mut(),
                &mut self.sink,
                &self.stream,
                &mut self.frames_delivered,
                &mut self.frames_dropped,
                &mut self.progress,
                frame,
            ),
            Submission::NoFrameYet => Ok(self.stop(StopReason::EndOfStream)),
            Submission::DecodeError(reason) => {
                log::warn!("Decoder failed while draining, stopping: {reason}");
                Ok(self.stop(StopReason::EndOfStream))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn deliver(
        converter: Option<&mut FrameConverter<B::Scaler>>,
        presentation: Option<&mut PresentationFrame>,
        sink: &mut OutputSink,
        stream: &StreamDescriptor,
        frames_delivered: &mut u64,
        frames_dropped: &mut u64,
        progress: &mut ProgressTracker,
        frame: &B::Frame,
    ) -> Result<Step, PipelineError> {
        let (Some(converter), Some(presentation)) = (converter, presentation) else {
            return Err(PipelineError::PipelineClosed);
        };

        converter.convert(frame, presentation)?;

        *frames_delivered += 1;
        let sequence_number = *frames_delivered;
        let step = match sink.present(presentation, stream.width, stream.height, sequence_number) {
            Ok(()) => Step::Presented(sequence_number),
            Err(error) if error.is_recoverable() => {
                log::warn!("Dropping frame {sequence_number}: {error}");
                *frames_dropped += 1;
                Step::Dropped(sequence_number)
            }
            Err(error) => return Err(error),
        };
        progress.advance(sequence_number);
        Ok(step)
    }

    /// Step until the loop finishes, then tear down.
    ///
    /// # Errors
    ///
    /// The first fatal in-loop error if there was one, otherwise the first
    /// teardown error.
    pub fn run(mut self) -> Result<RunSummary, PipelineError> {
        loop {
            match self.step() {
                Ok(Step::Finished(_)) => break,
                Ok(_) => {}
                Err(error) => return Err(self.fail(error)),
            }
        }
        self.finish()
    }

    /// Tear down after a clean loop and report the run.
    ///
    /// # Errors
    ///
    /// The first error reported while releasing resources. Every release
    /// step runs regardless.
    pub fn finish(mut self) -> Result<RunSummary, PipelineError> {
        self.progress.finish();
        self.teardown()?;
        let summary = self.summary();
        log::info!(
            "Pipeline finished: {} frames delivered ({} dropped), {} decode errors, {:?}",
            summary.frames_delivered,
            summary.frames_dropped,
            summary.decode_errors,
            summary.stop_reason,
        );
        Ok(summary)
    }

    /// Tear down after a fatal in-loop error and give the error back.
    ///
    /// Teardown errors are logged; they never replace `error`.
    pub fn fail(mut self, error: PipelineError) -> PipelineError {
        log::debug!("Pipeline failed: {error}");
        if let Err(teardown_error) = self.teardown() {
            log::warn!("Teardown after failure also failed: {teardown_error}");
        }
        error
    }

    /// Counters so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            packets_read: self.packets_read,
            video_packets: self.video_packets,
            frames_decoded: self.session.frames_decoded(),
            frames_delivered: self.frames_delivered,
            frames_dropped: self.frames_dropped,
            decode_errors: self.session.decode_errors(),
            stop_reason: self.stop_reason,
        }
    }

    fn teardown(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Closed {
            return Ok(());
        }
        self.state = PipelineState::Draining;

        let mut first_error: Option<PipelineError> = None;
        let mut remember = |result: Result<(), PipelineError>| {
            if let Err(error) = result {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    log::warn!("Additional teardown error: {error}");
                }
            }
        };

        self.presentation = None;
        self.converter = None;
        self.session.release_frame();
        remember(self.session.close());
        if let Some(mut container) = self.container.take() {
            remember(container.close());
        }

        self.state = PipelineState::Closed;
        log::debug!("Pipeline resources released");
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<B: MediaBackend> Drop for Pipeline<B> {
    fn drop(&mut self) {
        if let Err(error) = self.teardown() {
            log::warn!("Teardown on drop failed: {error}");
        }
    }
}
