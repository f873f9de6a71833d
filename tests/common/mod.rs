//! Shared test helpers: an in-memory media backend, a recording display
//! surface, and writers for tiny real media files.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::VecDeque,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    rc::Rc,
};

use ffmpeg_next::{codec::Id, format::Pixel, media::Type};
use framepipe::{
    ConversionKey, DecodeStatus, DisplaySurface, EncodedPacket, FrameScaler, MediaBackend,
    MediaContainer, PipelineError, PresentationFormat, PresentationFrame, RawVideoFrame,
    StreamDescriptor, VideoDecoder,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

// ── Journal ────────────────────────────────────────────────────────

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn record(event: &str) {
    JOURNAL.with(|journal| journal.borrow_mut().push(event.to_string()));
}

/// Events recorded on this thread so far.
pub fn journal() -> Vec<String> {
    JOURNAL.with(|journal| journal.borrow().clone())
}

pub fn clear_journal() {
    JOURNAL.with(|journal| journal.borrow_mut().clear());
}

/// Recorded events that start with `prefix`, in order.
pub fn events(prefix: &str) -> Vec<String> {
    journal()
        .into_iter()
        .filter(|event| event.starts_with(prefix))
        .collect()
}

// ── Packets and frames ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePacket {
    pub stream_index: usize,
    pub shade: u8,
    pub corrupt: bool,
}

impl FakePacket {
    pub fn video(stream_index: usize, shade: u8) -> Self {
        Self {
            stream_index,
            shade,
            corrupt: false,
        }
    }

    pub fn corrupt(stream_index: usize) -> Self {
        Self {
            stream_index,
            shade: 0,
            corrupt: true,
        }
    }
}

impl EncodedPacket for FakePacket {
    fn stream_index(&self) -> usize {
        self.stream_index
    }
}

#[derive(Debug)]
pub struct FakeFrame {
    pub width: u32,
    pub height: u32,
    pub format: Pixel,
    pub shade: u8,
    pub writes: u64,
}

impl RawVideoFrame for FakeFrame {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            format: Pixel::None,
            shade: 0,
            writes: 0,
        }
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> Pixel {
        self.format
    }
}

impl Drop for FakeFrame {
    fn drop(&mut self) {
        record("frame.drop");
    }
}

// ── Backend ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecBehaviour {
    Supported,
    Unsupported,
    Refused,
}

/// Configurable in-memory backend.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    pub streams: Vec<StreamDescriptor>,
    pub packets: Vec<FakePacket>,
    pub missing_file: bool,
    pub codec: CodecBehaviour,
    pub refuse_scaler: bool,
    /// Packets the decoder holds back before emitting its first frame.
    pub decoder_delay: usize,
    /// Make the decoder emit frames of this size instead of the stream's.
    pub frame_size_override: Option<(u32, u32)>,
    /// Make the scaler fail on this (1-based) conversion.
    pub scaler_fails_at: Option<u64>,
    /// Make the container fail the read after this many packets.
    pub read_error_after: Option<usize>,
    pub container_close_fails: bool,
}

impl FakeBackend {
    /// One 64x48 YUV420P video stream with `count` packets shaded 1, 2, 3, ...
    pub fn video_only(count: u8) -> Self {
        Self {
            streams: vec![StreamDescriptor::video(
                0,
                Id::H264,
                WIDTH,
                HEIGHT,
                Pixel::YUV420P,
            )],
            packets: (1..=count).map(|shade| FakePacket::video(0, shade)).collect(),
            missing_file: false,
            codec: CodecBehaviour::Supported,
            refuse_scaler: false,
            decoder_delay: 0,
            frame_size_override: None,
            scaler_fails_at: None,
            read_error_after: None,
            container_close_fails: false,
        }
    }

    /// Audio on stream 0, video on stream 1, packets interleaved.
    pub fn audio_and_video(video_packets: u8) -> Self {
        let mut backend = Self::video_only(0);
        backend.streams = vec![
            StreamDescriptor::other(0, Type::Audio, Id::AAC),
            StreamDescriptor::video(1, Id::H264, WIDTH, HEIGHT, Pixel::YUV420P),
        ];
        backend.packets = (1..=video_packets)
            .flat_map(|shade| [FakePacket::video(0, 200), FakePacket::video(1, shade)])
            .collect();
        backend
    }

    /// Audio and subtitles only.
    pub fn without_video() -> Self {
        let mut backend = Self::video_only(0);
        backend.streams = vec![
            StreamDescriptor::other(0, Type::Audio, Id::AAC),
            StreamDescriptor::other(1, Type::Subtitle, Id::SUBRIP),
        ];
        backend.packets = vec![FakePacket::video(0, 1), FakePacket::video(1, 2)];
        backend
    }

    pub fn video_stream(&self) -> StreamDescriptor {
        self.streams
            .iter()
            .find(|stream| stream.is_video())
            .cloned()
            .expect("backend has no video stream")
    }
}

impl MediaBackend for FakeBackend {
    type Packet = FakePacket;
    type Frame = FakeFrame;
    type Container = FakeContainer;
    type Decoder = FakeDecoder;
    type Scaler = FakeScaler;

    fn open_container(&mut self, path: &Path) -> Result<FakeContainer, PipelineError> {
        record("container.open");
        if self.missing_file {
            return Err(PipelineError::FileOpen {
                path: path.to_path_buf(),
                reason: "No such file or directory".to_string(),
            });
        }
        Ok(FakeContainer {
            streams: self.streams.clone(),
            packets: self.packets.iter().cloned().collect(),
            reads: 0,
            read_error_after: self.read_error_after,
            close_fails: self.container_close_fails,
            closed: false,
        })
    }

    fn open_decoder(
        &mut self,
        _container: &FakeContainer,
        stream: &StreamDescriptor,
    ) -> Result<FakeDecoder, PipelineError> {
        record("decoder.open");
        match self.codec {
            CodecBehaviour::Supported => {}
            CodecBehaviour::Unsupported => {
                return Err(PipelineError::CodecUnsupported {
                    codec: format!("{:?}", stream.codec),
                });
            }
            CodecBehaviour::Refused => {
                return Err(PipelineError::CodecOpen("bad extradata".to_string()));
            }
        }
        let (width, height) = self
            .frame_size_override
            .unwrap_or((stream.width, stream.height));
        Ok(FakeDecoder {
            width,
            height,
            format: stream.pixel_format,
            delay: self.decoder_delay,
            queue: VecDeque::new(),
            seen: Vec::new(),
        })
    }

    fn create_scaler(&mut self, key: &ConversionKey) -> Result<FakeScaler, PipelineError> {
        record("scaler.create");
        if self.refuse_scaler {
            return Err(PipelineError::ConverterInit(format!(
                "{:?} -> {:?} not supported",
                key.source_format, key.destination_format
            )));
        }
        Ok(FakeScaler {
            calls: 0,
            fails_at: self.scaler_fails_at,
        })
    }
}

pub struct FakeContainer {
    streams: Vec<StreamDescriptor>,
    packets: VecDeque<FakePacket>,
    reads: usize,
    read_error_after: Option<usize>,
    close_fails: bool,
    closed: bool,
}

impl MediaContainer for FakeContainer {
    type Packet = FakePacket;

    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<FakePacket>, PipelineError> {
        assert!(!self.closed, "read after close");
        if self.read_error_after == Some(self.reads) {
            return Err(PipelineError::FfmpegError("I/O error".to_string()));
        }
        self.reads += 1;
        Ok(self.packets.pop_front())
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        record("container.close");
        self.closed = true;
        if self.close_fails {
            return Err(PipelineError::FfmpegError("close failed".to_string()));
        }
        Ok(())
    }
}

pub struct FakeDecoder {
    width: u32,
    height: u32,
    format: Pixel,
    delay: usize,
    queue: VecDeque<u8>,
    pub seen: Vec<usize>,
}

impl FakeDecoder {
    pub fn new(stream: &StreamDescriptor, delay: usize) -> Self {
        Self {
            width: stream.width,
            height: stream.height,
            format: stream.pixel_format,
            delay,
            queue: VecDeque::new(),
            seen: Vec::new(),
        }
    }

    fn emit(&mut self, frame: &mut FakeFrame) -> DecodeStatus {
        match self.queue.pop_front() {
            Some(shade) => {
                frame.width = self.width;
                frame.height = self.height;
                frame.format = self.format;
                frame.shade = shade;
                frame.writes += 1;
                DecodeStatus::FrameReady
            }
            None => DecodeStatus::Pending,
        }
    }
}

impl VideoDecoder for FakeDecoder {
    type Packet = FakePacket;
    type Frame = FakeFrame;

    fn decode(&mut self, packet: &FakePacket, frame: &mut FakeFrame) -> Result<DecodeStatus, PipelineError> {
        record(&format!("decoder.decode {}", packet.stream_index));
        self.seen.push(packet.stream_index);
        if packet.corrupt {
            return Err(PipelineError::Decode("invalid data found".to_string()));
        }
        self.queue.push_back(packet.shade);
        if self.queue.len() > self.delay {
            Ok(self.emit(frame))
        } else {
            Ok(DecodeStatus::Pending)
        }
    }

    fn drain(&mut self, frame: &mut FakeFrame) -> Result<DecodeStatus, PipelineError> {
        Ok(self.emit(frame))
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        record("decoder.close");
        Ok(())
    }
}

pub struct FakeScaler {
    calls: u64,
    fails_at: Option<u64>,
}

impl FakeScaler {
    pub fn new() -> Self {
        Self {
            calls: 0,
            fails_at: None,
        }
    }
}

impl FrameScaler for FakeScaler {
    type Frame = FakeFrame;

    fn scale(&mut self, source: &FakeFrame, destination: &mut PresentationFrame) -> Result<(), PipelineError> {
        self.calls += 1;
        if self.fails_at == Some(self.calls) {
            return Err(PipelineError::FfmpegError("swscale failed".to_string()));
        }
        destination.data_mut().fill(source.shade);
        Ok(())
    }
}

impl Drop for FakeScaler {
    fn drop(&mut self) {
        record("scaler.drop");
    }
}

// ── Display ────────────────────────────────────────────────────────

/// Shared log of what a [`RecordingSurface`] was shown.
pub type Shown = Rc<RefCell<Vec<(usize, u8)>>>;

/// A surface that remembers `(byte length, first byte)` of each frame.
pub struct RecordingSurface {
    pub width: u32,
    pub height: u32,
    pub format: PresentationFormat,
    pub shown: Shown,
    pub fail_on: Option<usize>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32, format: PresentationFormat) -> (Self, Shown) {
        let shown = Shown::default();
        (
            Self {
                width,
                height,
                format,
                shown: Rc::clone(&shown),
                fail_on: None,
            },
            shown,
        )
    }
}

impl DisplaySurface for RecordingSurface {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_format(&self) -> PresentationFormat {
        self.format
    }

    fn present(&mut self, frame: &PresentationFrame) -> Result<(), PipelineError> {
        let mut shown = self.shown.borrow_mut();
        if self.fail_on == Some(shown.len() + 1) {
            return Err(PipelineError::Display("window closed".to_string()));
        }
        shown.push((frame.len(), frame.data().first().copied().unwrap_or_default()));
        Ok(())
    }
}

// ── Real media files ───────────────────────────────────────────────

/// Write a raw 4:2:0 YUV4MPEG2 clip of `frames` frames. Frame `n` (from 0)
/// has luma `16 + 8 * n` and neutral chroma.
pub fn write_y4m(path: &Path, width: u32, height: u32, frames: u32) {
    let file = File::create(path).expect("Failed to create y4m file");
    let mut writer = BufWriter::new(file);
    writeln!(writer, "YUV4MPEG2 W{width} H{height} F25:1 Ip A1:1 C420jpeg")
        .expect("Failed to write y4m header");

    let luma_size = (width * height) as usize;
    let chroma_size = (width.div_ceil(2) * height.div_ceil(2)) as usize;
    for n in 0..frames {
        writer.write_all(b"FRAME\n").expect("Failed to write frame marker");
        let luma = 16 + 8 * (n % 28) as u8;
        writer
            .write_all(&vec![luma; luma_size])
            .expect("Failed to write luma");
        writer
            .write_all(&vec![128; chroma_size * 2])
            .expect("Failed to write chroma");
    }
    writer.flush().expect("Failed to flush y4m file");
}

/// Write a short mono 16-bit PCM WAV file of silence.
pub fn write_wav(path: &Path) {
    const SAMPLE_RATE: u32 = 8_000;
    let samples = SAMPLE_RATE / 10;
    let data_size = samples * 2;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    bytes.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    bytes.resize(bytes.len() + data_size as usize, 0);

    std::fs::write(path, bytes).expect("Failed to write wav file");
}

/// Split a binary PPM into its header fields and payload.
pub fn parse_ppm(bytes: &[u8]) -> (u32, u32, u32, &[u8]) {
    let mut fields = Vec::new();
    let mut position = 0;
    while fields.len() < 4 {
        let end = bytes[position..]
            .iter()
            .position(|byte| byte.is_ascii_whitespace())
            .map(|offset| position + offset)
            .expect("truncated PPM header");
        fields.push(
            std::str::from_utf8(&bytes[position..end])
                .expect("non-UTF8 PPM header")
                .to_string(),
        );
        position = end + 1;
    }
    assert_eq!(fields[0], "P6");
    let parse = |field: &str| field.parse::<u32>().expect("bad PPM header number");
    (parse(&fields[1]), parse(&fields[2]), parse(&fields[3]), &bytes[position..])
}
