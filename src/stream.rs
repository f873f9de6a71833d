//! Stream inventory.
//!
//! A container exposes its elementary streams as a list of
//! [`StreamDescriptor`] values, in index order. The pipeline only ever plays
//! one of them: the first stream classified as video, chosen by
//! [`select_video_stream`].

use ffmpeg_next::{codec::Id as CodecId, format::Pixel, media::Type};

use crate::error::PipelineError;

/// Immutable metadata for one elementary stream.
///
/// Descriptors are plain copies of what the container reported when it was
/// opened. They stay readable after the container is gone, but they describe
/// nothing once the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Position of the stream inside the container.
    pub index: usize,
    /// Media type classification (video, audio, subtitle, ...).
    pub medium: Type,
    /// Codec identifier used to resolve a decoder.
    pub codec: CodecId,
    /// Frame width in pixels. Zero for non-video streams.
    pub width: u32,
    /// Frame height in pixels. Zero for non-video streams.
    pub height: u32,
    /// Native pixel format of decoded frames. `Pixel::None` for non-video
    /// streams.
    pub pixel_format: Pixel,
}

impl StreamDescriptor {
    /// Describe a video stream.
    pub fn video(index: usize, codec: CodecId, width: u32, height: u32, pixel_format: Pixel) -> Self {
        Self {
            index,
            medium: Type::Video,
            codec,
            width,
            height,
            pixel_format,
        }
    }

    /// Describe a non-video stream. Geometry is left empty.
    pub fn other(index: usize, medium: Type, codec: CodecId) -> Self {
        Self {
            index,
            medium,
            codec,
            width: 0,
            height: 0,
            pixel_format: Pixel::None,
        }
    }

    /// Whether this stream is classified as video.
    pub fn is_video(&self) -> bool {
        self.medium == Type::Video
    }
}

/// Return the first stream classified as video.
///
/// Streams are scanned in the order given, which is index order for every
/// container. The first match wins; later video streams are never
/// considered.
///
/// # Errors
///
/// Returns [`PipelineError::NoVideoStream`] when no stream is video.
///
/// # Example
///
/// ```
/// use ffmpeg_next::{codec::Id, format::Pixel, media::Type};
/// use framepipe::{StreamDescriptor, select_video_stream};
///
/// let streams = vec![
///     StreamDescriptor::other(0, Type::Audio, Id::AAC),
///     StreamDescriptor::video(1, Id::H264, 64, 48, Pixel::YUV420P),
/// ];
/// assert_eq!(select_video_stream(&streams)?.index, 1);
/// # Ok::<(), framepipe::PipelineError>(())
/// ```
pub fn select_video_stream(streams: &[StreamDescriptor]) -> Result<&StreamDescriptor, PipelineError> {
    streams
        .iter()
        .find(|stream| stream.is_video())
        .ok_or(PipelineError::NoVideoStream)
}

/// Iterate over every video stream, in index order.
pub fn video_streams(streams: &[StreamDescriptor]) -> impl Iterator<Item = &StreamDescriptor> {
    streams.iter().filter(|stream| stream.is_video())
}
