//! Presentation frames.
//!
//! A [`PresentationFrame`] is the converter's output: one contiguous buffer
//! in a fixed [`PresentationFormat`], tightly packed (no row padding), sized
//! once from the stream geometry and overwritten in place for every frame.

use ffmpeg_next::format::Pixel;

/// Destination pixel format for converted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentationFormat {
    /// Interleaved 8-bit RGB (24 bpp). Used by the file sink.
    #[default]
    Rgb24,
    /// Interleaved 8-bit RGBA (32 bpp).
    Rgba,
    /// Planar 4:2:0 luma/chroma, three planes (Y, U, V).
    Yuv420p,
}

impl PresentationFormat {
    /// Map to the corresponding FFmpeg pixel format constant.
    pub fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PresentationFormat::Rgb24 => Pixel::RGB24,
            PresentationFormat::Rgba => Pixel::RGBA,
            PresentationFormat::Yuv420p => Pixel::YUV420P,
        }
    }

    /// Number of planes in the layout.
    pub fn plane_count(self) -> usize {
        match self {
            PresentationFormat::Rgb24 | PresentationFormat::Rgba => 1,
            PresentationFormat::Yuv420p => 3,
        }
    }

    /// `(row_bytes, rows)` of `plane` for a `width x height` picture.
    ///
    /// Chroma planes of [`Yuv420p`](PresentationFormat::Yuv420p) round odd
    /// dimensions up.
    pub fn plane_geometry(self, plane: usize, width: u32, height: u32) -> (usize, usize) {
        let width = width as usize;
        let height = height as usize;
        match (self, plane) {
            (PresentationFormat::Rgb24, 0) => (width * 3, height),
            (PresentationFormat::Rgba, 0) => (width * 4, height),
            (PresentationFormat::Yuv420p, 0) => (width, height),
            (PresentationFormat::Yuv420p, 1 | 2) => (width.div_ceil(2), height.div_ceil(2)),
            _ => (0, 0),
        }
    }

    /// Size in bytes of a tightly packed `width x height` picture.
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        (0..self.plane_count())
            .map(|plane| {
                let (row_bytes, rows) = self.plane_geometry(plane, width, height);
                row_bytes * rows
            })
            .sum()
    }
}

/// A converted picture backed by a single allocation.
///
/// The buffer length is fixed at construction and never changes; the
/// converter writes into it through [`plane_mut`](PresentationFrame::plane_mut).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationFrame {
    format: PresentationFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PresentationFrame {
    /// Allocate a zeroed frame.
    pub fn new(format: PresentationFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            data: vec![0; format.buffer_size(width, height)],
        }
    }

    /// Pixel format of the buffer.
    pub fn format(&self) -> PresentationFormat {
        self.format
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The whole buffer, planes back to back.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The whole buffer, mutable.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame has zero area.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn plane_range(&self, plane: usize) -> std::ops::Range<usize> {
        let start: usize = (0..plane.min(self.format.plane_count()))
            .map(|earlier| {
                let (row_bytes, rows) = self.format.plane_geometry(earlier, self.width, self.height);
                row_bytes * rows
            })
            .sum();
        let (row_bytes, rows) = self.format.plane_geometry(plane, self.width, self.height);
        start..start + row_bytes * rows
    }

    /// One plane of the buffer. Out-of-range planes are empty.
    pub fn plane(&self, plane: usize) -> &[u8] {
        let range = self.plane_range(plane);
        &self.data[range]
    }

    /// One plane of the buffer, mutable. Out-of-range planes are empty.
    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        let range = self.plane_range(plane);
        &mut self.data[range]
    }
}
