//! Frame conversion.
//!
//! A [`FrameConverter`] binds one conversion context to a fixed
//! [`ConversionKey`] for the whole run and turns each decoded frame into a
//! [`PresentationFrame`] owned by the caller. Geometry and formats cannot
//! change mid-run, so a mismatch is treated as a bug: it is logged and
//! reported as a fatal [`PipelineError::Conversion`].

use ffmpeg_next::{format::Pixel, software::scaling::Flags as ScalingFlags};

use crate::{
    backend::{FrameScaler, MediaBackend, RawVideoFrame},
    error::PipelineError,
    frame::{PresentationFormat, PresentationFrame},
    stream::StreamDescriptor,
};

/// Interpolation used when the conversion context resamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalingPolicy {
    /// Fast bilinear.
    FastBilinear,
    /// Bilinear. This is the default.
    #[default]
    Bilinear,
    /// Bicubic.
    Bicubic,
    /// Nearest neighbour.
    Point,
    /// Area averaging.
    Area,
}

impl ScalingPolicy {
    /// Map to the corresponding FFmpeg scaler flag.
    pub fn to_ffmpeg_flags(self) -> ScalingFlags {
        match self {
            ScalingPolicy::FastBilinear => ScalingFlags::FAST_BILINEAR,
            ScalingPolicy::Bilinear => ScalingFlags::BILINEAR,
            ScalingPolicy::Bicubic => ScalingFlags::BICUBIC,
            ScalingPolicy::Point => ScalingFlags::POINT,
            ScalingPolicy::Area => ScalingFlags::AREA,
        }
    }
}

/// Everything a conversion context is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    /// Native format of decoded frames.
    pub source_format: Pixel,
    /// Decoded frame width.
    pub source_width: u32,
    /// Decoded frame height.
    pub source_height: u32,
    /// Presentation format.
    pub destination_format: PresentationFormat,
    /// Presentation width.
    pub destination_width: u32,
    /// Presentation height.
    pub destination_height: u32,
    /// Interpolation policy.
    pub scaling: ScalingPolicy,
}

impl ConversionKey {
    /// Key for presenting `stream` at its own size in `format`.
    pub fn for_stream(
        stream: &StreamDescriptor,
        format: PresentationFormat,
        scaling: ScalingPolicy,
    ) -> Self {
        Self {
            source_format: stream.pixel_format,
            source_width: stream.width,
            source_height: stream.height,
            destination_format: format,
            destination_width: stream.width,
            destination_height: stream.height,
            scaling,
        }
    }

    /// Byte size of a presentation frame for this key.
    pub fn destination_size(&self) -> usize {
        self.destination_format
            .buffer_size(self.destination_width, self.destination_height)
    }
}

/// A conversion context bound to one [`ConversionKey`].
pub struct FrameConverter<S> {
    key: ConversionKey,
    scaler: S,
    conversions: u64,
}

impl<S> FrameConverter<S>
where
    S: FrameScaler,
    S::Frame: RawVideoFrame,
{
    /// Create the conversion context for `key` through `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConverterInit`] if the backend cannot build
    /// a context for the format pair.
    pub fn create<B>(backend: &mut B, key: ConversionKey) -> Result<Self, PipelineError>
    where
        B: MediaBackend<Scaler = S>,
    {
        if key.source_width == 0 || key.source_height == 0 {
            return Err(PipelineError::ConverterInit(format!(
                "stream has no usable geometry ({}x{})",
                key.source_width, key.source_height
            )));
        }

        log::debug!(
            "Creating converter {:?} {}x{} -> {:?} {}x{} ({:?})",
            key.source_format,
            key.source_width,
            key.source_height,
            key.destination_format,
            key.destination_width,
            key.destination_height,
            key.scaling,
        );
        let scaler = backend.create_scaler(&key)?;
        Ok(Self::new(scaler, key))
    }

    /// Wrap an existing scaler.
    pub fn new(scaler: S, key: ConversionKey) -> Self {
        Self {
            key,
            scaler,
            conversions: 0,
        }
    }

    /// The key this converter is bound to.
    pub fn key(&self) -> &ConversionKey {
        &self.key
    }

    /// Allocate a presentation frame matching the bound destination.
    pub fn allocate_destination(&self) -> PresentationFrame {
        PresentationFrame::new(
            self.key.destination_format,
            self.key.destination_width,
            self.key.destination_height,
        )
    }

    /// Convert `decoded` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Conversion`] if either frame does not match
    /// the bound key, or if the scaler fails.
    pub fn convert(
        &mut self,
        decoded: &S::Frame,
        destination: &mut PresentationFrame,
    ) -> Result<(), PipelineError> {
        let key = &self.key;

        if decoded.width() != key.source_width
            || decoded.height() != key.source_height
            || decoded.pixel_format() != key.source_format
        {
            let reason = format!(
                "decoded frame {:?} {}x{} does not match the bound source {:?} {}x{}",
                decoded.pixel_format(),
                decoded.width(),
                decoded.height(),
                key.source_format,
                key.source_width,
                key.source_height,
            );
            log::error!("{reason}");
            return Err(PipelineError::Conversion(reason));
        }

        let expected_size = key.destination_size();
        if destination.format() != key.destination_format
            || destination.width() != key.destination_width
            || destination.height() != key.destination_height
            || destination.len() != expected_size
        {
            let reason = format!(
                "destination buffer {:?} {}x{} ({} bytes) does not match the bound destination {:?} {}x{} ({} bytes)",
                destination.format(),
                destination.width(),
                destination.height(),
                destination.len(),
                key.destination_format,
                key.destination_width,
                key.destination_height,
                expected_size,
            );
            log::error!("{reason}");
            return Err(PipelineError::Conversion(reason));
        }

        self.scaler
            .scale(decoded, destination)
            .map_err(|error| match error {
                PipelineError::Conversion(_) => error,
                other => PipelineError::Conversion(other.to_string()),
            })?;
        self.conversions += 1;
        Ok(())
    }

    /// Frames converted so far.
    pub fn conversions(&self) -> u64 {
        self.conversions
    }
}
