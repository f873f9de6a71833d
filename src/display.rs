//! On-screen playback through macroquad.
//!
//! [`MacroquadSurface`] draws each presentation frame into a texture that
//! fills the window. macroquad owns the buffer swap: the render loop calls
//! `next_frame().await` after every presented frame, so at most one frame is
//! in flight.

use macroquad::prelude::{
    BLACK, DrawTextureParams, FilterMode, Texture2D, WHITE, clear_background, draw_texture_ex,
    screen_height, screen_width, vec2,
};

use crate::{
    error::PipelineError,
    frame::{PresentationFormat, PresentationFrame},
    sink::DisplaySurface,
};

/// A window-filling RGBA texture.
pub struct MacroquadSurface {
    texture: Texture2D,
    width: u32,
    height: u32,
}

impl MacroquadSurface {
    /// Create the texture. Must run inside the macroquad main loop.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SinkInit`] if the size does not fit a
    /// texture.
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        let (Ok(texture_width), Ok(texture_height)) = (u16::try_from(width), u16::try_from(height))
        else {
            return Err(PipelineError::SinkInit(format!(
                "{width}x{height} is too large for a texture"
            )));
        };

        let blank = PresentationFrame::new(PresentationFormat::Rgba, width, height);
        let texture = Texture2D::from_rgba8(texture_width, texture_height, blank.data());
        texture.set_filter(FilterMode::Linear);
        log::debug!("Created {width}x{height} display texture");

        Ok(Self {
            texture,
            width,
            height,
        })
    }

    /// Open a surface as a boxed [`DisplaySurface`], for
    /// [`PipelineConfig::display`](crate::PipelineConfig::display).
    pub fn open(width: u32, height: u32) -> Result<Box<dyn DisplaySurface>, PipelineError> {
        Ok(Box::new(Self::new(width, height)?))
    }

    /// Draw the current texture scaled to the window.
    pub fn draw(&self) {
        clear_background(BLACK);
        draw_texture_ex(
            &self.texture,
            0.0,
            0.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(screen_width(), screen_height())),
                ..Default::default()
            },
        );
    }
}

impl DisplaySurface for MacroquadSurface {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_format(&self) -> PresentationFormat {
        PresentationFormat::Rgba
    }

    fn present(&mut self, frame: &PresentationFrame) -> Result<(), PipelineError> {
        self.texture
            .update_from_bytes(self.width, self.height, frame.data());
        self.draw();
        Ok(())
    }
}
