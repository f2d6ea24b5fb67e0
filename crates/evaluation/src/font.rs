use crate::error::RenderError;
use ab_glyph::{FontArc, FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;

static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Draws short strings onto RGB canvases with a TrueType font.
///
/// DejaVu Sans is compiled in, so rendering never depends on system fonts;
/// another font can be loaded from disk.
#[derive(Clone)]
pub struct TextRenderer {
    font: FontArc,
    scale: PxScale,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::embedded(DEFAULT_FONT_SIZE)
    }
}

impl TextRenderer {
    /// The compiled-in font at `size_px` pixels.
    pub fn embedded(size_px: f32) -> Self {
        let font =
            FontRef::try_from_slice(EMBEDDED_FONT).expect("embedded DejaVu Sans is a valid font");
        Self::with_font(FontArc::new(font), size_px)
    }

    pub fn from_file(path: &Path, size_px: f32) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path).map_err(|source| RenderError::FontIo {
            path: path.to_path_buf(),
            source,
        })?;
        let font =
            FontArc::try_from_vec(bytes).map_err(|_| RenderError::InvalidFont(path.to_path_buf()))?;

        Ok(Self::with_font(font, size_px))
    }

    /// Use the font at `path` when given, the embedded one otherwise.
    pub fn from_optional_file(path: Option<&Path>, size_px: f32) -> Result<Self, RenderError> {
        match path {
            Some(path) => Self::from_file(path, size_px),
            None => Ok(Self::embedded(size_px)),
        }
    }

    fn with_font(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            scale: PxScale::from(size_px.max(1.0)),
        }
    }

    pub fn size_px(&self) -> f32 {
        self.scale.y
    }

    /// Width and height in pixels of `text` as drawn.
    pub fn text_size(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, &self.font, text)
    }

    /// Draw `text` with its top-left corner at `(x, y)`; pixels off the
    /// canvas are clipped.
    pub fn draw(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        draw_text_mut(canvas, color, x, y, self.scale, &self.font, text);
    }
}
