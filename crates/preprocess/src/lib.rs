pub mod error;
pub mod letterbox;

use ndarray::{Array, IxDyn};
use serde::Deserialize;

pub use error::PreprocessError;
pub use letterbox::{LETTERBOX_COLOR, LetterboxPreprocessor};

/// Geometry of one letterbox transform.
///
/// A source image of `source_width x source_height` was scaled uniformly to
/// `resized_width x resized_height` and placed on an `input_width x input_height`
/// canvas, offset by `pad_left`/`pad_top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterboxMetadata {
    pub source_width: u32,
    pub source_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub pad_left: u32,
    pub pad_top: u32,
}

impl LetterboxMetadata {
    /// Compute the letterbox geometry for fitting `source` into `input`.
    ///
    /// Scale is `min(W / srcW, H / srcH)`, resized extents are rounded and
    /// padding is split evenly with integer division.
    pub fn compute(source: (u32, u32), input: (u32, u32)) -> Result<Self, PreprocessError> {
        let (source_width, source_height) = source;
        let (input_width, input_height) = input;

        if source_width == 0 || source_height == 0 {
            return Err(PreprocessError::EmptySource {
                width: source_width,
                height: source_height,
            });
        }
        if input_width == 0 || input_height == 0 {
            return Err(PreprocessError::EmptyTarget {
                width: input_width,
                height: input_height,
            });
        }

        let scale = (input_width as f64 / source_width as f64)
            .min(input_height as f64 / source_height as f64);

        let resized_width = ((source_width as f64 * scale).round() as u32).clamp(1, input_width);
        let resized_height =
            ((source_height as f64 * scale).round() as u32).clamp(1, input_height);

        Ok(Self {
            source_width,
            source_height,
            input_width,
            input_height,
            resized_width,
            resized_height,
            pad_left: (input_width - resized_width) / 2,
            pad_top: (input_height - resized_height) / 2,
        })
    }

    /// Horizontal factor from model-input pixels back to source pixels.
    #[inline]
    pub fn ratio_x(&self) -> f32 {
        self.source_width as f32 / self.resized_width as f32
    }

    /// Vertical factor from model-input pixels back to source pixels.
    #[inline]
    pub fn ratio_y(&self) -> f32 {
        self.source_height as f32 / self.resized_height as f32
    }

    /// Map a source-space point into model-input space.
    pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x / self.ratio_x() + self.pad_left as f32,
            y / self.ratio_y() + self.pad_top as f32,
        )
    }

    /// Map a model-input-space point back into source space.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_left as f32) * self.ratio_x(),
            (y - self.pad_top as f32) * self.ratio_y(),
        )
    }
}

/// How letterboxed bytes become tensor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Divide by 255 into `[0, 1]`.
    #[default]
    Unit,
    /// Keep `0..=255` as floats, for quantized accelerators that rescale on device.
    Raw,
}

/// Result of preprocessing including transformation parameters
#[derive(Debug)]
pub struct PreprocessResult {
    /// Planar RGB tensor shaped `[1, 3, H, W]`
    pub tensor: Array<f32, IxDyn>,
    /// Geometry needed to invert the letterbox
    pub metadata: LetterboxMetadata,
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Preprocess an image for inference
    ///
    /// # Arguments
    /// * `pixels` - RGB pixel data in HWC format
    /// * `width` - Image width
    /// * `height` - Image height
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PreprocessResult, PreprocessError>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}
