use crate::{LetterboxMetadata, Normalization, Preprocess, PreprocessError, PreprocessResult};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};

/// Mid-gray fill for the padded border.
pub const LETTERBOX_COLOR: u8 = 114;

pub struct LetterboxPreprocessor {
    pub input_size: (u32, u32),
    pub normalization: Normalization,
    resizer: Resizer,
    letterboxed_buffer: Vec<u8>,
}

impl LetterboxPreprocessor {
    pub fn new(input_size: (u32, u32), normalization: Normalization) -> Self {
        Self {
            input_size,
            normalization,
            resizer: Resizer::new(),
            letterboxed_buffer: vec![LETTERBOX_COLOR; (input_size.0 * input_size.1 * 3) as usize],
        }
    }

    /// Letterboxed RGB bytes from the last call to [`Self::letterbox`].
    pub fn canvas(&self) -> &[u8] {
        &self.letterboxed_buffer
    }

    /// Resize `pixels` (RGB, HWC) preserving aspect ratio and center it on the
    /// gray canvas. The canvas is kept for [`Self::canvas`] and [`Self::to_tensor`].
    pub fn letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<LetterboxMetadata, PreprocessError> {
        let _s = span!("letterbox");

        let metadata = LetterboxMetadata::compute((width, height), self.input_size)?;

        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(PreprocessError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        tracing::trace!(
            width,
            height,
            resized_width = metadata.resized_width,
            resized_height = metadata.resized_height,
            pad_left = metadata.pad_left,
            pad_top = metadata.pad_top,
            "Letterbox geometry"
        );

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(
            metadata.resized_width,
            metadata.resized_height,
            PixelType::U8x3,
        );

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let row_bytes = (metadata.resized_width * 3) as usize;
        let stride = (self.input_size.0 * 3) as usize;

        for (y, src_row) in resized_data.chunks_exact(row_bytes).enumerate() {
            let dst_row =
                (y + metadata.pad_top as usize) * stride + (metadata.pad_left * 3) as usize;
            self.letterboxed_buffer[dst_row..dst_row + row_bytes].copy_from_slice(src_row);
        }

        Ok(metadata)
    }

    /// Convert the current canvas into a planar `[1, 3, H, W]` tensor.
    pub fn to_tensor(&self) -> Result<Array<f32, IxDyn>, PreprocessError> {
        let _s = span!("to_tensor");

        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;
        let scale = match self.normalization {
            Normalization::Unit => 1.0 / 255.0,
            Normalization::Raw => 1.0,
        };

        let mut output = vec![0.0f32; 3 * spatial];
        for (i, px) in self.letterboxed_buffer.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 * scale;
            output[i + spatial] = px[1] as f32 * scale;
            output[i + 2 * spatial] = px[2] as f32 * scale;
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)?)
    }
}

impl Preprocess for LetterboxPreprocessor {
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PreprocessResult, PreprocessError> {
        let metadata = self.letterbox(pixels, width, height)?;
        let tensor = self.to_tensor()?;
        Ok(PreprocessResult { tensor, metadata })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}
