use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Source image has zero area ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    #[error("Model input size must be non-zero ({width}x{height})")]
    EmptyTarget { width: u32, height: u32 },

    #[error("Buffer size mismatch: expected {expected}, got {actual} bytes")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Image buffer error: {0}")]
    ImageBuffer(#[from] fast_image_resize::ImageBufferError),

    #[error("Resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = PreprocessError::EmptySource {
            width: 0,
            height: 720,
        };
        assert_eq!(err.to_string(), "Source image has zero area (0x720)");

        let err = PreprocessError::BufferSizeMismatch {
            expected: 300,
            actual: 200,
        };
        assert_eq!(
            err.to_string(),
            "Buffer size mismatch: expected 300, got 200 bytes",
            "BufferSizeMismatch should report both sizes"
        );
    }
}
