use thiserror::Error;

/// Rejected configuration, reported once before any image is processed.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Label set is empty")]
    EmptyLabelSet,

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },

    #[error("{name} must be non-zero ({width}x{height})")]
    ZeroSize {
        name: &'static str,
        width: u32,
        height: u32,
    },

    #[error("Anchor count must be non-zero")]
    ZeroAnchors,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] preprocess::PreprocessError),

    #[error("Inference backend failed: {0:#}")]
    Backend(anyhow::Error),

    #[error("Output tensor shape {actual:?} does not match [{attributes}, {anchors}]")]
    TensorShape {
        actual: Vec<usize>,
        attributes: usize,
        anchors: String,
    },
}
