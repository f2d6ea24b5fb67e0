pub mod backend;
pub mod config;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod labels;
pub mod processing;
pub mod tensor;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, ReplayBackend};
pub use config::DetectorConfig;
pub use detector::Detector;
pub use error::{ConfigError, PipelineError};
pub use geometry::{BoundingBox, iou};
pub use labels::{BACKGROUND_LABEL, LabelSet};
pub use processing::{BoxDecoder, CoordinateMapper, Detection, NmsEngine, RawBox};
pub use tensor::TensorView;
