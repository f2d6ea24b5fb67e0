pub mod confusion;
pub mod error;
pub mod evaluator;
pub mod font;
pub mod ground_truth;
pub mod overlay;
pub mod render;

pub use confusion::{ConfusionMatrix, ConfusionReport, Outcome, Summary};
pub use error::{GroundTruthError, RenderError};
pub use evaluator::{Evaluator, OVERALL_SCOPE, Scope, ScopedConfusion};
pub use font::{DEFAULT_FONT_SIZE, TextRenderer};
pub use ground_truth::{GroundTruthBox, annotation_path, load_ground_truth, parse_ground_truth};
pub use overlay::{OverlayRenderer, class_color};
pub use render::{ConfusionRenderer, save_png};
