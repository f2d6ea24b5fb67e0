use clap::Parser;
use std::path::PathBuf;

/// Run a detector over an annotated image set and score it against the
/// annotations.
#[derive(Debug, Default, Parser)]
#[command(name = "detect-eval", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset root, searched recursively for images and their `.xml` annotations
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Directory that receives one numbered run directory per invocation
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// ONNX model. Without one, output tensors recorded next to each image are replayed
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Minimum class score for a detection
    #[arg(long)]
    pub confidence: Option<f32>,

    /// IoU above which NMS drops the lower-scoring box
    #[arg(long)]
    pub nms_iou: Option<f32>,

    /// Model input size
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    pub img_size: Option<Vec<u32>>,

    /// Do not write predictions.txt
    #[arg(long)]
    pub no_save: bool,

    /// Write each image with its detections drawn under `overlays/`
    #[arg(long)]
    pub save_overlays: bool,

    /// TrueType font for matrix and overlay text
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}
