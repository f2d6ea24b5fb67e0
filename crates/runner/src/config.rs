use crate::cli::Cli;
use common::Environment;
use evaluation::DEFAULT_FONT_SIZE;
use inference::DetectorConfig;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "DETECT_EVAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub log_level: LogLevel,
    #[serde(deserialize_with = "deserialize_environment")]
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub model_path: Option<PathBuf>,
    /// Run the ONNX model on CUDA rather than CPU.
    pub use_cuda: bool,
    pub save_predictions: bool,
    pub save_overlays: bool,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn deserialize_environment<'de, D>(deserializer: D) -> Result<Environment, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(serde::de::Error::custom)
}

impl RunnerConfig {
    /// Layer built-in defaults, the optional config file, `DETECT_EVAL_*`
    /// environment variables and finally command-line flags.
    ///
    /// Nested keys use `__`, e.g. `DETECT_EVAL_DETECTOR__CONFIDENCE_THRESHOLD`;
    /// `DETECT_EVAL_DETECTOR__LABELS` takes a comma-separated list.
    pub fn load(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("environment", Environment::from_env().as_str())?
            .set_default("output_dir", "runs")?
            .set_default("use_cuda", false)?
            .set_default("save_predictions", true)?
            .set_default("save_overlays", false)?
            .set_default("font_size", f64::from(DEFAULT_FONT_SIZE))?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("detector.labels")
                    .try_parsing(true),
            )
            .set_override_option("data_dir", cli.data.as_deref().map(path_value))?
            .set_override_option("output_dir", cli.output.as_deref().map(path_value))?
            .set_override_option("model_path", cli.model.as_deref().map(path_value))?
            .set_override_option("font_path", cli.font.as_deref().map(path_value))?
            .set_override_option("log_level", cli.log_level.clone())?
            .set_override_option("detector.confidence_threshold", cli.confidence.map(f64::from))?
            .set_override_option("detector.nms_iou_threshold", cli.nms_iou.map(f64::from))?;

        if let Some([width, height]) = cli.img_size.as_deref() {
            builder = builder
                .set_override("detector.input_width", i64::from(*width))?
                .set_override("detector.input_height", i64::from(*height))?;
        }
        if cli.no_save {
            builder = builder.set_override("save_predictions", false)?;
        }
        if cli.save_overlays {
            builder = builder.set_override("save_overlays", true)?;
        }

        builder.build()?.try_deserialize()
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
