pub mod backend;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod run;

pub use backend::build_backend;
pub use cli::Cli;
pub use config::{LogLevel, RunnerConfig};
pub use dataset::{Sample, discover};
pub use run::{
    BatchRunner, RunSummary, allocate_run_dir, format_prediction_line, overlay_path, scope_dir,
};
