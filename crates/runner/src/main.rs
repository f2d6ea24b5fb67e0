use clap::Parser;
use common::{TelemetryGuard, setup_logging};
use runner::{BatchRunner, Cli, RunnerConfig, build_backend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RunnerConfig::load(&cli)?;

    let telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| TelemetryGuard::init("detect-eval", endpoint))
        .transpose()?;

    setup_logging(
        config.log_level.as_str(),
        config.environment,
        telemetry.as_ref(),
    );

    tracing::info!(config = ?config, "Loaded configuration");

    let mut backend = build_backend(&config)?;
    let summary = BatchRunner::new(&config)?.run(backend.as_mut(), cli.progress)?;

    if summary.images > 0 && summary.failed == summary.images {
        anyhow::bail!("All {} images failed to process", summary.images);
    }

    tracing::info!(run_dir = %summary.run_dir.display(), "Results written");
    Ok(())
}
