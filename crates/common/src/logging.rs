use crate::config::Environment;
use crate::telemetry::TelemetryGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Development gets pretty, coloured output and production gets JSON lines.
/// `RUST_LOG` takes precedence over `log_level` when set. When `telemetry` is
/// provided, spans are also bridged to its OTLP tracer.
pub fn setup_logging(log_level: &str, environment: Environment, telemetry: Option<&TelemetryGuard>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let otel_layer =
        telemetry.map(|guard| tracing_opentelemetry::layer().with_tracer(guard.tracer()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
