use opentelemetry::KeyValue;
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;

/// Batch runs finish in seconds, so metrics are pushed more often than a
/// long-lived service would.
const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Owns the OTLP tracer and meter providers for a process and flushes them
/// when dropped.
///
/// # Example
/// ```ignore
/// let telemetry = TelemetryGuard::init("detect-eval", "http://localhost:4317")?;
/// common::setup_logging("info", Environment::Production, Some(&telemetry));
/// // ... batch runs ...
/// // Pending spans and metrics are exported when `telemetry` goes out of scope
/// ```
pub struct TelemetryGuard {
    service_name: String,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Install global OpenTelemetry providers exporting to `endpoint` over gRPC.
    ///
    /// Only the providers are registered here; the `tracing` bridge is added
    /// by [`crate::setup_logging`] through [`TelemetryGuard::tracer`].
    pub fn init(service_name: &str, endpoint: &str) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = service_resource(service_name);
        let tracer_provider = build_tracer_provider(endpoint, resource.clone())?;
        let meter_provider = build_meter_provider(endpoint, resource)?;

        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        Ok(Self {
            service_name: service_name.to_string(),
            tracer_provider,
            meter_provider,
        })
    }

    /// Tracer bound to the globally installed provider.
    pub fn tracer(&self) -> BoxedTracer {
        global::tracer(self.service_name.clone())
    }
}

fn service_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, service_name.to_string()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build()
}

fn build_tracer_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_batch_exporter(exporter)
        .build())
}

fn build_meter_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // Logging may already be torn down here
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Failed to flush traces for {}: {e:?}", self.service_name);
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("Failed to flush metrics for {}: {e:?}", self.service_name);
        }
    }
}

/// Creates an info-level span and enters it.
#[macro_export]
macro_rules! span {
    ($name:literal) => {
        tracing::info_span!($name).entered()
    };
    ($name:literal, $($field:tt)+) => {
        tracing::info_span!($name, $($field)+).entered()
    };
}

/// Creates a debug-level span and enters it.
#[macro_export]
macro_rules! span_debug {
    ($name:literal) => {
        tracing::debug_span!($name).entered()
    };
    ($name:literal, $($field:tt)+) => {
        tracing::debug_span!($name, $($field)+).entered()
    };
}
