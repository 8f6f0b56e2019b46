//! Logging, trace export, Prometheus metrics and subsystem health.
//!
//! [`init`] runs once in `clonemond` before any sampling happens. OTLP export
//! is opt-in through the environment; the Prometheus listener is on unless
//! `metrics_port` is 0.

use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TraceError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{self, RandomIdGenerator, Sampler, Tracer};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod health;
pub mod metrics;

/// `CLONEMON_OTLP_ENABLED` or a configured collector endpoint turns export on.
fn otlp_enabled() -> bool {
    std::env::var("CLONEMON_OTLP_ENABLED").is_ok()
        || std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
}

/// Collector address, falling back to a local gRPC collector.
fn otlp_endpoint() -> String {
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string())
}

/// Install the global subscriber and metrics recorder.
///
/// `RUST_LOG` wins over `log_level` when set. Call it once: the subscriber and
/// the recorder are process-wide.
pub fn init(log_level: &str, metrics_port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true));

    if otlp_enabled() {
        let endpoint = otlp_endpoint();
        let telemetry = tracing_opentelemetry::layer().with_tracer(otlp_tracer(&endpoint)?);
        subscriber.with(telemetry).init();
        tracing::info!(%endpoint, "Logging to stdout, exporting spans over OTLP");
    } else {
        subscriber.init();
        tracing::info!("Logging to stdout, span export off");
    }

    if metrics_port != 0 {
        PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], metrics_port)).install()?;
        tracing::info!(port = metrics_port, "Prometheus exporter listening");
    }

    metrics::register_core_metrics();

    Ok(())
}

/// Batch span exporter tagged with the daemon's name and version.
fn otlp_tracer(endpoint: &str) -> Result<Tracer, TraceError> {
    let resource = Resource::new([
        KeyValue::new("service.name", "clonemond"),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Flush pending spans before exit.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
