//! Optional OpenTelemetry wiring behind the `telemetry` feature.
//!
//! When enabled, every task and chat request carries a span that can be
//! exported to Jaeger, Tempo, or any OTLP collector, and incoming
//! `traceparent` headers are honored so a gateway in front of this service
//! shows up as the parent span.
//!
//! Build with `cargo build --features telemetry`. The default build skips
//! the whole OTLP dependency tree and logs to the console only.

#[cfg(feature = "telemetry")]
use opentelemetry::{global, KeyValue};
#[cfg(feature = "telemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resource attributes attached to every exported span.
///
/// `deployment.environment` mirrors `TASKCHAT_ENV`, the same switch the
/// auth layer uses, so traces from a production deployment are
/// distinguishable from dev-mode noise.
#[cfg(feature = "telemetry")]
fn trace_resource(service_name: &str) -> Resource {
    let environment =
        std::env::var("TASKCHAT_ENV").unwrap_or_else(|_| "development".to_string());
    Resource::new([
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("deployment.environment", environment),
    ])
}

/// Parses `OTEL_TRACE_SAMPLE_RATIO`. `None` means sample everything.
///
/// Values are clamped to `0.0..=1.0`; unparseable input falls back to
/// always-on rather than silently dropping traces.
#[cfg(feature = "telemetry")]
fn sample_ratio_from(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|r| r.is_finite())
        .map(|r| r.clamp(0.0, 1.0))
}

/// Initialize the OTLP trace pipeline plus console logging.
///
/// Environment variables:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint (default: http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: service name (default: taskchat)
/// - `OTEL_TRACE_SAMPLE_RATIO`: head-sampling ratio, 0.0 to 1.0 (default: sample all)
/// - `RUST_LOG`: log level filter (default: info)
#[cfg(feature = "telemetry")]
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "taskchat".to_string());

    let ratio = sample_ratio_from(std::env::var("OTEL_TRACE_SAMPLE_RATIO").ok().as_deref());
    let sampler = match ratio {
        Some(r) => Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(r))),
        None => Sampler::ParentBased(Box::new(Sampler::AlwaysOn)),
    };

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&otlp_endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(sampler)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(trace_resource(&service_name)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    tracing::info!(
        service_name = %service_name,
        otlp_endpoint = %otlp_endpoint,
        sample_ratio = ?ratio,
        "OpenTelemetry tracing initialized"
    );

    Ok(())
}

/// Flush buffered spans during graceful shutdown.
#[cfg(feature = "telemetry")]
pub fn shutdown_tracing() {
    tracing::info!("Shutting down OpenTelemetry tracing");
    global::shutdown_tracer_provider();
}

/// W3C Trace Context propagation (`traceparent`/`tracestate` headers).
#[cfg(feature = "telemetry")]
pub mod trace_propagation {
    use axum::{extract::Request, middleware::Next, response::Response};
    use opentelemetry::global;
    use opentelemetry::propagation::Extractor;
    use tracing::Span;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    /// Read-only view over request headers for the propagator.
    struct HeaderCarrier<'a>(&'a axum::http::HeaderMap);

    impl<'a> Extractor for HeaderCarrier<'a> {
        fn get(&self, key: &str) -> Option<&str> {
            self.0.get(key)?.to_str().ok()
        }

        fn keys(&self) -> Vec<&str> {
            self.0.keys().map(|k| k.as_str()).collect()
        }
    }

    /// Adopt the caller's trace context, if any, as the parent of the
    /// current request span.
    pub async fn propagate_trace_context(req: Request, next: Next) -> Response {
        let remote_cx =
            global::get_text_map_propagator(|prop| prop.extract(&HeaderCarrier(req.headers())));
        Span::current().set_parent(remote_cx);
        next.run(req).await
    }
}
