//! Logging, tracing and metrics setup for the engine and the CLI.
//!
//! Local output always goes through a `fmt` layer filtered by `RUST_LOG` or
//! the configured level. With an OTLP endpoint the same spans, log events and
//! workflow counters are exported as well.

pub mod metrics;
pub mod workflow;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. "http://localhost:4317".
    pub endpoint: Option<String>,
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl TelemetryConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.otel_endpoint.clone(),
            service_name: env!("CARGO_PKG_NAME").to_string(),
            log_level: config.log_level.clone(),
        }
    }
}

/// Build the event filter. `RUST_LOG` wins over `level`; a malformed level
/// is a configuration error rather than a silent fallback.
pub fn log_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| Error::Config(format!("invalid LOG_LEVEL '{level}': {e}")))
}

/// Providers for the three exported signals.
struct OtlpPipeline {
    traces: SdkTracerProvider,
    metrics: SdkMeterProvider,
    logs: SdkLoggerProvider,
}

impl OtlpPipeline {
    fn connect(endpoint: &str, service_name: &str) -> Result<Self> {
        let resource = Resource::builder()
            .with_service_name(service_name.to_string())
            .with_attribute(opentelemetry::KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ))
            .build();

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("span", endpoint, e))?;
        let metrics = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("metric", endpoint, e))?;
        let logs = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("log", endpoint, e))?;

        let pipeline = Self {
            traces: SdkTracerProvider::builder()
                .with_batch_exporter(spans)
                .with_resource(resource.clone())
                .build(),
            metrics: SdkMeterProvider::builder()
                .with_periodic_exporter(metrics)
                .with_resource(resource.clone())
                .build(),
            logs: SdkLoggerProvider::builder()
                .with_batch_exporter(logs)
                .with_resource(resource)
                .build(),
        };
        // Counters in `metrics` resolve through the global meter.
        opentelemetry::global::set_meter_provider(pipeline.metrics.clone());
        Ok(pipeline)
    }

    fn flush(&self) {
        let _ = self.traces.force_flush();
        let _ = self.metrics.force_flush();
        let _ = self.logs.force_flush();
    }

    fn shutdown(self) {
        let _ = self.logs.shutdown();
        let _ = self.metrics.shutdown();
        let _ = self.traces.shutdown();
    }
}

fn exporter_error(signal: &str, endpoint: &str, e: impl std::fmt::Display) -> Error {
    Error::Other(format!("OTLP {signal} exporter for {endpoint}: {e}"))
}

/// Keeps exporters alive; dropping it flushes and shuts them down.
pub struct TelemetryGuard {
    pipeline: Option<OtlpPipeline>,
}

impl TelemetryGuard {
    pub fn is_exporting(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn force_flush(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
    }
}

/// Install the global subscriber.
///
/// Fails if the level is malformed, an exporter cannot be built, or a global
/// subscriber is already set.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    let filter = log_filter(&config.log_level)?;
    let pipeline = config
        .endpoint
        .as_deref()
        .map(|endpoint| OtlpPipeline::connect(endpoint, &config.service_name))
        .transpose()?;

    let trace_layer = pipeline.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.traces.tracer(config.service_name.clone()))
    });
    let log_layer = pipeline
        .as_ref()
        .map(|p| opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&p.logs));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_target(false))
        .with(trace_layer)
        .with(log_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("tracing subscriber already installed: {e}")))?;

    tracing::debug!(
        service = %config.service_name,
        exporting = pipeline.is_some(),
        "telemetry initialized"
    );
    Ok(TelemetryGuard { pipeline })
}
