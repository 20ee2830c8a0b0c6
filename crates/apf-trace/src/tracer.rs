//! Tracer initialization and configuration.

use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const OTLP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Failed to initialize tracer: {0}")]
    Init(String),
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Export spans when an OTLP endpoint is set.
    pub enabled: bool,
    pub service_name: String,
    pub sample_rate: f64,
    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "apf-metering".to_string(),
            sample_rate: 1.0,
            otlp_endpoint: None,
            log_format: LogFormat::Text,
        }
    }
}

impl TracingConfig {
    fn sampler(&self) -> Sampler {
        if self.sample_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sample_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sample_rate)
        }
    }
}

/// Install the global subscriber. Log level comes from `RUST_LOG`, default `info`.
pub fn init_tracer(config: &TracingConfig) -> Result<(), TracerError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (text_layer, json_layer) = match config.log_format {
        LogFormat::Text => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true),
            ),
        ),
    };

    let telemetry_layer = match (config.enabled, config.otlp_endpoint.as_deref()) {
        (true, Some(endpoint)) => {
            let tracer = init_otlp_tracer(config, endpoint)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(telemetry_layer)
        .try_init()
        .map_err(|e| TracerError::Init(e.to_string()))
}

fn init_otlp_tracer(
    config: &TracingConfig,
    endpoint: &str,
) -> Result<opentelemetry_sdk::trace::Tracer, TracerError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(OTLP_TIMEOUT)
        .build()
        .map_err(|e| TracerError::Init(e.to_string()))?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);
    Ok(tracer)
}

/// Flush and stop span export.
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.service_name, "apf-metering");
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: TracingConfig =
            serde_json::from_str(r#"{"log_format":"json","sample_rate":0.25}"#).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.sample_rate, 0.25);
        assert_eq!(config.service_name, "apf-metering");
    }

    #[test]
    fn test_sampler_bounds() {
        let mut config = TracingConfig::default();
        assert!(matches!(config.sampler(), Sampler::AlwaysOn));
        config.sample_rate = 0.0;
        assert!(matches!(config.sampler(), Sampler::AlwaysOff));
        config.sample_rate = 0.5;
        assert!(matches!(config.sampler(), Sampler::TraceIdRatioBased(_)));
    }
}
