//! Server configuration.
//!
//! Layered: built-in defaults, then an optional YAML file, then `APF_*`
//! environment variables (`__` separates nested keys, for example
//! `APF_TRACING__OTLP_ENDPOINT`).

use anyhow::{Context, bail};
use apf_api::ApiSettings;
use apf_trace::TracingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "apf.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub public_url: String,
    pub checkout_base_url: String,
    pub webhook_history_limit: usize,
    pub ledger_queue_capacity: usize,
    pub tracing: TracingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_url: api.public_url,
            checkout_base_url: api.checkout_base_url,
            webhook_history_limit: api.webhook_history_limit,
            ledger_queue_capacity: api.ledger_queue_capacity,
            tracing: TracingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `path`, or from `apf.yaml` if present, then the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("APF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("reading configuration")?
            .try_deserialize()
            .context("parsing configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.socket_addr()?;
        url::Url::parse(&self.public_url)
            .with_context(|| format!("public_url is not a URL: {}", self.public_url))?;
        url::Url::parse(&self.checkout_base_url).with_context(|| {
            format!("checkout_base_url is not a URL: {}", self.checkout_base_url)
        })?;
        if self.webhook_history_limit == 0 {
            bail!("webhook_history_limit must be at least 1");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("bind_address is not host:port: {}", self.bind_address))
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            public_url: self.public_url.trim_end_matches('/').to_string(),
            checkout_base_url: self.checkout_base_url.clone(),
            webhook_history_limit: self.webhook_history_limit,
            ledger_queue_capacity: self.ledger_queue_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.webhook_history_limit, 20);
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "bind_address: 127.0.0.1:9090\npublic_url: https://api.applefarm.io/\ntracing:\n  log_format: json"
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9090");
        assert_eq!(config.tracing.log_format, apf_trace::LogFormat::Json);
        assert_eq!(config.ledger_queue_capacity, 256);
        assert_eq!(config.api_settings().public_url, "https://api.applefarm.io");
    }

    #[test]
    fn test_invalid_bind_address_rejected() {
        let config = ServerConfig {
            bind_address: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
