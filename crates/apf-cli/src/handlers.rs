//! Command handlers.

use crate::commands::OutputFormat;
use crate::config::ServerConfig;
use anyhow::Context;
use apf_api::AppState;
use apf_core::{ApiCredential, SystemClock, Tier};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::in_memory(
        Arc::new(SystemClock),
        config.api_settings(),
    ));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Apple Farm metering API listening");

    apf_api::serve(listener, state, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

pub fn generate_keys(tier: &str, count: u32) -> anyhow::Result<()> {
    let tier: Tier = tier.parse()?;
    for _ in 0..count {
        println!("{}", ApiCredential::generate(tier));
    }
    Ok(())
}

pub fn show_config(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(config)?,
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
    };
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_rejects_unknown_tier() {
        assert!(generate_keys("gold", 1).is_err());
        assert!(generate_keys("pro", 2).is_ok());
    }

    #[test]
    fn test_show_config_renders_both_formats() {
        let config = ServerConfig::default();
        assert!(show_config(&config, OutputFormat::Yaml).is_ok());
        assert!(show_config(&config, OutputFormat::Json).is_ok());
    }
}
