//! Test server and HTTP client helpers.

use apf_api::{ApiSettings, AppState, create_router};
use apf_core::{ApiCredential, ManualClock, Tier};
use chrono::{TimeZone, Utc};
use reqwest::{Client, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running API server backed by fresh in-memory stores.
pub struct TestServer {
    pub addr: SocketAddr,
    pub clock: Arc<ManualClock>,
    pub state: Arc<AppState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start with the clock at 2026-03-10 09:00 UTC.
    pub async fn start() -> anyhow::Result<Self> {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).single();
        let clock = Arc::new(ManualClock::new(start.unwrap_or_else(Utc::now)));
        let state = Arc::new(AppState::in_memory(clock.clone(), ApiSettings::default()));

        let app = create_router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            clock,
            state,
            handle,
        })
    }

    pub fn client(&self) -> ApiTestClient {
        ApiTestClient::new(self.addr)
    }

    /// Wait until queued ledger notifications have been applied.
    pub async fn flush_ledger(&self) {
        self.state.subscriptions.notifier().flush().await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// A fresh credential string for `tier`.
pub fn api_key(tier: Tier) -> String {
    ApiCredential::generate(tier).to_string()
}

/// API test client with base URL.
pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> reqwest::Result<Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> reqwest::Result<Response> {
        self.client
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<Response> {
        self.client.delete(self.url(path)).send().await
    }

    /// Record one call against `/api/v1/usage`.
    pub async fn record_usage(&self, api_key: &str) -> reqwest::Result<Response> {
        self.post(
            "/api/v1/usage",
            &serde_json::json!({
                "apiKey": api_key,
                "endpoint": "/api/v1/varieties",
                "method": "GET",
                "status": 200,
                "latencyMs": 12,
            }),
        )
        .await
    }

    pub async fn health(&self) -> reqwest::Result<bool> {
        let resp = self.get("/health").await?;
        Ok(resp.status().is_success())
    }
}
