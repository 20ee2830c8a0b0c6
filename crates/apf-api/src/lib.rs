//! HTTP API server for Apple Farm usage metering and billing.

pub mod error;
pub mod handlers;
pub mod headers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{ApiSettings, AppState};

use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve the API on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    state.subscriptions.notifier().flush().await;
    Ok(())
}
