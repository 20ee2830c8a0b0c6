//! End-to-end test infrastructure for the Apple Farm metering API.
//!
//! Starts the real router on an ephemeral port with a manual clock so
//! tests can drive day rollover and expiry.
//!
//! ```ignore
//! use apf_tests::TestServer;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = TestServer::start().await.unwrap();
//!     let resp = server.client().get("/health").await.unwrap();
//! }
//! ```

pub mod helpers;

pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,apf_billing=debug")),
        )
        .with_test_writer()
        .try_init();
}
