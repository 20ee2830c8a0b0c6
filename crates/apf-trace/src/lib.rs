//! Logging and tracing for Apple Farm metering.
//!
//! Installs a `tracing` subscriber (text or JSON logs) with optional OTLP span
//! export, and provides span helpers for the metering components.

pub mod spans;
pub mod tracer;

pub use spans::{checkout_span, subscription_span, usage_span, webhook_span};
pub use tracer::{LogFormat, TracerError, TracingConfig, init_tracer, shutdown_tracer};
