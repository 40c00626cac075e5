//! Observability infrastructure.
//!
//! Structured logging via the tracing crate. Log level and format come
//! from the environment so deployments can switch between JSON and
//! human-readable output without a rebuild.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
