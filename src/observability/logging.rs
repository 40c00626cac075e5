//! Structured logging setup using the tracing crate.
//!
//! ## Environment variables
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG, TRACE — defaults to INFO
//! - `LOG_FORMAT`: json, pretty, compact — defaults to compact
//! - `RUST_LOG`: overrides the filter entirely (env_logger syntax)
//!
//! ```bash
//! # Production JSON logging
//! LOG_FORMAT=json LOG_LEVEL=INFO iotoggle run
//!
//! # Development with colors
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG iotoggle run
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable).
    Json,
    /// Pretty format with colors and indentation (human-readable).
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly).
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialize logging with explicit configuration.
pub fn init_logging(level: Level, format: LogFormat) {
    let mut filter = EnvFilter::new(level.to_string());
    // The transport library's own event logging is noise at info level.
    if let Ok(directive) = "rumqttc=warn".parse() {
        filter = filter.add_directive(directive);
    }

    // Allow RUST_LOG to override everything.
    if let Ok(rust_log) = env::var("RUST_LOG") {
        filter = EnvFilter::new(rust_log);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            subscriber.with(fmt::layer().json()).init();
        }
        LogFormat::Pretty => {
            subscriber.with(fmt::layer().pretty().with_ansi(true)).init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_ansi(true).with_target(false))
                .init();
        }
    }
}

/// Initialize logging from environment variables.
pub fn init_default_logging() {
    let level = match env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "INFO".to_string())
        .to_uppercase()
        .as_str()
    {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    };

    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default());

    init_logging(level, format);
}
