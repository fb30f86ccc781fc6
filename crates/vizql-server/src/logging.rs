//! Structured logging for the VizQL server
//!
//! Console output for development, JSON for production, optional daily
//! rolling file output. Controlled by environment:
//! - `RUST_LOG`: level filter (e.g. "debug", "vizql_server=trace,axum=warn")
//! - `LOG_FORMAT`: "pretty", "json" or "compact"
//! - `LOG_OUTPUT`: "stdout", "file" or "both"
//! - `LOG_DIR`: directory for log files (default "./logs")

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production (structured logging)
    Json,
    /// Compact format for testing
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    pub fn from_env() -> Self {
        match std::env::var("LOG_OUTPUT").as_deref() {
            Ok("file") => LogOutput::File,
            Ok("both") => LogOutput::Both,
            _ => LogOutput::Stdout,
        }
    }
}

const LOG_FILE_PREFIX: &str = "vizql-server.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"))
        // Quiet the noisy transport crates.
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("tokio=warn".parse().expect("static directive"))
        .add_directive("tower=warn".parse().expect("static directive"))
        .add_directive("h2=warn".parse().expect("static directive"))
}

fn file_appender() -> RollingFileAppender {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&log_dir).ok();
    RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX)
}

/// Initialize the logging system. Call once at startup, after the config
/// has exported its logging settings to the environment.
pub fn init() {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();

    match (output, format) {
        (LogOutput::Stdout, LogFormat::Pretty) => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
        (LogOutput::Stdout, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().json().with_current_span(true))
                .init();
        }
        (LogOutput::Stdout, LogFormat::Compact) => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().compact())
                .init();
        }
        (LogOutput::File, _) => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().with_writer(file_appender()).with_ansi(false))
                .init();
        }
        (LogOutput::Both, format) => {
            let stdout_layer = match format {
                LogFormat::Pretty => fmt::layer().pretty().with_target(true).boxed(),
                LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
                LogFormat::Compact => fmt::layer().compact().boxed(),
            };
            let file_layer = fmt::layer()
                .with_writer(file_appender())
                .with_ansi(false)
                .boxed();

            tracing_subscriber::registry()
                .with(env_filter())
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
    }

    tracing::info!(format = ?format, output = ?output, "logging initialized");
}
