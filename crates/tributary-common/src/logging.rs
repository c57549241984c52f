//! Logging configuration and initialization
//!
//! Centralized tracing setup for all Tributary binaries. Components log with
//! the structured `tracing` macros (`info!`, `warn!`, ...) — never `println!`.
//!
//! # Example
//!
//! ```no_run
//! use tributary_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env())?;
//!     info!("starting up");
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

/// Logging configuration, read once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `"info"` or `"info,sqlx=warn"`.
    pub filter: String,
    /// Output target.
    pub output: LogOutput,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Directory for rotated log files (file output only).
    pub log_dir: PathBuf,
    /// Log file name prefix, e.g. `"tributary"` -> `tributary.2026-08-07.log`.
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            output: LogOutput::Console,
            json: false,
            log_dir: PathBuf::from("./logs"),
            file_prefix: "tributary".to_string(),
        }
    }
}

impl LogConfig {
    /// Build a config from `LOG_FILTER`, `LOG_OUTPUT`, `LOG_FORMAT`,
    /// `LOG_DIR` and `LOG_FILE_PREFIX`. Missing variables keep defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.filter = filter;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            config.output = parse_output(&output);
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.json = format.eq_ignore_ascii_case("json");
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            config.file_prefix = prefix;
        }
        config
    }
}

fn parse_output(raw: &str) -> LogOutput {
    match raw.to_lowercase().as_str() {
        "file" => LogOutput::File,
        "both" | "all" => LogOutput::Both,
        _ => LogOutput::Console,
    }
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("invalid log filter: {}", config.filter))?;

    let console_layer = match config.output {
        LogOutput::Console | LogOutput::Both => {
            let layer = fmt::layer().with_writer(std::io::stdout);
            Some(if config.json {
                layer.json().with_ansi(false).boxed()
            } else {
                layer.boxed()
            })
        },
        LogOutput::File => None,
    };

    let file_layer = match config.output {
        LogOutput::File | LogOutput::Both => {
            std::fs::create_dir_all(&config.log_dir)
                .context("failed to create log directory")?;
            let appender =
                tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The guard flushes on drop; it must live as long as the process.
            std::mem::forget(guard);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            Some(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        },
        LogOutput::Console => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(filter = %config.filter, output = ?config.output, "logging initialized");
    Ok(())
}
