//! Tracing subscriber setup.
//!
//! Components never read a global logger. The binary installs the subscriber
//! once and hands each component a [`tracing::Span`] from [`component_span`].

use anyhow::{Context, Result};
use std::str::FromStr;
use tracing::Span;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for structured logging.
    Json,
    /// Human-readable pretty format with colors.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" | "prod" => Self::Json,
            "pretty" | "dev" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::default(),
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log output format.
    pub log_format: LogFormat,
    /// Filter directives, e.g. "info,dredd_operator=debug".
    pub log_filter: String,
    /// Include file and line in each event.
    pub include_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info,kube=warn".to_string(),
            include_location: false,
        }
    }
}

impl TracingConfig {
    /// Configuration for the `logger` setting (`PROD` or `DEV`).
    ///
    /// `RUST_LOG` overrides the default filter when set.
    pub fn for_logger(logger: &str) -> Self {
        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| Self::default().log_filter);
        Self {
            log_format: logger.parse().unwrap_or_default(),
            log_filter,
            include_location: logger.eq_ignore_ascii_case("dev"),
        }
    }
}

/// Install the global subscriber.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_span_events(FmtSpan::NONE)
                    .flatten_event(true),
            )
            .try_init()
            .context("Failed to initialize tracing subscriber")?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()
            .context("Failed to initialize tracing subscriber")?,
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
            .context("Failed to initialize tracing subscriber")?,
    }
    Ok(())
}

/// Span handed to one component; its events carry `component` and `namespace`.
pub fn component_span(component: &'static str, namespace: &str) -> Span {
    tracing::info_span!("dredd", component, namespace = %namespace)
}
