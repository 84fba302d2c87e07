//! Shared types for the Raspberry Pi / memcached exporter.
//!
//! - [`metric`] - Metric model (`MetricDescriptor`, `MetricKind`, `ConstMetric`)
//! - [`config`] - Logging configuration shared by binaries
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod metric;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use metric::{
    ConstMetric, MetricDescriptor, MetricKind, build_fq_name, validate_metric_name,
};

use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Pick the filter directives to log with.
///
/// An explicit override (the `--log-level` flag) wins, then a non-empty
/// `RUST_LOG`, then the configured level.
pub fn filter_directives(
    config: &LoggingConfig,
    level_override: Option<&str>,
    env: Option<String>,
) -> String {
    if let Some(level) = level_override {
        return level.to_string();
    }

    match env {
        Some(env) if !env.trim().is_empty() => env,
        _ => config.level.clone(),
    }
}

/// Build the [`EnvFilter`] for the exporter's logs.
///
/// Directives that do not parse are reported as [`Error::Config`] instead of
/// silently falling back to a default level.
pub fn log_filter(config: &LoggingConfig, level_override: Option<&str>) -> Result<EnvFilter> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(config, level_override, env);

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter {:?}: {}", directives, e)))
}

/// Install the global tracing subscriber.
///
/// `config.format` selects human-readable text or one JSON object per line.
///
/// ```ignore
/// let logging = LoggingConfig::default();
/// rpi_exporter_common::init_tracing(&logging, Some("debug"))?;
/// ```
pub fn init_tracing(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let filter = log_filter(config, level_override)?;
    let directives = filter.to_string();

    let output = match config.format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;

    tracing::debug!(filter = %directives, format = ?config.format, "Logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_override_wins_over_env_and_config() {
        let directives =
            filter_directives(&logging("warn"), Some("debug"), Some("trace".to_string()));
        assert_eq!(directives, "debug");
    }

    #[test]
    fn test_env_wins_over_config() {
        let directives =
            filter_directives(&logging("warn"), None, Some("rpi_exporter=trace".to_string()));
        assert_eq!(directives, "rpi_exporter=trace");
    }

    #[test]
    fn test_blank_env_falls_back_to_config() {
        assert_eq!(filter_directives(&logging("warn"), None, Some("  ".to_string())), "warn");
        assert_eq!(filter_directives(&logging("error"), None, None), "error");
    }

    #[test]
    fn test_log_filter_accepts_override() {
        assert!(log_filter(&logging("info"), Some("rpi_exporter=debug,warn")).is_ok());
    }

    #[test]
    fn test_log_filter_rejects_bad_level() {
        let result = log_filter(&logging("info"), Some("rpi_exporter=loud"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
