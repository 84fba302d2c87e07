//! Configuration for the exporter.

use std::path::Path;

use rpi_exporter_common::{LoggingConfig, validate_metric_name};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Collector settings shared by both sources.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Hardware status tool settings.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Memcached server settings.
    #[serde(default)]
    pub memcached: MemcachedConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:9243").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9243".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Metric name namespace (default: "rpi").
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Export the server clock as `<namespace>_time_seconds`.
    #[serde(default = "default_true")]
    pub time_metric: bool,

    /// Glob patterns for metric names to include (empty = all).
    ///
    /// Liveness metrics are always exported.
    #[serde(default)]
    pub include_metrics: Vec<String>,

    /// Glob patterns for metric names to exclude.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,
}

fn default_namespace() -> String {
    "rpi".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            time_metric: true,
            include_metrics: Vec::new(),
            exclude_metrics: Vec::new(),
        }
    }
}

/// Hardware status tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program to run (default: "vcgencmd", looked up on PATH).
    #[serde(default = "default_command")]
    pub command: String,

    /// Program arguments (default: ["get_throttled"]).
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// How long to wait for the program to exit (milliseconds).
    #[serde(default = "default_hardware_timeout")]
    pub timeout_ms: u64,
}

fn default_command() -> String {
    "vcgencmd".to_string()
}

fn default_args() -> Vec<String> {
    vec!["get_throttled".to_string()]
}

fn default_hardware_timeout() -> u64 {
    2000
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_command(),
            args: default_args(),
            timeout_ms: default_hardware_timeout(),
        }
    }
}

/// Memcached server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemcachedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Server address (default: "localhost:11211").
    #[serde(default = "default_address")]
    pub address: String,

    /// Per-request timeout, connection included (milliseconds).
    #[serde(default = "default_memcached_timeout")]
    pub timeout_ms: u64,
}

fn default_address() -> String {
    "localhost:11211".to_string()
}

fn default_memcached_timeout() -> u64 {
    1000
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_address(),
            timeout_ms: default_memcached_timeout(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if !self.collector.namespace.is_empty() {
            validate_metric_name(&self.collector.namespace)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }

        for pattern in self
            .collector
            .include_metrics
            .iter()
            .chain(&self.collector.exclude_metrics)
        {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "Invalid metric pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        if self.hardware.enabled {
            if self.hardware.command.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "hardware.command must not be empty".to_string(),
                ));
            }
            if self.hardware.timeout_ms == 0 {
                return Err(ConfigError::Validation(
                    "hardware.timeout_ms must be > 0".to_string(),
                ));
            }
        }

        if self.memcached.enabled {
            if self.memcached.address.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "memcached.address must not be empty".to_string(),
                ));
            }
            if self.memcached.timeout_ms == 0 {
                return Err(ConfigError::Validation(
                    "memcached.timeout_ms must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }
}
