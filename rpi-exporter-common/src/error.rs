use thiserror::Error;

/// Common error type for exporter components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid metric name '{name}': {reason}")]
    InvalidMetricName { name: String, reason: &'static str },
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
