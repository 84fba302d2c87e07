//! Error types for the collection core.
//!
//! None of these escape [`ScrapeCollector::scrape`](crate::collector::ScrapeCollector::scrape);
//! they are logged at the stage that produced them and turned into a liveness
//! downgrade for the affected source.

use std::num::ParseIntError;
use std::time::Duration;

use thiserror::Error;

/// Failure to obtain raw data from a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The command could not be started.
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command's output could not be fully read.
    #[error("Failed to read output of `{command}`: {source}")]
    Read {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully. Output read before exit is kept.
    #[error("`{command}` execution failed: {status}")]
    ExitStatus {
        command: String,
        status: String,
        stdout: Vec<u8>,
    },

    /// The fetch did not finish within its timeout.
    #[error("{target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    /// Could not connect to the cache server.
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on an established connection.
    #[error("I/O error talking to {address}: {source}")]
    Io {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The cache server replied with an error or an unexpected line.
    #[error("Protocol error from {address}: {message}")]
    Protocol { address: String, message: String },
}

impl FetchError {
    /// Output that was read before the failure, if any.
    pub fn partial_output(&self) -> Option<&[u8]> {
        match self {
            FetchError::ExitStatus { stdout, .. } if !stdout.is_empty() => Some(stdout),
            _ => None,
        }
    }

    /// Consume the error, keeping any output read before the failure.
    pub fn into_partial_output(self) -> Option<Vec<u8>> {
        match self {
            FetchError::ExitStatus { stdout, .. } if !stdout.is_empty() => Some(stdout),
            _ => None,
        }
    }
}

/// Raw data was obtained but is not in the expected format.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Throttled status output is empty")]
    Empty,

    #[error("Throttled status output is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid hexadecimal throttled status {value:?}")]
    InvalidHex {
        value: String,
        #[source]
        source: Option<ParseIntError>,
    },
}

/// A statistic that was present but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStat {
    pub key: String,
    pub value: String,
    pub expected: &'static str,
}

/// Some statistics decoded, others were skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} statistic(s) could not be decoded: {}", .skipped.len(), skipped_keys(.skipped))]
pub struct PartialDecodeError {
    pub skipped: Vec<SkippedStat>,
}

fn skipped_keys(skipped: &[SkippedStat]) -> String {
    skipped
        .iter()
        .map(|s| s.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A decoded fact could not be turned into a metric instance.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("No descriptor registered for metric '{0}'")]
    UnknownMetric(String),

    #[error("Metric '{name}' is declared as {declared} but was emitted as {emitted}")]
    KindMismatch {
        name: String,
        declared: &'static str,
        emitted: &'static str,
    },

    #[error("Metric '{name}' expects {expected} label value(s), got {actual}")]
    LabelCount {
        name: String,
        expected: usize,
        actual: usize,
    },
}
