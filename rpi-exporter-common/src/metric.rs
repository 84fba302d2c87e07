//! Metric model shared between the collection core and the exposition layer.

use std::sync::Arc;

use crate::error::{Error, Result};

/// The kind of an exported metric.
///
/// Only the two kinds the exporter produces are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Value that can go up or down.
    Gauge,
    /// Monotonically increasing value.
    Counter,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Identity of one exported signal.
///
/// Descriptors are built once when the collector is constructed and shared
/// read-only between scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    fq_name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
}

impl MetricDescriptor {
    /// Create a descriptor whose name is `{namespace}_{name}`.
    pub fn new(
        namespace: &str,
        name: &str,
        help: impl Into<String>,
        kind: MetricKind,
        label_names: &[&str],
    ) -> Self {
        Self {
            fq_name: build_fq_name(namespace, name),
            help: help.into(),
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// The fully-qualified metric name.
    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// An immutable metric instance produced during one scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstMetric {
    descriptor: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl ConstMetric {
    /// Create a metric instance.
    ///
    /// Callers are responsible for matching `label_values` to the
    /// descriptor's label names.
    pub fn new(descriptor: Arc<MetricDescriptor>, value: f64, label_values: Vec<String>) -> Self {
        Self {
            descriptor,
            value,
            label_values,
        }
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Label name/value pairs in descriptor order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptor
            .label_names
            .iter()
            .zip(self.label_values.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Build a fully-qualified metric name from a namespace and a name.
///
/// Format: `{namespace}_{name}`, or just `{name}` for an empty namespace.
pub fn build_fq_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

/// Check that `name` is a valid Prometheus metric name.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn validate_metric_name(name: &str) -> Result<()> {
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return Err(Error::InvalidMetricName {
            name: name.to_string(),
            reason: "name is empty",
        });
    };

    if !(first.is_ascii_alphabetic() || first == '_' || first == ':') {
        return Err(Error::InvalidMetricName {
            name: name.to_string(),
            reason: "must start with a letter, underscore or colon",
        });
    }

    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
        return Err(Error::InvalidMetricName {
            name: name.to_string(),
            reason: "only [a-zA-Z0-9_:] characters are allowed",
        });
    }

    Ok(())
}
