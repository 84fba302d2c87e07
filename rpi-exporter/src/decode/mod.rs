//! Decoders turning raw source output into typed facts.

pub mod bitmask;
pub mod stats;

use rpi_exporter_common::MetricKind;

/// A typed value extracted from raw source data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactValue {
    Bool(bool),
    Int(u64),
    Float(f64),
}

impl FactValue {
    /// Numeric representation used for exposition. Booleans map to 1/0.
    pub fn as_f64(&self) -> f64 {
        match self {
            FactValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            FactValue::Int(v) => *v as f64,
            FactValue::Float(v) => *v,
        }
    }
}

/// A single named, typed value ready to be emitted as a metric.
///
/// `metric` is the descriptor name without the namespace prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFact {
    pub metric: &'static str,
    pub kind: MetricKind,
    pub value: FactValue,
    pub label_values: Vec<String>,
}

impl DecodedFact {
    /// Create an unlabelled fact.
    pub fn new(metric: &'static str, kind: MetricKind, value: FactValue) -> Self {
        Self {
            metric,
            kind,
            value,
            label_values: Vec::new(),
        }
    }

    /// Add a label value.
    pub fn with_label_value(mut self, value: impl Into<String>) -> Self {
        self.label_values.push(value.into());
        self
    }
}

/// Static declaration of a metric a decoder can produce.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub label_names: &'static [&'static str],
}
