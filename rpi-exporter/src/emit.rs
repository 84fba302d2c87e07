//! Metric emitter: wraps decoded facts as immutable metric instances.

use std::sync::Arc;

use rpi_exporter_common::{ConstMetric, MetricDescriptor, MetricKind};

use crate::decode::DecodedFact;
use crate::descriptors::Descriptors;
use crate::error::EmitError;

/// Per-scrape output collection.
#[derive(Debug, Default)]
pub struct MetricSink {
    metrics: Vec<ConstMetric>,
}

impl MetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_metrics(self) -> Vec<ConstMetric> {
        self.metrics
    }
}

/// Write exactly one metric instance into `sink`.
///
/// The descriptor is shared, never modified.
pub fn emit(
    sink: &mut MetricSink,
    descriptor: &Arc<MetricDescriptor>,
    kind: MetricKind,
    value: f64,
    label_values: Vec<String>,
) -> Result<(), EmitError> {
    if descriptor.kind() != kind {
        return Err(EmitError::KindMismatch {
            name: descriptor.fq_name().to_string(),
            declared: descriptor.kind().as_str(),
            emitted: kind.as_str(),
        });
    }

    if descriptor.label_names().len() != label_values.len() {
        return Err(EmitError::LabelCount {
            name: descriptor.fq_name().to_string(),
            expected: descriptor.label_names().len(),
            actual: label_values.len(),
        });
    }

    sink.metrics
        .push(ConstMetric::new(descriptor.clone(), value, label_values));
    Ok(())
}

/// Emit a decoded fact using its registered descriptor.
pub fn emit_fact(
    sink: &mut MetricSink,
    descriptors: &Descriptors,
    fact: DecodedFact,
) -> Result<(), EmitError> {
    let descriptor = descriptors
        .get(fact.metric)
        .ok_or_else(|| EmitError::UnknownMetric(fact.metric.to_string()))?;

    emit(
        sink,
        descriptor,
        fact.kind,
        fact.value.as_f64(),
        fact.label_values,
    )
}
