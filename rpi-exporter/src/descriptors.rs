//! The fixed set of metric descriptors exported by the collector.

use std::collections::HashMap;
use std::sync::Arc;

use rpi_exporter_common::{MetricDescriptor, MetricKind};

use crate::decode::{MetricSpec, bitmask, stats};

/// Liveness of the hardware status tool.
pub const HARDWARE_UP: MetricSpec = MetricSpec {
    name: "hardware_up",
    help: "Whether the hardware status tool ran and its output decoded (1 = yes)",
    kind: MetricKind::Gauge,
    label_names: &[],
};

/// Liveness of the memcached server.
pub const MEMCACHED_UP: MetricSpec = MetricSpec {
    name: "memcached_up",
    help: "Whether the memcached server was reached and its statistics decoded (1 = yes)",
    kind: MetricKind::Gauge,
    label_names: &[],
};

/// Read-only registry of every metric the collector may emit, keyed by the
/// name without namespace.
#[derive(Debug)]
pub struct Descriptors {
    namespace: String,
    by_name: HashMap<&'static str, Arc<MetricDescriptor>>,
}

impl Descriptors {
    /// Build the full descriptor set under `namespace`.
    pub fn new(namespace: &str) -> Self {
        let specs = bitmask::metric_specs()
            .chain(stats::metric_specs())
            .chain([HARDWARE_UP, MEMCACHED_UP]);

        let by_name = specs
            .map(|spec| {
                let descriptor = MetricDescriptor::new(
                    namespace,
                    spec.name,
                    spec.help,
                    spec.kind,
                    spec.label_names,
                );
                (spec.name, Arc::new(descriptor))
            })
            .collect();

        Self {
            namespace: namespace.to_string(),
            by_name,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up a descriptor by its name without namespace.
    pub fn get(&self, name: &str) -> Option<&Arc<MetricDescriptor>> {
        self.by_name.get(name)
    }

    /// Iterate over all descriptors, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MetricDescriptor>> {
        self.by_name.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_are_namespaced() {
        let descriptors = Descriptors::new("rpi");

        let desc = descriptors.get("undervoltage_detected").unwrap();
        assert_eq!(desc.fq_name(), "rpi_undervoltage_detected");

        let desc = descriptors.get("memcached_current_items").unwrap();
        assert_eq!(desc.fq_name(), "rpi_memcached_current_items");

        let desc = descriptors.get("time_seconds").unwrap();
        assert_eq!(desc.fq_name(), "rpi_time_seconds");
    }

    #[test]
    fn test_descriptors_include_liveness() {
        let descriptors = Descriptors::new("rpi");

        assert!(descriptors.get("hardware_up").is_some());
        assert!(descriptors.get("memcached_up").is_some());
    }

    #[test]
    fn test_descriptor_names_are_valid() {
        let descriptors = Descriptors::new("rpi");

        assert!(descriptors.iter().count() > 0);
        for desc in descriptors.iter() {
            assert!(
                rpi_exporter_common::validate_metric_name(desc.fq_name()).is_ok(),
                "{} is not a valid metric name",
                desc.fq_name()
            );
        }
    }

    #[test]
    fn test_counters_end_in_total_or_seconds() {
        let descriptors = Descriptors::new("rpi");

        for desc in descriptors.iter() {
            if desc.kind() == MetricKind::Counter {
                assert!(
                    desc.fq_name().ends_with("_total") || desc.fq_name().ends_with("_seconds"),
                    "{} is a counter without a conventional suffix",
                    desc.fq_name()
                );
            }
        }
    }
}
