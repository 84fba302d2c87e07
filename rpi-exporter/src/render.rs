//! Prometheus text exposition format (version 0.0.4).

use std::collections::BTreeMap;
use std::fmt::Write;

use rpi_exporter_common::{ConstMetric, MetricDescriptor};

/// Content type of [`render_text`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render metrics in Prometheus exposition format.
///
/// Metric families are sorted by name; series keep their emission order.
pub fn render_text(metrics: &[ConstMetric]) -> String {
    let mut output = String::with_capacity(metrics.len() * 100);

    // Group metrics by name for TYPE/HELP comments
    let mut by_name: BTreeMap<&str, (&MetricDescriptor, Vec<&ConstMetric>)> = BTreeMap::new();
    for metric in metrics {
        let descriptor = metric.descriptor();
        by_name
            .entry(descriptor.fq_name())
            .or_insert_with(|| (descriptor, Vec::new()))
            .1
            .push(metric);
    }

    for (name, (descriptor, series)) in by_name {
        writeln!(output, "# HELP {} {}", name, escape_help(descriptor.help())).ok();
        writeln!(output, "# TYPE {} {}", name, descriptor.kind().as_str()).ok();

        for metric in series {
            writeln!(
                output,
                "{}{} {}",
                name,
                format_labels(metric),
                format_value(metric.value())
            )
            .ok();
        }
    }

    output
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape HELP text. Quotes are allowed there.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(metric: &ConstMetric) -> String {
    let parts: Vec<String> = metric
        .labels()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    format!("{{{}}}", parts.join(","))
}
