//! Decoder for memcached `stats` and `stats settings` replies.
//!
//! Missing keys are skipped silently. A key that is present but cannot be
//! converted is logged and recorded in a [`PartialDecodeError`]; the remaining
//! keys are still decoded.

use std::collections::HashMap;

use rpi_exporter_common::MetricKind;
use tracing::warn;

use super::{DecodedFact, FactValue, MetricSpec};
use crate::error::{PartialDecodeError, SkippedStat};

use MetricKind::{Counter, Gauge};
use StatType::{Bool, Float, Int};

/// Flat statistic name to value mapping, as returned by the cache server.
pub type StatsMap = HashMap<String, String>;

/// Expected type of a statistic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatType {
    Int,
    Float,
    Bool,
}

impl StatType {
    fn as_str(&self) -> &'static str {
        match self {
            StatType::Int => "integer",
            StatType::Float => "float",
            StatType::Bool => "boolean",
        }
    }

    /// Convert a raw value. Returns `None` when the value does not parse.
    pub fn parse(&self, raw: &str) -> Option<FactValue> {
        let raw = raw.trim();
        match self {
            StatType::Int => raw.parse::<u64>().ok().map(FactValue::Int),
            StatType::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FactValue::Float),
            StatType::Bool => parse_bool(raw).map(FactValue::Bool),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "on" | "true" => Some(true),
        "0" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

/// A statistic the exporter knows how to decode.
#[derive(Debug, Clone, Copy)]
pub struct StatSpec {
    /// Key in the server reply.
    pub key: &'static str,
    pub metric: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub ty: StatType,
    pub label_names: &'static [&'static str],
    /// Label value distinguishing series that share one metric.
    pub label_value: Option<&'static str>,
}

const fn stat(
    key: &'static str,
    metric: &'static str,
    help: &'static str,
    kind: MetricKind,
    ty: StatType,
) -> StatSpec {
    StatSpec {
        key,
        metric,
        help,
        kind,
        ty,
        label_names: &[],
        label_value: None,
    }
}

const fn command(key: &'static str, command: &'static str) -> StatSpec {
    StatSpec {
        key,
        metric: "memcached_commands_total",
        help: "Total number of commands processed, by command",
        kind: MetricKind::Counter,
        ty: StatType::Int,
        label_names: &["command"],
        label_value: Some(command),
    }
}

/// Statistics decoded from the `stats` reply.
#[rustfmt::skip]
pub const STATS: &[StatSpec] = &[
    stat("uptime", "memcached_uptime_seconds", "Number of seconds since the server started", Counter, Int),
    stat("curr_connections", "memcached_current_connections", "Current number of open connections", Gauge, Int),
    stat("total_connections", "memcached_connections_total", "Total number of connections opened since the server started", Counter, Int),
    stat("rejected_connections", "memcached_connections_rejected_total", "Total number of connections rejected because of the connection limit", Counter, Int),
    stat("accepting_conns", "memcached_accepting_connections", "Whether the server is currently accepting connections", Gauge, Bool),
    stat("threads", "memcached_threads", "Number of worker threads", Gauge, Int),
    stat("curr_items", "memcached_current_items", "Current number of items stored", Gauge, Int),
    stat("total_items", "memcached_items_total", "Total number of items stored since the server started", Counter, Int),
    stat("evictions", "memcached_items_evicted_total", "Total number of valid items removed to free memory", Counter, Int),
    stat("reclaimed", "memcached_items_reclaimed_total", "Total number of times an entry was stored using memory from an expired entry", Counter, Int),
    stat("bytes", "memcached_current_bytes", "Current number of bytes used to store items", Gauge, Int),
    stat("limit_maxbytes", "memcached_limit_bytes", "Number of bytes the server is allowed to use for storage", Gauge, Int),
    stat("bytes_read", "memcached_read_bytes_total", "Total number of bytes read by the server from the network", Counter, Int),
    stat("bytes_written", "memcached_written_bytes_total", "Total number of bytes written by the server to the network", Counter, Int),
    stat("get_hits", "memcached_get_hits_total", "Total number of get requests that found an item", Counter, Int),
    stat("get_misses", "memcached_get_misses_total", "Total number of get requests that missed", Counter, Int),
    stat("rusage_user", "memcached_process_user_cpu_seconds_total", "Accumulated user time for this process", Counter, Float),
    stat("rusage_system", "memcached_process_system_cpu_seconds_total", "Accumulated system time for this process", Counter, Float),
    command("cmd_get", "get"),
    command("cmd_set", "set"),
    command("cmd_flush", "flush"),
    command("cmd_touch", "touch"),
];

/// Statistics decoded from the `stats settings` reply.
#[rustfmt::skip]
pub const SETTINGS: &[StatSpec] = &[
    stat("maxconns", "memcached_max_connections", "Maximum number of simultaneous connections", Gauge, Int),
    stat("item_size_max", "memcached_max_item_size_bytes", "Maximum size of a stored item", Gauge, Int),
    stat("evictions", "memcached_evictions_enabled", "Whether memory is reclaimed by evicting items when full", Gauge, Bool),
    stat("lru_crawler", "memcached_lru_crawler_enabled", "Whether the LRU crawler is enabled", Gauge, Bool),
];

/// Server clock, emitted only when the time metric is enabled.
pub static TIME: StatSpec = stat(
    "time",
    "time_seconds",
    "Current UNIX time according to the server",
    Gauge,
    Int,
);

/// Server version, exported as a constant `1` labelled with the version string.
pub const VERSION: MetricSpec = MetricSpec {
    name: "memcached_version",
    help: "The version of the memcached server",
    kind: Gauge,
    label_names: &["version"],
};

/// Every metric this decoder can produce, deduplicated by name.
pub fn metric_specs() -> Vec<MetricSpec> {
    let mut specs: Vec<MetricSpec> = Vec::new();

    for stat in STATS.iter().chain(SETTINGS).chain(std::iter::once(&TIME)) {
        if specs.iter().any(|s| s.name == stat.metric) {
            continue;
        }
        specs.push(MetricSpec {
            name: stat.metric,
            help: stat.help,
            kind: stat.kind,
            label_names: stat.label_names,
        });
    }

    specs.push(VERSION);
    specs
}

/// Result of decoding one statistics mapping.
#[derive(Debug, Clone, Default)]
pub struct StatsDecode {
    pub facts: Vec<DecodedFact>,
    pub partial: Option<PartialDecodeError>,
}

/// Decode the `stats` reply.
///
/// The `time` statistic is only looked at when `with_time` is set.
pub fn decode_stats(stats: &StatsMap, with_time: bool) -> StatsDecode {
    let time = with_time.then_some(&TIME);
    let mut decoded = decode_table(stats, STATS.iter().chain(time));

    if let Some(version) = stats.get("version") {
        let version = version.trim();
        if version.is_empty() {
            record_skip(&mut decoded, "version", version, "version string");
        } else {
            decoded.facts.push(
                DecodedFact::new(VERSION.name, VERSION.kind, FactValue::Int(1))
                    .with_label_value(version),
            );
        }
    }

    decoded
}

/// Decode the `stats settings` reply.
pub fn decode_settings(settings: &StatsMap) -> StatsDecode {
    decode_table(settings, SETTINGS.iter())
}

fn decode_table<'a>(
    stats: &StatsMap,
    table: impl Iterator<Item = &'a StatSpec>,
) -> StatsDecode {
    let mut decoded = StatsDecode::default();

    for spec in table {
        let Some(raw) = stats.get(spec.key) else {
            continue;
        };

        match spec.ty.parse(raw) {
            Some(value) => {
                let mut fact = DecodedFact::new(spec.metric, spec.kind, value);
                if let Some(label_value) = spec.label_value {
                    fact = fact.with_label_value(label_value);
                }
                decoded.facts.push(fact);
            }
            None => record_skip(&mut decoded, spec.key, raw, spec.ty.as_str()),
        }
    }

    decoded
}

fn record_skip(decoded: &mut StatsDecode, key: &str, value: &str, expected: &'static str) {
    warn!(
        source = "memcached",
        key,
        value,
        expected,
        "Skipping statistic that could not be decoded"
    );

    decoded
        .partial
        .get_or_insert_with(|| PartialDecodeError {
            skipped: Vec::new(),
        })
        .skipped
        .push(SkippedStat {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        });
}
