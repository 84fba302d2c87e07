//! Scrape collector: runs both sources, decodes their output and emits the
//! resulting metric set.
//!
//! A scrape walks through fixed stages:
//!
//! ```text
//! Start → FetchHardware → DecodeHardware → FetchCache → DecodeCache → Emit → Done
//! ```
//!
//! Every stage runs even when an earlier one failed. A failure only
//! downgrades the liveness of the source it belongs to, so one broken input
//! never removes metrics from the other.

use std::sync::Arc;

use rpi_exporter_common::ConstMetric;
use tracing::{debug, error, trace, warn};

use crate::config::{CollectorConfig, ExporterConfig};
use crate::decode::{DecodedFact, FactValue, bitmask, stats};
use crate::descriptors::{Descriptors, HARDWARE_UP, MEMCACHED_UP};
use crate::emit::{MetricSink, emit_fact};
use crate::source::{CacheClient, HardwareSource, MemcachedClient, TokioCommandRunner};

/// Whether a source was reached and decoded during one scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Up,
    Down,
}

impl Liveness {
    /// Mark the source as failed for the rest of the scrape.
    pub fn degrade(&mut self) {
        *self = Liveness::Down;
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Liveness::Up)
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Liveness::Up => 1.0,
            Liveness::Down => 0.0,
        }
    }
}

/// Stages of one scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    Start,
    FetchHardware,
    DecodeHardware,
    FetchCache,
    DecodeCache,
    Emit,
    Done,
}

/// Scrape-local state. Allocated fresh for every scrape.
struct ScrapeState {
    stage: ScrapeStage,
    hardware: Liveness,
    cache: Liveness,
    facts: Vec<DecodedFact>,
}

impl ScrapeState {
    fn new() -> Self {
        Self {
            stage: ScrapeStage::Start,
            hardware: Liveness::Up,
            cache: Liveness::Up,
            facts: Vec::new(),
        }
    }

    fn advance(&mut self, next: ScrapeStage) {
        trace!(from = ?self.stage, to = ?next, "Scrape stage");
        self.stage = next;
    }
}

/// The metric set produced by one scrape.
#[derive(Debug, Clone)]
pub struct Scrape {
    /// Emitted metrics, in emission order.
    pub metrics: Vec<ConstMetric>,
    /// Hardware source liveness, `None` when the source is disabled.
    pub hardware: Option<Liveness>,
    /// Cache source liveness, `None` when the source is disabled.
    pub cache: Option<Liveness>,
}

impl Scrape {
    /// Find the first metric with the given fully-qualified name.
    pub fn get(&self, fq_name: &str) -> Option<&ConstMetric> {
        self.metrics
            .iter()
            .find(|m| m.descriptor().fq_name() == fq_name)
    }

    /// Value of the first metric with the given fully-qualified name.
    pub fn value(&self, fq_name: &str) -> Option<f64> {
        self.get(fq_name).map(|m| m.value())
    }
}

/// Include/exclude filter on fully-qualified metric names.
pub struct MetricFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
}

impl MetricFilter {
    /// Create a new filter from configuration. Invalid patterns are ignored.
    pub fn new(config: &CollectorConfig) -> Self {
        let include_metrics = config
            .include_metrics
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        let exclude_metrics = config
            .exclude_metrics
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        Self {
            include_metrics,
            exclude_metrics,
        }
    }

    /// Check if a metric should be exported.
    pub fn should_include(&self, fq_name: &str) -> bool {
        if !self.include_metrics.is_empty()
            && !self.include_metrics.iter().any(|p| p.matches(fq_name))
        {
            return false;
        }

        !self.exclude_metrics.iter().any(|p| p.matches(fq_name))
    }
}

/// Stateless collector. Safe to share between concurrent scrapes.
pub struct ScrapeCollector {
    descriptors: Arc<Descriptors>,
    hardware: Option<HardwareSource>,
    cache: Option<Arc<dyn CacheClient>>,
    time_metric: bool,
    filter: MetricFilter,
}

impl ScrapeCollector {
    /// Create a collector with no sources attached.
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            descriptors: Arc::new(Descriptors::new(&config.namespace)),
            hardware: None,
            cache: None,
            time_metric: config.time_metric,
            filter: MetricFilter::new(config),
        }
    }

    /// Build a collector with the production sources enabled in `config`.
    pub fn from_config(config: &ExporterConfig) -> Self {
        let mut collector = Self::new(&config.collector);

        if config.hardware.enabled {
            collector = collector.with_hardware(HardwareSource::from_config(
                Arc::new(TokioCommandRunner),
                &config.hardware,
            ));
        }

        if config.memcached.enabled {
            collector =
                collector.with_cache(Arc::new(MemcachedClient::from_config(&config.memcached)));
        }

        collector
    }

    /// Attach the hardware status source.
    pub fn with_hardware(mut self, source: HardwareSource) -> Self {
        self.hardware = Some(source);
        self
    }

    /// Attach the cache status source.
    pub fn with_cache(mut self, client: Arc<dyn CacheClient>) -> Self {
        self.cache = Some(client);
        self
    }

    pub fn descriptors(&self) -> &Arc<Descriptors> {
        &self.descriptors
    }

    /// Run one scrape.
    ///
    /// Never fails: source errors are logged and reported through the
    /// liveness metrics.
    pub async fn scrape(&self) -> Scrape {
        let mut state = ScrapeState::new();

        if let Some(source) = &self.hardware {
            self.collect_hardware(source, &mut state).await;
        }

        if let Some(client) = &self.cache {
            self.collect_cache(client.as_ref(), &mut state).await;
        }

        state.advance(ScrapeStage::Emit);
        let scrape = self.emit(&mut state);
        state.advance(ScrapeStage::Done);

        debug!(
            metrics = scrape.metrics.len(),
            hardware_up = ?scrape.hardware.map(|l| l.is_up()),
            memcached_up = ?scrape.cache.map(|l| l.is_up()),
            "Scrape complete"
        );

        scrape
    }

    async fn collect_hardware(&self, source: &HardwareSource, state: &mut ScrapeState) {
        state.advance(ScrapeStage::FetchHardware);
        let raw = match source.fetch().await {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(
                    source = "hardware",
                    error = %e,
                    partial_output = e.partial_output().is_some(),
                    "Failed to fetch throttled status"
                );
                state.hardware.degrade();
                e.into_partial_output()
            }
        };

        state.advance(ScrapeStage::DecodeHardware);
        let Some(raw) = raw.filter(|r| !r.is_empty()) else {
            debug!(source = "hardware", "No output to decode");
            state.hardware.degrade();
            return;
        };

        match bitmask::decode(&raw) {
            Ok(facts) => state.facts.extend(facts),
            Err(e) => {
                warn!(source = "hardware", error = %e, "Failed to decode throttled status");
                state.hardware.degrade();
            }
        }
    }

    async fn collect_cache(&self, client: &dyn CacheClient, state: &mut ScrapeState) {
        state.advance(ScrapeStage::FetchCache);
        let stats_reply = match client.fetch_stats().await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(source = "memcached", error = %e, "Failed to collect stats from memcached");
                state.cache.degrade();
                None
            }
        };
        let settings_reply = match client.fetch_stats_settings().await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(source = "memcached", error = %e, "Could not query stats settings");
                state.cache.degrade();
                None
            }
        };

        state.advance(ScrapeStage::DecodeCache);
        let decoded = stats_reply
            .map(|reply| stats::decode_stats(&reply, self.time_metric))
            .into_iter()
            .chain(settings_reply.map(|reply| stats::decode_settings(&reply)));

        for decoded in decoded {
            if let Some(partial) = &decoded.partial {
                warn!(source = "memcached", error = %partial, "Partially decoded statistics");
                state.cache.degrade();
            }
            state.facts.extend(decoded.facts);
        }
    }

    fn emit(&self, state: &mut ScrapeState) -> Scrape {
        let mut sink = MetricSink::new();

        for fact in state.facts.drain(..) {
            let included = self
                .descriptors
                .get(fact.metric)
                .is_none_or(|d| self.filter.should_include(d.fq_name()));
            if !included {
                trace!(metric = fact.metric, "Metric filtered out");
                continue;
            }

            let metric = fact.metric;
            if let Err(e) = emit_fact(&mut sink, &self.descriptors, fact) {
                error!(metric, error = %e, "Failed to emit metric");
            }
        }

        let hardware = self.hardware.as_ref().map(|_| state.hardware);
        let cache = self.cache.as_ref().map(|_| state.cache);

        for (spec, liveness) in [(HARDWARE_UP, hardware), (MEMCACHED_UP, cache)] {
            let Some(liveness) = liveness else {
                continue;
            };
            let fact = DecodedFact::new(spec.name, spec.kind, FactValue::Float(liveness.as_f64()));
            if let Err(e) = emit_fact(&mut sink, &self.descriptors, fact) {
                error!(metric = spec.name, error = %e, "Failed to emit liveness metric");
            }
        }

        Scrape {
            metrics: sink.into_metrics(),
            hardware,
            cache,
        }
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<ScrapeCollector>;
