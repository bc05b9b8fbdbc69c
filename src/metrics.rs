//! Per-request IDs and latency histograms for each pipeline stage.
//! Histograms keep the last N samples and report p50/p95/p99.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Identifier attached to every translation request and its persist job.
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
}

impl RequestIds {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn new(name: &'static str, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity ring buffer for histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

/// Stores histograms for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(ring_capacity: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            ring_capacity: ring_capacity.max(1),
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us = value_us, "metric_recorded");
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan::new(name, Arc::clone(self))
    }

    /// Number of samples recorded for `name` (capped at ring capacity).
    pub fn count(&self, name: &str) -> usize {
        self.histograms.lock().get(name).map(|r| r.count).unwrap_or(0)
    }

    /// Get percentile for a metric (p value 0-100). Returns microseconds.
    #[cfg(test)]
    pub(crate) fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    /// Summary of all metrics at p50/p95/p99.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        hists
            .iter()
            .map(|(&name, ring)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_us: ring.percentile(50.0),
                        p95_us: ring.percentile(95.0),
                        p99_us: ring.percentile(99.0),
                        count: ring.count,
                    },
                )
            })
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

/// Well-known metric names.
pub mod metric_names {
    pub const RESOLVE: &str = "t_resolve";
    pub const CACHE_LOOKUP: &str = "t_cache_lookup";
    pub const GENERATE: &str = "t_generate";
    pub const PERSIST: &str = "t_persist";
    pub const RESPOND_IDENTITY: &str = "t_respond_identity";
    pub const RESPOND_CACHE_HIT: &str = "t_respond_cache_hit";
    pub const RESPOND_GENERATED: &str = "t_respond_generated";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_recorded_samples() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record(metric_names::GENERATE, v as f64);
        }
        assert_eq!(registry.count(metric_names::GENERATE), 100);
        assert_eq!(registry.percentile(metric_names::GENERATE, 50.0), 51.0);
        assert_eq!(registry.percentile(metric_names::GENERATE, 99.0), 99.0);
        assert_eq!(registry.percentile("t_unknown", 50.0), 0.0);
    }

    #[test]
    fn ring_keeps_only_latest_samples() {
        let registry = MetricsRegistry::with_capacity(4);
        for v in [1.0, 2.0, 3.0, 4.0, 100.0, 100.0, 100.0, 100.0] {
            registry.record(metric_names::PERSIST, v);
        }
        let summary = registry.summary();
        let persist = &summary[metric_names::PERSIST];
        assert_eq!(persist.count, 4);
        assert_eq!(persist.p50_us, 100.0);
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestIds::new().request_id, RequestIds::new().request_id);
    }
}
