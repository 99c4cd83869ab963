//! In-process segmentation metrics
//!
//! `MetricsSink` is the collaborator the orchestrator reports to.
//! `MetricsRegistry` keeps counters, timing samples and mask-ratio samples
//! behind a single mutex so that `snapshot` observes a consistent state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

// Use instant crate for cross-platform time compatibility
use instant::Instant;

/// Samples kept per timing series and for mask ratios
pub const MAX_SAMPLES: usize = 1000;

pub const REQUESTS_TOTAL: &str = "seg_requests_total";
pub const FALLBACK_TOTAL: &str = "seg_fallback_total";
const ENGINE_USED_PREFIX: &str = "seg_engine_used_total_";
const FAILED_PREFIX: &str = "seg_failed_total_";

/// Counter key for an engine usage
#[must_use]
pub fn engine_counter_key(engine: &str) -> String {
    format!("{ENGINE_USED_PREFIX}{engine}")
}

/// Counter key for a failure kind
#[must_use]
pub fn failure_counter_key(kind: &str) -> String {
    format!("{FAILED_PREFIX}{kind}")
}

/// Sink for pipeline metrics
pub trait MetricsSink: Send + Sync {
    fn increment_request_count(&self) {}

    fn increment_engine_count(&self, engine: &str);

    fn increment_fallback_count(&self);

    /// `kind` is a stable failure key such as `timeout`
    fn increment_failure_count(&self, kind: &str);

    fn record_timing(&self, stage: &str, duration_ms: u64);

    fn record_mask_ratio(&self, ratio: f64);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsSink for NoOpMetrics {
    fn increment_engine_count(&self, _engine: &str) {}
    fn increment_fallback_count(&self) {}
    fn increment_failure_count(&self, _kind: &str) {}
    fn record_timing(&self, _stage: &str, _duration_ms: u64) {}
    fn record_mask_ratio(&self, _ratio: f64) {}
}

/// Summary statistics over a sample series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}

impl SampleStats {
    /// `None` for an empty series
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        Some(Self {
            count,
            mean: sorted.iter().sum::<f64>() / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
        })
    }
}

/// Linear-interpolated percentile of sorted data (0 for empty input)
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = (sorted.len() - 1) as f64 * pct / 100.0;
    let f = k as usize;
    let c = k - f as f64;
    match sorted.get(f + 1) {
        Some(next) => sorted[f] + c * (next - sorted[f]),
        None => sorted[f],
    }
}

/// Consistent copy of the registry state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: f64,
    pub counters: BTreeMap<String, u64>,
    pub timing_stats: BTreeMap<String, SampleStats>,
    pub mask_ratio_stats: Option<SampleStats>,
}

impl MetricsSnapshot {
    /// Counter value, 0 when never incremented
    #[must_use]
    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn engine_count(&self, engine: &str) -> u64 {
        self.counter(&engine_counter_key(engine))
    }

    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.counter(FALLBACK_TOTAL)
    }

    #[must_use]
    pub fn failure_count(&self, kind: &str) -> u64 {
        self.counter(&failure_counter_key(kind))
    }

    /// Statistics for a stage, keyed as `<stage>_duration_ms`
    #[must_use]
    pub fn timing(&self, stage: &str) -> Option<&SampleStats> {
        self.timing_stats.get(&format!("{stage}_duration_ms"))
    }
}

#[derive(Debug)]
struct MetricsState {
    counters: HashMap<String, u64>,
    timings: HashMap<String, VecDeque<f64>>,
    mask_ratios: VecDeque<f64>,
    started_at: Instant,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            counters: HashMap::new(),
            timings: HashMap::new(),
            mask_ratios: VecDeque::new(),
            started_at: Instant::now(),
        }
    }

    fn bump(&mut self, key: String) {
        *self.counters.entry(key).or_insert(0) += 1;
    }
}

fn push_bounded(series: &mut VecDeque<f64>, value: f64) {
    if series.len() == MAX_SAMPLES {
        series.pop_front();
    }
    series.push_back(value);
}

/// Mutex-guarded metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    state: Mutex<MetricsState>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MetricsState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Copy all counters and statistics under the lock
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.with_state(|state| {
            let counters = state
                .counters
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            let timing_stats = state
                .timings
                .iter()
                .filter_map(|(k, samples)| {
                    let samples: Vec<f64> = samples.iter().copied().collect();
                    SampleStats::from_samples(&samples).map(|s| (k.clone(), s))
                })
                .collect();
            let ratios: Vec<f64> = state.mask_ratios.iter().copied().collect();
            MetricsSnapshot {
                uptime_seconds: state.started_at.elapsed().as_secs_f64(),
                counters,
                timing_stats,
                mask_ratio_stats: SampleStats::from_samples(&ratios),
            }
        })
    }

    /// Clear everything and restart the uptime clock
    pub fn reset(&self) {
        self.with_state(|state| *state = MetricsState::new());
    }
}

impl MetricsSink for MetricsRegistry {
    fn increment_request_count(&self) {
        self.with_state(|state| state.bump(REQUESTS_TOTAL.to_string()));
    }

    fn increment_engine_count(&self, engine: &str) {
        self.with_state(|state| state.bump(engine_counter_key(engine)));
    }

    fn increment_fallback_count(&self) {
        self.with_state(|state| state.bump(FALLBACK_TOTAL.to_string()));
    }

    fn increment_failure_count(&self, kind: &str) {
        self.with_state(|state| state.bump(failure_counter_key(kind)));
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_timing(&self, stage: &str, duration_ms: u64) {
        self.with_state(|state| {
            let series = state
                .timings
                .entry(format!("{stage}_duration_ms"))
                .or_default();
            push_bounded(series, duration_ms as f64);
        });
    }

    fn record_mask_ratio(&self, ratio: f64) {
        self.with_state(|state| push_bounded(&mut state.mask_ratios, ratio));
    }
}
