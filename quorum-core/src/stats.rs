use crate::{OperationSample, StatsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Summary over one set of operation samples, modeled or observed.
///
/// Latencies are in milliseconds. Never updated in place; build a new one from the full sample
/// set instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub count: usize,
    pub success_count: usize,
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub throughput_ops_per_sec: f64,
}

impl AggregateResult {
    /// Aggregate live samples collected over `wall_clock`.
    ///
    /// Percentiles cover every sample, failed ones included. Throughput is what was actually
    /// observed: see [`observed_throughput`].
    pub fn from_samples(
        samples: &[OperationSample],
        wall_clock: Duration,
    ) -> Result<Self, StatsError> {
        let success_count = samples.iter().filter(|s| s.success).count();
        let latencies: Vec<f64> = samples.iter().map(OperationSample::latency_ms).collect();
        let throughput = observed_throughput(samples.len(), wall_clock);
        Self::build(latencies, success_count, throughput)
    }

    /// Aggregate a modeled latency array, where every trial counts as a success.
    pub fn from_latencies(latencies_ms: &[f64], throughput: f64) -> Result<Self, StatsError> {
        Self::build(latencies_ms.to_vec(), latencies_ms.len(), throughput)
    }

    fn build(
        mut latencies: Vec<f64>,
        success_count: usize,
        throughput_ops_per_sec: f64,
    ) -> Result<Self, StatsError> {
        if latencies.is_empty() {
            return Err(StatsError::Empty);
        }
        latencies.sort_by(f64::total_cmp);

        let count = latencies.len();
        Ok(Self {
            count,
            success_count,
            success_rate: success_count as f64 / count as f64,
            mean_latency_ms: statistical::mean(&latencies),
            min_latency_ms: latencies[0],
            max_latency_ms: latencies[count - 1],
            p50: percentile(&latencies, 50.),
            p90: percentile(&latencies, 90.),
            p95: percentile(&latencies, 95.),
            p99: percentile(&latencies, 99.),
            throughput_ops_per_sec,
        })
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ops={}, success={:.2}%, mean={:.2}ms, min={:.2}ms, max={:.2}ms, p50={:.2}ms, p90={:.2}ms, p95={:.2}ms, p99={:.2}ms, throughput={:.2}ops/s",
            self.count,
            self.success_rate * 100.,
            self.mean_latency_ms,
            self.min_latency_ms,
            self.max_latency_ms,
            self.p50,
            self.p90,
            self.p95,
            self.p99,
            self.throughput_ops_per_sec,
        )
    }
}

/// Percentile of an ascending slice, interpolating linearly between the two closest ranks.
///
/// NOTE: Panics on an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.).clamp(0., 1.) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Throughput of a model run: `assumed_concurrency` operations, each taking `mean_latency_ms`,
/// kept in flight at all times.
pub fn modeled_throughput(mean_latency_ms: f64, assumed_concurrency: f64) -> f64 {
    1000. / mean_latency_ms * assumed_concurrency
}

/// Throughput of a live phase: operations completed per second of real elapsed time.
pub fn observed_throughput(count: usize, wall_clock: Duration) -> f64 {
    let secs = wall_clock.as_secs_f64();
    if secs > 0. {
        count as f64 / secs
    } else {
        0.
    }
}
