use std::time::Duration;

/// Mean one-way network latency used when a sweep does not override it.
pub const DEFAULT_NETWORK_MEAN_MS: f64 = 20.0;

/// Parallel in-flight operations assumed when turning a modeled latency into throughput.
///
/// This is a modeling knob, not a derived quantity. Absolute throughput numbers scale linearly
/// with it.
pub const DEFAULT_ASSUMED_CONCURRENCY: f64 = 100.0;

/// Per-request timeout for correctness-oriented benchmark runs.
pub const BENCHMARK_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request timeout for high-throughput scale runs.
pub const SCALE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for the `/admin/cluster` health precheck.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_KEY_LEN: usize = 10;
pub const DEFAULT_VALUE_LEN: usize = 100;

/// Largest replica count for which the preset sweeps model every quorum size.
pub const EXHAUSTIVE_QUORUM_LIMIT: usize = 5;

/// Majority quorum for `n` replicas.
pub const fn majority(n: usize) -> usize {
    n / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_quorum() {
        assert_eq!(majority(1), 1);
        assert_eq!(majority(2), 2);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(4), 3);
        assert_eq!(majority(1000), 501);
    }
}
