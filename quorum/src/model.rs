//! Stochastic quorum latency model
//!
//! An operation fans out to N replicas and completes once k of them have acknowledged, so its
//! latency is the k-th order statistic of the N replica delays. A failed replica is not removed
//! from the race: the coordinator cannot tell it apart from a slow one until the timeout fires,
//! so its delay becomes the timeout and it still occupies a rank.
use quorum_core::{ConfigurationError, ModelParams, OpKind, SweepConfiguration};
use rand::Rng;
use rand_distr::{Distribution, Normal};
#[allow(unused_imports)]
use tracing::{debug, trace};

#[derive(Clone, Debug, Default)]
pub struct LatencyModel {
    params: ModelParams,
}

impl LatencyModel {
    pub fn new(params: ModelParams) -> Result<Self, ConfigurationError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Mean latency in milliseconds over `num_trials` simulated operations.
    pub fn simulate_latency<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        config: &SweepConfiguration,
        num_trials: usize,
    ) -> Result<f64, ConfigurationError> {
        let latencies = self.sample_latencies(rng, config, num_trials)?;
        Ok(statistical::mean(&latencies))
    }

    /// Latency in milliseconds of each of `num_trials` simulated operations.
    pub fn sample_latencies<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        config: &SweepConfiguration,
        num_trials: usize,
    ) -> Result<Vec<f64>, ConfigurationError> {
        config.validate()?;
        if num_trials == 0 {
            return Err(ConfigurationError::NoTrials);
        }

        let mut trial = Trial::new(&self.params, config)?;
        debug!(
            "Simulating {num_trials} trials of {config} (fan-out {:.3}ms)",
            trial.fanout_ms
        );

        let latencies = (0..num_trials).map(|_| trial.run(rng)).collect();
        Ok(latencies)
    }
}

/// Everything a single trial needs, resolved once per configuration.
struct Trial<'a> {
    params: &'a ModelParams,
    config: &'a SweepConfiguration,
    network: Normal<f64>,
    disk: Normal<f64>,
    fanout_ms: f64,
    reconciliation_ms: f64,
    repair_ms: f64,
    delays: Vec<f64>,
}

impl<'a> Trial<'a> {
    fn new(
        params: &'a ModelParams,
        config: &'a SweepConfiguration,
    ) -> Result<Self, ConfigurationError> {
        let network = normal(
            "network_std_ms",
            config.network_mean_ms,
            params.network_std_ms,
        )?;
        let (disk_mean, disk_std) = params.disk(config.op_kind);
        let disk = normal("disk_std_ms", disk_mean, disk_std)?;

        let n = config.replica_count;
        let k = config.quorum_size;
        let reconciliation_ms = match config.op_kind {
            OpKind::Read if k > 1 => (k - 1) as f64 * params.read_reconciliation_ms,
            _ => 0.,
        };

        Ok(Self {
            params,
            config,
            network,
            disk,
            fanout_ms: n as f64 * params.fanout_cost_per_node_ms,
            reconciliation_ms,
            // Round trip to the stale replica plus its disk write.
            repair_ms: config.network_mean_ms + params.write_disk_mean_ms,
            delays: Vec::with_capacity(n),
        })
    }

    /// NOTE: The number of draws taken from `rng` must not depend on the quorum size, so that a
    /// fixed seed gives every quorum size identical replica delays.
    fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        let params = self.params;
        let config = self.config;

        self.delays.clear();
        for _ in 0..config.replica_count {
            let network = self.network.sample(rng).max(params.min_network_ms);
            let disk = self.disk.sample(rng).max(params.min_disk_ms);
            self.delays.push(network + disk);
        }

        if config.node_failure_rate > 0. {
            for delay in self.delays.iter_mut() {
                if rng.gen::<f64>() < config.node_failure_rate {
                    *delay = params.timeout_ms;
                }
            }
        }

        let mut latency = kth_fastest(&mut self.delays, config.quorum_size);
        latency += self.fanout_ms;
        latency += self.reconciliation_ms;

        if config.coord_failure_rate > 0. && rng.gen::<f64>() < config.coord_failure_rate {
            latency += params.client_retry_delay_ms;
        }

        if config.op_kind == OpKind::Read
            && config.node_failure_rate > 0.
            && rng.gen::<f64>() < config.node_failure_rate
        {
            latency += self.repair_ms;
        }

        trace!("Trial latency {latency:.3}ms");
        latency
    }
}

/// Delay of the `k`-th fastest replica, i.e. when the `k`-th acknowledgement arrives.
///
/// Reorders `delays`. Panics unless `1 <= k <= delays.len()`.
pub fn kth_fastest(delays: &mut [f64], k: usize) -> f64 {
    let (_, kth, _) = delays.select_nth_unstable_by(k - 1, f64::total_cmp);
    *kth
}

fn normal(name: &'static str, mean: f64, std: f64) -> Result<Normal<f64>, ConfigurationError> {
    Normal::new(mean, std).map_err(|_| ConfigurationError::InvalidParameter { name, value: std })
}
