//! Parameter sweeps over the latency model
use crate::model::LatencyModel;
use quorum_core::{
    majority, modeled_throughput, AggregateResult, ConfigurationError, OpKind,
    SweepConfiguration, DEFAULT_ASSUMED_CONCURRENCY, DEFAULT_NETWORK_MEAN_MS,
    EXHAUSTIVE_QUORUM_LIMIT,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

const DEFAULT_TRIALS: usize = 2_000;

/// Which quorum sizes to model for a given replica count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumSelection {
    /// Every quorum size from 1 to N.
    All,
    /// Weak (1), majority and strong (N).
    Standard,
    /// 1, a quarter, majority, three quarters and N.
    Spread,
    /// Exactly these quorum sizes.
    Fixed(Vec<usize>),
}

impl QuorumSelection {
    /// Ascending, deduplicated quorum sizes for `n` replicas.
    pub fn quorums(&self, n: usize) -> Result<Vec<usize>, ConfigurationError> {
        let mut quorums = match self {
            QuorumSelection::All => (1..=n).collect(),
            QuorumSelection::Standard => vec![1, majority(n), n],
            QuorumSelection::Spread => {
                vec![1, n / 4, majority(n), n * 3 / 4, n]
            }
            QuorumSelection::Fixed(quorums) => {
                if let Some(&quorum) = quorums.iter().find(|&&k| k == 0 || k > n) {
                    return Err(ConfigurationError::QuorumOutOfRange {
                        quorum,
                        replicas: n,
                    });
                }
                quorums.clone()
            }
        };

        quorums.retain(|&k| k >= 1 && k <= n);
        quorums.sort_unstable();
        quorums.dedup();
        Ok(quorums)
    }
}

/// One evaluated grid cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepCell {
    pub config: SweepConfiguration,
    pub result: AggregateResult,
}

impl SweepCell {
    pub fn label(&self) -> String {
        self.config.label()
    }

    /// Seconds needed to push `num_keys` operations through at the modeled throughput.
    pub fn estimated_completion_secs(&self, num_keys: u64) -> f64 {
        num_keys as f64 / self.result.throughput_ops_per_sec
    }
}

/// A grid of model configurations.
///
/// Cells are produced in axis order: replica count, then operation kind, then quorum size, then
/// node failure rate, then coordinator failure rate. Value order within each axis is kept as
/// given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub replica_counts: Vec<usize>,
    pub op_kinds: Vec<OpKind>,
    pub quorums: QuorumSelection,
    pub node_failure_rates: Vec<f64>,
    pub coord_failure_rates: Vec<f64>,
    pub network_mean_ms: f64,
    pub trials: usize,
    pub assumed_concurrency: f64,
}

impl SweepPlan {
    pub fn new(replica_counts: &[usize], op_kind: OpKind) -> Self {
        Self {
            replica_counts: replica_counts.to_vec(),
            op_kinds: vec![op_kind],
            quorums: QuorumSelection::All,
            node_failure_rates: vec![0.],
            coord_failure_rates: vec![0.],
            network_mean_ms: DEFAULT_NETWORK_MEAN_MS,
            trials: DEFAULT_TRIALS,
            assumed_concurrency: DEFAULT_ASSUMED_CONCURRENCY,
        }
    }

    /// Every quorum size for small replica sets, then weak/majority/strong for large ones, with
    /// no failures injected.
    pub fn million_keys(op_kind: OpKind) -> Vec<Self> {
        let small: Vec<usize> = (1..=EXHAUSTIVE_QUORUM_LIMIT).collect();
        vec![
            Self::new(&small, op_kind).trials(10_000),
            Self::new(&[10, 20, 50, 100, 200, 500, 1000], op_kind)
                .quorums(QuorumSelection::Standard)
                .trials(10_000),
        ]
    }

    /// Spread of quorum sizes for `n` replicas under increasing node failure rates.
    pub fn failure_impact(n: usize, op_kind: OpKind) -> Self {
        Self::new(&[n], op_kind)
            .quorums(QuorumSelection::Spread)
            .node_failure_rates(&[0., 0.05, 0.10, 0.20])
            .coord_failure_rates(&[0.01])
            .trials(2_000)
    }

    pub fn op_kinds(mut self, op_kinds: &[OpKind]) -> Self {
        self.op_kinds = op_kinds.to_vec();
        self
    }

    pub fn quorums(mut self, quorums: QuorumSelection) -> Self {
        self.quorums = quorums;
        self
    }

    pub fn node_failure_rates(mut self, rates: &[f64]) -> Self {
        self.node_failure_rates = rates.to_vec();
        self
    }

    pub fn coord_failure_rates(mut self, rates: &[f64]) -> Self {
        self.coord_failure_rates = rates.to_vec();
        self
    }

    pub fn network_mean_ms(mut self, mean_ms: f64) -> Self {
        self.network_mean_ms = mean_ms;
        self
    }

    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn assumed_concurrency(mut self, concurrency: f64) -> Self {
        self.assumed_concurrency = concurrency;
        self
    }

    /// Every configuration of the grid, validated, in output order.
    pub fn configurations(&self) -> Result<Vec<SweepConfiguration>, ConfigurationError> {
        if self.trials == 0 {
            return Err(ConfigurationError::NoTrials);
        }
        if !(self.assumed_concurrency.is_finite() && self.assumed_concurrency > 0.) {
            return Err(ConfigurationError::InvalidParameter {
                name: "assumed_concurrency",
                value: self.assumed_concurrency,
            });
        }
        for (name, empty) in [
            ("replica_counts", self.replica_counts.is_empty()),
            ("op_kinds", self.op_kinds.is_empty()),
            ("node_failure_rates", self.node_failure_rates.is_empty()),
            ("coord_failure_rates", self.coord_failure_rates.is_empty()),
        ] {
            if empty {
                return Err(ConfigurationError::EmptyAxis(name));
            }
        }

        let mut configs = vec![];
        for &n in &self.replica_counts {
            if n == 0 {
                return Err(ConfigurationError::NoReplicas);
            }
            let quorums = self.quorums.quorums(n)?;
            for &op_kind in &self.op_kinds {
                for &k in &quorums {
                    for &node_failure in &self.node_failure_rates {
                        for &coord_failure in &self.coord_failure_rates {
                            let config = SweepConfiguration::new(n, k, op_kind)
                                .node_failure_rate(node_failure)
                                .coord_failure_rate(coord_failure)
                                .network_mean_ms(self.network_mean_ms);
                            config.validate()?;
                            configs.push(config);
                        }
                    }
                }
            }
        }
        Ok(configs)
    }

    /// Run the model once per grid cell.
    ///
    /// The whole grid is validated before the first trial runs.
    #[instrument(name = "sweep", skip_all, fields(trials = self.trials))]
    pub fn run<R: Rng + ?Sized>(
        &self,
        model: &LatencyModel,
        rng: &mut R,
    ) -> Result<Vec<SweepCell>, ConfigurationError> {
        let configs = self.configurations()?;
        info!("Sweeping {} configurations", configs.len());

        let start = Instant::now();
        let mut cells = Vec::with_capacity(configs.len());
        for config in configs {
            let latencies = model.sample_latencies(rng, &config, self.trials)?;
            let mean = statistical::mean(&latencies);
            let throughput = modeled_throughput(mean, self.assumed_concurrency);
            let result = AggregateResult::from_latencies(&latencies, throughput)
                .map_err(|_| ConfigurationError::NoTrials)?;

            debug!("{config}: {result}");
            cells.push(SweepCell { config, result });
        }

        info!(
            "Sweep complete in {}",
            humantime::format_duration(start.elapsed())
        );
        Ok(cells)
    }

    /// Run several plans back to back, keeping their order.
    pub fn chain<R: Rng + ?Sized>(
        plans: &[SweepPlan],
        model: &LatencyModel,
        rng: &mut R,
    ) -> Result<Vec<SweepCell>, ConfigurationError> {
        for plan in plans {
            plan.configurations()?;
        }

        let mut cells = vec![];
        for plan in plans {
            cells.extend(plan.run(model, rng)?);
        }
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn quorum_selections() {
        assert_eq!(QuorumSelection::All.quorums(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(QuorumSelection::Standard.quorums(1).unwrap(), vec![1]);
        assert_eq!(QuorumSelection::Standard.quorums(2).unwrap(), vec![1, 2]);
        assert_eq!(QuorumSelection::Standard.quorums(10).unwrap(), vec![1, 6, 10]);
        assert_eq!(
            QuorumSelection::Spread.quorums(20).unwrap(),
            vec![1, 5, 11, 15, 20]
        );
        assert_eq!(QuorumSelection::Spread.quorums(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            QuorumSelection::Fixed(vec![3, 1, 3]).quorums(5).unwrap(),
            vec![1, 3]
        );
        assert!(QuorumSelection::Fixed(vec![6]).quorums(5).is_err());
        assert!(QuorumSelection::Fixed(vec![0]).quorums(5).is_err());
    }

    #[test]
    fn grid_preserves_axis_order() {
        let plan = SweepPlan::new(&[5, 3], OpKind::Write)
            .op_kinds(&[OpKind::Write, OpKind::Read])
            .quorums(QuorumSelection::Standard)
            .node_failure_rates(&[0.2, 0.]);

        let configs = plan.configurations().unwrap();
        let keys: Vec<_> = configs
            .iter()
            .map(|c| (c.replica_count, c.op_kind, c.quorum_size, c.node_failure_rate))
            .collect();

        assert_eq!(configs.len(), 2 * 2 * 3 * 2);
        assert_eq!(keys[0], (5, OpKind::Write, 1, 0.2));
        assert_eq!(keys[1], (5, OpKind::Write, 1, 0.));
        assert_eq!(keys[2], (5, OpKind::Write, 3, 0.2));
        assert_eq!(keys[6], (5, OpKind::Read, 1, 0.2));
        assert_eq!(keys[12], (3, OpKind::Write, 1, 0.2));
        assert_eq!(*keys.last().unwrap(), (3, OpKind::Read, 3, 0.));
    }

    #[test]
    fn invalid_grids_fail_before_running() {
        let model = LatencyModel::default();
        let mut rng = SmallRng::seed_from_u64(1);

        let plan = SweepPlan::new(&[3, 0], OpKind::Write);
        assert_eq!(
            plan.run(&model, &mut rng),
            Err(ConfigurationError::NoReplicas)
        );

        let plan = SweepPlan::new(&[3], OpKind::Write).node_failure_rates(&[0.1, 2.]);
        assert!(matches!(
            plan.run(&model, &mut rng),
            Err(ConfigurationError::RateOutOfRange { .. })
        ));

        let plan = SweepPlan::new(&[3], OpKind::Write).node_failure_rates(&[]);
        assert_eq!(
            plan.run(&model, &mut rng),
            Err(ConfigurationError::EmptyAxis("node_failure_rates"))
        );

        let plan = SweepPlan::new(&[3], OpKind::Write).trials(0);
        assert_eq!(plan.run(&model, &mut rng), Err(ConfigurationError::NoTrials));

        let plans = [
            SweepPlan::new(&[3], OpKind::Write),
            SweepPlan::new(&[3], OpKind::Write).quorums(QuorumSelection::Fixed(vec![4])),
        ];
        assert!(SweepPlan::chain(&plans, &model, &mut rng).is_err());
    }

    #[tracing_test::traced_test]
    #[test]
    fn cells_carry_modeled_throughput() {
        let model = LatencyModel::default();
        let mut rng = SmallRng::seed_from_u64(11);
        let plan = SweepPlan::new(&[3], OpKind::Write)
            .trials(1_000)
            .assumed_concurrency(50.);

        let cells = plan.run(&model, &mut rng).unwrap();
        assert_eq!(cells.len(), 3);
        for cell in &cells {
            let r = &cell.result;
            assert_eq!(r.count, 1_000);
            assert_eq!(r.success_rate, 1.);
            assert!((r.throughput_ops_per_sec - 1000. / r.mean_latency_ms * 50.).abs() < 1e-6);
            assert!(r.p50 <= r.p99);
        }
        assert_eq!(cells[1].label(), "N=3, W=2");
        assert!(cells[0].result.mean_latency_ms < cells[2].result.mean_latency_ms);

        let secs = cells[0].estimated_completion_secs(1_000_000);
        assert!((secs - 1_000_000. / cells[0].result.throughput_ops_per_sec).abs() < 1e-6);
    }

    #[test]
    fn failure_impact_grid() {
        let plan = SweepPlan::failure_impact(20, OpKind::Read);
        let configs = plan.configurations().unwrap();
        assert_eq!(configs.len(), 5 * 4);
        assert!(configs.iter().all(|c| c.coord_failure_rate == 0.01));

        let model = LatencyModel::default();
        let mut rng = SmallRng::seed_from_u64(5);
        let cells = plan.trials(300).run(&model, &mut rng).unwrap();

        // Strong quorum at 20% failures is bounded by the timeout, weak quorum is not.
        let weak = &cells[3].result;
        let strong = &cells[19].result;
        assert_eq!(cells[3].config.quorum_size, 1);
        assert_eq!(cells[19].config.quorum_size, 20);
        assert!(weak.mean_latency_ms < 100.);
        assert!(strong.mean_latency_ms > 900.);
    }

    #[test]
    fn million_keys_plans() {
        let plans = SweepPlan::million_keys(OpKind::Write);
        let small = plans[0].configurations().unwrap();
        let large = plans[1].configurations().unwrap();
        assert_eq!(small.len(), 15);
        assert_eq!(large.len(), 21);
        assert_eq!(large[1].quorum_size, 6);
    }
}
