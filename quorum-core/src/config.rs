use crate::{
    ClusterEndpoint, ConfigurationError, OpKind, BENCHMARK_REQUEST_TIMEOUT,
    DEFAULT_NETWORK_MEAN_MS, SCALE_REQUEST_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

/// Constants of the stochastic latency model.
///
/// Defaults describe a large cluster where most requests cross the network, with append-only
/// writes (cheap) and seek-bound reads (expensive).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelParams {
    pub network_std_ms: f64,
    pub write_disk_mean_ms: f64,
    pub write_disk_std_ms: f64,
    pub read_disk_mean_ms: f64,
    pub read_disk_std_ms: f64,
    /// CPU cost per extra replica compared during a read.
    pub read_reconciliation_ms: f64,
    /// Coordinator cost to serialize and dispatch one replica request.
    pub fanout_cost_per_node_ms: f64,
    /// Delay charged for a replica that never answers.
    pub timeout_ms: f64,
    /// Penalty when the coordinator fails and the client resubmits elsewhere.
    pub client_retry_delay_ms: f64,
    pub min_network_ms: f64,
    pub min_disk_ms: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            network_std_ms: 5.0,
            write_disk_mean_ms: 2.0,
            write_disk_std_ms: 0.5,
            read_disk_mean_ms: 8.0,
            read_disk_std_ms: 2.0,
            read_reconciliation_ms: 0.05,
            fanout_cost_per_node_ms: 0.01,
            timeout_ms: 1000.0,
            client_retry_delay_ms: 50.0,
            min_network_ms: 1.0,
            min_disk_ms: 0.5,
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let fields = [
            ("network_std_ms", self.network_std_ms),
            ("write_disk_mean_ms", self.write_disk_mean_ms),
            ("write_disk_std_ms", self.write_disk_std_ms),
            ("read_disk_mean_ms", self.read_disk_mean_ms),
            ("read_disk_std_ms", self.read_disk_std_ms),
            ("read_reconciliation_ms", self.read_reconciliation_ms),
            ("fanout_cost_per_node_ms", self.fanout_cost_per_node_ms),
            ("timeout_ms", self.timeout_ms),
            ("client_retry_delay_ms", self.client_retry_delay_ms),
            ("min_network_ms", self.min_network_ms),
            ("min_disk_ms", self.min_disk_ms),
        ];

        for (name, value) in fields {
            check_non_negative(name, value)?;
        }
        Ok(())
    }

    /// Disk `(mean, std)` for the given kind of operation.
    pub fn disk(&self, op_kind: OpKind) -> (f64, f64) {
        match op_kind {
            OpKind::Write => (self.write_disk_mean_ms, self.write_disk_std_ms),
            OpKind::Read => (self.read_disk_mean_ms, self.read_disk_std_ms),
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: f64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn network_std_ms(mut self, std_ms: f64) -> Self {
        self.network_std_ms = std_ms;
        self
    }

    pub fn write_disk(mut self, mean_ms: f64, std_ms: f64) -> Self {
        self.write_disk_mean_ms = mean_ms;
        self.write_disk_std_ms = std_ms;
        self
    }

    pub fn read_disk(mut self, mean_ms: f64, std_ms: f64) -> Self {
        self.read_disk_mean_ms = mean_ms;
        self.read_disk_std_ms = std_ms;
        self
    }

    pub fn fanout_cost_per_node_ms(mut self, cost_ms: f64) -> Self {
        self.fanout_cost_per_node_ms = cost_ms;
        self
    }
}

/// One point of a parameter grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepConfiguration {
    pub replica_count: usize,
    pub quorum_size: usize,
    pub op_kind: OpKind,
    pub node_failure_rate: f64,
    pub coord_failure_rate: f64,
    pub network_mean_ms: f64,
}

impl SweepConfiguration {
    /// A failure-free configuration with the default network mean.
    pub fn new(replica_count: usize, quorum_size: usize, op_kind: OpKind) -> Self {
        Self {
            replica_count,
            quorum_size,
            op_kind,
            node_failure_rate: 0.,
            coord_failure_rate: 0.,
            network_mean_ms: DEFAULT_NETWORK_MEAN_MS,
        }
    }

    pub fn node_failure_rate(mut self, rate: f64) -> Self {
        self.node_failure_rate = rate;
        self
    }

    pub fn coord_failure_rate(mut self, rate: f64) -> Self {
        self.coord_failure_rate = rate;
        self
    }

    pub fn network_mean_ms(mut self, mean_ms: f64) -> Self {
        self.network_mean_ms = mean_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.replica_count == 0 {
            return Err(ConfigurationError::NoReplicas);
        }
        if !(1..=self.replica_count).contains(&self.quorum_size) {
            return Err(ConfigurationError::QuorumOutOfRange {
                quorum: self.quorum_size,
                replicas: self.replica_count,
            });
        }
        check_rate("node_failure_rate", self.node_failure_rate)?;
        check_rate("coord_failure_rate", self.coord_failure_rate)?;
        check_non_negative("network_mean_ms", self.network_mean_ms)
    }

    pub fn label(&self) -> String {
        format!(
            "N={}, {}={}",
            self.replica_count,
            self.op_kind.quorum_letter(),
            self.quorum_size
        )
    }
}

impl fmt::Display for SweepConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}, node_failure={:.2}, coord_failure={:.2}",
            self.op_kind,
            self.label(),
            self.node_failure_rate,
            self.coord_failure_rate,
        )
    }
}

/// How the live driver picks the node that coordinates each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRouting {
    /// Always the endpoint at this index, so read-after-write hits the same coordinator.
    Fixed(usize),
    /// Uniformly random per operation, like a client without endpoint affinity.
    Random,
}

/// Live workload driver settings.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub endpoints: Vec<ClusterEndpoint>,
    pub concurrency: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    pub routing: EndpointRouting,
    pub tps_limit: Option<NonZeroU32>,
    pub proceed_on_unhealthy: bool,
    pub seed: Option<u64>,
}

impl DriverConfig {
    /// Correctness-oriented runs against one coordinator with a generous timeout.
    pub fn benchmark(endpoint: ClusterEndpoint) -> Self {
        Self {
            endpoints: vec![endpoint],
            concurrency: 4,
            request_timeout: BENCHMARK_REQUEST_TIMEOUT,
            routing: EndpointRouting::Fixed(0),
            tps_limit: None,
            proceed_on_unhealthy: false,
            seed: None,
        }
    }

    /// High-throughput runs spread randomly over the whole cluster with a short timeout.
    pub fn scale(endpoints: Vec<ClusterEndpoint>) -> Self {
        Self {
            endpoints,
            concurrency: 20,
            request_timeout: SCALE_REQUEST_TIMEOUT,
            routing: EndpointRouting::Random,
            tps_limit: None,
            proceed_on_unhealthy: false,
            seed: None,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn routing(mut self, routing: EndpointRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn tps_limit(mut self, tps: NonZeroU32) -> Self {
        self.tps_limit = Some(tps);
        self
    }

    pub fn proceed_on_unhealthy(mut self, proceed: bool) -> Self {
        self.proceed_on_unhealthy = proceed;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.endpoints.is_empty() {
            return Err(ConfigurationError::NoEndpoints);
        }
        if self.concurrency == 0 {
            return Err(ConfigurationError::NoWorkers);
        }
        if let EndpointRouting::Fixed(index) = self.routing {
            if index >= self.endpoints.len() {
                return Err(ConfigurationError::RoutingOutOfRange {
                    index,
                    endpoints: self.endpoints.len(),
                });
            }
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::RateOutOfRange { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0. {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter { name, value })
    }
}
