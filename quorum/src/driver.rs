//! Concurrent workload driver for a live cluster
mod client;
mod health;
mod pool;

pub use client::KvRecord;
pub use health::ClusterHealth;

use crate::generator::SampleGenerator;
use client::KvClient;
use futures_util::future::join_all;
use pool::WorkerPool;
use quorum_core::{
    AggregateResult, ClusterEndpoint, ConfigurationError, DriverConfig, EndpointRouting, OpKind,
    OperationSample, StatsError,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSecondsWithFrac};
use std::time::{Duration, Instant};
use thiserror::Error;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Invalid driver configuration: {0}")]
    Config(#[from] ConfigurationError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Cluster is unhealthy: {0}")]
    Unhealthy(String),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Unable to decode record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Every sample of one phase together with its wall-clock duration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub kind: OpKind,
    pub samples: Vec<OperationSample>,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub elapsed: Duration,
}

impl PhaseReport {
    pub fn aggregate(&self) -> Result<AggregateResult, StatsError> {
        AggregateResult::from_samples(&self.samples, self.elapsed)
    }

    pub fn success_count(&self) -> usize {
        self.samples.iter().filter(|s| s.success).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedReport {
    pub writes: PhaseReport,
    pub reads: PhaseReport,
}

impl MixedReport {
    /// Both phases as a single population, over their summed wall clock.
    pub fn combined(&self) -> Result<AggregateResult, StatsError> {
        let samples: Vec<_> = self
            .writes
            .samples
            .iter()
            .chain(&self.reads.samples)
            .cloned()
            .collect();
        AggregateResult::from_samples(&samples, self.writes.elapsed + self.reads.elapsed)
    }
}

/// Issues real requests against a cluster and records one sample per operation.
///
/// Endpoint routing is decided on the calling task before jobs are handed to the pool, so a
/// seeded driver spreads the same workload over the same endpoints every run.
pub struct WorkloadDriver {
    config: DriverConfig,
    client: KvClient,
    pool: WorkerPool,
    rng: SmallRng,
}

impl WorkloadDriver {
    pub fn new(config: DriverConfig) -> Result<Self, DriverError> {
        config.validate()?;

        let client = KvClient::new(config.request_timeout)?;
        let pool = WorkerPool::new(config.concurrency, config.tps_limit);
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Ok(Self {
            config,
            client,
            pool,
            rng,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    #[instrument(name = "write_phase", skip_all, fields(ops = pairs.len(), workers = self.pool.concurrency()))]
    pub async fn run_write_phase(&mut self, pairs: Vec<(String, String)>) -> PhaseReport {
        let jobs: Vec<_> = pairs
            .into_iter()
            .map(|(key, value)| (self.route().clone(), key, value))
            .collect();

        let client = self.client.clone();
        let start = Instant::now();
        let samples = self
            .pool
            .run(jobs, move |(endpoint, key, value)| {
                let client = client.clone();
                async move { client.put(&endpoint, &key, &value).await }
            })
            .await;

        self.finish_phase(OpKind::Write, samples, start.elapsed())
    }

    #[instrument(name = "read_phase", skip_all, fields(ops = keys.len(), workers = self.pool.concurrency()))]
    pub async fn run_read_phase(&mut self, keys: Vec<String>) -> PhaseReport {
        let jobs: Vec<_> = keys
            .into_iter()
            .map(|key| (self.route().clone(), key))
            .collect();

        let client = self.client.clone();
        let start = Instant::now();
        let samples = self
            .pool
            .run(jobs, move |(endpoint, key)| {
                let client = client.clone();
                async move { client.get(&endpoint, &key).await }
            })
            .await;

        self.finish_phase(OpKind::Read, samples, start.elapsed())
    }

    /// Write `operations - reads` fresh pairs, then read `reads` keys drawn with replacement
    /// from what was written, where `reads = floor(operations * read_pct / 100)`.
    ///
    /// With nothing written the reads target fresh keys and are reported as misses.
    pub async fn run_mixed<R: Rng>(
        &mut self,
        generator: &mut SampleGenerator<R>,
        operations: usize,
        read_pct: u8,
    ) -> Result<MixedReport, DriverError> {
        if read_pct > 100 {
            return Err(ConfigurationError::ReadPercentOutOfRange(read_pct).into());
        }

        let reads = operations * read_pct as usize / 100;
        let writes = operations - reads;
        info!("Mixed workload of {operations} operations: {writes} writes, {reads} reads");

        let pairs = generator.random_pairs(writes);
        let written: Vec<String> = pairs.iter().map(|(key, _)| key.clone()).collect();
        let writes = self.run_write_phase(pairs).await;

        let read_keys = if written.is_empty() {
            (0..reads).map(|_| generator.random_key()).collect()
        } else {
            generator.sample_with_replacement(&written, reads)
        };
        let reads = self.run_read_phase(read_keys).await;

        Ok(MixedReport { writes, reads })
    }

    /// Store `count` generated pairs and hand back their keys for a separately timed read phase.
    pub async fn prepare_reads<R: Rng>(
        &mut self,
        generator: &mut SampleGenerator<R>,
        count: usize,
    ) -> Vec<String> {
        let pairs = generator.random_pairs(count);
        let keys = pairs.iter().map(|(key, _)| key.clone()).collect();

        let seeded = self.run_write_phase(pairs).await;
        let stored = seeded.success_count();
        if stored < count {
            warn!("Only {stored} of {count} keys were stored before the read phase");
        }
        keys
    }

    pub async fn put(&mut self, key: &str, value: &str) -> OperationSample {
        let endpoint = self.route().clone();
        self.client.put(&endpoint, key, value).await
    }

    pub async fn get(&mut self, key: &str) -> OperationSample {
        let endpoint = self.route().clone();
        self.client.get(&endpoint, key).await
    }

    /// Read back `key` through the primary endpoint.
    pub async fn fetch(&self, key: &str) -> Result<Option<KvRecord>, DriverError> {
        self.client.fetch(self.primary(), key).await
    }

    /// Concurrently write `values[i]` through endpoint `i`, wrapping around the endpoint list,
    /// so each value reaches the store via a different coordinator.
    pub async fn write_from_each(&self, key: &str, values: &[String]) -> Vec<OperationSample> {
        let endpoints = &self.config.endpoints;
        let writes = values.iter().enumerate().map(|(i, value)| {
            let endpoint = &endpoints[i % endpoints.len()];
            self.client.put(endpoint, key, value)
        });
        join_all(writes).await
    }

    pub async fn check_health(&self) -> ClusterHealth {
        health::check(self.client.http(), self.primary()).await
    }

    /// Health check plus the configured policy for an unhealthy cluster.
    pub async fn precheck(&self) -> Result<ClusterHealth, DriverError> {
        let health = self.check_health().await;
        match &health {
            ClusterHealth::Unhealthy(reason) if !self.config.proceed_on_unhealthy => {
                Err(DriverError::Unhealthy(reason.clone()))
            }
            ClusterHealth::Unhealthy(_) => {
                warn!("Proceeding against an unhealthy cluster");
                Ok(health)
            }
            ClusterHealth::Healthy { .. } => Ok(health),
        }
    }

    fn route(&mut self) -> &ClusterEndpoint {
        let endpoints = &self.config.endpoints;
        match self.config.routing {
            EndpointRouting::Fixed(idx) => &endpoints[idx],
            EndpointRouting::Random => &endpoints[self.rng.gen_range(0..endpoints.len())],
        }
    }

    fn primary(&self) -> &ClusterEndpoint {
        match self.config.routing {
            EndpointRouting::Fixed(idx) => &self.config.endpoints[idx],
            EndpointRouting::Random => &self.config.endpoints[0],
        }
    }

    fn finish_phase(
        &self,
        kind: OpKind,
        samples: Vec<OperationSample>,
        elapsed: Duration,
    ) -> PhaseReport {
        let report = PhaseReport {
            kind,
            samples,
            elapsed,
        };
        info!(
            "{kind} phase finished in {}: {} of {} succeeded",
            humantime::format_duration(elapsed),
            report.success_count(),
            report.samples.len()
        );
        report
    }
}
