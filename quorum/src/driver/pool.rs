use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics_util::AtomicBucket;
use quorum_core::{OperationSample, SampleError};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Bounded pool of tokio workers, scoped to a single `run`.
///
/// Jobs are handed out through a bounded channel, so at most `concurrency` operations are in
/// flight and the submitter waits once every worker is busy. Every job yields exactly one
/// sample, even when its task panics; completion order is not submission order.
pub(crate) struct WorkerPool {
    concurrency: usize,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl WorkerPool {
    /// NOTE: `concurrency` must be non-zero; `DriverConfig::validate` guarantees it.
    pub fn new(concurrency: usize, tps_limit: Option<NonZeroU32>) -> Self {
        Self {
            concurrency,
            limiter: tps_limit.map(|tps| Arc::new(rate_limiter(tps))),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `task` once per job and return every sample. All workers are joined before this
    /// returns.
    pub async fn run<J, T, F>(&self, jobs: Vec<J>, task: T) -> Vec<OperationSample>
    where
        J: Send + 'static,
        T: Fn(J) -> F + Send + Sync + Clone + 'static,
        F: Future<Output = OperationSample> + Send + 'static,
    {
        let job_count = jobs.len();
        let worker_count = self.concurrency.min(job_count);
        if worker_count == 0 {
            return vec![];
        }

        let (tx, rx) = async_channel::bounded::<J>(worker_count);
        let results: Arc<AtomicBucket<OperationSample>> = Arc::new(AtomicBucket::new());

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = rx.clone();
            let task = task.clone();
            let results = results.clone();
            let limiter = self.limiter.clone();

            trace!("Spawning worker {id}.");
            workers.push(tokio::spawn(async move {
                let mut completed = 0usize;
                while let Ok(job) = rx.recv().await {
                    if let Some(limiter) = &limiter {
                        limiter.until_ready().await;
                    }
                    let start = Instant::now();
                    let sample = match tokio::spawn(task(job)).await {
                        Ok(sample) => sample,
                        Err(err) => {
                            error!("Worker {id} lost a job: {err}");
                            lost(start.elapsed(), format!("task failed: {err}"))
                        }
                    };
                    results.push(sample);
                    completed += 1;
                }
                trace!("Worker {id} drained after {completed} jobs.");
            }));
        }
        drop(rx);

        for job in jobs {
            if tx.send(job).await.is_err() {
                error!("Every worker exited before all jobs were submitted.");
                break;
            }
        }
        drop(tx);

        for worker in workers {
            if let Err(err) = worker.await {
                error!("Worker failed: {err}");
            }
        }

        let mut samples = Vec::with_capacity(job_count);
        results.clear_with(|chunk| samples.extend_from_slice(chunk));
        if samples.len() < job_count {
            let missing = job_count - samples.len();
            error!("{missing} of {job_count} jobs produced no sample.");
            samples.extend(
                (0..missing).map(|_| lost(Duration::ZERO, "job was never run".to_string())),
            );
        }
        samples
    }
}

fn lost(latency: Duration, description: String) -> OperationSample {
    OperationSample::failure(latency, SampleError::Transport { description })
}

fn rate_limiter(tps_limit: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps_limit).allow_burst(NonZeroU32::MIN))
}
