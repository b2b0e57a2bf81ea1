use super::DriverError;
use quorum_core::{ClusterEndpoint, OpKind, OperationSample, SampleError};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A stored value as returned by `GET /kv/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvRecord {
    pub value: String,
    pub vector_clock: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct PutBody<'a> {
    value: &'a str,
}

/// Thin client for the store's key/value surface.
///
/// Benchmark operations never fail: whatever happens is folded into the returned sample.
#[derive(Clone, Debug)]
pub(crate) struct KvClient {
    http: Client,
    timeout: Duration,
}

impl KvClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().build()?,
            timeout,
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub async fn put(&self, endpoint: &ClusterEndpoint, key: &str, value: &str) -> OperationSample {
        let start = Instant::now();
        let res = self
            .http
            .put(kv_url(endpoint, key))
            .json(&PutBody { value })
            .timeout(self.timeout)
            .send()
            .await;

        let sample = finish(start, res, |status| {
            status == StatusCode::OK || status == StatusCode::CREATED
        })
        .await;
        trace!("PUT {key} via {endpoint}: {sample:?}");
        record(OpKind::Write, &sample);
        sample
    }

    pub async fn get(&self, endpoint: &ClusterEndpoint, key: &str) -> OperationSample {
        let start = Instant::now();
        let res = self
            .http
            .get(kv_url(endpoint, key))
            .timeout(self.timeout)
            .send()
            .await;

        let sample = finish(start, res, |status| status == StatusCode::OK).await;
        trace!("GET {key} via {endpoint}: {sample:?}");
        record(OpKind::Read, &sample);
        sample
    }

    /// Read back a record. `None` if the store does not know the key.
    pub async fn fetch(
        &self,
        endpoint: &ClusterEndpoint,
        key: &str,
    ) -> Result<Option<KvRecord>, DriverError> {
        let res = self
            .http
            .get(kv_url(endpoint, key))
            .timeout(self.timeout)
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => {
                let body = res.bytes().await?;
                Ok(Some(serde_json::from_slice(&body)?))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(DriverError::Status(status.as_u16())),
        }
    }
}

fn kv_url(endpoint: &ClusterEndpoint, key: &str) -> String {
    format!("{}/kv/{key}", endpoint.base_url())
}

/// Turn a request outcome into a sample. The body is drained so latency covers the full reply.
async fn finish(
    start: Instant,
    res: Result<Response, reqwest::Error>,
    accepted: impl Fn(StatusCode) -> bool,
) -> OperationSample {
    let res = match res {
        Ok(res) => res,
        Err(err) => return OperationSample::failure(start.elapsed(), transport(err)),
    };

    let status = res.status();
    if let Err(err) = res.bytes().await {
        return OperationSample::failure(start.elapsed(), transport(err));
    }

    let latency = start.elapsed();
    if accepted(status) {
        OperationSample::success(latency)
    } else {
        OperationSample::failure(
            latency,
            SampleError::Protocol {
                status: status.as_u16(),
            },
        )
    }
}

fn transport(err: reqwest::Error) -> SampleError {
    SampleError::Transport {
        description: err.to_string(),
    }
}

#[cfg(feature = "metrics")]
fn record(kind: OpKind, sample: &OperationSample) {
    let op = kind.as_str();
    metrics::histogram!("quorum_driver_latency_seconds", "op" => op)
        .record(sample.latency.as_secs_f64());
    if sample.success {
        metrics::counter!("quorum_driver_success", "op" => op).increment(1);
    } else {
        metrics::counter!("quorum_driver_error", "op" => op).increment(1);
    }
}

#[cfg(not(feature = "metrics"))]
fn record(_kind: OpKind, _sample: &OperationSample) {}
