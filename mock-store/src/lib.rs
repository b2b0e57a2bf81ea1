//! In-memory stand-in for a quorum-replicated key/value cluster.
//!
//! Every node spawned from one `MockStore` shares the same data, but each node stamps writes
//! with its own vector clock entry. Writes through different nodes that did not see each other
//! are kept as siblings and reported as conflicts on read.
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info, warn};

type VectorClock = BTreeMap<String, u64>;

/// Injected service behavior, applied to every `/kv` request.
#[derive(Clone, Copy, Debug)]
pub struct Behavior {
    pub delay_mean: Duration,
    pub delay_std: Duration,
    /// Fraction of requests answered with a 500.
    pub error_rate: f64,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            delay_mean: Duration::ZERO,
            delay_std: Duration::ZERO,
            error_rate: 0.,
        }
    }
}

/// What `/admin/cluster` answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterReply {
    /// 200 with a membership summary.
    #[default]
    Summary,
    /// 503.
    Unavailable,
    /// 200 with a body that is not JSON.
    Garbled,
    /// 200 with JSON that carries no summary.
    NoSummary,
}

#[derive(Clone, Debug)]
struct Version {
    value: String,
    clock: VectorClock,
}

#[derive(Default)]
struct Inner {
    /// Siblings per key, none of which descends from another.
    data: RwLock<HashMap<String, Vec<Version>>>,
    /// Last clock each node stamped per key: `(node, key) -> clock`.
    seen: RwLock<HashMap<(String, String), VectorClock>>,
    cluster_reply: RwLock<ClusterReply>,
    behavior: RwLock<Behavior>,
    nodes: AtomicU64,
    requests: AtomicU64,
}

#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Inner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn behavior(self, behavior: Behavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        if let Ok(mut current) = self.inner.behavior.write() {
            *current = behavior;
        }
    }

    /// Make `/admin/cluster` answer 503.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.set_cluster_reply(if unhealthy {
            ClusterReply::Unavailable
        } else {
            ClusterReply::Summary
        });
    }

    pub fn set_cluster_reply(&self, reply: ClusterReply) {
        if let Ok(mut current) = self.inner.cluster_reply.write() {
            *current = reply;
        }
    }

    /// Requests served on `/kv` since startup.
    pub fn requests(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn router(&self, node_id: &str) -> Router {
        self.inner.nodes.fetch_add(1, Ordering::Relaxed);
        let state = NodeState {
            node_id: node_id.into(),
            store: self.clone(),
        };

        Router::new()
            .route("/kv/:key", get(get_key).put(put_key))
            .route("/admin/cluster", get(cluster))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve a node on `addr` until the process exits.
    pub async fn run(&self, node_id: &str, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Node {node_id} listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router(node_id)).await
    }

    /// Serve a node on an ephemeral localhost port in the background.
    pub async fn spawn(&self, node_id: &str) -> std::io::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = self.router(node_id);
        let node_id = node_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!("Node {node_id} stopped: {err}");
            }
        });
        Ok(addr)
    }

    fn write(&self, node_id: &str, key: &str, value: String) -> Result<(), StatusCode> {
        let seen_key = (node_id.to_string(), key.to_string());
        let mut seen = self.inner.seen.write().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let mut clock = seen.get(&seen_key).cloned().unwrap_or_default();
        *clock.entry(node_id.to_string()).or_default() += 1;
        seen.insert(seen_key, clock.clone());
        drop(seen);

        let mut data = self.inner.data.write().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let siblings = data.entry(key.to_string()).or_default();
        siblings.retain(|v| !descends(&clock, &v.clock));
        siblings.push(Version { value, clock });
        Ok(())
    }

    fn read(&self, node_id: &str, key: &str) -> Result<Option<Vec<Version>>, StatusCode> {
        let data = self.inner.data.read().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let Some(siblings) = data.get(key).cloned() else {
            return Ok(None);
        };
        drop(data);

        // A read makes the node aware of every sibling, so its next write supersedes them.
        let merged = siblings.iter().fold(VectorClock::new(), |acc, v| merge(acc, &v.clock));
        if let Ok(mut seen) = self.inner.seen.write() {
            seen.insert((node_id.to_string(), key.to_string()), merged);
        }
        Ok(Some(siblings))
    }

    async fn simulate(&self) -> Result<(), StatusCode> {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        counter!("mock-store.requests").increment(1);

        let behavior = self
            .inner
            .behavior
            .read()
            .map(|b| *b)
            .unwrap_or_default();

        let (delay, fail) = {
            let mut rng = rand::thread_rng();
            let delay = Normal::new(
                behavior.delay_mean.as_secs_f64(),
                behavior.delay_std.as_secs_f64(),
            )
            .map(|dist| dist.sample(&mut rng).max(0.))
            .unwrap_or(0.);
            (delay, rng.gen_bool(behavior.error_rate.clamp(0., 1.)))
        };

        if delay > 0. {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
        if fail {
            counter!("mock-store.injected_errors").increment(1);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Ok(())
    }
}

/// `a` has seen everything `b` has.
fn descends(a: &VectorClock, b: &VectorClock) -> bool {
    b.iter()
        .all(|(node, count)| a.get(node).copied().unwrap_or(0) >= *count)
}

fn merge(mut acc: VectorClock, clock: &VectorClock) -> VectorClock {
    for (node, &count) in clock {
        let entry = acc.entry(node.clone()).or_default();
        *entry = (*entry).max(count);
    }
    acc
}

#[derive(Clone)]
struct NodeState {
    node_id: Arc<str>,
    store: MockStore,
}

#[derive(Deserialize)]
struct PutBody {
    value: String,
}

#[derive(Serialize)]
struct GetReply {
    value: String,
    vector_clock: VectorClock,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<serde_json::Value>,
}

#[debug_handler]
async fn put_key(
    State(state): State<NodeState>,
    Path(key): Path<String>,
    Json(body): Json<PutBody>,
) -> Result<Response, StatusCode> {
    state.store.simulate().await?;
    state.store.write(&state.node_id, &key, body.value)?;
    debug!("PUT {key} on {}", state.node_id);
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))).into_response())
}

#[debug_handler]
async fn get_key(
    State(state): State<NodeState>,
    Path(key): Path<String>,
) -> Result<Response, StatusCode> {
    state.store.simulate().await?;
    let Some(mut siblings) = state.store.read(&state.node_id, &key)? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let first = siblings.remove(0);
    let conflicts = siblings
        .into_iter()
        .map(|v| json!({ "value": v.value, "vector_clock": v.clock }))
        .collect();

    Ok(Json(GetReply {
        value: first.value,
        vector_clock: first.clock,
        conflicts,
    })
    .into_response())
}

async fn cluster(State(state): State<NodeState>) -> Response {
    let reply = state
        .store
        .inner
        .cluster_reply
        .read()
        .map(|r| *r)
        .unwrap_or_default();

    let nodes = state.store.inner.nodes.load(Ordering::Relaxed);
    match reply {
        ClusterReply::Summary => Json(json!({
            "node_id": &*state.node_id,
            "summary": { "total": nodes, "alive": nodes },
        }))
        .into_response(),
        ClusterReply::Unavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "cluster unavailable").into_response()
        }
        ClusterReply::Garbled => (StatusCode::OK, "all good").into_response(),
        ClusterReply::NoSummary => Json(json!({ "node_id": &*state.node_id })).into_response(),
    }
}
