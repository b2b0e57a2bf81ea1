use quorum_core::{ClusterEndpoint, HEALTH_CHECK_TIMEOUT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Outcome of polling `/admin/cluster` on an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterHealth {
    Healthy {
        total_nodes: Option<u64>,
        alive_nodes: Option<u64>,
    },
    Unhealthy(String),
}

impl ClusterHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ClusterHealth::Healthy { .. })
    }
}

/// `GET /admin/cluster` reply. Only the summary is read; membership details are ignored.
#[derive(Deserialize)]
struct ClusterInfo {
    summary: Option<ClusterSummary>,
}

#[derive(Deserialize)]
struct ClusterSummary {
    total: Option<u64>,
    alive: Option<u64>,
}

pub(crate) async fn check(http: &Client, endpoint: &ClusterEndpoint) -> ClusterHealth {
    let url = format!("{}/admin/cluster", endpoint.base_url());
    let res = match http.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
        Ok(res) => res,
        Err(err) => {
            warn!("Cluster at {endpoint} is unreachable: {err}");
            return ClusterHealth::Unhealthy(err.to_string());
        }
    };

    let status = res.status();
    if !status.is_success() {
        warn!("Cluster at {endpoint} reported status {status}");
        return ClusterHealth::Unhealthy(format!("status {}", status.as_u16()));
    }

    match res.json::<ClusterInfo>().await {
        Ok(info) => {
            let (total_nodes, alive_nodes) = info
                .summary
                .map_or((None, None), |s| (s.total, s.alive));
            info!(
                "Cluster at {endpoint} is healthy ({} of {} nodes alive)",
                display_count(alive_nodes),
                display_count(total_nodes)
            );
            ClusterHealth::Healthy {
                total_nodes,
                alive_nodes,
            }
        }
        Err(err) => {
            warn!("Cluster at {endpoint} answered with an unexpected body: {err}");
            ClusterHealth::Healthy {
                total_nodes: None,
                alive_nodes: None,
            }
        }
    }
}

fn display_count(count: Option<u64>) -> String {
    count.map_or_else(|| "?".to_string(), |c| c.to_string())
}
