use crate::{ConfigurationError, EndpointParseError};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSecondsWithFrac};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Read,
    Write,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Read => "read",
            OpKind::Write => "write",
        }
    }

    /// Conventional letter for the quorum of this kind of operation (`R` or `W`).
    pub fn quorum_letter(&self) -> char {
        match self {
            OpKind::Read => 'R',
            OpKind::Write => 'W',
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a live operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SampleError {
    /// Timeout or connection failure. Holds the transport's own description.
    Transport { description: String },
    /// The store answered, but not with a success status.
    Protocol { status: u16 },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Transport { description } => write!(f, "transport: {description}"),
            SampleError::Protocol { status } => write!(f, "status {status}"),
        }
    }
}

/// One measured operation outcome.
///
/// Latency is recorded for failed operations too, as long as it was measured (a timeout still
/// took time).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSample {
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub latency: Duration,
    pub success: bool,
    pub error: Option<SampleError>,
}

impl OperationSample {
    pub fn success(latency: Duration) -> Self {
        Self {
            latency,
            success: true,
            error: None,
        }
    }

    pub fn failure(latency: Duration, error: SampleError) -> Self {
        Self {
            latency,
            success: false,
            error: Some(error),
        }
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1e3
    }
}

/// Address of one node of a live cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    pub host: String,
    pub port: u16,
}

impl ClusterEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `count` endpoints on `host` with consecutive ports starting at `base_port`.
    pub fn port_range(
        host: &str,
        base_port: u16,
        count: u16,
    ) -> Result<Vec<Self>, ConfigurationError> {
        (0..count)
            .map(|offset| {
                base_port
                    .checked_add(offset)
                    .map(|port| Self::new(host, port))
                    .ok_or(ConfigurationError::PortRangeOverflow { base_port, count })
            })
            .collect()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ClusterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ClusterEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s
            .trim()
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError(s.to_string()))?;
        if host.is_empty() {
            return Err(EndpointParseError(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
