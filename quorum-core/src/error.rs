use thiserror::Error;

/// Invalid model or sweep parameters. Always raised before any trial runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Replica count must be at least 1")]
    NoReplicas,

    #[error("Quorum size {quorum} is outside 1..={replicas}")]
    QuorumOutOfRange { quorum: usize, replicas: usize },

    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("Number of trials must be at least 1")]
    NoTrials,

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Sweep axis `{0}` is empty")]
    EmptyAxis(&'static str),

    #[error("Read percentage must be within 0..=100, got {0}")]
    ReadPercentOutOfRange(u8),

    #[error("At least one cluster endpoint is required")]
    NoEndpoints,

    #[error("Concurrency must be at least 1")]
    NoWorkers,

    #[error("Routing index {index} is out of range for {endpoints} endpoints")]
    RoutingOutOfRange { index: usize, endpoints: usize },

    #[error("{count} ports starting at {base_port} run past port 65535")]
    PortRangeOverflow { base_port: u16, count: u16 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsError {
    #[error("No data available")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid cluster endpoint `{0}`, expected host:port")]
pub struct EndpointParseError(pub String);
