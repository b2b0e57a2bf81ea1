#![doc = include_str!("../README.md")]

pub mod driver;
pub mod generator;
pub mod model;
pub mod sweep;

pub use driver::WorkloadDriver;
pub use generator::SampleGenerator;
pub use model::LatencyModel;
pub use sweep::SweepPlan;

pub use quorum_core as core;

pub mod prelude {
    pub use crate::driver::{ClusterHealth, DriverError, MixedReport, PhaseReport, WorkloadDriver};
    pub use crate::generator::SampleGenerator;
    pub use crate::model::LatencyModel;
    pub use crate::sweep::{QuorumSelection, SweepCell, SweepPlan};

    pub use quorum_core::{
        AggregateResult, ClusterEndpoint, ConfigurationError, DriverConfig, EndpointRouting,
        ModelParams, OpKind, OperationSample, SweepConfiguration,
    };
}
