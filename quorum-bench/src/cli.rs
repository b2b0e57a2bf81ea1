use clap::{Args, Parser, Subcommand, ValueEnum};
use quorum_core::{OpKind, DEFAULT_KEY_LEN, DEFAULT_NETWORK_MEAN_MS, DEFAULT_VALUE_LEN};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version = "0.1", about = "Quorum latency modeling and live cluster benchmarks")]
pub struct Cli {
    /// Log filter, e.g. `quorum=debug`.
    #[arg(long, global = true, default_value = "quorum=info,quorum_bench=info")]
    pub log: String,

    /// Expose driver metrics on this address.
    #[arg(long, global = true)]
    pub prometheus: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write, read or mixed workload against one coordinator.
    Bench(BenchArgs),
    /// Write then read a deterministic key space spread over many nodes.
    Scale(ScaleArgs),
    /// Monte Carlo quorum latency model.
    Simulate {
        #[command(subcommand)]
        sweep: SimulateCommand,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum WorkloadType {
    Write,
    Read,
    Mixed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OpArg {
    Write,
    Read,
}

impl From<OpArg> for OpKind {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Write => OpKind::Write,
            OpArg::Read => OpKind::Read,
        }
    }
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    #[arg(short, long, default_value_t = 1000)]
    pub operations: usize,

    #[arg(long = "type", value_enum, default_value_t = WorkloadType::Mixed)]
    pub workload: WorkloadType,

    /// Share of reads in a mixed workload, in percent.
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub read_pct: u8,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    #[arg(long)]
    pub tps: Option<NonZeroU32>,

    #[arg(long, default_value_t = DEFAULT_KEY_LEN)]
    pub key_size: usize,

    #[arg(long, default_value_t = DEFAULT_VALUE_LEN)]
    pub value_size: usize,

    #[command(flatten)]
    pub common: LiveArgs,
}

#[derive(Args, Debug)]
pub struct ScaleArgs {
    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[arg(short, long, default_value_t = 4)]
    pub nodes: u16,

    #[arg(long, default_value_t = 8000)]
    pub base_port: u16,

    #[arg(short, long, default_value_t = 1000)]
    pub keys: usize,

    #[arg(short, long, default_value_t = 10)]
    pub workers: usize,

    #[arg(long, default_value_t = DEFAULT_VALUE_LEN)]
    pub value_size: usize,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    #[command(flatten)]
    pub common: LiveArgs,
}

#[derive(Args, Debug)]
pub struct LiveArgs {
    /// Run even if the cluster health check fails.
    #[arg(long)]
    pub proceed_unhealthy: bool,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Write aggregate results as JSON.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum SimulateCommand {
    /// Every quorum size up to N=5, then weak/majority/strong up to N=1000.
    MillionKeys {
        #[arg(long)]
        keys: Option<u64>,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Quorum sizes for one cluster size under rising node failure rates.
    FailureImpact {
        #[arg(short = 'n', long, default_value_t = 20)]
        replicas: usize,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Arbitrary grid.
    Grid(GridArgs),
}

#[derive(Args, Debug)]
pub struct GridArgs {
    #[arg(short = 'n', long, value_delimiter = ',', required = true)]
    pub replicas: Vec<usize>,

    /// Quorum sizes; every size from 1 to N when omitted.
    #[arg(short = 'k', long, value_delimiter = ',')]
    pub quorums: Vec<usize>,

    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub node_failure: Vec<f64>,

    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub coord_failure: Vec<f64>,

    #[arg(long, default_value_t = DEFAULT_NETWORK_MEAN_MS)]
    pub network_mean: f64,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug)]
pub struct ModelArgs {
    #[arg(long, value_enum, default_value_t = OpArg::Write)]
    pub op: OpArg,

    /// Overrides the preset trial count.
    #[arg(long)]
    pub trials: Option<usize>,

    /// Concurrency assumed when turning mean latency into throughput.
    #[arg(long)]
    pub concurrency: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file with model parameter overrides.
    #[arg(long)]
    pub params: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bench() {
        let cli = Cli::parse_from([
            "quorum-bench",
            "bench",
            "--type",
            "read",
            "--timeout",
            "1500ms",
            "--proceed-unhealthy",
        ]);
        let Command::Bench(args) = cli.command else {
            panic!("expected bench");
        };
        assert_eq!(args.workload, WorkloadType::Read);
        assert_eq!(args.timeout, Some(Duration::from_millis(1500)));
        assert!(args.common.proceed_unhealthy);
        assert_eq!(args.read_pct, 80);
    }

    #[test]
    fn rejects_read_pct_over_100() {
        assert!(Cli::try_parse_from(["quorum-bench", "bench", "--read-pct", "101"]).is_err());
    }

    #[test]
    fn parses_grid() {
        let cli = Cli::parse_from([
            "quorum-bench",
            "--log",
            "debug",
            "simulate",
            "grid",
            "-n",
            "3,5",
            "--node-failure",
            "0,0.1",
            "--op",
            "read",
        ]);
        assert_eq!(cli.log, "debug");
        let Command::Simulate {
            sweep: SimulateCommand::Grid(grid),
        } = cli.command
        else {
            panic!("expected grid");
        };
        assert_eq!(grid.replicas, vec![3, 5]);
        assert!(grid.quorums.is_empty());
        assert_eq!(grid.node_failure, vec![0., 0.1]);
        assert_eq!(grid.coord_failure, vec![0.]);
        assert_eq!(grid.model.op, OpArg::Read);
    }
}
