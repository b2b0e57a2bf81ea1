mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{BenchArgs, Cli, Command, ModelArgs, ScaleArgs, SimulateCommand, WorkloadType};
use metrics_exporter_prometheus::PrometheusBuilder;
use quorum::driver::PhaseReport;
use quorum::generator::indexed_key;
use quorum::prelude::*;
use quorum::sweep::QuorumSelection;
use quorum_core::AggregateResult;
use rand::{rngs::SmallRng, SeedableRng};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Serialize, Default)]
struct LiveOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    write: Option<AggregateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    read: Option<AggregateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    combined: Option<AggregateResult>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_env_filter(cli.log.as_str())
        .init();

    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing the Prometheus exporter")?;
    }

    match cli.command {
        Command::Bench(args) => bench(args).await,
        Command::Scale(args) => scale(args).await,
        Command::Simulate { sweep } => simulate(sweep),
    }
}

async fn bench(args: BenchArgs) -> anyhow::Result<()> {
    let endpoint = ClusterEndpoint::new(&args.host, args.port);
    let mut config = DriverConfig::benchmark(endpoint)
        .concurrency(args.workers)
        .proceed_on_unhealthy(args.common.proceed_unhealthy);
    if let Some(timeout) = args.timeout {
        config = config.request_timeout(timeout);
    }
    if let Some(tps) = args.tps {
        config = config.tps_limit(tps);
    }
    if let Some(seed) = args.common.seed {
        config = config.seed(seed);
    }

    let mut driver = WorkloadDriver::new(config)?;
    driver.precheck().await?;

    let mut gen = generator(args.common.seed)
        .key_len(args.key_size)
        .value_len(args.value_size);

    let output = match args.workload {
        WorkloadType::Write => {
            let report = driver
                .run_write_phase(gen.random_pairs(args.operations))
                .await;
            LiveOutput {
                write: summarize(&report),
                ..Default::default()
            }
        }
        WorkloadType::Read => {
            let keys = driver.prepare_reads(&mut gen, args.operations).await;
            let report = driver.run_read_phase(keys).await;
            LiveOutput {
                read: summarize(&report),
                ..Default::default()
            }
        }
        WorkloadType::Mixed => {
            let report = driver
                .run_mixed(&mut gen, args.operations, args.read_pct)
                .await?;
            let combined = match report.combined() {
                Ok(result) => {
                    info!("Combined: {result}");
                    Some(result)
                }
                Err(err) => {
                    warn!("Combined: {err}");
                    None
                }
            };
            LiveOutput {
                write: summarize(&report.writes),
                read: summarize(&report.reads),
                combined,
            }
        }
    };

    write_output(args.common.output.as_deref(), &output)
}

async fn scale(args: ScaleArgs) -> anyhow::Result<()> {
    let endpoints = ClusterEndpoint::port_range(&args.host, args.base_port, args.nodes)?;
    info!(
        "Targeting {} nodes on ports {}..{}",
        endpoints.len(),
        args.base_port,
        args.base_port as u32 + args.nodes as u32
    );

    let mut config = DriverConfig::scale(endpoints)
        .concurrency(args.workers)
        .proceed_on_unhealthy(args.common.proceed_unhealthy);
    if let Some(timeout) = args.timeout {
        config = config.request_timeout(timeout);
    }
    if let Some(seed) = args.common.seed {
        config = config.seed(seed);
    }

    let mut driver = WorkloadDriver::new(config)?;
    driver.precheck().await?;

    let mut gen = generator(args.common.seed).value_len(args.value_size);
    let writes = driver.run_write_phase(gen.indexed_pairs(args.keys)).await;
    let keys = (0..args.keys as u64).map(indexed_key).collect();
    let reads = driver.run_read_phase(keys).await;

    let output = LiveOutput {
        write: summarize(&writes),
        read: summarize(&reads),
        combined: None,
    };
    write_output(args.common.output.as_deref(), &output)
}

fn simulate(command: SimulateCommand) -> anyhow::Result<()> {
    let (plans, model_args, keys) = match command {
        SimulateCommand::MillionKeys { keys, model } => {
            (SweepPlan::million_keys(model.op.into()), model, keys)
        }
        SimulateCommand::FailureImpact { replicas, model } => (
            vec![SweepPlan::failure_impact(replicas, model.op.into())],
            model,
            None,
        ),
        SimulateCommand::Grid(grid) => {
            let quorums = if grid.quorums.is_empty() {
                QuorumSelection::All
            } else {
                QuorumSelection::Fixed(grid.quorums)
            };
            let plan = SweepPlan::new(&grid.replicas, grid.model.op.into())
                .quorums(quorums)
                .node_failure_rates(&grid.node_failure)
                .coord_failure_rates(&grid.coord_failure)
                .network_mean_ms(grid.network_mean);
            (vec![plan], grid.model, None)
        }
    };

    let plans: Vec<_> = plans
        .into_iter()
        .map(|plan| apply_overrides(plan, &model_args))
        .collect();
    let model = LatencyModel::new(load_params(model_args.params.as_deref())?)?;
    let mut rng = match model_args.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let cells = SweepPlan::chain(&plans, &model, &mut rng)?;
    for cell in &cells {
        let result = &cell.result;
        print!(
            "{:<40} mean {:>8.2} ms  p99 {:>8.2} ms  {:>10.0} ops/s",
            cell.config.to_string(),
            result.mean_latency_ms,
            result.p99,
            result.throughput_ops_per_sec
        );
        match keys {
            Some(keys) => println!(
                "  {keys} keys in {}",
                humantime::format_duration(std::time::Duration::from_secs_f64(
                    cell.estimated_completion_secs(keys).min(u32::MAX as f64)
                ))
            ),
            None => println!(),
        }
    }

    write_output(model_args.output.as_deref(), &cells)
}

fn apply_overrides(mut plan: SweepPlan, args: &ModelArgs) -> SweepPlan {
    if let Some(trials) = args.trials {
        plan = plan.trials(trials);
    }
    if let Some(concurrency) = args.concurrency {
        plan = plan.assumed_concurrency(concurrency);
    }
    plan
}

fn load_params(path: Option<&Path>) -> anyhow::Result<ModelParams> {
    let Some(path) = path else {
        return Ok(ModelParams::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading model parameters from {}", path.display()))?;
    let params = serde_json::from_str(&raw)
        .with_context(|| format!("parsing model parameters in {}", path.display()))?;
    Ok(params)
}

fn generator(seed: Option<u64>) -> SampleGenerator {
    match seed {
        Some(seed) => SampleGenerator::seeded(seed),
        None => SampleGenerator::from_entropy(),
    }
}

fn summarize(report: &PhaseReport) -> Option<AggregateResult> {
    match report.aggregate() {
        Ok(result) => {
            info!("{}: {result}", report.kind);
            Some(result)
        }
        Err(err) => {
            warn!("{}: {err}", report.kind);
            None
        }
    }
}

fn write_output<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    info!("Results written to {}", path.display());
    Ok(())
}
