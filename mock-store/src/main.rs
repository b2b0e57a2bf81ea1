use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_store::{Behavior, MockStore};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version = "0.1", about = "In-memory quorum store for local benchmark runs")]
struct Cli {
    /// First node port; nodes listen on consecutive ports from here.
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    #[arg(short, long, default_value_t = 3)]
    nodes: u16,

    /// Mean artificial service delay in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    #[arg(long, default_value_t = 0)]
    delay_std_ms: u64,

    #[arg(long, default_value_t = 0.)]
    error_rate: f64,

    #[arg(long)]
    prometheus: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    if let Some(addr) = args.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
    }

    let store = MockStore::new().behavior(Behavior {
        delay_mean: Duration::from_millis(args.delay_ms),
        delay_std: Duration::from_millis(args.delay_std_ms),
        error_rate: args.error_rate,
    });

    let mut nodes = vec![];
    for (i, addr) in node_addrs(args.port, args.nodes)?.into_iter().enumerate() {
        let store = store.clone();
        nodes.push(tokio::spawn(async move {
            store.run(&format!("node-{}", i + 1), addr).await
        }));
    }

    tokio::spawn(tps_measure_task(store));

    for node in nodes {
        node.await??;
    }
    Ok(())
}

async fn tps_measure_task(store: MockStore) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let total = store.requests();
        println!("{} TPS", total - last);
        last = total;
    }
}

fn node_addrs(port: u16, nodes: u16) -> anyhow::Result<Vec<SocketAddr>> {
    (0..nodes)
        .map(|i| -> anyhow::Result<SocketAddr> {
            let port = port.checked_add(i).with_context(|| {
                format!("{nodes} nodes from port {port} run past port 65535")
            })?;
            Ok(([0, 0, 0, 0], port).into())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_node_ports() {
        let addrs = node_addrs(65533, 3).unwrap();
        let ports: Vec<_> = addrs.iter().map(|a| a.port()).collect();
        assert_eq!(ports, vec![65533, 65534, 65535]);

        let err = node_addrs(65534, 3).unwrap_err();
        assert!(err.to_string().contains("run past port 65535"));
    }
}
