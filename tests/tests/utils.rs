use mock_store::MockStore;
use quorum::core::ClusterEndpoint;
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("quorum=debug,mock_store=debug,axum::rejection=trace")
            .try_init();
    });
}

/// Start `nodes` mock nodes sharing one store, named `node-1..`.
#[allow(unused)]
pub async fn cluster(nodes: usize) -> anyhow::Result<(MockStore, Vec<ClusterEndpoint>)> {
    let store = MockStore::new();
    let mut endpoints = Vec::with_capacity(nodes);
    for i in 0..nodes {
        let addr = store.spawn(&format!("node-{}", i + 1)).await?;
        endpoints.push(ClusterEndpoint::new(addr.ip().to_string(), addr.port()));
    }
    Ok((store, endpoints))
}

/// An endpoint nothing listens on.
#[allow(unused)]
pub fn unreachable_endpoint() -> anyhow::Result<ClusterEndpoint> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(ClusterEndpoint::new("127.0.0.1", port))
}
