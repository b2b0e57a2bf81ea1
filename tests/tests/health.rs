mod utils;
#[allow(unused)]
use utils::*;

use mock_store::ClusterReply;
use quorum::prelude::*;

#[tokio::test]
#[ntest::timeout(30_000)]
async fn healthy_cluster_reports_membership() -> anyhow::Result<()> {
    init();
    let (_store, endpoints) = cluster(3).await?;
    let driver = WorkloadDriver::new(DriverConfig::scale(endpoints))?;

    let health = driver.precheck().await?;
    assert_eq!(
        health,
        ClusterHealth::Healthy {
            total_nodes: Some(3),
            alive_nodes: Some(3),
        }
    );
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn unhealthy_cluster_policy() -> anyhow::Result<()> {
    init();
    let (store, endpoints) = cluster(1).await?;
    store.set_unhealthy(true);

    let strict = WorkloadDriver::new(DriverConfig::benchmark(endpoints[0].clone()))?;
    assert!(matches!(
        strict.precheck().await,
        Err(DriverError::Unhealthy(_))
    ));

    let lenient = WorkloadDriver::new(
        DriverConfig::benchmark(endpoints[0].clone()).proceed_on_unhealthy(true),
    )?;
    let health = lenient.precheck().await?;
    assert!(!health.is_healthy());
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn unreachable_cluster_is_unhealthy() -> anyhow::Result<()> {
    init();
    let driver = WorkloadDriver::new(DriverConfig::benchmark(unreachable_endpoint()?))?;
    assert!(matches!(
        driver.check_health().await,
        ClusterHealth::Unhealthy(_)
    ));
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn answering_cluster_without_membership_is_healthy() -> anyhow::Result<()> {
    init();
    let (store, endpoints) = cluster(2).await?;
    let driver = WorkloadDriver::new(DriverConfig::scale(endpoints))?;

    for reply in [ClusterReply::Garbled, ClusterReply::NoSummary] {
        store.set_cluster_reply(reply);
        let health = driver.precheck().await?;
        assert_eq!(
            health,
            ClusterHealth::Healthy {
                total_nodes: None,
                alive_nodes: None,
            },
            "{reply:?}"
        );
    }
    Ok(())
}
