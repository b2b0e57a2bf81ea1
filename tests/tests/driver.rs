mod utils;
#[allow(unused)]
use utils::*;

use mock_store::Behavior;
use quorum::prelude::*;
use quorum::core::SampleError;
use quorum::generator::indexed_key;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn write_then_read_returns_written_values() -> anyhow::Result<()> {
    init();
    let (_store, endpoints) = cluster(1).await?;
    let mut driver = WorkloadDriver::new(DriverConfig::benchmark(endpoints[0].clone()).seed(1))?;
    let mut gen = SampleGenerator::seeded(1);

    let pairs = gen.indexed_pairs(200);
    let writes = driver.run_write_phase(pairs.clone()).await;
    assert_eq!(writes.samples.len(), 200);
    assert_eq!(writes.success_count(), 200);

    let keys = pairs.iter().map(|(key, _)| key.clone()).collect();
    let reads = driver.run_read_phase(keys).await;
    let result = reads.aggregate()?;
    assert_eq!(result.count, 200);
    assert_eq!(result.success_rate, 1.0);
    assert!(result.p50 <= result.p99);

    for (key, value) in pairs.iter().take(20) {
        let record = driver.fetch(key).await?.expect("written key is readable");
        assert_eq!(&record.value, value);
        assert!(record.vector_clock.is_object());
    }
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn sequential_updates_advance_the_clock() -> anyhow::Result<()> {
    init();
    let (_store, endpoints) = cluster(1).await?;
    let mut driver = WorkloadDriver::new(DriverConfig::benchmark(endpoints[0].clone()))?;

    assert!(driver.put("k1", "v1").await.success);
    let record = driver.fetch("k1").await?.expect("k1 was written");
    assert_eq!(record.value, "v1");
    assert!(!record.vector_clock.is_null());

    for value in ["v2", "v3"] {
        assert!(driver.put("k1", value).await.success);
    }
    let record = driver.fetch("k1").await?.expect("k1 was written");
    assert_eq!(record.value, "v3");
    assert_eq!(record.vector_clock["node-1"], 3);
    assert!(record.conflicts.is_none());

    assert!(driver.fetch("never-written").await?.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(30_000)]
async fn concurrent_coordinators_leave_conflicts() -> anyhow::Result<()> {
    init();
    let (_store, endpoints) = cluster(3).await?;
    let driver = WorkloadDriver::new(DriverConfig::scale(endpoints).seed(3))?;

    let values = vec!["concurrent_val_A".to_string(), "concurrent_val_B".to_string()];
    let samples = driver.write_from_each("test_key_concurrent", &values).await;
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.success));

    let record = driver
        .fetch("test_key_concurrent")
        .await?
        .expect("key was written");
    assert!(values.contains(&record.value));
    assert_eq!(record.conflicts.map(|c| c.len()), Some(1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn unreachable_cluster_still_yields_samples() -> anyhow::Result<()> {
    init();
    let config = DriverConfig::benchmark(unreachable_endpoint()?)
        .request_timeout(Duration::from_millis(500))
        .concurrency(4);
    let mut driver = WorkloadDriver::new(config)?;
    let mut gen = SampleGenerator::seeded(9);

    let report = driver.run_write_phase(gen.random_pairs(20)).await;
    assert_eq!(report.samples.len(), 20);
    assert_eq!(report.success_count(), 0);
    assert!(report
        .samples
        .iter()
        .all(|s| matches!(s.error, Some(SampleError::Transport { .. }))));

    let result = report.aggregate()?;
    assert_eq!(result.success_rate, 0.0);
    assert_eq!(result.count, 20);
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn status_failures_are_protocol_errors() -> anyhow::Result<()> {
    init();
    let (store, endpoints) = cluster(1).await?;
    let mut driver = WorkloadDriver::new(DriverConfig::benchmark(endpoints[0].clone()))?;

    let report = driver.run_read_phase(vec!["missing".to_string()]).await;
    assert_eq!(
        report.samples[0].error,
        Some(SampleError::Protocol { status: 404 })
    );

    store.set_behavior(Behavior {
        error_rate: 1.0,
        ..Default::default()
    });
    let sample = driver.put("k", "v").await;
    assert!(!sample.success);
    assert_eq!(sample.error, Some(SampleError::Protocol { status: 500 }));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(60_000)]
async fn scale_run_spreads_over_nodes() -> anyhow::Result<()> {
    init();
    let (store, endpoints) = cluster(4).await?;
    let mut driver = WorkloadDriver::new(DriverConfig::scale(endpoints).seed(11))?;
    let mut gen = SampleGenerator::seeded(11).value_len(32);

    let writes = driver.run_write_phase(gen.indexed_pairs(400)).await;
    assert_eq!(writes.success_count(), 400);
    assert_eq!(store.len(), 400);

    let keys = (0..400).map(indexed_key).collect();
    let reads = driver.run_read_phase(keys).await;
    assert_eq!(reads.success_count(), 400);
    assert_eq!(store.requests(), 800);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn read_benchmark_reads_prepared_keys() -> anyhow::Result<()> {
    init();
    let (_store, endpoints) = cluster(1).await?;
    let mut driver = WorkloadDriver::new(DriverConfig::benchmark(endpoints[0].clone()))?;
    let mut gen = SampleGenerator::seeded(5);

    let keys = driver.prepare_reads(&mut gen, 50).await;
    assert_eq!(keys.len(), 50);

    let reads = driver.run_read_phase(keys).await;
    assert_eq!(reads.kind, OpKind::Read);
    assert_eq!(reads.success_count(), 50);
    Ok(())
}
