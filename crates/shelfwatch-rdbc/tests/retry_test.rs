//! Tests for the resilient executor's retry behavior

use shelfwatch_rdbc::prelude::*;
use shelfwatch_rdbc::testing::MockConnectionFactory;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn store(factory: &MockConnectionFactory, retry: RetryPolicy) -> AnalyticsStore {
    let config = StoreConfig::new(ConnectionConfig::new("mock", "tester"))
        .with_pool(
            PoolConfig::new(ConnectionConfig::new("mock", "tester"))
                .with_max_size(4)
                .with_acquire_timeout(Duration::from_millis(50)),
        )
        .with_retry(retry);
    AnalyticsStore::new(config, Arc::new(factory.clone())).unwrap()
}

fn quick(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::bounded(max_attempts, Duration::ZERO)
}

fn fill_batch() -> Batch {
    Batch::new("shelf_fill_events", ["store_id", "fill_pct"], ["store_id"])
        .with_records([Record::new().with("store_id", 7).with("fill_pct", 42.5)])
}

#[tokio::test]
async fn test_recovers_after_connect_failures() {
    let factory = MockConnectionFactory::new().fail_connects(3);
    let store = store(&factory, quick(10));

    let result = store.write(WriteMode::Upsert, &fill_batch()).await.unwrap();

    assert_eq!(factory.connect_attempts(), 4);
    // every connection-loss failure replaced the pool
    assert_eq!(store.manager().generation(), 4);
    assert_eq!(factory.commits(), 1);

    let clean = MockConnectionFactory::new();
    let expected = store_for_clean(&clean).await;
    assert_eq!(result.rows_affected, expected.rows_affected);
    assert_eq!(result.records, expected.records);
}

async fn store_for_clean(factory: &MockConnectionFactory) -> WriteResult {
    store(factory, quick(1))
        .write(WriteMode::Upsert, &fill_batch())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_recovers_after_statement_failures() {
    let factory = MockConnectionFactory::new().fail_executes(2);
    let store = store(&factory, quick(10));

    store.write(WriteMode::Insert, &fill_batch()).await.unwrap();

    assert_eq!(factory.rollbacks(), 2);
    assert_eq!(factory.commits(), 1);
    assert_eq!(factory.data_statements().len(), 3);
}

#[tokio::test]
async fn test_bounded_policy_returns_last_error() {
    let factory = MockConnectionFactory::new().fail_connects(10);
    let store = store(&factory, quick(3));

    let err = store.execute("SELECT 1", &[]).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(factory.connect_attempts(), 3);
}

#[tokio::test]
async fn test_integrity_failure_is_not_retried() {
    let factory = MockConnectionFactory::new().violate_constraint("shelf_fill_events_pkey");
    let store = store(&factory, quick(10));

    let err = store
        .write(WriteMode::Insert, &fill_batch())
        .await
        .unwrap_err();

    assert!(err.is_integrity());
    assert_eq!(factory.data_statements().len(), 1);
    assert_eq!(factory.rollbacks(), 1);
    assert_eq!(factory.commits(), 0);
    assert_eq!(store.writer_stats().batches_failed, 1);
}

#[tokio::test]
async fn test_timeout_is_retried_without_rebuild() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let factory = MockConnectionFactory::new().on_execute(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(Error::timeout("canceling statement due to statement timeout"))
        } else {
            Ok(1)
        }
    });
    let store = store(&factory, quick(5));

    assert_eq!(store.execute("UPDATE t SET x = 1", &[]).await.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.manager().generation(), 1);
}

#[tokio::test]
async fn test_absent_pool_is_rebuilt() {
    let factory = MockConnectionFactory::new().fail_connects(2);
    let config = StoreConfig::new(ConnectionConfig::new("mock", "tester"))
        .with_pool(PoolConfig::new(ConnectionConfig::new("mock", "tester")).with_min_size(1))
        .with_retry(quick(5));
    let store = AnalyticsStore::new(config, Arc::new(factory.clone())).unwrap();

    assert_eq!(store.execute("SELECT 1", &[]).await.unwrap(), 1);
    assert_eq!(factory.connect_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_default_policy_waits_fixed_interval() {
    let factory = MockConnectionFactory::new().fail_connects(2);
    let store = store(&factory, RetryPolicy::default());

    let start = tokio::time::Instant::now();
    store.execute("SELECT 1", &[]).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(120));
    assert!(start.elapsed() < Duration::from_secs(180));
}

#[tokio::test]
async fn test_transaction_work_is_not_retried() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory, quick(10));

    let tx = store.begin_transaction().await.unwrap();
    factory.set_execute_failures(1);

    let err = store
        .write_in(&tx, WriteMode::Upsert, &fill_batch())
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(factory.data_statements().len(), 1);

    tx.rollback().await.unwrap();
    assert_eq!(factory.commits(), 0);
}
