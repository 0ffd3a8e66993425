//! Tests for shelfwatch-rdbc bulk writer

use chrono::NaiveDate;
use parking_lot::Mutex;
use shelfwatch_rdbc::prelude::*;
use shelfwatch_rdbc::testing::MockConnectionFactory;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn store(factory: &MockConnectionFactory) -> AnalyticsStore {
    let config = StoreConfig::new(ConnectionConfig::new("mock", "tester"))
        .with_retry(RetryPolicy::bounded(3, Duration::ZERO));
    AnalyticsStore::new(config, Arc::new(factory.clone())).unwrap()
}

fn fill_record(store_id: i64, fill_pct: impl Into<Value>) -> Record {
    let ts = NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    Record::new()
        .with("store_id", store_id)
        .with("ts", ts)
        .with("fill_pct", fill_pct)
}

fn fill_batch(records: impl IntoIterator<Item = Record>) -> Batch {
    Batch::new("shelf_fill_events", ["store_id", "ts", "fill_pct"], ["store_id", "ts"])
        .with_records(records)
}

type Seen = Arc<Mutex<Vec<Vec<Value>>>>;

/// Records the parameters of every data statement
fn capture(factory: MockConnectionFactory) -> (MockConnectionFactory, Seen) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let factory = factory.on_execute(move |_, params| {
        sink.lock().push(params.to_vec());
        Ok(1)
    });
    (factory, seen)
}

#[tokio::test]
async fn test_zero_fill_is_written_as_null() {
    let (factory, seen) = capture(MockConnectionFactory::new());
    let store = store(&factory);

    store
        .write(WriteMode::Insert, &fill_batch([fill_record(7, 0.0)]))
        .await
        .unwrap();

    let params = seen.lock();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0][0], Value::Int64(7));
    assert_eq!(params[0][2], Value::Null);
}

#[tokio::test]
async fn test_null_markers_are_written_as_null() {
    let (factory, seen) = capture(MockConnectionFactory::new());
    let store = store(&factory);

    let markers = ["", "nan", "<NA>", "NaT", "NaN", "None"];
    let batch = Batch::new("store_entrances", ["id_store", "url"], Vec::<String>::new())
        .with_records(
            markers
                .iter()
                .map(|m| Record::new().with("id_store", 3).with("url", *m)),
        );
    store.write(WriteMode::Insert, &batch).await.unwrap();

    let params = seen.lock();
    assert_eq!(params.len(), markers.len());
    assert!(params.iter().all(|row| row[1] == Value::Null));
}

#[tokio::test]
async fn test_caller_batch_is_left_untouched() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);
    let batch = fill_batch([fill_record(7, 0.0)]);
    let before = batch.clone();

    store.write(WriteMode::Upsert, &batch).await.unwrap();
    assert_eq!(batch, before);
}

#[tokio::test]
async fn test_batch_runs_in_one_transaction() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);

    let result = store
        .write(
            WriteMode::Upsert,
            &fill_batch([fill_record(7, 42.5), fill_record(8, 55.0), fill_record(9, 1.0)]),
        )
        .await
        .unwrap();

    assert_eq!(result.mode, WriteMode::Upsert);
    assert_eq!(result.records, 3);
    assert_eq!(result.rows_affected, 3);

    let statements = factory.statements();
    assert_eq!(statements.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(statements.last().map(String::as_str), Some("COMMIT"));
    assert_eq!(factory.data_statements().len(), 3);
    assert!(factory.data_statements()[0].contains("ON CONFLICT"));
}

#[tokio::test]
async fn test_empty_batch_touches_nothing() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);

    let result = store.write(WriteMode::Upsert, &fill_batch([])).await.unwrap();

    assert_eq!(result.records, 0);
    assert!(!result.inserted());
    assert_eq!(factory.connect_attempts(), 0);
    assert!(factory.statements().is_empty());
}

#[tokio::test]
async fn test_invalid_batch_is_rejected_before_connecting() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);

    let batch = Batch::new("shelf_fill_events", ["store_id", "fill_pct"], ["ts"])
        .with_records([Record::new().with("store_id", 7).with("fill_pct", 1.0)]);
    let err = store.write(WriteMode::Upsert, &batch).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::InvalidBatch);
    assert_eq!(factory.connect_attempts(), 0);
}

#[tokio::test]
async fn test_insert_if_absent_reports_new_keys() {
    let keys = Arc::new(Mutex::new(HashSet::new()));
    let known = Arc::clone(&keys);
    let factory = MockConnectionFactory::new().on_execute(move |sql, params| {
        assert!(sql.contains("NOT EXISTS"));
        let key = format!("{:?}/{:?}", params[0], params[1]);
        Ok(u64::from(known.lock().insert(key)))
    });
    let store = store(&factory);

    let first = store
        .write(WriteMode::InsertIfAbsent, &fill_batch([fill_record(7, 42.5)]))
        .await
        .unwrap();
    let second = store
        .write(WriteMode::InsertIfAbsent, &fill_batch([fill_record(7, 99.0)]))
        .await
        .unwrap();

    assert!(first.inserted());
    assert!(!second.inserted());
    assert_eq!(keys.lock().len(), 1);
}

#[tokio::test]
async fn test_update_then_insert() {
    let factory = MockConnectionFactory::new().on_execute(|sql, _| {
        if sql.starts_with("UPDATE") {
            Ok(0)
        } else {
            Ok(1)
        }
    });
    let store = store(&factory);

    let (update, insert) = store
        .update_then_insert(&fill_batch([fill_record(7, 42.5), fill_record(8, 10.0)]))
        .await
        .unwrap();

    assert_eq!(update.mode, WriteMode::UpdateOnly);
    assert_eq!(update.rows_affected, 0);
    assert_eq!(insert.mode, WriteMode::InsertIfAbsent);
    assert_eq!(insert.rows_affected, 2);

    let data = factory.data_statements();
    assert_eq!(data.len(), 4);
    assert!(data[0].starts_with("UPDATE") && data[1].starts_with("UPDATE"));
    assert!(data[2].starts_with("INSERT") && data[3].starts_with("INSERT"));
    assert_eq!(factory.commits(), 1);
}

#[tokio::test]
async fn test_caller_transaction_is_not_committed_by_writer() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);

    let tx = store.begin_transaction().await.unwrap();
    store
        .write_in(&tx, WriteMode::Upsert, &fill_batch([fill_record(7, 42.5)]))
        .await
        .unwrap();
    store
        .write_in(&tx, WriteMode::Insert, &fill_batch([fill_record(8, 55.0)]))
        .await
        .unwrap();
    assert_eq!(factory.commits(), 0);

    tx.commit().await.unwrap();
    assert_eq!(factory.commits(), 1);
    assert_eq!(
        factory.statements().iter().filter(|s| *s == "BEGIN").count(),
        1
    );
}

#[tokio::test]
async fn test_abandoned_transaction_rolls_back() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);

    {
        let tx = store.begin_transaction().await.unwrap();
        store
            .write_in(&tx, WriteMode::Insert, &fill_batch([fill_record(7, 1.0)]))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(factory.rollbacks(), 1);
    assert_eq!(factory.commits(), 0);
}

#[tokio::test]
async fn test_writer_stats() {
    let factory = MockConnectionFactory::new();
    let store = store(&factory);

    store
        .write(WriteMode::Insert, &fill_batch([fill_record(7, 1.0), fill_record(8, 2.0)]))
        .await
        .unwrap();

    let stats = store.writer_stats();
    assert_eq!(stats.batches_written, 1);
    assert_eq!(stats.records_written, 2);
    assert_eq!(stats.rows_affected, 2);
    assert_eq!(stats.batches_failed, 0);
}

#[tokio::test]
async fn test_concurrent_writers_share_one_pool() {
    let factory = MockConnectionFactory::new();
    let config = StoreConfig::new(ConnectionConfig::new("mock", "tester"))
        .with_pool(
            PoolConfig::new(ConnectionConfig::new("mock", "tester"))
                .with_max_size(2)
                .with_max_overflow(0),
        )
        .with_retry(RetryPolicy::bounded(3, Duration::ZERO));
    let store = AnalyticsStore::new(config, Arc::new(factory.clone())).unwrap();

    let writes = (1..=8).map(|i| {
        let store = store.clone();
        async move {
            store
                .write(WriteMode::Upsert, &fill_batch([fill_record(i, 10.0)]))
                .await
        }
    });
    let results = futures::future::join_all(writes).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(factory.connects() <= 2);
    assert_eq!(factory.commits(), 8);
}
