//! End-to-end tests for the SQLite load and query pipelines.

mod common;

use common::TestFixture;
use futures::TryStreamExt;
use spillway::config::{LoadArgs, QueryArgs};
use spillway::pipeline::{run_load, run_query};
use spillway::storage::{
    prepare_database, InsertBuilder, JsonRecord, PageQuery, ReaderPool, SqliteExecutor,
    StoredRecord,
};
use spillway::upstream::StreamPublisher;
use spillway::writer::{BatchType, BatchWriter, WriterConfig};
use tokio::sync::watch;
use tokio_test::assert_ok;

fn load_args(table: &str, input: &std::path::Path) -> LoadArgs {
    LoadArgs {
        table: table.to_string(),
        input: input.display().to_string(),
        batch_size: 5,
        concurrent_requests: 2,
        batch_type: BatchType::Logged,
        flush_interval_ms: None,
    }
}

fn query_args(table: &str) -> QueryArgs {
    QueryArgs {
        table: table.to_string(),
        page_size: 4,
        limit: None,
    }
}

fn json_lines(n: usize) -> String {
    (0..n)
        .map(|i| format!(r#"{{"id":"evt-{i:03}","seq":{i}}}"#))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_load_then_query_round_trip() {
    let fixture = TestFixture::new();
    // Blank lines in the input are skipped.
    let input = fixture.write_input("events.jsonl", &format!("{}\n\n  \n", json_lines(23)));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let summary = assert_ok!(run_load(&fixture.db_path, &load_args("events", &input), shutdown_rx).await);
    assert_eq!(summary.records, 23);
    assert_eq!(summary.batches, 5);

    let mut out = Vec::new();
    let rows = assert_ok!(run_query(&fixture.db_path, &query_args("events"), &mut out).await);
    assert_eq!(rows, 23);

    let mut lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 23);
    // Concurrent batches may commit out of order.
    lines.sort_by_key(|row| row["id"].as_str().unwrap_or_default().to_string());
    for (i, row) in lines.iter().enumerate() {
        assert_eq!(row["id"], format!("evt-{i:03}"));
        assert_eq!(row["body"]["seq"], i);
        assert!(row["ingested_at"].as_i64().unwrap() > 0);
    }
}

#[tokio::test]
async fn test_query_respects_limit() {
    let fixture = TestFixture::new();
    let input = fixture.write_input("events.jsonl", &json_lines(10));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    assert_ok!(run_load(&fixture.db_path, &load_args("events", &input), shutdown_rx).await);

    let mut args = query_args("events");
    args.limit = Some(3);
    let mut out = Vec::new();
    let rows = assert_ok!(run_query(&fixture.db_path, &args, &mut out).await);

    assert_eq!(rows, 3);
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn test_malformed_line_fails_the_load() {
    let fixture = TestFixture::new();
    let input = fixture.write_input(
        "events.jsonl",
        &format!("{}\nthis is not json\n{}", json_lines(3), json_lines(3)),
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let err = run_load(&fixture.db_path, &load_args("events", &input), shutdown_rx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid JSON record"), "{err}");
}

#[tokio::test]
async fn test_shutdown_before_start_ends_input_immediately() {
    let fixture = TestFixture::new();
    let input = fixture.write_input("events.jsonl", &json_lines(10));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let summary = assert_ok!(run_load(&fixture.db_path, &load_args("events", &input), shutdown_rx).await);
    assert_eq!(summary.records, 0);

    let pool = ReaderPool::new(&fixture.db_path, 1).unwrap();
    assert_eq!(pool.count_rows("events").unwrap(), 0);
}

#[tokio::test]
async fn test_missing_input_file_is_an_error() {
    let fixture = TestFixture::new();
    let missing = fixture.temp_dir.path().join("missing.jsonl");
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let result = run_load(&fixture.db_path, &load_args("events", &missing), shutdown_rx).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_writer_with_sqlite_executor_and_paged_reader() {
    let fixture = TestFixture::new();
    prepare_database(&fixture.db_path, "orders").unwrap();

    let records: Vec<JsonRecord> = (0..42)
        .map(|i| JsonRecord::parse(&format!(r#"{{"id":{i},"total":{}}}"#, i * 10)).unwrap())
        .collect();
    let executor = SqliteExecutor::open(&fixture.db_path, 3).unwrap();
    let config = WriterConfig::default()
        .with_batch_size(8)
        .with_concurrent_requests(3)
        .with_batch_type(BatchType::Unlogged);

    let handle = BatchWriter::new(InsertBuilder::new("orders").unwrap(), executor, config)
        .write_stream(StreamPublisher::from_records(records))
        .unwrap();
    let summary = assert_ok!(handle.join().await);
    assert_eq!(summary.batches, 6);

    let pool = ReaderPool::new(&fixture.db_path, 2).unwrap();
    let query = PageQuery::new("orders", &StoredRecord::COLUMNS)
        .unwrap()
        .with_page_size(10);
    let rows: Vec<StoredRecord> = pool.stream_rows(&query).try_collect().await.unwrap();

    assert_eq!(rows.len(), 42);
    let mut totals: Vec<i64> = rows
        .iter()
        .map(|r| r.body["total"].as_i64().unwrap())
        .collect();
    totals.sort_unstable();
    assert_eq!(totals, (0..42).map(|i| i * 10).collect::<Vec<i64>>());
}
