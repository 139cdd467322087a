//! Results store against an in-memory SQLite database.

mod common;

use syncbench::adapters::sqlite::{create_migrated_test_pool, SqliteResultsRepository};
use syncbench::domain::errors::PersistenceError;
use syncbench::domain::ports::ReportSink;

async fn store() -> SqliteResultsRepository {
    SqliteResultsRepository::new(create_migrated_test_pool().await.unwrap())
}

#[tokio::test]
async fn test_identifiers_count_up_per_environment() {
    let store = store().await;

    assert_eq!(store.publish(&common::sample_report("staging")).await.unwrap(), "staging_1");
    assert_eq!(store.publish(&common::sample_report("staging")).await.unwrap(), "staging_2");
    assert_eq!(store.publish(&common::sample_report("mainnet")).await.unwrap(), "mainnet_1");
    assert_eq!(
        store.next_identifier("staging").await.unwrap(),
        ("staging_3".to_string(), 3)
    );
}

#[tokio::test]
async fn test_published_row_reads_back() {
    let store = store().await;
    let report = common::sample_report("testnet");

    let id = store.publish(&report).await.unwrap();
    assert_eq!(store.find(&id).await.unwrap(), Some(report));
    assert_eq!(store.find("testnet_9").await.unwrap(), None);
}

#[tokio::test]
async fn test_duplicate_identifier_is_rejected() {
    let store = store().await;
    let report = common::sample_report("shelley_qa");

    store.insert("shelley_qa_1", 1, &report).await.unwrap();
    let err = store.insert("shelley_qa_1", 1, &report).await.unwrap_err();
    assert!(matches!(err, PersistenceError::DuplicateIdentifier(id) if id == "shelley_qa_1"));
}

#[tokio::test]
async fn test_store_as_report_sink() {
    let store = store().await;
    store.persist(&common::sample_report("staging")).await.unwrap();
    assert!(store.find("staging_1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_publish_command_reads_report_file() {
    let dir = common::temp_dir();
    let report_path = dir.path().join("test_results.json");
    std::fs::write(
        &report_path,
        serde_json::to_string_pretty(&common::sample_report("staging")).unwrap(),
    )
    .unwrap();
    let db_path = dir.path().join("store").join("results.db");

    let first = syncbench::cli::commands::publish::publish(&report_path, &db_path).await.unwrap();
    let second = syncbench::cli::commands::publish::publish(&report_path, &db_path).await.unwrap();

    assert_eq!(first.identifier, "staging_1");
    assert_eq!(second.identifier, "staging_2");
    assert_eq!(first.total_sync_time_in_h_m_s, "1 day, 2:30:15");
}
