//! End-to-end tests for the merge-and-upload path.
//!
//! All scenarios run against the in-memory store, which supports rate-limit
//! fault injection and records per-path put counts, so the retry and
//! no-partial-write guarantees can be asserted without a real backend.
//!
//! # Test Organization
//! - `happy_*` - normal operation: create, merge, append, idempotence
//! - `failure_*` - failure scenarios: schema conflicts, rate limiting,
//!   exhausted retries

use std::sync::Arc;

use csv_sync::{
    Dataset, InMemoryStore, MergeOutcome, RemoteStore, Row, Storage, StorageConfig, StorageError,
    StoreError,
};

fn row(pairs: &[(&str, &str)]) -> Row {
    Row::new(
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect(),
    )
}

fn dataset(rows: &[&[(&str, &str)]]) -> Dataset {
    Dataset::from_rows(rows.iter().map(|r| row(r)).collect()).expect("uniform rows")
}

fn test_config(staging: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        retry_initial_ms: 1,
        retry_max_ms: 5,
        staging_dir: staging.path().to_path_buf(),
        ..Default::default()
    }
}

fn setup() -> (Arc<InMemoryStore>, Storage, tempfile::TempDir) {
    let staging = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(InMemoryStore::new());
    let storage = Storage::new(store.clone(), test_config(&staging));
    (store, storage, staging)
}

fn staging_is_empty(staging: &tempfile::TempDir) -> bool {
    std::fs::read_dir(staging.path())
        .map(|entries| entries.count() == 0)
        .unwrap_or(false)
}

// =============================================================================
// Happy paths
// =============================================================================

#[tokio::test]
async fn happy_absent_remote_is_created_by_direct_upload() {
    let (_store, storage, staging) = setup();
    let local = dataset(&[&[("id", "1"), ("v", "x")]]);

    let outcome = storage
        .merge_csv(local.clone(), "/data/file.csv", Some("id"), false)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Created);

    let remote = storage.get_csv("/data/file.csv").await.unwrap();
    assert_eq!(remote, local);
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn happy_merge_overlapping_datasets() {
    let (_store, storage, staging) = setup();

    let remote = dataset(&[&[("id", "1"), ("v", "a")], &[("id", "2"), ("v", "b")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();

    let local = dataset(&[&[("id", "2"), ("v", "B")], &[("id", "3"), ("v", "c")]]);
    let outcome = storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { rows: 3 });

    let merged = storage.get_csv("/file.csv").await.unwrap();
    let rows: Vec<(&str, &str)> = merged
        .rows()
        .iter()
        .map(|r| (r.get("id").unwrap(), r.get("v").unwrap()))
        .collect();
    assert_eq!(rows, [("1", "a"), ("2", "B"), ("3", "c")]);
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn happy_empty_local_is_a_noop() {
    let (store, storage, _staging) = setup();
    let remote = dataset(&[&[("id", "1"), ("v", "a")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();
    let puts_before = store.put_count("/file.csv");

    let outcome = storage
        .merge_csv(Dataset::default(), "/file.csv", Some("id"), false)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Skipped);
    assert_eq!(store.put_count("/file.csv"), puts_before);
}

#[tokio::test]
async fn happy_empty_remote_is_replaced() {
    let (_store, storage, _staging) = setup();
    storage.upload_text("\n", "/file.csv").await.unwrap();

    let local = dataset(&[&[("id", "1"), ("v", "x")]]);
    let outcome = storage
        .merge_csv(local.clone(), "/file.csv", Some("id"), false)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Created);
    assert_eq!(storage.get_csv("/file.csv").await.unwrap(), local);
}

#[tokio::test]
async fn happy_repeated_merge_is_idempotent() {
    let (_store, storage, _staging) = setup();
    let local = dataset(&[&[("id", "2"), ("v", "b")], &[("id", "1"), ("v", "a")]]);

    storage
        .merge_csv(local.clone(), "/file.csv", Some("id"), false)
        .await
        .unwrap();
    let first = storage.get_bytes("/file.csv").await.unwrap();

    storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap();
    let second = storage.get_bytes("/file.csv").await.unwrap();

    // Byte-stable: same rows, same canonical order.
    assert_eq!(first, second);
}

#[tokio::test]
async fn happy_append_row() {
    let (_store, storage, _staging) = setup();
    let remote = dataset(&[&[("id", "1"), ("v", "a")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();

    storage
        .append_row(row(&[("id", "2"), ("v", "b")]), "/file.csv", Some("id"))
        .await
        .unwrap();

    let merged = storage.get_csv("/file.csv").await.unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.rows()[1].get("id"), Some("2"));
}

#[tokio::test]
async fn happy_merge_local_file_from_disk() {
    let (_store, storage, staging) = setup();
    let local_file = staging.path().join("local.csv");
    std::fs::write(&local_file, "id;v\n1;x\n").unwrap();

    let outcome = storage
        .merge_csv_file(&local_file, "/file.csv", Some("id"), false)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Created);

    let remote = storage.get_csv("/file.csv").await.unwrap();
    assert_eq!(remote.rows()[0].get("v"), Some("x"));
}

#[tokio::test]
async fn happy_merge_with_dedupe_incoming() {
    let (_store, storage, _staging) = setup();
    let remote = dataset(&[&[("id", "1"), ("v", "a")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();

    let local = dataset(&[
        &[("id", "2"), ("v", "first")],
        &[("id", "2"), ("v", "second")],
    ]);
    storage
        .merge_csv(local, "/file.csv", Some("id"), true)
        .await
        .unwrap();

    let merged = storage.get_csv("/file.csv").await.unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.rows()[1].get("v"), Some("first"));
}

#[tokio::test]
async fn happy_concurrent_merges_on_distinct_paths() {
    let (_store, storage, _staging) = setup();
    let storage = Arc::new(storage);

    let mut handles = Vec::new();
    for i in 0..8 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = i.to_string();
            let local = Dataset::from_rows(vec![row(&[("id", id.as_str()), ("v", "x")])]).unwrap();
            storage
                .merge_csv(local, &format!("/out/file-{i}.csv"), Some("id"), false)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), MergeOutcome::Created);
    }

    let entries = storage.list_all("/out").await.unwrap();
    assert_eq!(entries.len(), 8);
}

#[tokio::test]
async fn happy_concurrent_merges_on_same_path_lose_no_update() {
    let (_store, storage, _staging) = setup();

    let seed = dataset(&[&[("id", "0"), ("v", "seed")]]);
    storage.upload_dataset(&seed, "/file.csv").await.unwrap();

    let storage = Arc::new(storage);
    let mut handles = Vec::new();
    for i in 1..=6 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = i.to_string();
            let local = Dataset::from_rows(vec![row(&[("id", id.as_str()), ("v", "x")])]).unwrap();
            storage
                .merge_csv(local, "/file.csv", Some("id"), false)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every concurrent merge took effect: seed row plus one row per task.
    let merged = storage.get_csv("/file.csv").await.unwrap();
    assert_eq!(merged.len(), 7);
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[tokio::test]
async fn failure_schema_mismatch_leaves_remote_untouched() {
    let (store, storage, staging) = setup();
    let remote = dataset(&[&[("id", "1"), ("v", "a")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();
    let original = store.get("/file.csv").await.unwrap();
    let puts_before = store.put_count("/file.csv");

    let local = dataset(&[&[("id", "2"), ("w", "b")]]);
    let err = storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap_err();
    match err {
        StorageError::Merge { path, .. } => assert_eq!(path, "/file.csv"),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.get("/file.csv").await.unwrap(), original);
    assert_eq!(store.put_count("/file.csv"), puts_before);
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn failure_duplicate_key_aborts_before_any_write() {
    let (store, storage, _staging) = setup();
    let remote = dataset(&[&[("id", "1"), ("v", "a")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();
    let puts_before = store.put_count("/file.csv");

    let local = dataset(&[&[("id", "2"), ("v", "b")], &[("id", "2"), ("v", "c")]]);
    let err = storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Merge { .. }));
    assert_eq!(store.put_count("/file.csv"), puts_before);
}

#[tokio::test]
async fn failure_malformed_remote_file() {
    let (_store, storage, staging) = setup();
    storage
        .upload_text("id,v\n1\n", "/file.csv") // ragged row
        .await
        .unwrap();

    let local = dataset(&[&[("id", "2"), ("v", "b")]]);
    let err = storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Codec { .. }));
    assert!(staging_is_empty(&staging));
}

#[tokio::test]
async fn failure_rate_limits_are_retried_until_success() {
    let (store, storage, _staging) = setup();
    // Two transient failures, then the store recovers.
    store.rate_limit_next(2);

    let local = dataset(&[&[("id", "1"), ("v", "x")]]);
    let outcome = storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Created);
    assert!(store.exists("/file.csv").await.unwrap());
}

#[tokio::test]
async fn failure_exhausted_retries_surface_the_error() {
    let (store, storage, _staging) = setup();
    // More consecutive failures than the 5-attempt budget of any single task.
    store.rate_limit_next(50);

    let local = dataset(&[&[("id", "1"), ("v", "x")]]);
    let err = storage
        .merge_csv(local, "/file.csv", Some("id"), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Store(StoreError::RateLimited(_))
    ));
}

#[tokio::test]
async fn failure_append_row_schema_mismatch() {
    let (_store, storage, _staging) = setup();
    let remote = dataset(&[&[("id", "1"), ("v", "a")]]);
    storage.upload_dataset(&remote, "/file.csv").await.unwrap();

    let err = storage
        .append_row(row(&[("id", "2"), ("other", "b")]), "/file.csv", Some("id"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Merge { .. }));
}
