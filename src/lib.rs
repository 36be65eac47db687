//! # csv-sync
//!
//! Merge-and-upload engine for tabular (CSV) datasets held in a remote
//! object store: safe concurrent writes and incremental reconciliation of
//! new rows into existing remote files by primary key.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Reconciliation Orchestrator                │
//! │  • merge_csv / append_row / upload_* operations            │
//! │  • Per-destination-path serialization                      │
//! └─────────────────────────────────────────────────────────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │ Merge Engine │      │  Row Codec   │      │ Task Queues  │
//! │ sort-merge   │      │ CSV ↔ rows   │      │ upload: 5    │
//! │ new wins     │      │ auto-delim   │      │ download: 5  │
//! └──────────────┘      └──────────────┘      │ retry w/     │
//!                                             │ backoff      │
//!                                             └──────────────┘
//!                                                    │
//!                                                    ▼
//!                                          ┌──────────────────┐
//!                                          │   RemoteStore    │
//!                                          │ get/put/delete/  │
//!                                          │ list (external)  │
//!                                          └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use csv_sync::{Dataset, Row, Storage, StorageConfig, InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), csv_sync::StorageError> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let storage = Storage::new(store, StorageConfig::default());
//!
//!     let local = Dataset::from_rows(vec![Row::new(vec![
//!         ("id".into(), "1".into()),
//!         ("v".into(), "x".into()),
//!     ])]).expect("uniform rows");
//!
//!     // Creates the file, or sort-merges into it by the "id" column.
//!     storage.merge_csv(local, "/reports/daily.csv", Some("id"), false).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Deterministic merges**: both sides sorted by key, linear two-pointer
//!   merge, incoming row wins on collision; output ascending by key, which
//!   is also the canonical on-disk row order.
//! - **No partial writes**: the overwrite upload is the single
//!   state-changing step; every failure before it leaves the remote file
//!   untouched.
//! - **Bounded concurrency**: independent upload and download queues with a
//!   fixed number of worker slots, retrying rate-limit errors with
//!   exponential backoff (5 attempts, then the failure surfaces).
//! - **Guaranteed staging cleanup**: downloaded merge artifacts live in
//!   uniquely named staging files removed on success and failure alike.
//!
//! ## Modules
//!
//! - [`storage`]: the [`Storage`] orchestrator
//! - [`merge`]: the pure sort-merge reconciliation engine
//! - [`dataset`]: rows, schemas and primary-key resolution
//! - [`codec`]: CSV encoding/decoding
//! - [`queue`]: bounded, retrying task queues
//! - [`store`]: the remote object-store seam
//! - [`retry`], [`staging`], [`config`], [`metrics`]: supporting pieces

pub mod codec;
pub mod config;
pub mod dataset;
pub mod merge;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod staging;
pub mod storage;
pub mod store;

pub use codec::CodecError;
pub use config::StorageConfig;
pub use dataset::{Dataset, DatasetError, EffectiveKey, Row, Schema};
pub use merge::{merge, MergeError, MergeOptions, Side};
pub use queue::TaskQueue;
pub use retry::{retry_transient, RetryConfig, Transient};
pub use staging::StagingFile;
pub use storage::{MergeOutcome, Storage, StorageError};
pub use store::{DirPage, EntryMeta, InMemoryStore, RemoteStore, StoreError, WriteMode};
