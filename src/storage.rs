//! Reconciliation orchestrator.
//!
//! [`Storage`] ties the remote store, the CSV codec, the merge engine and
//! the task queues together. All remote reads go through the download queue
//! and all remote writes through the upload queue, so upload pressure cannot
//! starve downloads or vice versa.
//!
//! Merges targeting the same destination path are serialized end-to-end by a
//! per-path lock; merges on different paths proceed independently, bounded
//! only by the queues' slot counts. On any failure after the download step
//! the original remote file is left untouched — the overwrite upload is the
//! single state-changing step and only happens once the full merged dataset
//! is materialized.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::codec::{self, CodecError};
use crate::config::StorageConfig;
use crate::dataset::{Dataset, DatasetError, Row};
use crate::merge::{self, MergeError, MergeOptions};
use crate::queue::TaskQueue;
use crate::staging::StagingFile;
use crate::store::{EntryMeta, RemoteStore, StoreError, WriteMode};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("[{path}] invalid dataset: {source}")]
    Dataset {
        path: String,
        #[source]
        source: DatasetError,
    },
    #[error("[{path}] undecodable file: {source}")]
    Codec {
        path: String,
        #[source]
        source: CodecError,
    },
    #[error("[{path}] failed to merge: {source}")]
    Merge {
        path: String,
        #[source]
        source: MergeError,
    },
    #[error("staging file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("[{path}] refusing to upload an empty dataset")]
    EmptyDataset { path: String },
}

/// What a merge operation did to the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The remote file was absent (or decoded empty) and the local dataset
    /// was uploaded directly.
    Created,
    /// The local dataset was empty; the remote file was left as-is.
    Skipped,
    /// Remote and local were reconciled and the result written back.
    Merged { rows: usize },
}

/// Storage component: remote CSV datasets with safe concurrent writes.
pub struct Storage {
    store: Arc<dyn RemoteStore>,
    config: StorageConfig,
    uploads: TaskQueue,
    downloads: TaskQueue,
    /// One lock per destination path; a merge holds it end-to-end.
    path_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Storage {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, config: StorageConfig) -> Self {
        let retry = config.retry();
        Self {
            uploads: TaskQueue::new("upload", config.upload_slots, retry.clone()),
            downloads: TaskQueue::new("download", config.download_slots, retry),
            store,
            config,
            path_locks: DashMap::new(),
        }
    }

    /// Tasks waiting in or running on the upload queue.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.uploads.pending()
    }

    /// Tasks waiting in or running on the download queue.
    #[must_use]
    pub fn pending_downloads(&self) -> usize {
        self.downloads.pending()
    }

    // --- Plumbing operations (all store I/O goes through a queue) ---

    pub async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self
            .downloads
            .submit(path, || self.store.exists(path))
            .await?)
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Bytes, StorageError> {
        Ok(self.downloads.submit(path, || self.store.get(path)).await?)
    }

    pub async fn get_string(&self, path: &str) -> Result<String, StorageError> {
        let bytes = self.get_bytes(path).await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| StorageError::Codec {
            path: path.to_string(),
            source: CodecError::Malformed(e.to_string()),
        })
    }

    /// Download and decode a remote CSV file.
    pub async fn get_csv(&self, path: &str) -> Result<Dataset, StorageError> {
        let bytes = self.get_bytes(path).await?;
        codec::decode(&bytes).map_err(|source| StorageError::Codec {
            path: path.to_string(),
            source,
        })
    }

    /// Upload raw text, creating the parent folder if needed.
    pub async fn upload_text(
        &self,
        data: impl Into<Bytes>,
        destination: &str,
    ) -> Result<(), StorageError> {
        let data: Bytes = data.into();
        let size = data.len();
        self.uploads
            .submit(destination, || {
                let data = data.clone();
                async move {
                    self.ensure_parent_dir(destination).await?;
                    self.store
                        .put(destination, data, WriteMode::Overwrite)
                        .await
                }
            })
            .await?;
        crate::metrics::record_bytes_uploaded(size);
        debug!(destination, size, "uploaded text");
        Ok(())
    }

    /// Encode a dataset as CSV and upload it.
    pub async fn upload_dataset(
        &self,
        dataset: &Dataset,
        destination: &str,
    ) -> Result<(), StorageError> {
        if dataset.is_empty() {
            return Err(StorageError::EmptyDataset {
                path: destination.to_string(),
            });
        }
        let bytes = codec::encode(dataset).map_err(|source| StorageError::Codec {
            path: destination.to_string(),
            source,
        })?;
        self.upload_text(bytes, destination).await
    }

    /// Upload a local file's contents.
    pub async fn upload_file(&self, file: &Path, destination: &str) -> Result<(), StorageError> {
        let data = tokio::fs::read(file).await?;
        self.upload_text(data, destination).await
    }

    /// Ask the store to fetch an external URL into `destination`.
    ///
    /// The store's server-side fetch endpoint cannot overwrite, so any
    /// existing file at the destination is deleted first. The whole sequence
    /// runs as one download-queue task.
    #[tracing::instrument(skip(self))]
    pub async fn upload_from_url(&self, url: &str, destination: &str) -> Result<(), StorageError> {
        self.downloads
            .submit(destination, || async {
                if self.store.exists(destination).await? {
                    self.store.delete(destination).await?;
                }
                self.store.save_url(url, destination).await
            })
            .await?;
        Ok(())
    }

    /// List every entry under `path`, draining pagination cursors.
    pub async fn list_all(&self, path: &str) -> Result<Vec<EntryMeta>, StorageError> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .downloads
                .submit(path, || {
                    self.store
                        .list_dir(path, cursor.as_deref(), self.config.list_page_size)
                })
                .await?;
            entries.extend(page.entries);
            match page.cursor {
                Some(next) => {
                    info!(path, loaded = entries.len(), "loading more entries...");
                    cursor = Some(next);
                }
                None => return Ok(entries),
            }
        }
    }

    // --- Reconciliation ---

    /// Merge a local dataset into the remote CSV file at `remote_path`.
    ///
    /// State machine:
    /// - local empty → no-op;
    /// - remote absent → direct upload of the local dataset;
    /// - remote decodes empty → direct upload of the local dataset;
    /// - both non-empty → download to a staging file, decode, sort-merge
    ///   (incoming wins on key collision), encode, overwrite upload.
    ///
    /// Merges for one destination path run end-to-end before the next one
    /// targeting the same path starts.
    #[tracing::instrument(skip(self, local), fields(rows = local.len()))]
    pub async fn merge_csv(
        &self,
        local: Dataset,
        remote_path: &str,
        primary_key: Option<&str>,
        dedupe_incoming: bool,
    ) -> Result<MergeOutcome, StorageError> {
        let lock = self
            .path_locks
            .entry(remote_path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if local.is_empty() {
            crate::metrics::record_merge("skipped");
            return Ok(MergeOutcome::Skipped);
        }

        if !self.exists(remote_path).await? {
            self.upload_dataset(&local, remote_path).await?;
            info!(remote_path, rows = local.len(), "created remote file");
            crate::metrics::record_merge("created");
            return Ok(MergeOutcome::Created);
        }

        // Download the current remote content to a staging file before
        // decoding; the staging file is removed on every exit path.
        let staging = StagingFile::create(&self.config.staging_dir);
        let bytes = self.get_bytes(remote_path).await?;
        staging.write(&bytes).await?;

        let existing =
            codec::decode(&staging.read().await?).map_err(|source| StorageError::Codec {
                path: remote_path.to_string(),
                source,
            })?;

        if existing.is_empty() {
            self.upload_dataset(&local, remote_path).await?;
            info!(remote_path, rows = local.len(), "replaced empty remote file");
            crate::metrics::record_merge("created");
            return Ok(MergeOutcome::Created);
        }

        let options = MergeOptions {
            primary_key: primary_key.map(str::to_string),
            dedupe_incoming,
        };
        let merged =
            merge::merge(existing, local, &options).map_err(|source| StorageError::Merge {
                path: remote_path.to_string(),
                source,
            })?;
        let rows = merged.len();

        // The one state-changing step. Everything before this point left the
        // remote file untouched.
        self.upload_dataset(&merged, remote_path).await?;

        info!(remote_path, rows, "merged remote file");
        crate::metrics::record_merge("merged");
        Ok(MergeOutcome::Merged { rows })
    }

    /// Read and decode a local CSV file, then merge it into `remote_path`.
    pub async fn merge_csv_file(
        &self,
        local_file: &Path,
        remote_path: &str,
        primary_key: Option<&str>,
        dedupe_incoming: bool,
    ) -> Result<MergeOutcome, StorageError> {
        let bytes = tokio::fs::read(local_file).await?;
        let local = codec::decode(&bytes).map_err(|source| StorageError::Codec {
            path: local_file.display().to_string(),
            source,
        })?;
        self.merge_csv(local, remote_path, primary_key, dedupe_incoming)
            .await
    }

    /// Append one row to a remote CSV file: a degenerate merge with a
    /// one-row incoming dataset. Fails with a schema mismatch when the row's
    /// field set differs from the existing file's.
    #[tracing::instrument(skip(self, row))]
    pub async fn append_row(
        &self,
        row: Row,
        remote_path: &str,
        primary_key: Option<&str>,
    ) -> Result<MergeOutcome, StorageError> {
        let local = Dataset::from_rows(vec![row]).map_err(|source| StorageError::Dataset {
            path: remote_path.to_string(),
            source,
        })?;
        self.merge_csv(local, remote_path, primary_key, false).await
    }

    /// Create the destination's parent folder unless it already exists or
    /// the destination sits at the root. Runs inside upload tasks so a
    /// retried upload re-checks the folder.
    async fn ensure_parent_dir(&self, destination: &str) -> Result<(), StoreError> {
        let Some(parent) = parent_dir(destination) else {
            return Ok(());
        };
        if self.store.exists(&parent).await? {
            return Ok(());
        }
        self.store.create_dir(&parent).await
    }
}

/// Parent folder of a `/`-separated path; `None` at the root.
fn parent_dir(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        None
    } else {
        Some(trimmed[..idx].to_string())
    }
}
