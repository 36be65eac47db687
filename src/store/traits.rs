use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::retry::Transient;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("rate limited by remote store: {0}")]
    RateLimited(String),
    #[error("remote store error: {0}")]
    Fatal(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Write behavior when the destination path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace any existing content.
    Overwrite,
    /// Fail with `Fatal` when the path already exists.
    Add,
}

/// Metadata for one entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub path: String,
    pub size: u64,
}

/// One page of a paginated directory listing.
#[derive(Debug, Clone)]
pub struct DirPage {
    pub entries: Vec<EntryMeta>,
    /// Continuation cursor; `None` means the listing is complete.
    pub cursor: Option<String>,
}

/// Byte-level remote object store, keyed by `/`-separated paths.
///
/// Implementations map onto a concrete backend (Dropbox, S3, a local
/// directory, ...). All operations may fail with [`StoreError::RateLimited`],
/// which callers are expected to retry.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;
    async fn get(&self, path: &str) -> Result<Bytes, StoreError>;
    async fn put(&self, path: &str, bytes: Bytes, mode: WriteMode) -> Result<(), StoreError>;
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
    async fn create_dir(&self, path: &str) -> Result<(), StoreError>;

    /// List one page of entries under `path`. Pass the previous page's
    /// cursor to continue.
    async fn list_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DirPage, StoreError>;

    /// Ask the store to fetch an external URL into `path` itself.
    /// Backends without a server-side fetch endpoint reject this.
    async fn save_url(&self, url: &str, path: &str) -> Result<(), StoreError> {
        let _ = path;
        Err(StoreError::Fatal(format!(
            "store does not support server-side fetch of {url}"
        )))
    }
}
