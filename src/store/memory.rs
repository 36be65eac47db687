//! In-memory [`RemoteStore`] used by tests and examples.
//!
//! Supports fault injection: the store can be told to fail the next N
//! operations with `RateLimited`, which is how the retry path is exercised
//! without a real backend. Per-path put counts are recorded so tests can
//! assert how many writes actually reached the store.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::traits::{DirPage, EntryMeta, RemoteStore, StoreError, WriteMode};

#[derive(Default)]
pub struct InMemoryStore {
    objects: DashMap<String, Bytes>,
    dirs: DashMap<String, ()>,
    /// Content served for `save_url` calls, keyed by URL.
    staged_urls: DashMap<String, Bytes>,
    /// Number of operations that will fail with `RateLimited` before the
    /// store starts succeeding again.
    rate_limit_next: AtomicUsize,
    put_counts: DashMap<String, usize>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` store operations with `RateLimited`.
    pub fn rate_limit_next(&self, n: usize) {
        self.rate_limit_next.store(n, Ordering::SeqCst);
    }

    /// Stage content to be served when `save_url` is called with `url`.
    pub fn stage_url(&self, url: &str, bytes: impl Into<Bytes>) {
        self.staged_urls.insert(url.to_string(), bytes.into());
    }

    /// Number of successful puts recorded for `path`.
    #[must_use]
    pub fn put_count(&self, path: &str) -> usize {
        self.put_counts.get(path).map_or(0, |c| *c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check_rate_limit(&self) -> Result<(), StoreError> {
        let remaining = self.rate_limit_next.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .rate_limit_next
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StoreError::RateLimited("too_many_write_operations".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.check_rate_limit()?;
        Ok(self.objects.contains_key(path) || self.dirs.contains_key(path))
    }

    async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        self.check_rate_limit()?;
        self.objects
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn put(&self, path: &str, bytes: Bytes, mode: WriteMode) -> Result<(), StoreError> {
        self.check_rate_limit()?;
        if mode == WriteMode::Add && self.objects.contains_key(path) {
            return Err(StoreError::Fatal(format!("path already exists: {path}")));
        }
        self.objects.insert(path.to_string(), bytes);
        *self.put_counts.entry(path.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.check_rate_limit()?;
        self.objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn create_dir(&self, path: &str) -> Result<(), StoreError> {
        self.check_rate_limit()?;
        self.dirs.insert(path.to_string(), ());
        Ok(())
    }

    async fn list_dir(
        &self,
        path: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DirPage, StoreError> {
        self.check_rate_limit()?;

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut paths: Vec<(String, u64)> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| (entry.key().clone(), entry.value().len() as u64))
            .collect();
        paths.sort();

        // Cursor is the last path of the previous page.
        let start = match cursor {
            Some(last) => paths.partition_point(|(p, _)| p.as_str() <= last),
            None => 0,
        };
        let page: Vec<EntryMeta> = paths
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|(path, size)| EntryMeta { path, size })
            .collect();

        let cursor = if page.len() == limit {
            page.last().map(|entry| entry.path.clone())
        } else {
            None
        };
        Ok(DirPage { entries: page, cursor })
    }

    async fn save_url(&self, url: &str, path: &str) -> Result<(), StoreError> {
        self.check_rate_limit()?;
        let bytes = self
            .staged_urls
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::Fatal(format!("unreachable url: {url}")))?;
        self.objects.insert(path.to_string(), bytes);
        *self.put_counts.entry(path.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
