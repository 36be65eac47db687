//! Configuration for the storage component.
//!
//! # Example
//!
//! ```
//! use csv_sync::StorageConfig;
//!
//! // Minimal config (uses defaults)
//! let config = StorageConfig::default();
//! assert_eq!(config.upload_slots, 5);
//! assert_eq!(config.download_slots, 5);
//!
//! // Full config
//! let config = StorageConfig {
//!     upload_slots: 2,
//!     retry_max_attempts: 3,
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryConfig;

/// Configuration for [`Storage`](crate::Storage).
///
/// All fields have sensible defaults matching the remote store's documented
/// concurrency limits.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Concurrent upload worker slots
    #[serde(default = "default_upload_slots")]
    pub upload_slots: usize,

    /// Concurrent download worker slots
    #[serde(default = "default_download_slots")]
    pub download_slots: usize,

    /// Retry bound per store operation (attempts, not retries)
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    /// Backoff settings
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub retry_factor: f64,

    /// Directory for staging files (downloaded merge artifacts)
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Page size for directory listings
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

fn default_upload_slots() -> usize { 5 }
fn default_download_slots() -> usize { 5 }
fn default_retry_max_attempts() -> usize { 5 }
fn default_retry_initial_ms() -> u64 { 200 }
fn default_retry_max_ms() -> u64 { 5000 }
fn default_retry_factor() -> f64 { 2.0 }
fn default_staging_dir() -> PathBuf { std::env::temp_dir() }
fn default_list_page_size() -> usize { 2000 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_slots: default_upload_slots(),
            download_slots: default_download_slots(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_factor: default_retry_factor(),
            staging_dir: default_staging_dir(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl StorageConfig {
    /// Retry policy derived from the configured bounds.
    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
            factor: self.retry_factor,
        }
    }
}
