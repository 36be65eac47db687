//! Staging files for downloaded remote content.
//!
//! A [`StagingFile`] is a uniquely named temporary artifact under the
//! configured staging directory. Names carry a random identifier so that
//! concurrent merges never collide. The file is removed when the guard is
//! dropped, on success and failure paths alike.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    /// Reserve a unique path under `dir`. The file itself is created on the
    /// first write.
    #[must_use]
    pub fn create(dir: &Path) -> Self {
        let path = dir.join(format!("csv-sync-{}.csv", Uuid::new_v4()));
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(&self.path, bytes).await
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if std::fs::remove_file(&self.path).is_ok() {
            debug!(path = %self.path.display(), "removed staging file");
        }
    }
}
