//! File Store
//!
//! Durable store backed by one file per logical name inside a data directory.
//! Writes go to a temp file that is synced and renamed over the target.

use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ports::storage::{DurableStore, StoreError};

/// Directory-backed durable store
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a logical name
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Unused `<name>.<tag>-<unix millis>` path, with a counter on collision
    fn aside_path(&self, name: &str, tag: &str) -> PathBuf {
        let stem = format!("{}.{}-{}", name, tag, Utc::now().timestamp_millis());
        let mut target = self.dir.join(&stem);
        let mut n = 1;
        while target.exists() {
            target = self.dir.join(format!("{}-{}", stem, n));
            n += 1;
        }
        target
    }
}

impl DurableStore for FileStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)
            .map_err(|e| StoreError::ReadError(format!("{}: {}", path.display(), e)))?;

        if bytes.is_empty() {
            return Ok(None);
        }

        tracing::debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Ok(Some(bytes))
    }

    fn persist(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::DirectoryError(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.path_for(name);
        let temp_path = path.with_extension("tmp");
        let write_err = |e: std::io::Error| {
            let _ = fs::remove_file(&temp_path);
            StoreError::WriteError(format!("{}: {}", path.display(), e))
        };

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(bytes).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        fs::rename(&temp_path, &path).map_err(write_err)?;

        tracing::debug!("Persisted {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn quarantine(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(());
        }

        let target = self.aside_path(name, "corrupt");
        fs::rename(&path, &target)
            .map_err(|e| StoreError::QuarantineError(format!("{}: {}", path.display(), e)))?;

        tracing::warn!("Moved unreadable {} to {}", path.display(), target.display());
        Ok(())
    }

    fn backup(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(());
        }

        let target = self.aside_path(name, "backup");
        fs::copy(&path, &target)
            .map_err(|e| StoreError::BackupError(format!("{}: {}", path.display(), e)))?;

        tracing::warn!("Copied {} to {}", path.display(), target.display());
        Ok(())
    }
}
