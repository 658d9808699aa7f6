//! Advisory lock around a crontab transaction.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use {fd_lock::RwLock, tracing::debug};

use crate::{Error, Result};

/// Exclusive advisory lock on a lock file, held for one transaction.
///
/// Every process that edits the same crontab through this crate takes the
/// same lock, so two concurrent load-modify-persist cycles cannot overwrite
/// each other's changes.
#[derive(Debug, Clone)]
pub struct TransactionLock {
    path: PathBuf,
}

impl TransactionLock {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` while holding the lock. Blocks until the lock is available.
    pub fn run<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::store_access(format!("create lock dir {}", parent.display()), e)
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|e| {
                Error::store_access(format!("open lock file {}", self.path.display()), e)
            })?;

        let mut lock = RwLock::new(file);
        let _guard = lock
            .write()
            .map_err(|e| Error::store_access(format!("lock {}", self.path.display()), e))?;
        debug!(lock = %self.path.display(), "acquired crontab lock");
        f()
    }
}
