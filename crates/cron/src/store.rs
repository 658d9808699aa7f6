//! Persistence trait for crontabs.

use std::path::PathBuf;

use crate::{Result, crontab::Crontab};

/// Where a crontab lives.
///
/// Stores are loaded fresh for every registration and never cached. They
/// are shared with other programs, so a store must round-trip lines it does
/// not understand.
pub trait CrontabStore: Send + Sync {
    /// Read the whole crontab. A store that does not exist yet loads empty.
    fn load(&self) -> Result<Crontab>;

    /// Replace the stored crontab with `crontab`.
    fn persist(&self, crontab: &Crontab) -> Result<()>;

    /// File used to serialize load-modify-persist cycles across processes.
    /// `None` when the store needs no cross-process lock.
    fn lock_path(&self) -> Option<PathBuf> {
        None
    }

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}
