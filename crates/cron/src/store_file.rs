//! Crontab-format text file store with atomic writes.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{Error, Result, crontab::Crontab, store::CrontabStore};

/// A crontab kept in a plain file, e.g. a file under `/etc/cron.d` or a
/// staging copy that is installed by other means.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic write: write to temp, keep the old file as `.bak`, rename the
    /// temp file over the target.
    fn atomic_write(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::store_access(format!("create {}", parent.display()), e)
                })?;
            }
        }

        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, text.as_bytes())
            .map_err(|e| Error::store_access(format!("write {}", tmp.display()), e))?;

        if self.path.exists() {
            let bak = sibling(&self.path, ".bak");
            if let Err(e) = fs::copy(&self.path, &bak) {
                debug!(path = %bak.display(), error = %e, "could not keep crontab backup");
            }
        }

        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::store_access(format!("replace {}", self.path.display()), e)
        })
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("crontab"));
    name.push(suffix);
    path.with_file_name(name)
}

impl CrontabStore for FileStore {
    fn load(&self) -> Result<Crontab> {
        if !self.path.exists() {
            return Ok(Crontab::new());
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|e| Error::store_access(format!("read {}", self.path.display()), e))?;
        Ok(Crontab::parse(&text))
    }

    fn persist(&self, crontab: &Crontab) -> Result<()> {
        self.atomic_write(&crontab.render())
    }

    fn lock_path(&self) -> Option<PathBuf> {
        Some(sibling(&self.path, ".lock"))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::entry::CrontabEntry, tempfile::TempDir};

    fn entry(expr: &str, command: &str) -> CrontabEntry {
        CrontabEntry::from_expression(expr, command).unwrap()
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("crontab"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn persist_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("crontab"));

        let mut crontab = Crontab::new();
        crontab.add(entry("*/5 * * * *", "/opt/a.sh"));
        crontab.add(entry("0 1 * * *", "/opt/b.sh"));
        store.persist(&crontab).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "*/5 * * * * /opt/a.sh\n0 1 * * * /opt/b.sh\n"
        );
    }

    #[test]
    fn persist_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("a").join("b").join("crontab"));
        store.persist(&Crontab::new()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn backup_created_on_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("crontab"));
        fs::write(store.path(), "MAILTO=root\n").unwrap();

        let mut crontab = store.load().unwrap();
        crontab.add(entry("0 * * * *", "/opt/c.sh"));
        store.persist(&crontab).unwrap();

        let bak = tmp.path().join("crontab.bak");
        assert_eq!(fs::read_to_string(bak).unwrap(), "MAILTO=root\n");
        assert!(!tmp.path().join("crontab.tmp").exists());
    }

    #[test]
    fn unrelated_content_survives_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("crontab"));
        let text = "# managed by ops\nPATH=/usr/bin:/bin\n\n@reboot /opt/warm.sh\n15 * * * * /opt/x\n";
        fs::write(store.path(), text).unwrap();

        store.persist(&store.load().unwrap()).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), text);
    }

    #[test]
    fn lock_path_is_next_to_file() {
        let store = FileStore::new("/var/spool/app/crontab");
        assert_eq!(
            store.lock_path(),
            Some(PathBuf::from("/var/spool/app/crontab.lock"))
        );
        assert!(store.describe().contains("/var/spool/app/crontab"));
    }

    #[test]
    fn unreadable_path_is_store_access_error() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be.
        let dir = tmp.path().join("crontab");
        fs::create_dir(&dir).unwrap();
        let store = FileStore::new(&dir);
        assert!(store.load().unwrap_err().is_store_access());
        assert!(store.persist(&Crontab::new()).unwrap_err().is_store_access());
    }
}
