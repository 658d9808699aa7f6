//! In-memory store for testing.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{Error, Result, crontab::Crontab, store::CrontabStore};

/// Crontab held in memory. No persistence, for tests and dry runs.
///
/// Counts loads and persists so callers can assert that a rejected job never
/// reached the store.
#[derive(Default)]
pub struct InMemoryStore {
    crontab: Mutex<Crontab>,
    loads: AtomicUsize,
    persists: AtomicUsize,
    fail_persist: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing crontab text.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        Self {
            crontab: Mutex::new(Crontab::parse(text)),
            ..Self::default()
        }
    }

    /// The current content.
    #[must_use]
    pub fn snapshot(&self) -> Crontab {
        self.crontab
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    /// Make every following `persist` fail with a store-access error.
    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }
}

impl CrontabStore for InMemoryStore {
    fn load(&self) -> Result<Crontab> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    fn persist(&self, crontab: &Crontab) -> Result<()> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(Error::store_access("persist in-memory crontab", "persist disabled"));
        }
        let mut current = self.crontab.lock().unwrap_or_else(|e| e.into_inner());
        *current = crontab.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory crontab".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::entry::CrontabEntry};

    #[test]
    fn persist_replaces_content() {
        let store = InMemoryStore::with_text("MAILTO=root\n");
        let mut crontab = store.load().unwrap();
        crontab.add(CrontabEntry::from_expression("@hourly", "/opt/a.sh").unwrap());
        store.persist(&crontab).unwrap();

        assert_eq!(store.snapshot().render(), "MAILTO=root\n0 * * * * /opt/a.sh\n");
        assert_eq!(store.load_count(), 1);
        assert_eq!(store.persist_count(), 1);
    }

    #[test]
    fn failing_persist_leaves_content() {
        let store = InMemoryStore::with_text("* * * * * /opt/a.sh\n");
        store.set_fail_persist(true);
        let err = store.persist(&Crontab::new()).unwrap_err();
        assert!(err.is_store_access());
        assert_eq!(store.snapshot().len(), 1);

        store.set_fail_persist(false);
        store.persist(&Crontab::new()).unwrap();
        assert!(store.snapshot().is_empty());
    }
}
