//! Idempotent registration of a job into a crontab store.
//!
//! A registration is one load → search → merge-or-insert → persist
//! transaction. It runs on a blocking thread, serialized in-process by a
//! mutex and across processes by the store's advisory lock.

use std::sync::{Arc, Mutex};

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    crontab::{Crontab, CrontabLine},
    entry::CrontabEntry,
    fingerprint::{Fingerprint, JobIdentity},
    lock::TransactionLock,
    store::CrontabStore,
};

/// What an update to an existing entry may overwrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Only the five timing fields are refreshed; the command stays as found.
    #[default]
    TimingOnly,
    /// Timing fields and the command are refreshed.
    TimingAndCommand,
}

/// What happens to further entries carrying the same fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Only the first match is updated, the rest are left in place.
    #[default]
    Keep,
    /// Every match after the first is removed.
    Prune,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationPolicy {
    pub merge: MergePolicy,
    pub duplicates: DuplicatePolicy,
}

/// How the crontab changed for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No entry carried the fingerprint; the desired entry was appended.
    Inserted,
    /// The first matching entry was refreshed in place.
    Updated {
        schedule_changed: bool,
        command_changed: bool,
    },
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub fingerprint: Fingerprint,
    pub outcome: Outcome,
    /// Matching entries beyond the first one.
    pub duplicates_found: usize,
    pub duplicates_removed: usize,
}

impl Registration {
    #[must_use]
    pub fn inserted(&self) -> bool {
        self.outcome == Outcome::Inserted
    }
}

/// Merge `desired` into `crontab` for `fingerprint`. Pure; the caller
/// persists the result.
pub fn apply(
    crontab: &mut Crontab,
    fingerprint: &Fingerprint,
    desired: &CrontabEntry,
    policy: RegistrationPolicy,
) -> Result<Registration> {
    let pattern = fingerprint.pattern()?;
    let matches = crontab.matching_lines(&pattern);

    let Some((&first, duplicates)) = matches.split_first() else {
        crontab.add(desired.clone());
        return Ok(Registration {
            fingerprint: fingerprint.clone(),
            outcome: Outcome::Inserted,
            duplicates_found: 0,
            duplicates_removed: 0,
        });
    };

    let (schedule_changed, command_changed) = match crontab.lines().get(first) {
        Some(CrontabLine::Entry { entry, .. }) => (
            !entry.same_schedule(desired),
            policy.merge == MergePolicy::TimingAndCommand && entry.command != desired.command,
        ),
        _ => (false, false),
    };
    if schedule_changed || command_changed {
        if let Some(existing) = crontab.entry_mut(first) {
            existing.copy_schedule_from(desired);
            if command_changed {
                existing.command.clone_from(&desired.command);
            }
        }
    }

    let duplicates_removed = match policy.duplicates {
        DuplicatePolicy::Prune if !duplicates.is_empty() => {
            crontab.remove_lines(duplicates);
            duplicates.len()
        },
        _ => 0,
    };
    if duplicates_removed == 0 && !duplicates.is_empty() {
        warn!(
            fingerprint = %fingerprint,
            count = duplicates.len(),
            "duplicate crontab entries left in place"
        );
    }

    Ok(Registration {
        fingerprint: fingerprint.clone(),
        outcome: Outcome::Updated {
            schedule_changed,
            command_changed,
        },
        duplicates_found: duplicates.len(),
        duplicates_removed,
    })
}

/// Registers jobs into one crontab store.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn CrontabStore>,
    policy: RegistrationPolicy,
    guard: Arc<Mutex<()>>,
}

impl Registrar {
    pub fn new(store: Arc<dyn CrontabStore>) -> Self {
        Self {
            store,
            policy: RegistrationPolicy::default(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RegistrationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CrontabStore> {
        &self.store
    }

    /// Run `f` against the store with both locks held.
    async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CrontabStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let guard = Arc::clone(&self.guard);
        tokio::task::spawn_blocking(move || {
            let _held = guard.lock().unwrap_or_else(|e| e.into_inner());
            match store.lock_path() {
                Some(path) => TransactionLock::at(path).run(|| f(store.as_ref())),
                None => f(store.as_ref()),
            }
        })
        .await?
    }

    /// Insert or refresh the entry for `identity`.
    ///
    /// The store is only persisted after the merge succeeded. A failed load
    /// or persist is returned as an error and nothing counts as registered.
    pub async fn register(
        &self,
        identity: &JobIdentity,
        desired: CrontabEntry,
    ) -> Result<Registration> {
        desired.validate()?;
        let fingerprint = identity.fingerprint().clone();
        let policy = self.policy;

        let registration = self
            .transaction(move |store| {
                let mut crontab = store.load()?;
                debug!(store = %store.describe(), entries = crontab.len(), "loaded crontab");
                let registration = apply(&mut crontab, &fingerprint, &desired, policy)?;
                store.persist(&crontab)?;
                Ok(registration)
            })
            .await?;

        match registration.outcome {
            Outcome::Inserted => info!(
                identifier = identity.identifier(),
                fingerprint = %registration.fingerprint,
                store = %self.store.describe(),
                "crontab entry added"
            ),
            Outcome::Updated {
                schedule_changed,
                command_changed,
            } => info!(
                identifier = identity.identifier(),
                fingerprint = %registration.fingerprint,
                store = %self.store.describe(),
                schedule_changed,
                command_changed,
                "crontab entry refreshed"
            ),
        }
        Ok(registration)
    }

    /// Remove every entry carrying the fingerprint of `identity`. Returns
    /// how many entries were removed.
    pub async fn unregister(&self, identity: &JobIdentity) -> Result<usize> {
        self.unregister_fingerprint(identity.fingerprint()).await
    }

    /// Remove every entry carrying `fingerprint`.
    pub async fn unregister_fingerprint(&self, fingerprint: &Fingerprint) -> Result<usize> {
        let pattern = fingerprint.pattern()?;
        let removed = self
            .transaction(move |store| {
                let mut crontab = store.load()?;
                let removed = crontab.remove_matching(&pattern);
                if removed > 0 {
                    store.persist(&crontab)?;
                }
                Ok(removed)
            })
            .await?;
        info!(fingerprint = %fingerprint, removed, "crontab entries removed");
        Ok(removed)
    }

    /// Entries carrying the fingerprint of `identity`, in file order.
    pub async fn find(&self, identity: &JobIdentity) -> Result<Vec<CrontabEntry>> {
        let pattern = identity.fingerprint().pattern()?;
        self.transaction(move |store| {
            let crontab = store.load()?;
            Ok(crontab
                .find_by_regex(&pattern)
                .into_iter()
                .cloned()
                .collect())
        })
        .await
    }

    /// The whole crontab as currently stored.
    pub async fn snapshot(&self) -> Result<Crontab> {
        self.transaction(|store| store.load()).await
    }
}
