//! Idempotent self-registration of recurring jobs into a crontab.
//!
//! A job derives a stable [`Fingerprint`] from its identifier and salts,
//! embeds it in its crontab annotation, and on every registration either
//! refreshes the entry carrying that fingerprint or appends a new one.
//! Unrelated crontab content is never touched.

pub mod crontab;
pub mod entry;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod lock;
pub mod registrar;
pub mod schedule;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod store_system;

pub use {
    crontab::Crontab,
    entry::CrontabEntry,
    error::{Error, Result},
    fingerprint::{Fingerprint, JobIdentity, fingerprint},
    job::{AutoCrontabJob, JobOptions, PreparedJob, ScheduledTask},
    registrar::{
        DuplicatePolicy, MergePolicy, Outcome, Registrar, Registration, RegistrationPolicy,
    },
    schedule::ScheduleInput,
    store::CrontabStore,
    store_file::FileStore,
    store_memory::InMemoryStore,
    store_system::SystemCrontab,
};
