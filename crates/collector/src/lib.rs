//! Scheduled data collection from a REST API into SQLite.
//!
//! A [`CollectorJob`] validates its handles and paths, registers its own
//! crontab entry, loads its schema, and on every scheduled run calls the
//! [`DataCollector`] with a [`CollectorContext`].

pub mod api;
pub mod error;
pub mod job;
pub mod log;
pub mod schema;

pub use {
    api::ApiClient,
    error::{Error, Result},
    job::{CollectorContext, CollectorJob, CollectorJobBuilder, DataCollector},
    log::LogSink,
    schema::{SchemaReport, StatementFailure, bootstrap_schema},
};
