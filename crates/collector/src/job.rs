//! Data-collection jobs that register themselves in the crontab.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    autocron_cron::{
        JobIdentity, JobOptions, Registrar, Registration, ScheduleInput, ScheduledTask,
        job::canonical_script,
        schedule::{collector_annotation, now},
    },
    sqlx::SqlitePool,
    tracing::info,
};

use crate::{
    Error, Result,
    api::ApiClient,
    log::LogSink,
    schema::{SchemaReport, bootstrap_schema},
};

/// Handles a collector works with. Passed to every collection run.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    pub api: ApiClient,
    pub db: SqlitePool,
    pub log: LogSink,
}

/// Fetches data from the API and stores it in the database.
#[async_trait]
pub trait DataCollector: Send + Sync {
    async fn collect(&self, ctx: &CollectorContext) -> Result<()>;

    /// Name recorded in the crontab annotation and mixed into the
    /// fingerprint.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Builder for [`CollectorJob`]. Every option except the interpreter is
/// required.
#[derive(Debug, Default)]
pub struct CollectorJobBuilder {
    identifier: String,
    script: Option<PathBuf>,
    schema: Option<PathBuf>,
    log: Option<PathBuf>,
    schedule: Option<ScheduleInput>,
    interpreter: Option<String>,
    api: Option<ApiClient>,
    database: Option<SqlitePool>,
}

impl CollectorJobBuilder {
    #[must_use]
    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema = Some(path.into());
        self
    }

    #[must_use]
    pub fn log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log = Some(path.into());
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: impl Into<ScheduleInput>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    #[must_use]
    pub fn interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    #[must_use]
    pub fn api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    #[must_use]
    pub fn database(mut self, db: SqlitePool) -> Self {
        self.database = Some(db);
        self
    }

    /// Validate every option, load the schema, then register the job.
    ///
    /// Nothing touches the crontab until all options have been validated.
    pub async fn build<C: DataCollector>(
        self,
        collector: C,
        registrar: &Registrar,
    ) -> Result<CollectorJob<C>> {
        let api = self
            .api
            .ok_or_else(|| Error::validation("expected an API client, received none"))?;
        let db = self
            .database
            .ok_or_else(|| Error::validation("expected a database connection, received none"))?;
        let script = self
            .script
            .ok_or_else(|| Error::validation("script path is required"))?;
        let script = canonical_script(&script)?;
        let schema = self
            .schema
            .as_deref()
            .ok_or_else(|| Error::validation("schema path is required"))
            .and_then(existing_schema)?;
        let log_path = self
            .log
            .ok_or_else(|| Error::validation("log path is required"))?;
        let timing = self
            .schedule
            .ok_or_else(|| Error::validation("schedule is required"))?;
        let log = LogSink::open(&log_path)?;

        let owner = collector.name();
        let options = JobOptions {
            identifier: self.identifier,
            script_path: script,
            schedule: timing,
            interpreter: self.interpreter,
        };
        let salts = [
            schema.display().to_string(),
            log.path().display().to_string(),
        ];
        let prepared = options.prepare_with(&owner, &salts, |_, fingerprint| {
            collector_annotation(&owner, fingerprint, &now())
        })?;
        // The crontab is persisted last, once the schema is in place.
        let schema_report = bootstrap_schema(&db, &schema, &log).await?;
        let (identity, registration) = prepared.register(registrar).await?;
        info!(
            fingerprint = %identity.fingerprint(),
            statements = schema_report.executed,
            failed = schema_report.failures.len(),
            "collector ready"
        );

        Ok(CollectorJob {
            collector,
            context: CollectorContext { api, db, log },
            identity,
            registration,
            schema_report,
        })
    }
}

fn existing_schema(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(Error::validation(format!(
            "SQL schema file '{}' does not exist",
            path.display()
        )));
    }
    Ok(path.canonicalize()?)
}

/// A registered collector together with the handles it runs with.
pub struct CollectorJob<C> {
    collector: C,
    context: CollectorContext,
    identity: JobIdentity,
    registration: Registration,
    schema_report: SchemaReport,
}

impl CollectorJob<()> {
    #[must_use]
    pub fn builder(identifier: impl Into<String>) -> CollectorJobBuilder {
        CollectorJobBuilder {
            identifier: identifier.into(),
            ..CollectorJobBuilder::default()
        }
    }
}

impl<C: DataCollector> CollectorJob<C> {
    #[must_use]
    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    #[must_use]
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    #[must_use]
    pub fn schema_report(&self) -> &SchemaReport {
        &self.schema_report
    }

    #[must_use]
    pub fn context(&self) -> &CollectorContext {
        &self.context
    }

    #[must_use]
    pub fn collector(&self) -> &C {
        &self.collector
    }
}

#[async_trait]
impl<C: DataCollector> ScheduledTask for CollectorJob<C> {
    /// One collection run. Failures go to the log sink.
    async fn run(&self) {
        let log = &self.context.log;
        log.log(&format!("collection started (Job ID {})", self.identity.fingerprint()));
        match self.collector.collect(&self.context).await {
            Ok(()) => log.log("collection finished"),
            Err(e) => log.error(&format!("collection failed: {e}")),
        }
    }

    fn owner(&self) -> Cow<'static, str> {
        self.collector.name()
    }
}
