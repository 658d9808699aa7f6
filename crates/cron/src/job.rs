//! Self-registering jobs.
//!
//! A job is registered once per deployment (or on every start, which is
//! idempotent) and executed later, in a separate process, whenever the OS
//! scheduler fires its command.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    entry::CrontabEntry,
    fingerprint::{Fingerprint, JobIdentity, validate_identifier},
    registrar::{Registrar, Registration},
    schedule::{self, ScheduleInput},
};

/// Work executed when the OS scheduler fires. Outcomes are reported through
/// whatever sink the task was built with, never through a return value.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self);

    /// Name recorded in the crontab annotation and mixed into the
    /// fingerprint.
    fn owner(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Construction-time options shared by every self-registering job.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub identifier: String,
    pub script_path: PathBuf,
    pub schedule: ScheduleInput,
    /// Program that runs the script, e.g. `/usr/bin/python3`. `None` runs
    /// the script directly.
    pub interpreter: Option<String>,
}

impl JobOptions {
    pub fn new(
        identifier: impl Into<String>,
        script_path: impl Into<PathBuf>,
        schedule: impl Into<ScheduleInput>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            script_path: script_path.into(),
            schedule: schedule.into(),
            interpreter: None,
        }
    }

    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Validate the options and build the job's identity and entry, using
    /// the plain job annotation. No store is touched.
    pub fn prepare(&self, owner: &str, extra_salts: &[String]) -> Result<PreparedJob> {
        self.prepare_with(owner, extra_salts, |script, fingerprint| {
            schedule::job_annotation(script, owner, fingerprint, &schedule::now())
        })
    }

    /// Like [`JobOptions::prepare`], with a caller-chosen annotation.
    ///
    /// Salts are `extra_salts`, then the canonical script path, then `owner`.
    pub fn prepare_with(
        &self,
        owner: &str,
        extra_salts: &[String],
        annotate: impl FnOnce(&Path, &Fingerprint) -> String,
    ) -> Result<PreparedJob> {
        validate_identifier(&self.identifier)?;
        let script = canonical_script(&self.script_path)?;
        if self.interpreter.as_deref().is_some_and(|i| i.contains('%')) {
            return Err(Error::validation("interpreter must not contain '%'"));
        }

        let mut salts = extra_salts.to_vec();
        salts.push(script.display().to_string());
        salts.push(owner.to_string());
        let identity = JobIdentity::new(&self.identifier, &salts)?;

        let command = schedule::command_line(self.interpreter.as_deref(), &script);
        let annotation = annotate(&script, identity.fingerprint());
        let entry = schedule::normalize(&self.schedule, &command, &annotation)?;

        Ok(PreparedJob {
            identity,
            script,
            entry,
        })
    }
}

/// `path` resolved to an absolute path of an existing regular file.
pub fn canonical_script(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::validation("script path is empty"));
    }
    if !path.is_file() {
        return Err(Error::validation(format!(
            "script '{}' does not exist or is not a file",
            path.display()
        )));
    }
    let canonical = path.canonicalize().map_err(|e| {
        Error::validation(format!("cannot resolve script '{}': {e}", path.display()))
    })?;
    // cron turns `%` in the command field into a newline, quoted or not.
    if canonical.to_string_lossy().contains('%') {
        return Err(Error::validation(format!(
            "script path '{}' must not contain '%'",
            canonical.display()
        )));
    }
    Ok(canonical)
}

/// A validated job, ready to be registered.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub identity: JobIdentity,
    pub script: PathBuf,
    pub entry: CrontabEntry,
}

impl PreparedJob {
    pub async fn register(self, registrar: &Registrar) -> Result<(JobIdentity, Registration)> {
        let registration = registrar.register(&self.identity, self.entry).await?;
        Ok((self.identity, registration))
    }
}

/// A task that registers its own crontab entry when constructed.
pub struct AutoCrontabJob<T> {
    task: T,
    identity: JobIdentity,
    registration: Registration,
}

impl<T: ScheduledTask> AutoCrontabJob<T> {
    /// Validate `options`, then register the job. Validation errors are
    /// returned before the store is loaded.
    pub async fn register(options: JobOptions, task: T, registrar: &Registrar) -> Result<Self> {
        let prepared = options.prepare(&task.owner(), &[])?;
        let (identity, registration) = prepared.register(registrar).await?;
        Ok(Self {
            task,
            identity,
            registration,
        })
    }

    pub async fn run(&self) {
        self.task.run().await;
    }

    #[must_use]
    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    #[must_use]
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    #[must_use]
    pub fn task(&self) -> &T {
        &self.task
    }
}
