//! Config schema: where the crontab lives, how registrations merge, and the
//! jobs to register.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    autocron_cron::{
        CrontabStore, FileStore, JobOptions, Registrar, RegistrationPolicy, ScheduleInput,
        SystemCrontab,
    },
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocronConfig {
    pub store: StoreConfig,
    pub registration: RegistrationPolicy,
    pub jobs: Vec<JobConfig>,
}

impl AutocronConfig {
    /// A registrar for the configured store and policy.
    pub fn registrar(&self) -> anyhow::Result<Registrar> {
        Ok(Registrar::new(self.store.open()?).with_policy(self.registration))
    }

    #[must_use]
    pub fn job(&self, identifier: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|job| job.identifier == identifier)
    }
}

/// Which crontab to manage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// A user's crontab, through the `crontab` program.
    System {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        program: Option<PathBuf>,
    },
    /// A crontab-format file.
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::System {
            user: None,
            program: None,
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> anyhow::Result<Arc<dyn CrontabStore>> {
        Ok(match self {
            Self::System { user, program } => {
                let mut store = SystemCrontab::new();
                if let Some(user) = user {
                    store = store.for_user(user.clone());
                }
                if let Some(program) = program {
                    store = store.with_program(program.clone());
                }
                Arc::new(store)
            },
            Self::File { path: Some(path) } => Arc::new(FileStore::new(path.clone())),
            Self::File { path: None } => anyhow::bail!("store.kind = \"file\" requires a path"),
        })
    }
}

/// One job declared in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub identifier: String,
    pub script: PathBuf,
    /// Either a schedule expression or a full entry table.
    pub schedule: ScheduleInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

impl JobConfig {
    #[must_use]
    pub fn options(&self) -> JobOptions {
        JobOptions {
            identifier: self.identifier.clone(),
            script_path: self.script.clone(),
            schedule: self.schedule.clone(),
            interpreter: self.interpreter.clone(),
        }
    }

    /// The script path resolved against `base` when relative.
    #[must_use]
    pub fn script_from(&self, base: &Path) -> PathBuf {
        if self.script.is_relative() {
            base.join(&self.script)
        } else {
            self.script.clone()
        }
    }
}
