//! The OS scheduler's per-user crontab, driven through `crontab(1)`.

use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

use tracing::debug;

use crate::{Error, Result, crontab::Crontab, store::CrontabStore};

const DEFAULT_PROGRAM: &str = "crontab";

/// A user's crontab as managed by the `crontab` program.
pub struct SystemCrontab {
    program: PathBuf,
    user: Option<String>,
    lock_dir: PathBuf,
}

impl SystemCrontab {
    /// The invoking user's crontab.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            user: None,
            lock_dir: std::env::temp_dir(),
        }
    }

    /// Manage another user's crontab (`crontab -u <user>`); usually needs root.
    #[must_use]
    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Use a different `crontab` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Directory holding the transaction lock file.
    #[must_use]
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(user) = &self.user {
            cmd.args(["-u", user]);
        }
        cmd
    }

    fn user_label(&self) -> String {
        self.user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "default".to_string())
    }
}

impl Default for SystemCrontab {
    fn default() -> Self {
        Self::new()
    }
}

impl CrontabStore for SystemCrontab {
    fn load(&self) -> Result<Crontab> {
        let output = self.command().arg("-l").output().map_err(|e| {
            Error::store_access(format!("run {} -l", self.program.display()), e)
        })?;

        if output.status.success() {
            // Persist writes back every line as read, so no lossy decoding.
            let text = String::from_utf8(output.stdout)
                .map_err(|e| Error::store_access(format!("load {}", self.describe()), e))?;
            return Ok(Crontab::parse(&text));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_ascii_lowercase().contains("no crontab for") {
            debug!(user = %self.user_label(), "no crontab installed yet");
            return Ok(Crontab::new());
        }
        Err(Error::store_access(
            format!("load {}", self.describe()),
            format!("{} -l exited with {}: {}", self.program.display(), output.status, stderr.trim()),
        ))
    }

    fn persist(&self, crontab: &Crontab) -> Result<()> {
        let text = crontab.render();
        let mut child = self
            .command()
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::store_access(format!("run {} -", self.program.display()), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| Error::store_access(format!("write {}", self.describe()), e))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::store_access(format!("persist {}", self.describe()), e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::store_access(
                format!("persist {}", self.describe()),
                format!("{} - exited with {}: {}", self.program.display(), output.status, stderr.trim()),
            ));
        }
        Ok(())
    }

    fn lock_path(&self) -> Option<PathBuf> {
        let label: String = self
            .user_label()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Some(self.lock_dir.join(format!("autocron-crontab-{label}.lock")))
    }

    fn describe(&self) -> String {
        format!("crontab of {}", self.user_label())
    }
}
