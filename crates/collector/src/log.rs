//! Append-only log file that collectors report through.
//!
//! Collection runs unattended under the OS scheduler, so the log file is
//! where operators look. Every line is also emitted through `tracing`.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use {
    chrono::Local,
    fd_lock::RwLock,
    tracing::{info, warn},
};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    /// Open (creating if needed) the log file at `path`. An unusable
    /// location is a validation error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |e: std::io::Error| {
            Error::validation(format!("invalid log file location '{}': {e}", path.display()))
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(invalid)?;
            }
        }
        open_append(path).map_err(invalid)?;
        let path = path.canonicalize().map_err(invalid)?;
        Ok(Self { path })
    }

    /// Absolute path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an informational line.
    pub fn log(&self, message: &str) {
        info!(log = %self.path.display(), "{message}");
        self.write_line("INFO", message);
    }

    /// Record an error line.
    pub fn error(&self, message: &str) {
        warn!(log = %self.path.display(), "{message}");
        self.write_line("ERROR", message);
    }

    /// Append one line, holding an exclusive lock so concurrent runs do not
    /// interleave. Failures are reported through `tracing` only.
    fn write_line(&self, level: &str, message: &str) {
        if let Err(e) = self.try_write_line(level, message) {
            warn!(log = %self.path.display(), error = %e, "could not write to collector log");
        }
    }

    fn try_write_line(&self, level: &str, message: &str) -> std::io::Result<()> {
        let line = format!(
            "{} [{level}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message.replace('\n', " ")
        );
        let mut lock = RwLock::new(open_append(&self.path)?);
        let mut guard = lock.write()?;
        guard.write_all(line.as_bytes())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
