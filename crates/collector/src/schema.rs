//! Loading a collector's SQL schema into its database.

use std::path::Path;

use {sqlx::SqlitePool, tracing::warn};

use crate::{Error, Result, log::LogSink};

/// One statement of the schema that the database rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    /// Zero-based position among the non-blank statements.
    pub index: usize,
    pub statement: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub executed: usize,
    pub failures: Vec<StatementFailure>,
}

impl SchemaReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Split schema text on `;` into trimmed, non-blank statements.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Run every statement of the schema file at `path` against `db`.
///
/// A failing statement is written to `log` and counted; the remaining
/// statements still run. Only an unreadable schema file is an error.
pub async fn bootstrap_schema(db: &SqlitePool, path: &Path, log: &LogSink) -> Result<SchemaReport> {
    let sql = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Schema {
            path: path.to_path_buf(),
            source,
        })?;

    let mut report = SchemaReport::default();
    for (index, statement) in split_statements(&sql).into_iter().enumerate() {
        match sqlx::query(statement).execute(db).await {
            Ok(_) => report.executed += 1,
            Err(e) => {
                warn!(schema = %path.display(), index, error = %e, "schema statement failed");
                log.error(&format!(
                    "database error while creating data collection tables: {e}"
                ));
                report.failures.push(StatementFailure {
                    index,
                    statement: statement.to_string(),
                    message: e.to_string(),
                });
            },
        }
    }
    Ok(report)
}
