use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cron(#[from] autocron_cron::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("pagination stopped: {0}")]
    Pagination(String),

    #[error("schema file {}: {source}", path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// A construction-time validation failure, reported the same way the
    /// core crate reports one.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Cron(autocron_cron::Error::validation(message))
    }

    #[must_use]
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Cron(e) if e.is_validation())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
