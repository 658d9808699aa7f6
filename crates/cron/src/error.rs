use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad job definition, rejected before the crontab is touched.
    #[error("invalid job: {message}")]
    Validation { message: String },

    /// Loading or persisting the crontab failed.
    #[error("crontab store {context}: {source}")]
    StoreAccess {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error("registration task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn store_access(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StoreAccess {
            context: context.into(),
            source: source.into(),
        }
    }

    /// `true` for errors raised by construction-time validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// `true` for errors raised while loading or persisting the crontab.
    #[must_use]
    pub fn is_store_access(&self) -> bool {
        matches!(self, Self::StoreAccess { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
