//! Error taxonomy shared by the storage, pipeline and job-search services.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Record absent, or present but owned by somebody else.
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("empty file")]
    EmptyInput,
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Pipeline(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Errors that may succeed when retried (SQLite lock contention, pool
    /// exhaustion, dropped connections).
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            ServiceError::Database(sqlx::Error::Database(db_err)) => {
                let message = db_err.message().to_ascii_lowercase();
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
