//! Error taxonomy shared by the store, the stages, and the orchestrator.
//!
//! Stage failures are contained per article and recorded on the article row.
//! Store failures are never converted into article state: they propagate to the
//! top-level caller because nothing durable can be written.
use crate::stages::Stage;
use crate::store::{ArticleId, ArticleStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("article {0} not found")]
    NotFound(ArticleId),

    /// A guarded write found the article in a different state than expected.
    #[error("article {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: ArticleId,
        expected: ArticleStatus,
        actual: ArticleStatus,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("article {id} has an unreadable record: {detail}")]
    Corrupt { id: ArticleId, detail: String },

    #[error("cannot encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A stage's external call failed: timeout, malformed response, provider error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Errors that stop `Pipeline::run` before or outside article-level handling.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Only queued articles can be run; re-running review/error is unsupported.
    #[error("article {id} is {status} and cannot be run (only queued articles run)")]
    NotRunnable { id: ArticleId, status: ArticleStatus },

    /// Rejected before any article row is created.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
}

impl RunError {
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            RunError::Store(
                StoreError::Unavailable(_) | StoreError::Corrupt { .. } | StoreError::Encode(_)
            )
        )
    }
}
