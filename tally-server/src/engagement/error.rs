use thiserror::Error;
use uuid::Uuid;

use crate::db::repositories::LedgerError;

pub type EngagementResult<T> = Result<T, EngagementError>;

/// Errors surfaced to callers of the engagement core
#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("topic {0} not found")]
    TopicNotFound(Uuid),
    #[error("topic {0} is not active")]
    TopicInactive(Uuid),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl EngagementError {
    /// True for errors caused by the request rather than the system
    pub fn is_validation(&self) -> bool {
        !matches!(self, EngagementError::Storage(_))
    }
}

impl From<LedgerError> for EngagementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::TopicNotFound(id) => EngagementError::TopicNotFound(id),
            LedgerError::TopicInactive(id) => EngagementError::TopicInactive(id),
            LedgerError::Storage(source) => EngagementError::Storage(source),
        }
    }
}

/// Failures in streak or achievement bookkeeping. These are logged by the
/// coordinator and never returned: the vote that triggered them stands.
#[derive(Debug, Error)]
pub enum BookkeepingError {
    #[error("streak update failed for fid {fid}: {source:#}")]
    Streak { fid: i64, source: anyhow::Error },
    #[error("achievement evaluation failed for fid {fid}: {source:#}")]
    Achievements { fid: i64, source: anyhow::Error },
    #[error("activity count failed for fid {fid}: {source:#}")]
    Activity { fid: i64, source: anyhow::Error },
}
