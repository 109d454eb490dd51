use thiserror::Error;
use uuid::Uuid;

use crate::services::StoreError;

/// Outcomes of the ranking core that callers must handle
///
/// `InvalidVote`, `DuplicateVote` and `NotFound` are client errors: the client
/// should fetch a fresh pair. `PersistenceFailure` is transient and leaves no
/// state behind.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Voter {voter_id} has already judged this pair")]
    DuplicateVote { voter_id: String },

    #[error("Item not found: {0}")]
    NotFound(Uuid),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl RankError {
    /// Stable machine-readable kind used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            RankError::InvalidVote(_) => "invalid_vote",
            RankError::DuplicateVote { .. } => "duplicate_vote",
            RankError::NotFound(_) => "not_found",
            RankError::PersistenceFailure(_) => "persistence_failure",
        }
    }
}

impl From<StoreError> for RankError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidVote(reason) => RankError::InvalidVote(reason),
            StoreError::DuplicateVote { voter_id } => RankError::DuplicateVote { voter_id },
            StoreError::NotFound(id) => RankError::NotFound(id),
            other => RankError::PersistenceFailure(other.to_string()),
        }
    }
}
