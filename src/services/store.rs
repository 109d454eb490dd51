use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::core::elo::EloModel;
use crate::core::leaderboard::rank_items;
use crate::models::{Ballot, DeletionPolicy, Item, ItemId, ItemPatch, NewItem, PairKey, VoteOutcome};

/// Errors raised by a rating store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Duplicate vote by {voter_id}")]
    DuplicateVote { voter_id: String },

    #[error("Not found: {0}")]
    NotFound(Uuid),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the whole unit of work may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::SqlxError(err) => is_transient_sqlx(err),
            _ => false,
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        // serialization_failure, deadlock_detected
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001") | Some("40P01")),
        _ => false,
    }
}

/// Persisted rating state
///
/// `commit_vote` is the only way ratings change. Implementations must run it
/// as one atomic read-modify-write: validate both items, reject a pair the
/// voter already judged, insert the vote and write both new ratings, or do
/// nothing at all.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// All items with `active = true`, whatever their opt-out flag
    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError>;

    /// Unordered pairs the voter has already judged
    async fn list_vote_history(&self, voter_id: &str) -> Result<HashSet<PairKey>, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Item, StoreError>;

    /// Every item belonging to `owner_id`, inactive ones included, newest first
    async fn list_items_by_owner(&self, owner_id: &str) -> Result<Vec<Item>, StoreError>;

    async fn create_item(&self, new_item: NewItem, baseline: f64) -> Result<Item, StoreError>;

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError>;

    /// Remove an item. Returns `false` if it did not exist.
    async fn delete_item(&self, id: ItemId, policy: DeletionPolicy) -> Result<bool, StoreError>;

    /// Record a ballot and apply `model` to both items atomically
    async fn commit_vote(&self, ballot: &Ballot, model: &EloModel) -> Result<VoteOutcome, StoreError>;

    /// Active items ranked by rating
    async fn leaderboard(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let items = self.list_active_items().await?;
        Ok(rank_items(items, limit))
    }

    async fn count_items(&self) -> Result<usize, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
