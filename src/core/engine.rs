use std::sync::Arc;
use std::time::Duration;

use crate::core::elo::EloModel;
use crate::core::error::RankError;
use crate::models::{Ballot, ItemId, VoteOutcome};
use crate::services::{RatingStore, StoreError};

/// Backoff applied when a vote commit fails transiently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total commit attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

/// Records votes and moves ratings
///
/// Each vote is a single unit of work inside the store: the vote row and
/// both rating updates land together or not at all. A transient failure
/// retries the whole unit, never part of it.
#[derive(Clone)]
pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
    model: EloModel,
    retry: RetryPolicy,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn RatingStore>, model: EloModel, retry: RetryPolicy) -> Self {
        Self { store, model, retry }
    }

    pub fn model(&self) -> &EloModel {
        &self.model
    }

    /// Record `winner_id` beating `loser_id` for `voter_id`, retrying
    /// transient persistence failures with backoff
    pub async fn record_vote(
        &self,
        voter_id: &str,
        winner_id: ItemId,
        loser_id: ItemId,
    ) -> Result<VoteOutcome, RankError> {
        let ballot = validate_ballot(voter_id, winner_id, loser_id)?;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.store.commit_vote(&ballot, &self.model).await {
                Ok(outcome) => {
                    tracing::info!(
                        "Vote {} by {}: {} ({:.2}) beat {} ({:.2})",
                        outcome.vote.id,
                        voter_id,
                        winner_id,
                        outcome.winner_rating,
                        loser_id,
                        outcome.loser_rating
                    );
                    return Ok(outcome);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Vote commit attempt {}/{} failed for {}: {}, retrying in {:?}",
                        attempt,
                        max_attempts,
                        voter_id,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    log_rejection(&ballot, &err);
                    return Err(err.into());
                }
            }
        }
    }

    /// Single commit attempt with no retry
    pub async fn try_record_vote(
        &self,
        voter_id: &str,
        winner_id: ItemId,
        loser_id: ItemId,
    ) -> Result<VoteOutcome, RankError> {
        let ballot = validate_ballot(voter_id, winner_id, loser_id)?;
        self.store
            .commit_vote(&ballot, &self.model)
            .await
            .map_err(|err| {
                log_rejection(&ballot, &err);
                err.into()
            })
    }
}

fn validate_ballot(voter_id: &str, winner_id: ItemId, loser_id: ItemId) -> Result<Ballot, RankError> {
    if voter_id.trim().is_empty() {
        return Err(RankError::InvalidVote("voter ID is required".to_string()));
    }
    if winner_id == loser_id {
        return Err(RankError::InvalidVote(format!(
            "item {} cannot be compared with itself",
            winner_id
        )));
    }

    Ok(Ballot {
        voter_id: voter_id.to_string(),
        winner_id,
        loser_id,
    })
}

fn log_rejection(ballot: &Ballot, err: &StoreError) {
    match err {
        StoreError::InvalidVote(_) | StoreError::DuplicateVote { .. } | StoreError::NotFound(_) => {
            tracing::info!(
                "Rejected vote by {} ({} over {}): {}",
                ballot.voter_id,
                ballot.winner_id,
                ballot.loser_id,
                err
            );
        }
        _ => {
            tracing::error!("Failed to commit vote by {}: {}", ballot.voter_id, err);
        }
    }
}
