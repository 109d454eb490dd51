use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Query for the next pair
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PairQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "voterId", rename = "voter")]
    pub voter: String,
}

/// Request to record a comparison
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitVoteRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "voter_id", alias = "voterID", rename = "voterId")]
    pub voter_id: String,
    #[serde(alias = "winner_id", alias = "winnerID", rename = "winnerId")]
    pub winner_id: Uuid,
    #[serde(alias = "loser_id", alias = "loserID", rename = "loserId")]
    pub loser_id: Uuid,
}

/// Leaderboard query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query for an owner's items
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OwnerItemsQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "ownerId", rename = "owner")]
    pub owner: String,
}

/// Request to register an uploaded item
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(max = 120))]
    #[serde(default)]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    #[serde(default, alias = "owner_id", rename = "ownerId")]
    pub owner_id: Option<String>,
}

/// Owner changes to an item
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(max = 120))]
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, alias = "voting_opt_out", rename = "votingOptOut")]
    pub voting_opt_out: Option<bool>,
}
