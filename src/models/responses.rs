use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::domain::{Item, PairKey};

/// What a voter sees of an item while comparing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairItem {
    pub id: Uuid,
    pub title: Option<String>,
    pub rating: f64,
    pub vote_count: u64,
}

impl From<Item> for PairItem {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            title: item.title,
            rating: item.rating,
            vote_count: item.vote_count,
        }
    }
}

/// Response for the pair endpoint: either two items or the exhausted marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PairResponse {
    Pair {
        #[serde(rename = "itemA")]
        item_a: PairItem,
        #[serde(rename = "itemB")]
        item_b: PairItem,
    },
    Exhausted {
        exhausted: bool,
    },
}

/// Response for a committed vote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub vote_id: Uuid,
    pub winner_rating: f64,
    pub loser_rating: f64,
}

/// One leaderboard row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub item: Item,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub items: Vec<LeaderboardEntry>,
    pub total: usize,
}

/// Pairs a voter has already judged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteHistoryResponse {
    pub voter_id: String,
    pub pairs: Vec<PairKey>,
    pub count: usize,
}

/// An owner's items, inactive ones included
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerItemsResponse {
    pub owner_id: String,
    pub items: Vec<Item>,
    pub total: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    pub status_code: u16,
}
