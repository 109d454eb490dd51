use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a ranked item
pub type ItemId = Uuid;

/// Rating every new item starts from
pub const BASELINE_RATING: f64 = 1200.0;

/// A ranked entity (a workstation submission)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
    pub rating: f64,
    pub vote_count: u64,
    #[serde(default = "default_true")]
    pub active: bool,
    /// `None` for seed/showcase items
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub voting_opt_out: bool,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Build a freshly uploaded item at the given baseline rating
    pub fn new(title: Option<String>, owner_id: Option<String>, baseline: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            rating: baseline,
            vote_count: 0,
            active: true,
            owner_id,
            voting_opt_out: false,
            created_at: Utc::now(),
        }
    }

    /// Whether the item may be offered in a pair at all
    #[inline]
    pub fn is_pairable(&self) -> bool {
        self.active && !self.voting_opt_out
    }

    #[inline]
    pub fn is_owned_by(&self, voter_id: &str) -> bool {
        self.owner_id.as_deref() == Some(voter_id)
    }
}

fn default_true() -> bool { true }

/// Unordered pair of item IDs. `(a, b)` and `(b, a)` produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    low: ItemId,
    high: ItemId,
}

impl PairKey {
    pub fn new(a: ItemId, b: ItemId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> ItemId {
        self.low
    }

    pub fn high(&self) -> ItemId {
        self.high
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.low == id || self.high == id
    }

    pub fn is_degenerate(&self) -> bool {
        self.low == self.high
    }
}

/// A submitted comparison, before it is committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub voter_id: String,
    pub winner_id: ItemId,
    pub loser_id: ItemId,
}

impl Ballot {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.winner_id, self.loser_id)
    }
}

/// Committed, immutable vote row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub id: Uuid,
    pub voter_id: String,
    pub winner_id: ItemId,
    pub loser_id: ItemId,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn from_ballot(ballot: &Ballot) -> Self {
        Self {
            id: Uuid::new_v4(),
            voter_id: ballot.voter_id.clone(),
            winner_id: ballot.winner_id,
            loser_id: ballot.loser_id,
            created_at: Utc::now(),
        }
    }
}

/// Result of a committed vote
#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub vote: VoteRecord,
    pub winner_rating: f64,
    pub loser_rating: f64,
    pub winner_vote_count: u64,
    pub loser_vote_count: u64,
}

/// What the pair selector hands back to a voter
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Pair(Item, Item),
    /// The voter has judged every available pair
    Exhausted,
}

impl PairOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PairOutcome::Exhausted)
    }
}

/// Fields supplied when an item is uploaded
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub title: Option<String>,
    pub owner_id: Option<String>,
}

/// Owner-controlled changes to an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub active: Option<bool>,
    pub voting_opt_out: Option<bool>,
}

impl ItemPatch {
    pub fn apply(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = Some(title.clone());
        }
        if let Some(active) = self.active {
            item.active = active;
        }
        if let Some(opt_out) = self.voting_opt_out {
            item.voting_opt_out = opt_out;
        }
    }
}

/// What happens to an item's votes when the item is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Vote rows stay for audit; history keys naming the item become inert
    #[default]
    RetainVotes,
    /// Vote rows and history keys naming the item are removed
    PurgeVotes,
}
