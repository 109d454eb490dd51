use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::core::elo::EloModel;
use crate::models::{Ballot, DeletionPolicy, Item, ItemId, ItemPatch, NewItem, PairKey, VoteOutcome, VoteRecord};
use crate::services::store::{RatingStore, StoreError};

/// An item behind its own lock. `None` once the item has been deleted, so a
/// vote that grabbed the slot before deletion sees it as gone.
type ItemSlot = Arc<Mutex<Option<Item>>>;

/// In-process rating store
///
/// Each item has its own lock; a vote holds the two item locks (taken in ID
/// order) for the whole unit of work, so votes on disjoint pairs never wait
/// on each other.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<ItemId, ItemSlot>>,
    history: Mutex<HashMap<String, HashSet<PairKey>>>,
    votes: Mutex<Vec<VoteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed item, replacing any item with the same ID
    pub async fn insert_item(&self, item: Item) {
        let mut items = self.items.write().await;
        items.insert(item.id, Arc::new(Mutex::new(Some(item))));
    }

    /// Every committed vote, oldest first
    pub async fn votes(&self) -> Vec<VoteRecord> {
        self.votes.lock().await.clone()
    }

    async fn slot(&self, id: ItemId) -> Option<ItemSlot> {
        self.items.read().await.get(&id).cloned()
    }

    async fn snapshot(&self) -> Vec<Item> {
        let slots: Vec<ItemSlot> = self.items.read().await.values().cloned().collect();
        let mut items = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(item) = slot.lock().await.as_ref() {
                items.push(item.clone());
            }
        }
        items
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError> {
        let mut items = self.snapshot().await;
        items.retain(|item| item.active);
        Ok(items)
    }

    async fn list_vote_history(&self, voter_id: &str) -> Result<HashSet<PairKey>, StoreError> {
        let history = self.history.lock().await;
        Ok(history.get(voter_id).cloned().unwrap_or_default())
    }

    async fn get_item(&self, id: ItemId) -> Result<Item, StoreError> {
        let slot = self.slot(id).await.ok_or(StoreError::NotFound(id))?;
        let guard = slot.lock().await;
        guard.clone().ok_or(StoreError::NotFound(id))
    }

    async fn list_items_by_owner(&self, owner_id: &str) -> Result<Vec<Item>, StoreError> {
        let mut items = self.snapshot().await;
        items.retain(|item| item.is_owned_by(owner_id));
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn create_item(&self, new_item: NewItem, baseline: f64) -> Result<Item, StoreError> {
        let item = Item::new(new_item.title, new_item.owner_id, baseline);
        self.insert_item(item.clone()).await;
        Ok(item)
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        let slot = self.slot(id).await.ok_or(StoreError::NotFound(id))?;
        let mut guard = slot.lock().await;
        let item = guard.as_mut().ok_or(StoreError::NotFound(id))?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn delete_item(&self, id: ItemId, policy: DeletionPolicy) -> Result<bool, StoreError> {
        let Some(slot) = self.slot(id).await else {
            return Ok(false);
        };

        {
            let mut guard = slot.lock().await;
            if guard.take().is_none() {
                return Ok(false);
            }
        }
        self.items.write().await.remove(&id);

        if policy == DeletionPolicy::PurgeVotes {
            let mut history = self.history.lock().await;
            for pairs in history.values_mut() {
                pairs.retain(|key| !key.contains(id));
            }
            drop(history);

            let mut votes = self.votes.lock().await;
            votes.retain(|vote| vote.winner_id != id && vote.loser_id != id);
        }

        Ok(true)
    }

    async fn commit_vote(&self, ballot: &Ballot, model: &EloModel) -> Result<VoteOutcome, StoreError> {
        if ballot.winner_id == ballot.loser_id {
            return Err(StoreError::InvalidVote("winner and loser are the same item".to_string()));
        }

        let key = ballot.pair_key();
        let low = self.slot(key.low()).await.ok_or(StoreError::NotFound(key.low()))?;
        let high = self.slot(key.high()).await.ok_or(StoreError::NotFound(key.high()))?;

        // Ascending ID order on every path
        let mut low_guard = low.lock().await;
        let mut high_guard = high.lock().await;

        let low_item = low_guard.as_mut().ok_or(StoreError::NotFound(key.low()))?;
        let high_item = high_guard.as_mut().ok_or(StoreError::NotFound(key.high()))?;

        for item in [&*low_item, &*high_item] {
            if !item.active {
                return Err(StoreError::InvalidVote(format!("item {} is not active", item.id)));
            }
        }

        let (winner, loser) = if low_item.id == ballot.winner_id {
            (low_item, high_item)
        } else {
            (high_item, low_item)
        };

        {
            let mut history = self.history.lock().await;
            let judged = history.entry(ballot.voter_id.clone()).or_default();
            if !judged.insert(key) {
                return Err(StoreError::DuplicateVote {
                    voter_id: ballot.voter_id.clone(),
                });
            }
        }

        // Nothing below can fail, so the history entry and the ratings land together
        let update = model.rate(winner.rating, loser.rating);
        winner.rating = update.winner;
        winner.vote_count += 1;
        loser.rating = update.loser;
        loser.vote_count += 1;

        let vote = VoteRecord::from_ballot(ballot);
        self.votes.lock().await.push(vote.clone());

        Ok(VoteOutcome {
            vote,
            winner_rating: winner.rating,
            loser_rating: loser.rating,
            winner_vote_count: winner.vote_count,
            loser_vote_count: loser.vote_count,
        })
    }

    async fn count_items(&self) -> Result<usize, StoreError> {
        Ok(self.items.read().await.len())
    }
}
