// Integration tests for Deskrank: selector + engine over the in-memory store

use async_trait::async_trait;
use deskrank::core::{EloModel, PairSelector, PairingPolicy, RankError, RatingEngine, RetryPolicy};
use deskrank::models::{
    Ballot, DeletionPolicy, Item, ItemId, ItemPatch, NewItem, PairKey, PairOutcome, VoteOutcome,
    BASELINE_RATING,
};
use deskrank::services::{MemoryStore, RatingStore, StoreError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn seeded_store(n: usize) -> (Arc<MemoryStore>, Vec<ItemId>) {
    let store = Arc::new(MemoryStore::new());
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let item = store
            .create_item(
                NewItem {
                    title: Some(format!("Workstation {}", i)),
                    owner_id: Some(format!("owner-{}", i)),
                },
                BASELINE_RATING,
            )
            .await
            .unwrap();
        ids.push(item.id);
    }
    (store, ids)
}

fn engine(store: Arc<dyn RatingStore>) -> RatingEngine {
    RatingEngine::new(store, EloModel::default(), RetryPolicy::no_retry())
}

fn selector(store: Arc<dyn RatingStore>) -> PairSelector {
    PairSelector::new(store, PairingPolicy::default())
}

#[tokio::test]
async fn test_no_pair_offered_twice_until_exhausted() {
    let (store, _) = seeded_store(7).await;
    let selector = selector(store.clone());
    let engine = engine(store.clone());

    let mut judged = HashSet::new();
    let mut cycles = 0;
    while let PairOutcome::Pair(a, b) = selector.select_pair("alice").await.unwrap() {
        assert_ne!(a.id, b.id);
        assert!(judged.insert(PairKey::new(a.id, b.id)), "pair offered twice");

        let (winner, loser) = if cycles % 3 == 0 { (b.id, a.id) } else { (a.id, b.id) };
        engine.record_vote("alice", winner, loser).await.unwrap();
        cycles += 1;
        assert!(cycles <= 21, "more cycles than pairs");
    }

    assert_eq!(cycles, 21);
    assert_eq!(store.list_vote_history("alice").await.unwrap(), judged);

    // Another voter still has the full set available
    assert!(matches!(selector.select_pair("bob").await.unwrap(), PairOutcome::Pair(..)));
}

#[tokio::test]
async fn test_exhausted_after_all_pairs_judged() {
    let (store, ids) = seeded_store(4).await;
    let engine = engine(store.clone());

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            engine.record_vote("carol", ids[i], ids[j]).await.unwrap();
        }
    }

    assert_eq!(store.list_vote_history("carol").await.unwrap().len(), 6);
    assert_eq!(selector(store.clone()).select_pair("carol").await.unwrap(), PairOutcome::Exhausted);
}

#[tokio::test]
async fn test_new_item_reopens_exhausted_voter() {
    let (store, ids) = seeded_store(2).await;
    let engine = engine(store.clone());
    let selector = selector(store.clone());

    engine.record_vote("dave", ids[0], ids[1]).await.unwrap();
    assert!(selector.select_pair("dave").await.unwrap().is_exhausted());

    let fresh = store.create_item(NewItem::default(), BASELINE_RATING).await.unwrap();
    match selector.select_pair("dave").await.unwrap() {
        PairOutcome::Pair(a, b) => assert!(a.id == fresh.id || b.id == fresh.id),
        PairOutcome::Exhausted => panic!("new item should reopen pairing"),
    }
}

#[tokio::test]
async fn test_ratings_are_zero_sum_across_votes() {
    let (store, ids) = seeded_store(6).await;
    let engine = engine(store.clone());

    for (voter, (w, l)) in [(0, 1), (2, 1), (3, 4), (5, 0), (1, 3), (4, 2), (0, 5)].iter().enumerate() {
        let before_w = store.get_item(ids[*w]).await.unwrap().rating;
        let before_l = store.get_item(ids[*l]).await.unwrap().rating;

        let outcome = engine.record_vote(&format!("voter-{}", voter), ids[*w], ids[*l]).await.unwrap();

        let gain = outcome.winner_rating - before_w;
        let loss = outcome.loser_rating - before_l;
        assert!((gain + loss).abs() < 1e-9);
    }

    let total: f64 = store.list_active_items().await.unwrap().iter().map(|i| i.rating).sum();
    assert!((total - 6.0 * BASELINE_RATING).abs() < 1e-6);
}

#[tokio::test]
async fn test_upset_vote_through_engine() {
    let store = Arc::new(MemoryStore::new());
    let mut underdog = Item::new(Some("underdog".into()), None, BASELINE_RATING);
    underdog.rating = 1000.0;
    let mut favourite = Item::new(Some("favourite".into()), None, BASELINE_RATING);
    favourite.rating = 1400.0;
    store.insert_item(underdog.clone()).await;
    store.insert_item(favourite.clone()).await;

    let outcome = engine(store.clone())
        .record_vote("erin", underdog.id, favourite.id)
        .await
        .unwrap();

    assert!((outcome.winner_rating - 1029.09).abs() < 0.01);
    assert!((outcome.loser_rating - 1370.91).abs() < 0.01);
    assert!(outcome.winner_rating - 1000.0 > 16.0);
}

#[tokio::test]
async fn test_self_vote_never_mutates_state() {
    let (store, ids) = seeded_store(2).await;
    let err = engine(store.clone()).record_vote("frank", ids[1], ids[1]).await.unwrap_err();

    assert!(matches!(err, RankError::InvalidVote(_)));
    assert_eq!(err.kind(), "invalid_vote");
    assert!(store.votes().await.is_empty());
    for id in ids {
        let item = store.get_item(id).await.unwrap();
        assert_eq!((item.rating, item.vote_count), (BASELINE_RATING, 0));
    }
}

#[tokio::test]
async fn test_vote_on_inactive_item_is_invalid() {
    let (store, ids) = seeded_store(2).await;
    store
        .update_item(ids[0], ItemPatch { active: Some(false), ..Default::default() })
        .await
        .unwrap();

    let err = engine(store.clone()).record_vote("gina", ids[0], ids[1]).await.unwrap_err();
    assert!(matches!(err, RankError::InvalidVote(_)));
    assert!(store.list_vote_history("gina").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_item_deleted_mid_flow_is_not_found() {
    let (store, ids) = seeded_store(3).await;
    let selector = selector(store.clone());

    let (a, b) = match selector.select_pair("hank").await.unwrap() {
        PairOutcome::Pair(a, b) => (a, b),
        PairOutcome::Exhausted => panic!("expected a pair"),
    };
    store.delete_item(a.id, DeletionPolicy::RetainVotes).await.unwrap();

    let err = engine(store.clone()).record_vote("hank", a.id, b.id).await.unwrap_err();
    assert!(matches!(err, RankError::NotFound(id) if id == a.id));
    assert_eq!(store.get_item(b.id).await.unwrap().vote_count, 0);
    assert_eq!(store.count_items().await.unwrap(), ids.len() - 1);
}

#[tokio::test]
async fn test_opted_out_item_never_offered() {
    let (store, ids) = seeded_store(3).await;
    store
        .update_item(ids[2], ItemPatch { voting_opt_out: Some(true), ..Default::default() })
        .await
        .unwrap();
    let selector = selector(store.clone());

    for _ in 0..20 {
        match selector.select_pair("iris").await.unwrap() {
            PairOutcome::Pair(a, b) => {
                assert_ne!(a.id, ids[2]);
                assert_ne!(b.id, ids[2]);
            }
            PairOutcome::Exhausted => panic!("two pairable items remain"),
        }
    }
}

#[tokio::test]
async fn test_own_items_excluded_when_configured() {
    let (store, ids) = seeded_store(3).await;
    let excluding = PairSelector::new(
        store.clone(),
        PairingPolicy { include_own_items: false, ..Default::default() },
    );

    // owner-0 owns ids[0]; only (ids[1], ids[2]) is left for them
    match excluding.select_pair("owner-0").await.unwrap() {
        PairOutcome::Pair(a, b) => assert_eq!(PairKey::new(a.id, b.id), PairKey::new(ids[1], ids[2])),
        PairOutcome::Exhausted => panic!("expected a pair"),
    }

    engine(store.clone()).record_vote("owner-0", ids[1], ids[2]).await.unwrap();
    assert!(excluding.select_pair("owner-0").await.unwrap().is_exhausted());
    // The default policy still offers their own item
    assert!(!selector(store.clone()).select_pair("owner-0").await.unwrap().is_exhausted());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_votes_lose_no_updates() {
    let (store, ids) = seeded_store(5).await;
    let engine = engine(store.clone());

    // Every voter judges every pair once, all at the same time
    let mut handles = Vec::new();
    let mut expected_votes = vec![0u64; ids.len()];
    for voter in 0..20 {
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                expected_votes[i] += 1;
                expected_votes[j] += 1;
                let engine = engine.clone();
                let (winner, loser) = if (voter + i + j) % 2 == 0 { (ids[i], ids[j]) } else { (ids[j], ids[i]) };
                handles.push(tokio::spawn(async move {
                    engine.record_vote(&format!("voter-{}", voter), winner, loser).await
                }));
            }
        }
    }

    let total = handles.len();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.votes().await.len(), total);
    let mut rating_sum = 0.0;
    for (index, id) in ids.iter().enumerate() {
        let item = store.get_item(*id).await.unwrap();
        assert_eq!(item.vote_count, expected_votes[index]);
        rating_sum += item.rating;
    }
    assert!((rating_sum - 5.0 * BASELINE_RATING).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_raced_duplicate_resolves_to_one_commit() {
    let (store, ids) = seeded_store(2).await;
    let engine = engine(store.clone());

    let mut handles = Vec::new();
    for attempt in 0..16 {
        let engine = engine.clone();
        let (winner, loser) = if attempt % 2 == 0 { (ids[0], ids[1]) } else { (ids[1], ids[0]) };
        handles.push(tokio::spawn(async move { engine.record_vote("jules", winner, loser).await }));
    }

    let mut committed = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(RankError::DuplicateVote { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(store.get_item(ids[0]).await.unwrap().vote_count, 1);
    assert_eq!(store.get_item(ids[1]).await.unwrap().vote_count, 1);
    assert_eq!(store.votes().await.len(), 1);
}

/// Store whose first `failures` commits report the backend as unavailable
struct FlakyStore {
    inner: MemoryStore,
    failures: u32,
    commits: AtomicU32,
}

#[async_trait]
impl RatingStore for FlakyStore {
    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.list_active_items().await
    }

    async fn list_vote_history(&self, voter_id: &str) -> Result<HashSet<PairKey>, StoreError> {
        self.inner.list_vote_history(voter_id).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Item, StoreError> {
        self.inner.get_item(id).await
    }

    async fn list_items_by_owner(&self, owner_id: &str) -> Result<Vec<Item>, StoreError> {
        self.inner.list_items_by_owner(owner_id).await
    }

    async fn create_item(&self, new_item: NewItem, baseline: f64) -> Result<Item, StoreError> {
        self.inner.create_item(new_item, baseline).await
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        self.inner.update_item(id, patch).await
    }

    async fn delete_item(&self, id: ItemId, policy: DeletionPolicy) -> Result<bool, StoreError> {
        self.inner.delete_item(id, policy).await
    }

    async fn commit_vote(&self, ballot: &Ballot, model: &EloModel) -> Result<VoteOutcome, StoreError> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.commit_vote(ballot, model).await
    }

    async fn count_items(&self) -> Result<usize, StoreError> {
        self.inner.count_items().await
    }
}

async fn flaky_store(failures: u32) -> (Arc<FlakyStore>, ItemId, ItemId) {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        failures,
        commits: AtomicU32::new(0),
    });
    let a = store.create_item(NewItem::default(), BASELINE_RATING).await.unwrap().id;
    let b = store.create_item(NewItem::default(), BASELINE_RATING).await.unwrap().id;
    (store, a, b)
}

#[tokio::test]
async fn test_transient_failures_retried_at_transaction_boundary() {
    let (store, a, b) = flaky_store(2).await;
    let retry = RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1) };
    let engine = RatingEngine::new(store.clone(), EloModel::default(), retry);

    let outcome = engine.record_vote("kim", a, b).await.unwrap();

    assert_eq!(outcome.winner_rating, 1216.0);
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert_eq!(store.inner.votes().await.len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_surface_persistence_failure_without_state_change() {
    let (store, a, b) = flaky_store(5).await;
    let retry = RetryPolicy { max_attempts: 2, base_delay: Duration::from_millis(1) };
    let engine = RatingEngine::new(store.clone(), EloModel::default(), retry);

    let err = engine.record_vote("lee", a, b).await.unwrap_err();

    assert!(matches!(err, RankError::PersistenceFailure(_)));
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);
    assert!(store.inner.votes().await.is_empty());
    assert_eq!(store.get_item(a).await.unwrap().vote_count, 0);
    assert!(store.list_vote_history("lee").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (store, a, b) = flaky_store(0).await;
    let retry = RetryPolicy { max_attempts: 5, base_delay: Duration::from_millis(1) };
    let engine = RatingEngine::new(store.clone(), EloModel::default(), retry);

    engine.record_vote("mo", a, b).await.unwrap();
    let err = engine.record_vote("mo", b, a).await.unwrap_err();

    assert!(matches!(err, RankError::DuplicateVote { .. }));
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_blocking_runtime_roundtrip() {
    // Drive the store from sync code the way a CLI tool would
    let store = MemoryStore::new();
    let item = tokio_test::block_on(store.create_item(NewItem::default(), BASELINE_RATING)).unwrap();
    let fetched = tokio_test::block_on(store.get_item(item.id)).unwrap();
    assert_eq!(fetched, item);
}
