use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::error::RankError;
use crate::models::{Item, PairKey, PairOutcome};
use crate::services::RatingStore;

/// Pool size up to which every candidate pair is enumerated
pub const DEFAULT_EXHAUSTIVE_THRESHOLD: usize = 64;

/// Anchor draws tried before falling back to enumeration
pub const DEFAULT_MAX_RANDOM_ATTEMPTS: usize = 16;

/// Pure pair-selection rules
///
/// # Strategy
/// 1. Pool = items that are active, not opted out and (optionally) not owned
///    by the voter
/// 2. Small pools: enumerate unordered pairs minus the voter's history and
///    pick one uniformly
/// 3. Large pools: draw an anchor item uniformly, then a partner uniformly
///    among items the voter has not yet paired with it; redraw the anchor if
///    it has no partner left
/// 4. When the draws run out, enumerate so exhaustion is reported truthfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingPolicy {
    pub include_own_items: bool,
    pub exhaustive_threshold: usize,
    pub max_random_attempts: usize,
}

impl Default for PairingPolicy {
    fn default() -> Self {
        Self {
            include_own_items: true,
            exhaustive_threshold: DEFAULT_EXHAUSTIVE_THRESHOLD,
            max_random_attempts: DEFAULT_MAX_RANDOM_ATTEMPTS,
        }
    }
}

impl PairingPolicy {
    /// Items this voter may be shown
    pub fn eligible<'a>(&self, voter_id: &str, items: &'a [Item]) -> Vec<&'a Item> {
        let mut seen = HashSet::with_capacity(items.len());
        items
            .iter()
            .filter(|item| item.is_pairable())
            .filter(|item| self.include_own_items || !item.is_owned_by(voter_id))
            .filter(|item| seen.insert(item.id))
            .collect()
    }

    /// Pick an unseen pair for `voter_id`, or report exhaustion
    pub fn choose<R: Rng + ?Sized>(
        &self,
        voter_id: &str,
        items: &[Item],
        history: &HashSet<PairKey>,
        rng: &mut R,
    ) -> PairOutcome {
        let pool = self.eligible(voter_id, items);
        if pool.len() < 2 {
            return PairOutcome::Exhausted;
        }

        let picked = if pool.len() <= self.exhaustive_threshold {
            pick_exhaustive(&pool, history, rng)
        } else {
            pick_sampled(&pool, history, self.max_random_attempts, rng).or_else(|| {
                tracing::debug!(
                    "Random draws exhausted for voter {} over {} items, enumerating",
                    voter_id,
                    pool.len()
                );
                pick_exhaustive(&pool, history, rng)
            })
        };

        match picked {
            Some((a, b)) => {
                // Left/right placement carries no meaning
                let (first, second) = if rng.random_bool(0.5) { (a, b) } else { (b, a) };
                PairOutcome::Pair(pool[first].clone(), pool[second].clone())
            }
            None => PairOutcome::Exhausted,
        }
    }

    /// Number of pairs the voter can still be offered
    pub fn remaining_pairs(&self, voter_id: &str, items: &[Item], history: &HashSet<PairKey>) -> usize {
        let pool = self.eligible(voter_id, items);
        candidate_pairs(&pool, history).len()
    }
}

fn candidate_pairs(pool: &[&Item], history: &HashSet<PairKey>) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..pool.len() {
        for j in (i + 1)..pool.len() {
            let key = PairKey::new(pool[i].id, pool[j].id);
            if !key.is_degenerate() && !history.contains(&key) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn pick_exhaustive<R: Rng + ?Sized>(
    pool: &[&Item],
    history: &HashSet<PairKey>,
    rng: &mut R,
) -> Option<(usize, usize)> {
    candidate_pairs(pool, history).choose(rng).copied()
}

fn pick_sampled<R: Rng + ?Sized>(
    pool: &[&Item],
    history: &HashSet<PairKey>,
    max_attempts: usize,
    rng: &mut R,
) -> Option<(usize, usize)> {
    let mut spent_anchors = HashSet::new();

    for _ in 0..max_attempts {
        let anchor = rng.random_range(0..pool.len());
        if spent_anchors.contains(&anchor) {
            continue;
        }

        let anchor_id = pool[anchor].id;
        let partners: Vec<usize> = (0..pool.len())
            .filter(|&other| other != anchor)
            .filter(|&other| {
                let key = PairKey::new(anchor_id, pool[other].id);
                !key.is_degenerate() && !history.contains(&key)
            })
            .collect();

        match partners.choose(rng) {
            Some(&partner) => return Some((anchor, partner)),
            None => {
                spent_anchors.insert(anchor);
            }
        }
    }

    None
}

/// Serves pairs to voters from the rating store
#[derive(Clone)]
pub struct PairSelector {
    store: Arc<dyn RatingStore>,
    policy: PairingPolicy,
}

impl PairSelector {
    pub fn new(store: Arc<dyn RatingStore>, policy: PairingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &PairingPolicy {
        &self.policy
    }

    /// Next unseen pair for `voter_id`. Read-only.
    pub async fn select_pair(&self, voter_id: &str) -> Result<PairOutcome, RankError> {
        let items = self.store.list_active_items().await?;
        let history = self.store.list_vote_history(voter_id).await?;

        let outcome = {
            let mut rng = rand::rng();
            self.policy.choose(voter_id, &items, &history, &mut rng)
        };

        match &outcome {
            PairOutcome::Pair(a, b) => {
                tracing::debug!("Serving pair {} vs {} to voter {}", a.id, b.id, voter_id);
            }
            PairOutcome::Exhausted => {
                tracing::info!(
                    "Voter {} exhausted all pairs ({} active items, {} judged)",
                    voter_id,
                    items.len(),
                    history.len()
                );
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BASELINE_RATING;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(Some(format!("Desk {}", i)), Some(format!("owner-{}", i)), BASELINE_RATING))
            .collect()
    }

    fn all_pairs(items: &[Item]) -> HashSet<PairKey> {
        let mut pairs = HashSet::new();
        for a in items {
            for b in items {
                if a.id != b.id {
                    pairs.insert(PairKey::new(a.id, b.id));
                }
            }
        }
        pairs
    }

    fn expect_pair(outcome: PairOutcome) -> (Item, Item) {
        match outcome {
            PairOutcome::Pair(a, b) => (a, b),
            PairOutcome::Exhausted => panic!("expected a pair"),
        }
    }

    #[test]
    fn test_fewer_than_two_items_is_exhausted() {
        let policy = PairingPolicy::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(policy.choose("voter", &[], &HashSet::new(), &mut rng).is_exhausted());
        assert!(policy.choose("voter", &items(1), &HashSet::new(), &mut rng).is_exhausted());
    }

    #[test]
    fn test_returns_distinct_items() {
        let policy = PairingPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let pool = items(5);
        for _ in 0..50 {
            let (a, b) = expect_pair(policy.choose("voter", &pool, &HashSet::new(), &mut rng));
            assert_ne!(a.id, b.id);
        }
    }

    #[test]
    fn test_only_remaining_pair_is_served() {
        let policy = PairingPolicy::default();
        let mut rng = StdRng::seed_from_u64(3);
        let pool = items(3);
        let mut history = all_pairs(&pool);
        let open = PairKey::new(pool[0].id, pool[2].id);
        history.remove(&open);

        for _ in 0..20 {
            let (a, b) = expect_pair(policy.choose("voter", &pool, &history, &mut rng));
            assert_eq!(PairKey::new(a.id, b.id), open);
        }
    }

    #[test]
    fn test_all_pairs_judged_is_exhausted() {
        let policy = PairingPolicy::default();
        let mut rng = StdRng::seed_from_u64(11);
        let pool = items(6);
        let history = all_pairs(&pool);
        assert_eq!(history.len(), 15);
        assert!(policy.choose("voter", &pool, &history, &mut rng).is_exhausted());
        assert_eq!(policy.remaining_pairs("voter", &pool, &history), 0);
    }

    #[test]
    fn test_inactive_and_opted_out_never_served() {
        let policy = PairingPolicy::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut pool = items(4);
        pool[0].active = false;
        pool[1].voting_opt_out = true;
        let hidden = [pool[0].id, pool[1].id];

        for _ in 0..30 {
            let (a, b) = expect_pair(policy.choose("voter", &pool, &HashSet::new(), &mut rng));
            assert!(!hidden.contains(&a.id));
            assert!(!hidden.contains(&b.id));
        }
    }

    #[test]
    fn test_own_items_excluded_when_configured() {
        let mut pool = items(3);
        pool[0].owner_id = Some("voter".to_string());

        let including = PairingPolicy::default();
        assert_eq!(including.remaining_pairs("voter", &pool, &HashSet::new()), 3);

        let excluding = PairingPolicy { include_own_items: false, ..Default::default() };
        assert_eq!(excluding.remaining_pairs("voter", &pool, &HashSet::new()), 1);

        let mut rng = StdRng::seed_from_u64(9);
        let (a, b) = expect_pair(excluding.choose("voter", &pool, &HashSet::new(), &mut rng));
        assert!(!a.is_owned_by("voter") && !b.is_owned_by("voter"));
    }

    #[test]
    fn test_sampled_path_falls_back_to_enumeration() {
        // Force the sampled path with a single anchor draw; only one pair is open.
        let policy = PairingPolicy {
            include_own_items: true,
            exhaustive_threshold: 2,
            max_random_attempts: 1,
        };
        let pool = items(40);
        let mut history = all_pairs(&pool);
        let open = PairKey::new(pool[17].id, pool[33].id);
        history.remove(&open);

        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..10 {
            let (a, b) = expect_pair(policy.choose("voter", &pool, &history, &mut rng));
            assert_eq!(PairKey::new(a.id, b.id), open);
        }

        history.insert(open);
        assert!(policy.choose("voter", &pool, &history, &mut rng).is_exhausted());
    }

    #[test]
    fn test_sampled_path_never_repeats_history() {
        let policy = PairingPolicy { exhaustive_threshold: 0, ..Default::default() };
        let pool = items(12);
        let mut history = HashSet::new();
        let mut rng = StdRng::seed_from_u64(42);

        while let PairOutcome::Pair(a, b) = policy.choose("voter", &pool, &history, &mut rng) {
            assert!(history.insert(PairKey::new(a.id, b.id)), "pair served twice");
        }
        assert_eq!(history.len(), 66);
    }
}
