use std::cmp::Ordering;

use crate::models::{Item, LeaderboardEntry};

/// Leaderboard ordering: rating descending, then oldest first, then by ID.
///
/// Elo ties are common while items have few votes, so the order has to be
/// total for the board to be stable between requests.
#[inline]
pub fn compare_standing(a: &Item, b: &Item) -> Ordering {
    b.rating
        .partial_cmp(&a.rating)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Keep active items, sort them by standing and truncate to `limit`
pub fn rank_items(items: Vec<Item>, limit: usize) -> Vec<Item> {
    let mut ranked: Vec<Item> = items.into_iter().filter(|item| item.active).collect();
    ranked.sort_by(compare_standing);
    ranked.truncate(limit);
    ranked
}

/// Attach 1-based ranks to already ordered items
pub fn to_entries(items: Vec<Item>) -> Vec<LeaderboardEntry> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| LeaderboardEntry { rank: index + 1, item })
        .collect()
}
