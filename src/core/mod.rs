// Ranking core exports
pub mod elo;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod selector;

pub use elo::{EloModel, RatingUpdate, DEFAULT_K_FACTOR, ELO_SCALE};
pub use engine::{RatingEngine, RetryPolicy};
pub use error::RankError;
pub use leaderboard::{compare_standing, rank_items, to_entries};
pub use selector::{PairSelector, PairingPolicy};
