//! Deskrank - pairwise Elo ranking service for workstation setups
//!
//! Voters are shown two items they have not compared yet and pick one. Each
//! pick is committed atomically together with the Elo update of both items,
//! and the leaderboard orders items by the resulting rating.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{EloModel, PairSelector, PairingPolicy, RankError, RatingEngine, RetryPolicy};
pub use crate::models::{Item, PairKey, PairOutcome, VoteOutcome};
pub use crate::services::{MemoryStore, PostgresStore, RatingStore, StoreError};
