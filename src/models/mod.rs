// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Item, ItemId, PairKey, Ballot, VoteRecord, VoteOutcome, PairOutcome, NewItem, ItemPatch, DeletionPolicy, BASELINE_RATING};
pub use requests::{PairQuery, SubmitVoteRequest, LeaderboardQuery, OwnerItemsQuery, CreateItemRequest, UpdateItemRequest};
pub use responses::{PairItem, PairResponse, VoteResponse, LeaderboardEntry, LeaderboardResponse, VoteHistoryResponse, OwnerItemsResponse, HealthResponse, ErrorResponse};
