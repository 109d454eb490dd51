// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{CacheManager, CacheKey, CacheError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{RatingStore, StoreError};
