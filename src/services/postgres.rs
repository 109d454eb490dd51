use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

use crate::core::elo::EloModel;
use crate::models::{Ballot, DeletionPolicy, Item, ItemId, ItemPatch, NewItem, PairKey, VoteOutcome, VoteRecord};
use crate::services::store::{RatingStore, StoreError};

const ITEM_COLUMNS: &str =
    "id, title, rating, vote_count, active, owner_id, voting_opt_out, created_at";

/// Locked view of an item inside a vote transaction
struct LockedItem {
    id: Uuid,
    rating: f64,
    vote_count: i64,
    active: bool,
}

/// PostgreSQL rating store
///
/// Votes commit inside one transaction: both item rows are locked with
/// `SELECT ... FOR UPDATE` in ascending ID order, the vote row is inserted
/// (a unique index on the unordered pair per voter rejects duplicates), and
/// both ratings are written before `COMMIT`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL at {}", redact_url(url));

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    async fn lock_item(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<LockedItem, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, rating, vote_count, active
            FROM items
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Ok(LockedItem {
            id: row.try_get("id")?,
            rating: row.try_get("rating")?,
            vote_count: row.try_get("vote_count")?,
            active: row.try_get("active")?,
        })
    }

    /// Append the vote row. `None` if the voter already judged this pair.
    async fn insert_vote(
        tx: &mut Transaction<'_, Postgres>,
        ballot: &Ballot,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let key = ballot.pair_key();
        let row = sqlx::query(
            r#"
            INSERT INTO votes (id, voter_id, winner_id, loser_id, pair_low, pair_high, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (voter_id, pair_low, pair_high) DO NOTHING
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&ballot.voter_id)
        .bind(ballot.winner_id)
        .bind(ballot.loser_id)
        .bind(key.low())
        .bind(key.high())
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => Ok(Some(VoteRecord {
                id: row.try_get("id")?,
                voter_id: ballot.voter_id.clone(),
                winner_id: ballot.winner_id,
                loser_id: ballot.loser_id,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn update_item_rating(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        rating: f64,
        vote_count: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE items SET rating = $2, vote_count = $3 WHERE id = $1")
            .bind(id)
            .bind(rating)
            .bind(vote_count)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RatingStore for PostgresStore {
    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError> {
        let query = format!("SELECT {} FROM items WHERE active", ITEM_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn list_vote_history(&self, voter_id: &str) -> Result<HashSet<PairKey>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT pair_low, pair_high
            FROM votes
            WHERE voter_id = $1
            "#,
        )
        .bind(voter_id)
        .fetch_all(&self.pool)
        .await?;

        let mut history = HashSet::with_capacity(rows.len());
        for row in &rows {
            let low: Uuid = row.try_get("pair_low")?;
            let high: Uuid = row.try_get("pair_high")?;
            history.insert(PairKey::new(low, high));
        }

        tracing::debug!("Voter {} has judged {} pairs", voter_id, history.len());

        Ok(history)
    }

    async fn get_item(&self, id: ItemId) -> Result<Item, StoreError> {
        let query = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        item_from_row(&row)
    }

    async fn list_items_by_owner(&self, owner_id: &str) -> Result<Vec<Item>, StoreError> {
        let query = format!(
            "SELECT {} FROM items WHERE owner_id = $1 ORDER BY created_at DESC, id ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn create_item(&self, new_item: NewItem, baseline: f64) -> Result<Item, StoreError> {
        let query = format!(
            r#"
            INSERT INTO items (id, title, rating, vote_count, active, owner_id, voting_opt_out, created_at)
            VALUES ($1, $2, $3, 0, TRUE, $4, FALSE, NOW())
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&new_item.title)
            .bind(baseline)
            .bind(&new_item.owner_id)
            .fetch_one(&self.pool)
            .await?;
        item_from_row(&row)
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        let query = format!(
            r#"
            UPDATE items SET
                title = COALESCE($2, title),
                active = COALESCE($3, active),
                voting_opt_out = COALESCE($4, voting_opt_out)
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(&patch.title)
            .bind(patch.active)
            .bind(patch.voting_opt_out)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        item_from_row(&row)
    }

    async fn delete_item(&self, id: ItemId, policy: DeletionPolicy) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if deleted && policy == DeletionPolicy::PurgeVotes {
            let purged = sqlx::query("DELETE FROM votes WHERE winner_id = $1 OR loser_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            tracing::info!("Purged {} votes referencing deleted item {}", purged, id);
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn commit_vote(&self, ballot: &Ballot, model: &EloModel) -> Result<VoteOutcome, StoreError> {
        if ballot.winner_id == ballot.loser_id {
            return Err(StoreError::InvalidVote("winner and loser are the same item".to_string()));
        }

        let key = ballot.pair_key();
        let mut tx = self.pool.begin().await?;

        // Lock order is always ascending ID to avoid deadlocks between voters
        let low = Self::lock_item(&mut tx, key.low()).await?;
        let high = Self::lock_item(&mut tx, key.high()).await?;

        for item in [&low, &high] {
            if !item.active {
                return Err(StoreError::InvalidVote(format!("item {} is not active", item.id)));
            }
        }

        let vote = Self::insert_vote(&mut tx, ballot)
            .await?
            .ok_or_else(|| StoreError::DuplicateVote {
                voter_id: ballot.voter_id.clone(),
            })?;

        let (winner, loser) = if low.id == ballot.winner_id { (low, high) } else { (high, low) };
        let update = model.rate(winner.rating, loser.rating);
        let winner_votes = winner.vote_count + 1;
        let loser_votes = loser.vote_count + 1;

        Self::update_item_rating(&mut tx, winner.id, update.winner, winner_votes).await?;
        Self::update_item_rating(&mut tx, loser.id, update.loser, loser_votes).await?;

        // Dropping `tx` on any early return above rolls everything back
        tx.commit().await?;

        Ok(VoteOutcome {
            vote,
            winner_rating: update.winner,
            loser_rating: update.loser,
            winner_vote_count: to_count(winner_votes)?,
            loser_vote_count: to_count(loser_votes)?,
        })
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM items
            WHERE active
            ORDER BY rating DESC, created_at ASC, id ASC
            LIMIT $1
            "#,
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn count_items(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        usize::try_from(count).map_err(|_| StoreError::Corrupt(format!("item count {}", count)))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let vote_count: i64 = row.try_get("vote_count")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Item {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        rating: row.try_get("rating")?,
        vote_count: to_count(vote_count)?,
        active: row.try_get("active")?,
        owner_id: row.try_get("owner_id")?,
        voting_opt_out: row.try_get("voting_opt_out")?,
        created_at,
    })
}

fn to_count(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative vote count {}", value)))
}

/// Strip the password from a connection URL before logging it
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.find(':') {
                Some(colon) => format!(
                    "{}{}:****{}",
                    &url[..scheme_end + 3],
                    &credentials[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
