use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::core::RankError;
use crate::models::{PairOutcome, PairQuery, PairResponse, SubmitVoteRequest, VoteHistoryResponse, VoteResponse};
use crate::routes::{blank_identifier, validation_failed, AppState};

/// Configure pairing and voting routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/pair", web::get().to(get_pair))
        .route("/vote", web::post().to(submit_vote))
        .route("/voters/{voter_id}/history", web::get().to(get_vote_history));
}

/// Next pair for a voter
///
/// GET /pair?voter={voterId}
///
/// Returns `{"itemA": {...}, "itemB": {...}}`, or `{"exhausted": true}` once
/// the voter has judged every available pair.
async fn get_pair(
    state: web::Data<AppState>,
    query: web::Query<PairQuery>,
) -> Result<HttpResponse, RankError> {
    if let Err(errors) = query.validate() {
        return Ok(validation_failed(&errors));
    }
    if query.voter.trim().is_empty() {
        return Ok(blank_identifier("voter"));
    }

    let response = match state.selector.select_pair(&query.voter).await? {
        PairOutcome::Pair(a, b) => PairResponse::Pair {
            item_a: a.into(),
            item_b: b.into(),
        },
        PairOutcome::Exhausted => PairResponse::Exhausted { exhausted: true },
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Record a comparison
///
/// POST /vote
///
/// Request body:
/// ```json
/// {
///   "voterId": "string",
///   "winnerId": "uuid",
///   "loserId": "uuid"
/// }
/// ```
///
/// `voterID`/`winnerID`/`loserID` and snake_case names are accepted too.
async fn submit_vote(
    state: web::Data<AppState>,
    req: web::Json<SubmitVoteRequest>,
) -> Result<HttpResponse, RankError> {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for vote request: {:?}", errors);
        return Ok(validation_failed(&errors));
    }
    if req.voter_id.trim().is_empty() {
        return Ok(blank_identifier("voterId"));
    }

    let outcome = state
        .engine
        .record_vote(&req.voter_id, req.winner_id, req.loser_id)
        .await?;

    if let Err(e) = state.cache.invalidate_leaderboard().await {
        tracing::warn!("Failed to invalidate leaderboard cache: {}", e);
    }

    Ok(HttpResponse::Ok().json(VoteResponse {
        vote_id: outcome.vote.id,
        winner_rating: outcome.winner_rating,
        loser_rating: outcome.loser_rating,
    }))
}

/// Pairs a voter has already judged
///
/// GET /voters/{voterId}/history
async fn get_vote_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, RankError> {
    let voter_id = path.into_inner();
    let mut pairs: Vec<_> = state.store.list_vote_history(&voter_id).await?.into_iter().collect();
    pairs.sort();

    Ok(HttpResponse::Ok().json(VoteHistoryResponse {
        count: pairs.len(),
        voter_id,
        pairs,
    }))
}
