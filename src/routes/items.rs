use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::core::{to_entries, RankError};
use crate::models::{
    CreateItemRequest, HealthResponse, ItemPatch, LeaderboardQuery, LeaderboardResponse, NewItem,
    OwnerItemsQuery, OwnerItemsResponse, UpdateItemRequest,
};
use crate::routes::{blank_identifier, validation_failed, AppState};

/// Configure leaderboard, item lifecycle and health routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/leaderboard", web::get().to(get_leaderboard))
        .route("/items", web::get().to(list_owner_items))
        .route("/items", web::post().to(create_item))
        .route("/items/{id}", web::get().to(get_item))
        .route("/items/{id}", web::patch().to(update_item))
        .route("/items/{id}", web::delete().to(delete_item));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let store_healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Ranked active items
///
/// GET /leaderboard?limit={n}
async fn get_leaderboard(
    state: web::Data<AppState>,
    query: web::Query<LeaderboardQuery>,
) -> Result<HttpResponse, RankError> {
    let limit = state.leaderboard.clamp(query.limit);
    let cache_key = state.cache.leaderboard_key(limit);

    if let Ok(cached) = state.cache.get::<LeaderboardResponse>(&cache_key).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let items = state.store.leaderboard(limit).await?;
    let response = LeaderboardResponse {
        total: items.len(),
        items: to_entries(items),
    };

    if let Err(e) = state.cache.set(&cache_key, &response).await {
        tracing::warn!("Failed to cache leaderboard: {}", e);
    }

    Ok(HttpResponse::Ok().json(response))
}

/// Register an uploaded item at the baseline rating
///
/// POST /items
async fn create_item(
    state: web::Data<AppState>,
    req: web::Json<CreateItemRequest>,
) -> Result<HttpResponse, RankError> {
    if let Err(errors) = req.validate() {
        return Ok(validation_failed(&errors));
    }

    let req = req.into_inner();
    let item = state
        .store
        .create_item(
            NewItem {
                title: req.title,
                owner_id: req.owner_id,
            },
            state.baseline_rating,
        )
        .await?;

    tracing::info!("Created item {} (owner: {:?})", item.id, item.owner_id);
    invalidate_leaderboard(&state).await;

    Ok(HttpResponse::Created().json(item))
}

/// An owner's items, inactive ones included, newest first
///
/// GET /items?owner={ownerId}
async fn list_owner_items(
    state: web::Data<AppState>,
    query: web::Query<OwnerItemsQuery>,
) -> Result<HttpResponse, RankError> {
    if let Err(errors) = query.validate() {
        return Ok(validation_failed(&errors));
    }
    if query.owner.trim().is_empty() {
        return Ok(blank_identifier("owner"));
    }

    let items = state.store.list_items_by_owner(&query.owner).await?;

    Ok(HttpResponse::Ok().json(OwnerItemsResponse {
        owner_id: query.into_inner().owner,
        total: items.len(),
        items,
    }))
}

async fn get_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, RankError> {
    let item = state.store.get_item(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(item))
}

/// Owner changes: title, active, votingOptOut
///
/// PATCH /items/{id}
async fn update_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateItemRequest>,
) -> Result<HttpResponse, RankError> {
    if let Err(errors) = req.validate() {
        return Ok(validation_failed(&errors));
    }

    let req = req.into_inner();
    let patch = ItemPatch {
        title: req.title,
        active: req.active,
        voting_opt_out: req.voting_opt_out,
    };
    let item = state.store.update_item(path.into_inner(), patch).await?;

    tracing::info!(
        "Updated item {} (active: {}, voting opt-out: {})",
        item.id,
        item.active,
        item.voting_opt_out
    );
    invalidate_leaderboard(&state).await;

    Ok(HttpResponse::Ok().json(item))
}

/// DELETE /items/{id}
async fn delete_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, RankError> {
    let id = path.into_inner();
    if !state.store.delete_item(id, state.deletion_policy).await? {
        return Err(RankError::NotFound(id));
    }

    tracing::info!("Deleted item {} ({:?})", id, state.deletion_policy);
    invalidate_leaderboard(&state).await;

    Ok(HttpResponse::NoContent().finish())
}

async fn invalidate_leaderboard(state: &AppState) {
    if let Err(e) = state.cache.invalidate_leaderboard().await {
        tracing::warn!("Failed to invalidate leaderboard cache: {}", e);
    }
}
