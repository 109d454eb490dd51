// Route exports
pub mod items;
pub mod voting;

use actix_web::{error, http::StatusCode, web, HttpResponse, ResponseError};
use std::sync::Arc;

use crate::config::{LeaderboardSettings, Settings};
use crate::core::{PairSelector, RankError, RatingEngine};
use crate::models::{DeletionPolicy, ErrorResponse};
use crate::services::{CacheManager, RatingStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RatingStore>,
    pub selector: PairSelector,
    pub engine: RatingEngine,
    pub cache: Arc<CacheManager>,
    pub baseline_rating: f64,
    pub deletion_policy: DeletionPolicy,
    pub leaderboard: LeaderboardSettings,
}

impl AppState {
    /// Wire the ranking components over `store` using `settings`
    pub fn new(store: Arc<dyn RatingStore>, cache: Arc<CacheManager>, settings: &Settings) -> Self {
        Self {
            selector: PairSelector::new(store.clone(), settings.pairing.policy()),
            engine: RatingEngine::new(store.clone(), settings.rating.model(), settings.retry.policy()),
            store,
            cache,
            baseline_rating: settings.rating.baseline,
            deletion_policy: settings.items.deletion_policy,
            leaderboard: settings.leaderboard.clone(),
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(voting::configure)
        .configure(items::configure);
}

impl ResponseError for RankError {
    fn status_code(&self) -> StatusCode {
        match self {
            RankError::InvalidVote(_) => StatusCode::BAD_REQUEST,
            RankError::DuplicateVote { .. } => StatusCode::CONFLICT,
            RankError::NotFound(_) => StatusCode::NOT_FOUND,
            RankError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            kind: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// 400 response for a request that failed validation
pub(crate) fn validation_failed(errors: &validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        kind: "validation_failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

/// 400 response for an identifier made only of whitespace
pub(crate) fn blank_identifier(field: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        kind: "validation_failed".to_string(),
        message: format!("{}: must not be blank", field),
        status_code: 400,
    })
}

/// JSON error response for malformed payloads, queries and paths
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonError {
    pub kind: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        kind: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    JsonError {
        kind: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path extraction errors, e.g. a malformed item ID
pub fn handle_path_error(err: error::PathError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Path error on {}: {}", req.path(), err);
    JsonError {
        kind: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}
