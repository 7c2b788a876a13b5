use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{CatalogReader, HybridOrchestrator, StoreError};
use crate::models::{
    CreateProfileRequest, ErrorResponse, HealthResponse, MatchResultsQuery, RequestMatchRequest,
    RequestMatchResponse,
};
use crate::services::{MatchStore, ProfileWriter, ResultReader};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MatchStore>,
    pub orchestrator: Arc<HybridOrchestrator>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/profiles", web::post().to(create_profile))
        .route("/scholarships", web::get().to(list_scholarships))
        .route("/matches/request", web::post().to(request_match))
        .route("/matches/results", web::get().to(get_results));
}

fn store_error(context: &str, e: StoreError) -> HttpResponse {
    tracing::error!("{}: {}", context, e);
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: context.to_string(),
        message: e.to_string(),
        status_code: 500,
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.store.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Create a diagnostic profile
///
/// POST /api/v1/profiles
async fn create_profile(
    state: web::Data<AppState>,
    req: web::Json<CreateProfileRequest>,
) -> impl Responder {
    let profile = req.into_inner().into_profile(Uuid::new_v4(), chrono::Utc::now());

    match state.store.insert_profile(profile).await {
        Ok(profile) => {
            tracing::info!("Created profile {}", profile.id);
            HttpResponse::Created().json(profile)
        }
        Err(e) => store_error("Failed to create profile", e),
    }
}

/// Published scholarship catalog
///
/// GET /api/v1/scholarships
async fn list_scholarships(state: web::Data<AppState>) -> impl Responder {
    match state.store.get_published_offers().await {
        Ok(offers) => HttpResponse::Ok().json(offers),
        Err(e) => store_error("Failed to load scholarships", e),
    }
}

/// Start a matching run in the background
///
/// POST /api/v1/matches/request
///
/// Request body:
/// ```json
/// { "profileId": "uuid" }
/// ```
async fn request_match(
    state: web::Data<AppState>,
    req: web::Json<RequestMatchRequest>,
) -> impl Responder {
    let profile_id = req.profile_id;
    tracing::info!("Matching requested for profile {}", profile_id);

    state.orchestrator.spawn_match(profile_id);

    HttpResponse::Accepted().json(RequestMatchResponse {
        status: "accepted".to_string(),
        message: "Matching started. Poll /api/v1/matches/results for the outcome.".to_string(),
        profile_id,
    })
}

/// Latest result set for a profile, ordered by rank
///
/// GET /api/v1/matches/results?profileId=...
async fn get_results(
    state: web::Data<AppState>,
    query: web::Query<MatchResultsQuery>,
) -> impl Responder {
    let profile_id = query.profile_id;

    match state.store.get_results(profile_id).await {
        Ok(results) if results.is_empty() => HttpResponse::NotFound().json(ErrorResponse {
            error: "Results not found".to_string(),
            message: format!("Results for profile {} not found or still processing", profile_id),
            status_code: 404,
        }),
        Ok(results) => HttpResponse::Ok().json(results),
        Err(e) => store_error("Failed to load results", e),
    }
}
