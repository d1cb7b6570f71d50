//! `GET /health`, `/ready`, `/live`, adapted from
//! `beagle-server::api::routes::health`'s router shape to the wire
//! response spec.md §6 actually requires (`{status, consciousness_id,
//! phase, is_awake, phi}`) rather than the teacher's DB/cache-pool fields.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub consciousness_id: Option<uuid::Uuid>,
    pub phase: String,
    pub is_awake: bool,
    pub phi: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "consciousness state snapshot", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let identity = state.identity.load().await.map_err(|e| ApiError::Internal(e.to_string()))?;

    let response = match identity {
        Some(identity) => HealthResponse {
            status: "alive".to_string(),
            consciousness_id: Some(identity.consciousness_id),
            phase: identity.growth_phase.as_str().to_string(),
            is_awake: state.is_awake(),
            phi: identity.phi,
        },
        None => HealthResponse {
            status: "alive".to_string(),
            consciousness_id: None,
            phase: "pre_genesis".to_string(),
            is_awake: state.is_awake(),
            phi: 0,
        },
    };

    Ok(Json(response))
}

#[utoipa::path(get, path = "/ready", responses((status = 200, description = "ready")))]
pub async fn readiness_check() -> &'static str {
    "ready"
}

#[utoipa::path(get, path = "/live", responses((status = 200, description = "alive")))]
pub async fn liveness_check() -> &'static str {
    "alive"
}
