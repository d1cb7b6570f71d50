//! `GET /memories?limit=N&importance_min=F`: read-only inspection of
//! episodic memory (spec.md §6), authenticated the same as the session
//! WebSocket since it exposes the persona's private history.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MemoriesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub importance_min: f32,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemorySummary {
    pub id: uuid::Uuid,
    pub content: String,
    pub summary: Option<String>,
    pub context: Option<String>,
    pub importance: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemoriesResponse {
    pub memories: Vec<MemorySummary>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/memories", get(list_memories))
}

#[utoipa::path(
    get,
    path = "/memories",
    params(("limit" = Option<i64>, Query), ("importance_min" = Option<f32>, Query)),
    responses((status = 200, description = "recent episodic memories", body = MemoriesResponse))
)]
pub async fn list_memories(
    State(state): State<AppState>,
    _claims: Claims,
    Query(query): Query<MemoriesQuery>,
) -> ApiResult<Json<MemoriesResponse>> {
    if query.limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".into()));
    }

    let memories = state
        .episodic
        .list_recent(query.limit, query.importance_min)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(MemoriesResponse {
        memories: memories
            .into_iter()
            .map(|memory| MemorySummary {
                id: memory.memory_id,
                content: memory.content,
                summary: memory.summary,
                context: memory.context_type,
                importance: memory.importance.get(),
                timestamp: memory.occurred_at,
            })
            .collect(),
    }))
}
