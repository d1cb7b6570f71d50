//! `/auth/login`: the single Creator account exchanges a password for a
//! bearer JWT, grounded on `beagle-server::api::routes::auth::login`.

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "authenticated", body = LoginResponse),
        (status = 401, description = "invalid credentials"),
        (status = 400, description = "malformed request"),
    )
)]
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("username and password are required".into()));
    }

    if payload.username != state.creator_name() {
        return Err(ApiError::Unauthorized("invalid credentials".into()));
    }

    let parsed_hash = PasswordHash::new(state.admin_password_hash())
        .map_err(|_| ApiError::Internal("stored password hash is invalid".into()))?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("invalid credentials".into()))?;

    let device_id = payload.device_id.unwrap_or_else(|| "default".to_string());
    let claims = Claims::new(payload.username, device_id, state.jwt_expiration_hours());
    let token = claims.encode(state.jwt_secret())?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_expiration_hours() * 3600,
    }))
}
