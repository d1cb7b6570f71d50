//! JWT authentication for the single Creator principal, grounded on
//! `beagle-server::auth::mod`'s `Claims` + `FromRequestParts` extractor
//! shape.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::typed_header::TypedHeader;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// The Creator is the only subject a token is ever issued for; `device_id`
/// distinguishes concurrent client devices without implying multi-user
/// access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub device_id: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn new(subject: String, device_id: String, expiration_hours: i64) -> Self {
        let now = Utc::now();
        let expires_at = now + Duration::hours(expiration_hours);
        Self {
            sub: subject,
            device_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        }
    }

    pub fn encode(&self, secret: &str) -> Result<String, ApiError> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|err| ApiError::Internal(format!("failed to sign JWT: {err}")))
    }

    pub fn decode(token: &str, secret: &str) -> Result<Self, ApiError> {
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| ApiError::Unauthorized(format!("invalid token: {err}")))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Claims {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized("missing Authorization header".into()))?;

        Claims::decode(bearer.token(), state.jwt_secret())
    }
}
