//! OpenAPI document for the HTTP surface, grounded on
//! `beagle-server::api::openapi::ApiDoc`. The session WebSocket has no
//! REST shape to describe here; its wire protocol lives in `websocket.rs`.

use utoipa::OpenApi;

use crate::api::routes::{auth, health, memories};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kin API",
        version = "1.0.0",
        description = "Session and inspection API for a single-user conversational agent.",
        contact(name = "Kin", email = "kin@localhost")
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::liveness_check,
        auth::login,
        memories::list_memories,
    ),
    components(schemas(
        health::HealthResponse,
        auth::LoginRequest,
        auth::LoginResponse,
        memories::MemoriesResponse,
        memories::MemorySummary,
    )),
    tags(
        (name = "health", description = "Liveness and consciousness-state snapshot"),
        (name = "auth", description = "Creator authentication"),
        (name = "memories", description = "Read-only episodic memory inspection"),
    )
)]
pub struct ApiDoc;
