//! Route registration, grounded on `beagle-server::api::routes`'s
//! per-concern `Router` factory functions merged together in `main.rs`.

use axum::Router;

use crate::metrics;
use crate::state::AppState;
use crate::websocket;

pub mod auth;
pub mod health;
pub mod memories;

pub fn health_routes() -> Router<AppState> {
    Router::new().merge(health::router())
}

pub fn auth_routes() -> Router<AppState> {
    Router::new().merge(auth::router())
}

pub fn memory_routes() -> Router<AppState> {
    Router::new().merge(memories::router())
}

pub fn session_routes() -> Router<AppState> {
    Router::new().merge(websocket::router())
}

pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", axum::routing::get(metrics::metrics_handler))
}
