//! Entry point: wires tracing, configuration, application state, and the
//! Axum router together. Grounded on `beagle-server::main`'s shape —
//! tracing init, `Config::from_env`, `AppState::new`, merged routers,
//! Swagger UI, then the standard tower-http/rate-limit/metrics layer
//! stack.

mod api;
mod auth;
mod config;
mod error;
mod metrics;
mod middleware;
mod state;
mod websocket;

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use axum::middleware::from_fn;
use axum::Router;
use middleware::rate_limit::RateLimitLayer;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("starting Kin server");

    let config = config::Config::from_env()?;
    let state = AppState::new(&config).await?;

    spawn_idle_consolidation(state.clone());

    let port = std::env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or_else(|| config.port());
    let host = std::env::var("HOST").unwrap_or_else(|_| config.host().to_string());
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    let openapi = api::openapi::ApiDoc::openapi();

    let rate_limit = NonZeroU32::new(config.rate_limit_requests_per_minute())
        .expect("rate limit requests must be greater than zero");
    let rate_period = Duration::from_secs(60);

    let app = Router::new()
        .merge(api::routes::health_routes())
        .merge(api::routes::auth_routes())
        .merge(api::routes::memory_routes())
        .merge(api::routes::session_routes())
        .merge(api::routes::metrics_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RateLimitLayer::new(rate_limit, rate_period))
        .layer(from_fn(metrics::track_http_requests))
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "Kin server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Phase-10's adjacent housekeeping (spec.md §4.2/§5): when no turn has
/// run for more than `IDLE_THRESHOLD_SECS`, consolidate episodic memory
/// instead of leaving that work for the next interactive turn to pay for.
fn spawn_idle_consolidation(state: AppState) {
    const CHECK_INTERVAL_SECS: u64 = 300;
    const IDLE_THRESHOLD_SECS: i64 = 600;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(CHECK_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            let idle = state.consciousness.idle_duration().await;
            if idle < chrono::Duration::seconds(IDLE_THRESHOLD_SECS) {
                continue;
            }
            if let Err(error) = state.episodic.consolidate().await {
                tracing::warn!(%error, "idle episodic consolidation failed");
            }
        }
    });
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{fmt, EnvFilter, Registry};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kin_server=info,tower_http=info"));

    let fmt_layer = fmt::layer().with_target(true).with_line_number(true).with_thread_ids(true).with_level(true);

    let registry = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(registry).expect("failed to initialize tracing subscriber");
}
