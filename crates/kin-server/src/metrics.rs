//! HTTP request metrics exposed at `/metrics`, grounded on
//! `beagle-server::metrics`.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::ApiError;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid http_requests_total counter config");

    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("registering http_requests_total in the global registry");

    counter
});

pub async fn metrics_handler() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|err| ApiError::Internal(format!("failed to encode Prometheus metrics: {err}")))?;

    let body = String::from_utf8(buffer)
        .map_err(|err| ApiError::Internal(format!("metrics buffer was not UTF-8: {err}")))?;

    Ok(([(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))], body))
}

pub async fn track_http_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let matched_path: String = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS
        .with_label_values(&[method.as_str(), matched_path.as_str(), status.as_str()])
        .inc();

    response
}
