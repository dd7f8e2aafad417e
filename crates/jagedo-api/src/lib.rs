//! # jagedo-api — Axum API for the Settlement Engine
//!
//! HTTP surface over [`jagedo_lifecycle::LifecycleEngine`]. Handlers
//! translate requests into engine commands and engine errors into
//! structured JSON responses; no business rules live here.
//!
//! ## API Surface
//!
//! | Prefix                   | Module                     | Domain                |
//! |--------------------------|----------------------------|-----------------------|
//! | `/v1/requests/*`         | [`routes::requests`]       | Request lifecycle     |
//! | `/v1/requests/:id/bids/*`| [`routes::bids`]           | Competitive bidding   |
//! | `/v1/milestones/*`       | [`routes::payments`]       | Milestone approval    |
//! | `/v1/payments/*`         | [`routes::payments`]       | Payment confirmation  |
//! | `/v1/events`             | [`routes::events`]         | Outbound events       |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::collections::BTreeMap;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    let api = Router::new()
        .merge(routes::requests::router())
        .merge(routes::bids::router())
        .merge(routes::payments::router())
        .merge(routes::events::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(axum::Extension(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let probes = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .route("/metrics", axum::routing::get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

/// GET /metrics — Prometheus scrape endpoint.
///
/// Refreshes the per-stage request gauge and the event window gauge from
/// the engine on each scrape, then encodes the registry.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = &state.metrics;

    let mut by_stage: BTreeMap<&'static str, usize> = BTreeMap::new();
    for request in state.engine.list_requests() {
        *by_stage.entry(request.stage.as_str()).or_default() += 1;
    }
    metrics.requests_by_stage().reset();
    for (stage, count) in &by_stage {
        metrics
            .requests_by_stage()
            .with_label_values(&[stage])
            .set(*count as f64);
    }
    metrics.events_retained().set(state.events.len() as f64);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => AppError::Internal(e).into_response(),
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The engine is in-process, so the service is ready as
/// soon as the router serves.
async fn readiness() -> &'static str {
    "ready"
}
