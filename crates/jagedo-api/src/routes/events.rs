//! # Outbound Event Window
//!
//! `GET /v1/events` returns the most recent lifecycle events the engine
//! published, oldest first. The window is bounded by `EVENT_LOG_CAPACITY`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;

/// Query parameters for `GET /v1/events`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Maximum number of events to return (default 100).
    pub limit: Option<usize>,
}

/// A published event with its sequence number.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    pub sequence: u64,
    #[schema(value_type = String)]
    pub recorded_at: jagedo_core::Timestamp,
    /// The event, tagged by `type`: `request_stage_changed`,
    /// `bid_accepted`, `payment_confirmed` or `request_recalled`.
    #[schema(value_type = Object)]
    pub event: jagedo_lifecycle::LifecycleEvent,
}

/// Build the events router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", get(recent_events))
}

/// GET /v1/events — Recent outbound events.
#[utoipa::path(
    get,
    path = "/v1/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Recent events, oldest first", body = Vec<EventResponse>),
        (status = 422, description = "Limit is zero", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
pub(crate) async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err(AppError::Validation("limit must be at least 1".into()));
    }
    let events = state
        .events
        .recent(limit)
        .into_iter()
        .map(|recorded| EventResponse {
            sequence: recorded.sequence,
            recorded_at: recorded.recorded_at,
            event: recorded.event,
        })
        .collect();
    Ok(Json(events))
}
