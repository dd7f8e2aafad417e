//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "JaGedo Settlement Engine API",
        version = "0.1.0",
        description = "Request lifecycle and settlement engine for a construction marketplace.\n\nCustomers raise jobs and goods orders; operations review them and assign providers directly or through bidding; accepted bids are paid out milestone by milestone.\n\nEvery command names its caller with the `x-caller-role` and `x-caller-id` headers.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Requests ─────────────────────────────────────────────────────
        crate::routes::requests::create_request,
        crate::routes::requests::list_requests,
        crate::routes::requests::get_request,
        crate::routes::requests::submit,
        crate::routes::requests::start_review,
        crate::routes::requests::choose_restricted,
        crate::routes::requests::choose_competitive,
        crate::routes::requests::begin,
        crate::routes::requests::complete,
        crate::routes::requests::recall,
        crate::routes::requests::quote,
        // ── Bids ─────────────────────────────────────────────────────────
        crate::routes::bids::get_bids,
        crate::routes::bids::submit_bid,
        crate::routes::bids::accept_bid,
        crate::routes::bids::reject_bid,
        crate::routes::bids::get_milestones,
        // ── Milestones & payments ────────────────────────────────────────
        crate::routes::payments::approve_milestone,
        crate::routes::payments::reject_milestone,
        crate::routes::payments::record_payment,
        crate::routes::payments::get_payments,
        crate::routes::payments::record_ad_hoc_payment,
        crate::routes::payments::complete_payment,
        crate::routes::payments::confirm_payment,
        // ── Events ───────────────────────────────────────────────────────
        crate::routes::events::recent_events,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::requests::CreateRequestBody,
        crate::routes::requests::LineItemBody,
        crate::routes::requests::RestrictedAssignmentBody,
        crate::routes::requests::RecallBody,
        crate::routes::requests::RequestResponse,
        crate::routes::requests::TransitionResponse,
        crate::routes::requests::QuoteResponse,
        crate::routes::bids::SubmitBidBody,
        crate::routes::bids::PlanItemBody,
        crate::routes::bids::BidResponse,
        crate::routes::payments::RecordPaymentBody,
        crate::routes::payments::MilestoneResponse,
        crate::routes::payments::PaymentResponse,
        crate::routes::payments::ConfirmationResponse,
        crate::routes::events::EventResponse,
    )),
    tags(
        (name = "requests", description = "Request lifecycle commands and queries"),
        (name = "bids", description = "Competitive bidding"),
        (name = "payments", description = "Milestones and payments"),
        (name = "events", description = "Recent outbound lifecycle events"),
    )
)]
pub struct ApiDoc;

/// Router serving `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
