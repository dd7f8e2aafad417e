//! # Request Lifecycle API
//!
//! Creation, queries, and the stage commands of a request:
//! DRAFT → NEW → UNDERREVIEW → (BIDDING →) ASSIGNED → ACTIVE → COMPLETE,
//! with RECALLED reachable before assignment.
//!
//! Every command returns the committed request snapshot. Replaying a
//! command that was already applied returns the same snapshot with an
//! unchanged `version`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use jagedo_core::{Amount, ManagedBy, ProviderId, RequestId};
use jagedo_lifecycle::{
    AssignmentMethod, LineItem, NewRequest, Quote, Request, RequestCategory, RequestKind, Stage,
    StageTransition,
};
use jagedo_settlement::{CommissionBreakdown, DiscountQuote};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, CallerIdentity, Validate};
use crate::state::AppState;

// ── Request bodies ──────────────────────────────────────────────

/// Body of `POST /v1/requests`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRequestBody {
    /// JOB or ORDER.
    #[schema(value_type = String, example = "JOB")]
    pub kind: RequestKind,
    /// FUNDI, PROFESSIONAL, CONTRACTOR or HARDWARE.
    #[schema(value_type = String, example = "CONTRACTOR")]
    pub category: RequestCategory,
    /// SELF or JAGEDO.
    #[schema(value_type = String, example = "SELF")]
    pub managed_by: ManagedBy,
    pub title: String,
    /// Goods lines; required for ORDER, forbidden for JOB.
    #[serde(default)]
    pub line_items: Vec<LineItemBody>,
}

/// One goods line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LineItemBody {
    pub description: String,
    #[schema(value_type = String, format = Uuid)]
    pub seller_id: ProviderId,
    pub quantity: u32,
    /// Decimal string, at most two fraction digits.
    #[schema(value_type = String, example = "1250.00")]
    pub unit_price: Amount,
}

impl Validate for CreateRequestBody {
    fn validate(&self) -> Result<(), String> {
        if self.title.len() > 200 {
            return Err(format!("title too long: {} bytes (max 200)", self.title.len()));
        }
        if self.line_items.len() > 500 {
            return Err(format!(
                "too many line items: {} (max 500)",
                self.line_items.len()
            ));
        }
        Ok(())
    }
}

impl From<CreateRequestBody> for NewRequest {
    fn from(body: CreateRequestBody) -> Self {
        NewRequest {
            kind: body.kind,
            category: body.category,
            managed_by: body.managed_by,
            title: body.title,
            line_items: body
                .line_items
                .into_iter()
                .map(|line| LineItem {
                    description: line.description,
                    seller_id: line.seller_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        }
    }
}

/// Body of `POST /v1/requests/:id/assignment/restricted`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RestrictedAssignmentBody {
    /// Providers chosen by the reviewer. Ignored for categories whose
    /// candidates are the order's line-item sellers.
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub provider_ids: Vec<ProviderId>,
}

/// Body of `POST /v1/requests/:id/recall`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecallBody {
    pub reason: String,
}

// ── Responses ───────────────────────────────────────────────────

/// A request snapshot.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: RequestId,
    #[schema(value_type = String)]
    pub kind: RequestKind,
    #[schema(value_type = String)]
    pub category: RequestCategory,
    #[schema(value_type = String)]
    pub managed_by: ManagedBy,
    #[schema(value_type = String, format = Uuid)]
    pub customer_id: jagedo_core::CustomerId,
    pub title: String,
    pub line_items: Vec<LineItemBody>,
    /// Current lifecycle stage.
    #[schema(value_type = String, example = "UNDERREVIEW")]
    pub stage: Stage,
    #[schema(value_type = Option<String>)]
    pub assignment_method: Option<AssignmentMethod>,
    #[schema(value_type = Vec<String>)]
    pub assigned_provider_ids: Vec<ProviderId>,
    #[schema(value_type = Option<String>)]
    pub accepted_bid_id: Option<jagedo_core::BidId>,
    pub recall_reason: Option<String>,
    /// Order total (sum of line subtotals); absent for jobs.
    #[schema(value_type = Option<String>)]
    pub order_total: Option<Amount>,
    pub transitions: Vec<TransitionResponse>,
    pub version: u64,
    #[schema(value_type = String)]
    pub created_at: jagedo_core::Timestamp,
    #[schema(value_type = String)]
    pub updated_at: jagedo_core::Timestamp,
}

/// One entry of a request's stage history.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionResponse {
    #[schema(value_type = String)]
    pub from_stage: Stage,
    #[schema(value_type = String)]
    pub to_stage: Stage,
    #[schema(value_type = String)]
    pub actor_role: jagedo_core::CallerRole,
    #[schema(value_type = String, format = Uuid)]
    pub actor_id: jagedo_core::ActorId,
    #[schema(value_type = String)]
    pub at: jagedo_core::Timestamp,
    pub reason: Option<String>,
}

impl From<StageTransition> for TransitionResponse {
    fn from(t: StageTransition) -> Self {
        Self {
            from_stage: t.from_stage,
            to_stage: t.to_stage,
            actor_role: t.actor_role,
            actor_id: t.actor_id,
            at: t.at,
            reason: t.reason,
        }
    }
}

impl From<Request> for RequestResponse {
    fn from(r: Request) -> Self {
        let order_total = match r.kind {
            RequestKind::Order => r.order_total(),
            RequestKind::Job => None,
        };
        Self {
            id: r.id,
            kind: r.kind,
            category: r.category,
            managed_by: r.managed_by,
            customer_id: r.customer_id,
            title: r.title,
            line_items: r
                .line_items
                .into_iter()
                .map(|line| LineItemBody {
                    description: line.description,
                    seller_id: line.seller_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            stage: r.stage,
            assignment_method: r.assignment_method,
            assigned_provider_ids: r.assigned_provider_ids.into_iter().collect(),
            accepted_bid_id: r.accepted_bid_id,
            recall_reason: r.recall_reason,
            order_total,
            transitions: r.transitions.into_iter().map(Into::into).collect(),
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// What the caller's role sees for the accepted bid.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    #[schema(value_type = String, format = Uuid)]
    pub request_id: RequestId,
    #[schema(value_type = String, format = Uuid)]
    pub bid_id: jagedo_core::BidId,
    #[schema(value_type = String)]
    pub viewer_role: jagedo_core::CallerRole,
    #[schema(value_type = String)]
    pub total_amount: Amount,
    #[schema(value_type = String, example = "0.1000")]
    pub commission_rate: jagedo_core::Rate,
    #[schema(value_type = String)]
    pub jagedo_commission: Amount,
    #[schema(value_type = String)]
    pub payable_to_provider: Amount,
    #[schema(value_type = String)]
    pub discount: Amount,
    #[schema(value_type = String)]
    pub discounted_total: Amount,
}

impl From<Quote> for QuoteResponse {
    fn from(q: Quote) -> Self {
        let CommissionBreakdown {
            total_amount,
            commission_rate,
            jagedo_commission,
            payable_to_provider,
        } = q.commission;
        let DiscountQuote {
            discount,
            discounted_total,
            ..
        } = q.discount;
        Self {
            request_id: q.request_id,
            bid_id: q.bid_id,
            viewer_role: q.viewer_role,
            total_amount,
            commission_rate,
            jagedo_commission,
            payable_to_provider,
            discount,
            discounted_total,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────

/// Build the request lifecycle router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request).get(list_requests))
        .route("/v1/requests/:id", get(get_request))
        .route("/v1/requests/:id/submit", post(submit))
        .route("/v1/requests/:id/review", post(start_review))
        .route(
            "/v1/requests/:id/assignment/restricted",
            post(choose_restricted),
        )
        .route(
            "/v1/requests/:id/assignment/competitive",
            post(choose_competitive),
        )
        .route("/v1/requests/:id/begin", post(begin))
        .route("/v1/requests/:id/complete", post(complete))
        .route("/v1/requests/:id/recall", post(recall))
        .route("/v1/requests/:id/quote", get(quote))
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /v1/requests — Create a DRAFT request owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = CreateRequestBody,
    params(
        ("x-caller-role" = String, Header, description = "Caller role"),
        ("x-caller-id" = String, Header, description = "Caller UUID"),
    ),
    responses(
        (status = 201, description = "Request created", body = RequestResponse),
        (status = 400, description = "Malformed body or caller headers", body = crate::error::ErrorBody),
        (status = 422, description = "Request failed validation", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn create_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestResponse>), AppError> {
    let body = extract_validated_json(body)?;
    let request = state.engine.create_request(caller.caller(), body.into())?;
    Ok((StatusCode::CREATED, Json(request.into())))
}

/// GET /v1/requests — List every request, oldest first.
#[utoipa::path(
    get,
    path = "/v1/requests",
    responses((status = 200, description = "All requests", body = Vec<RequestResponse>)),
    tag = "requests"
)]
pub(crate) async fn list_requests(State(state): State<AppState>) -> Json<Vec<RequestResponse>> {
    Json(
        state
            .engine
            .list_requests()
            .into_iter()
            .map(Into::into)
            .collect(),
    )
}

/// GET /v1/requests/:id — Fetch one request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state.engine.get_request(RequestId::from_uuid(id))?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/submit — DRAFT → NEW.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/submit",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request submitted", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not a DRAFT", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state.engine.submit(RequestId::from_uuid(id), caller.caller())?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/review — NEW → UNDERREVIEW.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/review",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request under review", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not NEW", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn start_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state
        .engine
        .start_review(RequestId::from_uuid(id), caller.caller())?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/assignment/restricted — Assign directly.
///
/// An empty or missing body is accepted; categories whose candidates come
/// from the order's line items need no ids.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/assignment/restricted",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RestrictedAssignmentBody,
    responses(
        (status = 200, description = "Request assigned", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Method already set or wrong stage", body = crate::error::ErrorBody),
        (status = 422, description = "No candidate providers", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn choose_restricted(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
    body: Option<Json<RestrictedAssignmentBody>>,
) -> Result<Json<RequestResponse>, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let request = state.engine.choose_restricted(
        RequestId::from_uuid(id),
        caller.caller(),
        &body.provider_ids,
    )?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/assignment/competitive — Open for bids.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/assignment/competitive",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request open for bidding", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Method already set or wrong stage", body = crate::error::ErrorBody),
        (status = 422, description = "Category is restricted and has no candidates", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn choose_competitive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state
        .engine
        .choose_competitive(RequestId::from_uuid(id), caller.caller())?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/begin — ASSIGNED → ACTIVE.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/begin",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Work started", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not ASSIGNED", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn begin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state.engine.begin(RequestId::from_uuid(id), caller.caller())?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/complete — ACTIVE → COMPLETE.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/complete",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request complete", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not ACTIVE or milestones unpaid", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state
        .engine
        .complete(RequestId::from_uuid(id), caller.caller())?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/recall — Withdraw an unassigned request.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/recall",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RecallBody,
    responses(
        (status = 200, description = "Request recalled", body = RequestResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already assigned or wrong stage", body = crate::error::ErrorBody),
        (status = 422, description = "Blank reason", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn recall(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
    body: Result<Json<RecallBody>, JsonRejection>,
) -> Result<Json<RequestResponse>, AppError> {
    let body = extract_json(body)?;
    let request = state
        .engine
        .recall(RequestId::from_uuid(id), caller.caller(), &body.reason)?;
    Ok(Json(request.into()))
}

/// GET /v1/requests/:id/quote — Commission split and the discount the
/// caller's role sees for the accepted bid.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}/quote",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Quote for the accepted bid", body = QuoteResponse),
        (status = 404, description = "Request or accepted bid not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = state.engine.quote(RequestId::from_uuid(id), caller.role())?;
    Ok(Json(quote.into()))
}
