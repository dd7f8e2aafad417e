//! # Bid API
//!
//! Providers bid on BIDDING requests; the customer accepts one, which
//! rejects the rest and materialises the winner's milestones.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use jagedo_core::{Amount, BidId, Percentage, ProviderId, Rate, RequestId, Timestamp};
use jagedo_lifecycle::{Bid, BidStatus, NewBid};
use jagedo_settlement::MilestonePlanItem;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, CallerIdentity, Validate};
use crate::routes::payments::MilestoneResponse;
use crate::routes::requests::RequestResponse;
use crate::state::AppState;

// ── Bodies and responses ────────────────────────────────────────

/// Body of `POST /v1/requests/:id/bids`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SubmitBidBody {
    /// Decimal string, at most two fraction digits.
    #[schema(value_type = String, example = "100000.00")]
    pub total_amount: Amount,
    /// Fraction in [0, 1], at most four fraction digits.
    #[schema(value_type = String, example = "0.10")]
    pub commission_rate: Rate,
    /// Disbursement tranches; percentages with up to two decimals summing to 100.
    pub milestone_plan: Vec<PlanItemBody>,
}

/// One tranche of a proposed milestone plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PlanItemBody {
    pub name: String,
    #[schema(value_type = f64, example = 12.5)]
    pub percentage_disbursement: Percentage,
}

impl Validate for SubmitBidBody {
    fn validate(&self) -> Result<(), String> {
        if self.milestone_plan.len() > 100 {
            return Err(format!(
                "too many milestones: {} (max 100)",
                self.milestone_plan.len()
            ));
        }
        for (i, item) in self.milestone_plan.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(format!("milestone {i}: name must be non-empty"));
            }
        }
        Ok(())
    }
}

impl From<SubmitBidBody> for NewBid {
    fn from(body: SubmitBidBody) -> Self {
        NewBid {
            total_amount: body.total_amount,
            commission_rate: body.commission_rate,
            milestone_plan: body
                .milestone_plan
                .into_iter()
                .map(|item| MilestonePlanItem::new(item.name, item.percentage_disbursement))
                .collect(),
        }
    }
}

/// A bid with its commission split.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BidResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: BidId,
    #[schema(value_type = String, format = Uuid)]
    pub request_id: RequestId,
    #[schema(value_type = String, format = Uuid)]
    pub provider_id: ProviderId,
    #[schema(value_type = String)]
    pub total_amount: Amount,
    #[schema(value_type = String)]
    pub commission_rate: Rate,
    #[schema(value_type = String)]
    pub jagedo_commission: Amount,
    #[schema(value_type = String)]
    pub payable_to_provider: Amount,
    /// SUBMITTED, ACCEPTED or REJECTED.
    #[schema(value_type = String)]
    pub status: BidStatus,
    pub milestone_plan: Vec<PlanItemBody>,
    pub version: u64,
    #[schema(value_type = String)]
    pub submitted_at: Timestamp,
    #[schema(value_type = String)]
    pub updated_at: Timestamp,
}

impl From<Bid> for BidResponse {
    fn from(b: Bid) -> Self {
        Self {
            id: b.id,
            request_id: b.request_id,
            provider_id: b.provider_id,
            total_amount: b.total_amount,
            commission_rate: b.commission_rate,
            jagedo_commission: b.jagedo_commission,
            payable_to_provider: b.payable_to_provider,
            status: b.status,
            milestone_plan: b
                .milestone_plan
                .into_iter()
                .map(|item| PlanItemBody {
                    name: item.name,
                    percentage_disbursement: item.percentage_disbursement,
                })
                .collect(),
            version: b.version,
            submitted_at: b.submitted_at,
            updated_at: b.updated_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────

/// Build the bid router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests/:id/bids", get(get_bids).post(submit_bid))
        .route("/v1/requests/:id/bids/:bid_id/accept", post(accept_bid))
        .route("/v1/requests/:id/bids/:bid_id/reject", post(reject_bid))
        .route("/v1/bids/:bid_id/milestones", get(get_milestones))
}

// ── Handlers ────────────────────────────────────────────────────

/// GET /v1/requests/:id/bids — Every bid on a request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}/bids",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Bids in submission order", body = Vec<BidResponse>),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn get_bids(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BidResponse>>, AppError> {
    let bids = state.engine.get_bids(RequestId::from_uuid(id))?;
    Ok(Json(bids.into_iter().map(Into::into).collect()))
}

/// POST /v1/requests/:id/bids — Submit the calling provider's bid.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/bids",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = SubmitBidBody,
    responses(
        (status = 201, description = "Bid submitted", body = BidResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not BIDDING, or provider already has a live bid", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid amount, rate or milestone plan", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn submit_bid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
    body: Result<Json<SubmitBidBody>, JsonRejection>,
) -> Result<(StatusCode, Json<BidResponse>), AppError> {
    let body = extract_validated_json(body)?;
    let bid = state
        .engine
        .submit_bid(RequestId::from_uuid(id), caller.caller(), body.into())?;
    Ok((StatusCode::CREATED, Json(bid.into())))
}

/// POST /v1/requests/:id/bids/:bid_id/accept — Choose the winning bid.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/bids/{bid_id}/accept",
    params(
        ("id" = Uuid, Path, description = "Request ID"),
        ("bid_id" = Uuid, Path, description = "Bid ID"),
    ),
    responses(
        (status = 200, description = "Bid accepted; request ASSIGNED", body = RequestResponse),
        (status = 404, description = "Request or bid not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request not BIDDING or bid not SUBMITTED", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn accept_bid(
    State(state): State<AppState>,
    Path((id, bid_id)): Path<(Uuid, Uuid)>,
    caller: CallerIdentity,
) -> Result<Json<RequestResponse>, AppError> {
    let request = state.engine.accept_bid(
        RequestId::from_uuid(id),
        caller.caller(),
        BidId::from_uuid(bid_id),
    )?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/bids/:bid_id/reject — Turn down one bid.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/bids/{bid_id}/reject",
    params(
        ("id" = Uuid, Path, description = "Request ID"),
        ("bid_id" = Uuid, Path, description = "Bid ID"),
    ),
    responses(
        (status = 200, description = "Bid rejected", body = BidResponse),
        (status = 404, description = "Request or bid not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request not BIDDING or bid already settled", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn reject_bid(
    State(state): State<AppState>,
    Path((id, bid_id)): Path<(Uuid, Uuid)>,
    caller: CallerIdentity,
) -> Result<Json<BidResponse>, AppError> {
    let bid = state.engine.reject_bid(
        RequestId::from_uuid(id),
        caller.caller(),
        BidId::from_uuid(bid_id),
    )?;
    Ok(Json(bid.into()))
}

/// GET /v1/bids/:bid_id/milestones — Milestones of a bid, in plan order.
///
/// Empty until the bid is accepted.
#[utoipa::path(
    get,
    path = "/v1/bids/{bid_id}/milestones",
    params(("bid_id" = Uuid, Path, description = "Bid ID")),
    responses(
        (status = 200, description = "Milestones of the bid", body = Vec<MilestoneResponse>),
        (status = 404, description = "Bid not found", body = crate::error::ErrorBody),
    ),
    tag = "bids"
)]
pub(crate) async fn get_milestones(
    State(state): State<AppState>,
    Path(bid_id): Path<Uuid>,
) -> Result<Json<Vec<MilestoneResponse>>, AppError> {
    let milestones = state.engine.get_milestones(BidId::from_uuid(bid_id))?;
    Ok(Json(milestones.into_iter().map(Into::into).collect()))
}
