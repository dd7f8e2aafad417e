//! # Milestone & Payment API
//!
//! Milestone approval and dispute, payments against milestones or the
//! request itself, gateway completion, and confirmation. Confirming the
//! payment that leaves every milestone PAID completes an ACTIVE request.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use jagedo_core::{Amount, BidId, MilestoneId, PaymentId, Percentage, RequestId, Timestamp};
use jagedo_settlement::{Milestone, MilestoneStatus, Payment, PaymentConfirmation, PaymentStatus, PaymentType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_json, CallerIdentity};
use crate::state::AppState;

// ── Bodies and responses ────────────────────────────────────────

/// Body of the two payment-recording endpoints.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordPaymentBody {
    /// Decimal string, at most two fraction digits.
    #[schema(value_type = String, example = "30000.00")]
    pub amount: Amount,
    /// DEPOSIT, MILESTONE, SETTLEMENT or AD_HOC.
    #[schema(value_type = String, example = "MILESTONE")]
    pub payment_type: PaymentType,
}

/// A disbursement tranche.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MilestoneResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: MilestoneId,
    #[schema(value_type = String, format = Uuid)]
    pub bid_id: BidId,
    pub name: String,
    #[schema(value_type = f64, example = 12.5)]
    pub percentage_disbursement: Percentage,
    #[schema(value_type = String)]
    pub amount: Amount,
    /// PENDING, APPROVED, PAID or REJECTED.
    #[schema(value_type = String)]
    pub status: MilestoneStatus,
    pub version: u64,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
    #[schema(value_type = String)]
    pub updated_at: Timestamp,
}

impl From<Milestone> for MilestoneResponse {
    fn from(m: Milestone) -> Self {
        Self {
            id: m.id,
            bid_id: m.bid_id,
            name: m.name,
            percentage_disbursement: m.percentage_disbursement,
            amount: m.amount,
            status: m.status,
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// A money movement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: PaymentId,
    #[schema(value_type = String, format = Uuid)]
    pub request_id: RequestId,
    #[schema(value_type = Option<String>)]
    pub milestone_id: Option<MilestoneId>,
    #[schema(value_type = String)]
    pub amount: Amount,
    #[schema(value_type = String)]
    pub payment_type: PaymentType,
    /// PENDING or COMPLETED.
    #[schema(value_type = String)]
    pub status: PaymentStatus,
    pub approved: bool,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
    #[schema(value_type = Option<String>)]
    pub approved_at: Option<Timestamp>,
    #[schema(value_type = String)]
    pub updated_at: Timestamp,
    pub version: u64,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            request_id: p.request_id,
            milestone_id: p.milestone_id,
            amount: p.amount,
            payment_type: p.payment_type,
            status: p.status,
            approved: p.approved,
            created_at: p.created_at,
            approved_at: p.approved_at,
            updated_at: p.updated_at,
            version: p.version,
        }
    }
}

/// The confirmed payment and, when it has one, its milestone afterwards.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationResponse {
    pub payment: PaymentResponse,
    pub milestone: Option<MilestoneResponse>,
}

impl From<PaymentConfirmation> for ConfirmationResponse {
    fn from(c: PaymentConfirmation) -> Self {
        Self {
            payment: c.payment.into(),
            milestone: c.milestone.map(Into::into),
        }
    }
}

// ── Router ──────────────────────────────────────────────────────

/// Build the milestone and payment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/milestones/:id/approve", post(approve_milestone))
        .route("/v1/milestones/:id/reject", post(reject_milestone))
        .route("/v1/milestones/:id/payments", post(record_payment))
        .route(
            "/v1/requests/:id/payments",
            get(get_payments).post(record_ad_hoc_payment),
        )
        .route("/v1/payments/:id/complete", post(complete_payment))
        .route("/v1/payments/:id/confirm", post(confirm_payment))
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /v1/milestones/:id/approve — Provider marks the tranche's work done.
#[utoipa::path(
    post,
    path = "/v1/milestones/{id}/approve",
    params(("id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Milestone approved (or paid, if already covered)", body = MilestoneResponse),
        (status = 404, description = "Milestone not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request not ACTIVE or milestone settled", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn approve_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<MilestoneResponse>, AppError> {
    let milestone = state
        .engine
        .approve_milestone(MilestoneId::from_uuid(id), caller.caller())?;
    Ok(Json(milestone.into()))
}

/// POST /v1/milestones/:id/reject — Dispute a tranche.
#[utoipa::path(
    post,
    path = "/v1/milestones/{id}/reject",
    params(("id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Milestone rejected", body = MilestoneResponse),
        (status = 404, description = "Milestone not found", body = crate::error::ErrorBody),
        (status = 409, description = "Milestone already PAID", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn reject_milestone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<MilestoneResponse>, AppError> {
    let milestone = state
        .engine
        .reject_milestone(MilestoneId::from_uuid(id), caller.caller())?;
    Ok(Json(milestone.into()))
}

/// POST /v1/milestones/:id/payments — Raise a payment against a milestone.
#[utoipa::path(
    post,
    path = "/v1/milestones/{id}/payments",
    params(("id" = Uuid, Path, description = "Milestone ID")),
    request_body = RecordPaymentBody,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 404, description = "Milestone not found", body = crate::error::ErrorBody),
        (status = 409, description = "Exceeds outstanding or milestone settled", body = crate::error::ErrorBody),
        (status = 422, description = "Non-positive amount", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
    body: Result<Json<RecordPaymentBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let body = extract_json(body)?;
    let payment = state.engine.record_payment(
        MilestoneId::from_uuid(id),
        caller.caller(),
        body.amount,
        body.payment_type,
    )?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// GET /v1/requests/:id/payments — Every payment on a request.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}/payments",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Payments in recording order", body = Vec<PaymentResponse>),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn get_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state.engine.get_payments(RequestId::from_uuid(id))?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

/// POST /v1/requests/:id/payments — Raise a payment with no milestone.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/payments",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RecordPaymentBody,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
        (status = 409, description = "Request is DRAFT or RECALLED", body = crate::error::ErrorBody),
        (status = 422, description = "Non-positive amount", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn record_ad_hoc_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
    body: Result<Json<RecordPaymentBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let body = extract_json(body)?;
    let payment = state.engine.record_ad_hoc_payment(
        RequestId::from_uuid(id),
        caller.caller(),
        body.amount,
        body.payment_type,
    )?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// POST /v1/payments/:id/complete — Gateway reports the money captured.
#[utoipa::path(
    post,
    path = "/v1/payments/{id}/complete",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment completed", body = PaymentResponse),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn complete_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state
        .engine
        .complete_payment(PaymentId::from_uuid(id), caller.caller())?;
    Ok(Json(payment.into()))
}

/// POST /v1/payments/:id/confirm — Approve a payment.
///
/// Confirming twice is the same as confirming once.
#[utoipa::path(
    post,
    path = "/v1/payments/{id}/confirm",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment confirmed", body = ConfirmationResponse),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
        (status = 409, description = "Milestone rejected or payment exceeds outstanding", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<Json<ConfirmationResponse>, AppError> {
    let confirmation = state
        .engine
        .confirm_payment(PaymentId::from_uuid(id), caller.caller())?;
    Ok(Json(confirmation.into()))
}
