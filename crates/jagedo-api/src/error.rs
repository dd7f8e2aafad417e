//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Engine errors keep their machine code (`INVALID_TRANSITION`, ...) and map
//! onto HTTP statuses by kind: missing records are 404, rejected input is
//! 422, and anything that conflicts with the current state is 409.
//! Internal error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jagedo_core::EngineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "INVALID_TRANSITION").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// A rejected engine command or query.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Malformed HTTP input: caller headers, path ids, or JSON framing (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Well-formed body that fails field validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found outside the engine (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Engine(err) => (engine_status(err), err.code()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::InvalidAmount(_)
        | EngineError::PercentageMismatch { .. }
        | EngineError::MissingReason
        | EngineError::InvalidRequest(_)
        | EngineError::NoCandidateProviders { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::InvalidTransition { .. }
        | EngineError::AssignmentMethodAlreadySet { .. }
        | EngineError::AlreadyAssigned { .. }
        | EngineError::AmountExceedsOutstanding { .. }
        | EngineError::DuplicateBid { .. } => StatusCode::CONFLICT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Engine(err) => tracing::warn!(code, error = %err, "command rejected"),
            _ => {}
        }

        let details = match &self {
            Self::Engine(EngineError::InvalidTransition {
                entity,
                from,
                command,
            }) => Some(serde_json::json!({
                "entity": entity,
                "from": from,
                "command": command,
            })),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::from(EngineError::not_found("request", "abc"));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn state_conflicts_map_to_409() {
        for err in [
            EngineError::invalid_transition("request", "DRAFT", "begin"),
            EngineError::AlreadyAssigned {
                request_id: "r".into(),
            },
            EngineError::AssignmentMethodAlreadySet {
                request_id: "r".into(),
                method: "COMPETITIVE".into(),
            },
        ] {
            let code = err.code();
            let (status, mapped) = AppError::from(err).status_and_code();
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(mapped, code);
        }
    }

    #[test]
    fn rejected_input_maps_to_422() {
        for err in [
            EngineError::MissingReason,
            EngineError::PercentageMismatch { total: "90".into() },
            EngineError::InvalidAmount("zero".into()),
            EngineError::InvalidRequest("blank title".into()),
        ] {
            let (status, _) = AppError::from(err).status_and_code();
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("missing x-caller-role".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn internal_status_code() {
        let err = AppError::Internal("metrics encoder failed".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
    }

    #[test]
    fn internal_message_is_not_leaked() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
