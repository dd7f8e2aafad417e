//! # Custom Extractors
//!
//! JSON body extraction with validation, and the caller identity every
//! command needs.
//!
//! The engine holds no session state, so each request names its caller in
//! two headers:
//!
//! - `x-caller-role`: one of CUSTOMER, ADMIN, FUNDI, PROFESSIONAL,
//!   CONTRACTOR, HARDWARE (case-insensitive).
//! - `x-caller-id`: the caller's UUID.
//!
//! Missing or malformed headers reject the request with 400.

use axum::extract::rejection::JsonRejection;
use axum::http::request::Parts;
use axum::Json;
use jagedo_core::{ActorId, Caller, CallerRole};

use crate::error::AppError;

/// Header carrying the caller's role.
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";
/// Header carrying the caller's id.
pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Trait for request types that can validate their own fields.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// The caller named by the request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity(pub Caller);

impl CallerIdentity {
    pub fn caller(&self) -> &Caller {
        &self.0
    }

    pub fn role(&self) -> CallerRole {
        self.0.role
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("missing {name} header")))?;
    value
        .to_str()
        .map(str::trim)
        .map_err(|_| AppError::BadRequest(format!("{name} header is not valid text")))
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role: CallerRole = header(parts, CALLER_ROLE_HEADER)?
            .parse()
            .map_err(|e| AppError::BadRequest(format!("{CALLER_ROLE_HEADER}: {e}")))?;
        let id: ActorId = header(parts, CALLER_ID_HEADER)?
            .parse()
            .map_err(|e| AppError::BadRequest(format!("{CALLER_ID_HEADER}: {e}")))?;
        Ok(Self(Caller::new(role, id)))
    }
}
