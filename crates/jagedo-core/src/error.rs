//! # Error Taxonomy
//!
//! Every engine command returns `Result<_, EngineError>`. All variants are
//! caller-recoverable: the command was rejected and nothing was persisted.
//!
//! State machine errors carry the current state and the attempted command.
//! Money errors carry the offending amounts as display strings so they can
//! be surfaced verbatim.

use thiserror::Error;

/// Errors returned by engine commands and queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The command is not valid from the record's current state.
    #[error("invalid {entity} transition: cannot {command} from {from}")]
    InvalidTransition {
        /// Kind of record ("request", "bid", "milestone", "payment").
        entity: &'static str,
        /// Current state name.
        from: String,
        /// The attempted command.
        command: &'static str,
    },

    /// The assignment method was already chosen for this request.
    #[error("request {request_id} already has assignment method {method}")]
    AssignmentMethodAlreadySet {
        /// The request.
        request_id: String,
        /// The method already recorded.
        method: String,
    },

    /// Candidate resolution produced an empty provider set.
    #[error("no candidate providers for request {request_id}")]
    NoCandidateProviders {
        /// The request.
        request_id: String,
    },

    /// The request is already committed to a provider.
    #[error("request {request_id} is already assigned to a provider")]
    AlreadyAssigned {
        /// The request.
        request_id: String,
    },

    /// A blank reason was supplied where one is required.
    #[error("a non-blank reason is required")]
    MissingReason,

    /// Milestone percentages are out of range or do not sum to 100.
    #[error("milestone percentages must each be above 0 and sum to exactly 100, got {total}")]
    PercentageMismatch {
        /// Sum of the supplied percentages, as a decimal.
        total: String,
    },

    /// A payment would exceed what is still owed on a milestone.
    #[error("payment of {requested} exceeds outstanding {outstanding} on {milestone_id}")]
    AmountExceedsOutstanding {
        /// The milestone.
        milestone_id: String,
        /// The requested amount.
        requested: String,
        /// The amount still outstanding.
        outstanding: String,
    },

    /// An amount or rate is non-positive, out of range, or malformed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// No record with this id exists.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of record.
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The provider already has a live bid on this request.
    #[error("{provider_id} already has a live bid on {request_id}")]
    DuplicateBid {
        /// The request.
        request_id: String,
        /// The provider.
        provider_id: String,
    },

    /// A new request failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    /// Stable machine-readable code for UI surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AssignmentMethodAlreadySet { .. } => "ASSIGNMENT_METHOD_ALREADY_SET",
            Self::NoCandidateProviders { .. } => "NO_CANDIDATE_PROVIDERS",
            Self::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            Self::MissingReason => "MISSING_REASON",
            Self::PercentageMismatch { .. } => "PERCENTAGE_MISMATCH",
            Self::AmountExceedsOutstanding { .. } => "AMOUNT_EXCEEDS_OUTSTANDING",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DuplicateBid { .. } => "DUPLICATE_BID",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Shorthand for [`EngineError::InvalidTransition`].
    pub fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        command: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            command,
        }
    }

    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_state_and_command() {
        let err = EngineError::invalid_transition("request", "BIDDING", "start_review");
        assert_eq!(
            err.to_string(),
            "invalid request transition: cannot start_review from BIDDING"
        );
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            EngineError::invalid_transition("bid", "ACCEPTED", "reject"),
            EngineError::AssignmentMethodAlreadySet {
                request_id: "r".into(),
                method: "RESTRICTED".into(),
            },
            EngineError::NoCandidateProviders {
                request_id: "r".into(),
            },
            EngineError::AlreadyAssigned {
                request_id: "r".into(),
            },
            EngineError::MissingReason,
            EngineError::PercentageMismatch { total: "90".into() },
            EngineError::AmountExceedsOutstanding {
                milestone_id: "m".into(),
                requested: "2.00".into(),
                outstanding: "1.00".into(),
            },
            EngineError::InvalidAmount("-1".into()),
            EngineError::not_found("bid", "b"),
            EngineError::DuplicateBid {
                request_id: "r".into(),
                provider_id: "p".into(),
            },
            EngineError::InvalidRequest("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(EngineError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn not_found_message() {
        let err = EngineError::not_found("payment", "payment:abc");
        assert_eq!(err.to_string(), "payment payment:abc not found");
    }
}
