//! # Callers and Management Mode
//!
//! The engine holds no session. Every command receives a [`Caller`]
//! carrying the role and id of whoever issued it; authentication happens
//! upstream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::identity::{ActorId, CustomerId, ProviderId};

/// The role a caller acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallerRole {
    /// The customer who owns requests.
    Customer,
    /// Platform operations staff.
    Admin,
    /// A skilled tradesperson.
    Fundi,
    /// A licensed professional (architect, engineer, surveyor).
    Professional,
    /// A building contractor.
    Contractor,
    /// A hardware seller fulfilling goods orders.
    Hardware,
}

impl CallerRole {
    /// All roles, in declaration order.
    pub const ALL: [CallerRole; 6] = [
        Self::Customer,
        Self::Admin,
        Self::Fundi,
        Self::Professional,
        Self::Contractor,
        Self::Hardware,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Admin => "ADMIN",
            Self::Fundi => "FUNDI",
            Self::Professional => "PROFESSIONAL",
            Self::Contractor => "CONTRACTOR",
            Self::Hardware => "HARDWARE",
        }
    }

    /// Whether the role supplies work or goods.
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::Fundi | Self::Professional | Self::Contractor | Self::Hardware
        )
    }
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallerRole {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EngineError::InvalidRequest(format!("unknown caller role {wanted:?}")))
    }
}

/// Who manages delivery of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagedBy {
    /// The customer manages the job directly.
    #[serde(rename = "SELF")]
    SelfManaged,
    /// The platform manages the job on the customer's behalf.
    #[serde(rename = "JAGEDO")]
    Jagedo,
}

impl ManagedBy {
    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfManaged => "SELF",
            Self::Jagedo => "JAGEDO",
        }
    }
}

impl fmt::Display for ManagedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whoever issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// The role the caller acts in.
    pub role: CallerRole,
    /// The caller's id.
    pub id: ActorId,
}

impl Caller {
    /// Construct a caller.
    pub fn new(role: CallerRole, id: ActorId) -> Self {
        Self { role, id }
    }

    /// The caller's id viewed as a provider id.
    pub fn provider_id(&self) -> ProviderId {
        ProviderId::from(self.id)
    }

    /// The caller's id viewed as a customer id.
    pub fn customer_id(&self) -> CustomerId {
        CustomerId::from(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("admin".parse::<CallerRole>().unwrap(), CallerRole::Admin);
        assert_eq!(" FUNDI ".parse::<CallerRole>().unwrap(), CallerRole::Fundi);
        assert!("plumber".parse::<CallerRole>().is_err());
    }

    #[test]
    fn provider_roles() {
        assert!(!CallerRole::Customer.is_provider());
        assert!(!CallerRole::Admin.is_provider());
        assert!(CallerRole::Hardware.is_provider());
    }

    #[test]
    fn managed_by_wire_names() {
        assert_eq!(
            serde_json::to_string(&ManagedBy::SelfManaged).unwrap(),
            "\"SELF\""
        );
        let parsed: ManagedBy = serde_json::from_str("\"JAGEDO\"").unwrap();
        assert_eq!(parsed, ManagedBy::Jagedo);
    }

    #[test]
    fn role_serde_matches_as_str() {
        for role in CallerRole::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
