//! # Identifier Newtypes
//!
//! One newtype per record kind, so a `BidId` cannot be passed where a
//! `MilestoneId` is expected. Every identifier wraps a v4 UUID and
//! serializes as the bare UUID string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_identifier!(
    /// A customer's job or goods order tracked through the lifecycle.
    RequestId,
    "request"
);

uuid_identifier!(
    /// A provider's priced proposal against a request.
    BidId,
    "bid"
);

uuid_identifier!(
    /// A disbursement tranche of an accepted bid.
    MilestoneId,
    "milestone"
);

uuid_identifier!(
    /// A money movement raised against a milestone or a request.
    PaymentId,
    "payment"
);

uuid_identifier!(
    /// A fundi, professional, contractor, or hardware seller.
    ProviderId,
    "provider"
);

uuid_identifier!(
    /// The customer who owns a request.
    CustomerId,
    "customer"
);

uuid_identifier!(
    /// Whoever issued a command, regardless of role.
    ActorId,
    "actor"
);

impl From<ActorId> for ProviderId {
    fn from(actor: ActorId) -> Self {
        Self(actor.0)
    }
}

impl From<ActorId> for CustomerId {
    fn from(actor: ActorId) -> Self {
        Self(actor.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed() {
        let id = RequestId::from_uuid(Uuid::nil());
        assert_eq!(
            id.to_string(),
            "request:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&BidId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn parses_from_str() {
        let uuid = Uuid::new_v4();
        let parsed: PaymentId = uuid.to_string().parse().unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
        assert!("not-a-uuid".parse::<PaymentId>().is_err());
    }

    #[test]
    fn actor_converts_to_provider_and_customer() {
        let actor = ActorId::new();
        assert_eq!(ProviderId::from(actor).as_uuid(), actor.as_uuid());
        assert_eq!(CustomerId::from(actor).as_uuid(), actor.as_uuid());
    }
}
