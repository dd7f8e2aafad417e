//! # Requests
//!
//! A request is a customer's job or goods order, unified. Its `stage` is
//! written only by the state machine in [`crate::machine`].
//!
//! ## Stage Graph
//!
//! ```text
//! DRAFT ──submit──▶ NEW ──start_review──▶ UNDERREVIEW ──choose_restricted──▶ ASSIGNED
//!                    │                        │                                 ▲
//!                    │                        └──choose_competitive──▶ BIDDING ─┘ accept_bid
//!                    │                        │                          │
//!                    └────────────recall──────┴──────────────────────────┴──▶ RECALLED
//!
//! ASSIGNED ──begin──▶ ACTIVE ──complete / all milestones paid──▶ COMPLETE
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use jagedo_core::{
    ActorId, Amount, BidId, Caller, CallerRole, CustomerId, ManagedBy, ProviderId, RequestId,
    Timestamp,
};

// ── Stage ───────────────────────────────────────────────────────────────

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    /// Being drafted by the customer.
    Draft,
    /// Submitted, awaiting review.
    New,
    /// Under review by operations.
    UnderReview,
    /// Open for bids.
    Bidding,
    /// Committed to one or more providers.
    Assigned,
    /// Work in progress.
    Active,
    /// Finished. Terminal state.
    Complete,
    /// Withdrawn before assignment. Terminal state.
    Recalled,
}

impl Stage {
    /// The canonical string name of this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::New => "NEW",
            Self::UnderReview => "UNDERREVIEW",
            Self::Bidding => "BIDDING",
            Self::Assigned => "ASSIGNED",
            Self::Active => "ACTIVE",
            Self::Complete => "COMPLETE",
            Self::Recalled => "RECALLED",
        }
    }

    /// Whether this stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Recalled)
    }

    /// Whether a request in this stage may be recalled.
    pub fn is_recallable(&self) -> bool {
        matches!(self, Self::New | Self::UnderReview | Self::Bidding)
    }

    /// Valid target stages from this stage.
    pub fn valid_transitions(&self) -> &'static [Stage] {
        match self {
            Self::Draft => &[Self::New],
            Self::New => &[Self::UnderReview, Self::Recalled],
            Self::UnderReview => &[Self::Assigned, Self::Bidding, Self::Recalled],
            Self::Bidding => &[Self::Assigned, Self::Recalled],
            Self::Assigned => &[Self::Active],
            Self::Active => &[Self::Complete],
            Self::Complete | Self::Recalled => &[],
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Classification ──────────────────────────────────────────────────────

/// Whether a request is for work or for goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestKind {
    Job,
    Order,
}

impl RequestKind {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "JOB",
            Self::Order => "ORDER",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider category a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestCategory {
    Fundi,
    Professional,
    Contractor,
    Hardware,
}

impl RequestCategory {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fundi => "FUNDI",
            Self::Professional => "PROFESSIONAL",
            Self::Contractor => "CONTRACTOR",
            Self::Hardware => "HARDWARE",
        }
    }
}

impl std::fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How providers are chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssignmentMethod {
    /// Operations assigns vetted providers directly.
    Restricted,
    /// Providers bid and the customer accepts one.
    Competitive,
}

impl AssignmentMethod {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "RESTRICTED",
            Self::Competitive => "COMPETITIVE",
        }
    }
}

impl std::fmt::Display for AssignmentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Records ─────────────────────────────────────────────────────────────

/// One line of a goods order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    /// The hardware seller supplying this line.
    pub seller_id: ProviderId,
    pub quantity: u32,
    pub unit_price: Amount,
}

impl LineItem {
    /// `quantity × unit_price`, or `None` on overflow.
    pub fn subtotal(&self) -> Option<Amount> {
        self.unit_price
            .minor_units()
            .checked_mul(i64::from(self.quantity))
            .map(Amount::from_minor)
    }
}

/// An entry in a request's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub actor_role: CallerRole,
    pub actor_id: ActorId,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Input for creating a request. The customer is the calling actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub kind: RequestKind,
    pub category: RequestCategory,
    pub managed_by: ManagedBy,
    pub title: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A customer's job or goods order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub kind: RequestKind,
    pub category: RequestCategory,
    pub managed_by: ManagedBy,
    pub customer_id: CustomerId,
    pub title: String,
    pub line_items: Vec<LineItem>,
    pub stage: Stage,
    /// Set once, when the request leaves UNDERREVIEW.
    pub assignment_method: Option<AssignmentMethod>,
    /// Written only by the assignment resolver.
    pub assigned_provider_ids: BTreeSet<ProviderId>,
    /// Immutable once set.
    pub accepted_bid_id: Option<BidId>,
    /// Present iff the request is RECALLED.
    pub recall_reason: Option<String>,
    pub transitions: Vec<StageTransition>,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Request {
    /// A new DRAFT request owned by `customer_id`.
    pub fn new(input: NewRequest, customer_id: CustomerId) -> Self {
        let now = Timestamp::now();
        Self {
            id: RequestId::new(),
            kind: input.kind,
            category: input.category,
            managed_by: input.managed_by,
            customer_id,
            title: input.title.trim().to_string(),
            line_items: input.line_items,
            stage: Stage::Draft,
            assignment_method: None,
            assigned_provider_ids: BTreeSet::new(),
            accepted_bid_id: None,
            recall_reason: None,
            transitions: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the request is committed to a provider.
    pub fn is_assigned(&self) -> bool {
        !self.assigned_provider_ids.is_empty() || self.accepted_bid_id.is_some()
    }

    /// Distinct seller ids across the line items.
    pub fn line_item_sellers(&self) -> BTreeSet<ProviderId> {
        self.line_items.iter().map(|item| item.seller_id).collect()
    }

    /// Sum of line-item subtotals, or `None` on overflow.
    pub fn order_total(&self) -> Option<Amount> {
        self.line_items
            .iter()
            .try_fold(Amount::ZERO, |acc, item| acc.checked_add(item.subtotal()?))
    }

    /// Set the stage and append an audit record. Does not validate.
    pub(crate) fn record_stage(&mut self, to: Stage, caller: &Caller, reason: Option<String>) {
        self.transitions.push(StageTransition {
            from_stage: self.stage,
            to_stage: to,
            actor_role: caller.role,
            actor_id: caller.id,
            at: Timestamp::now(),
            reason,
        });
        self.stage = to;
    }

    /// Bump the version once for a committed write.
    pub(crate) fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Request {
        let seller = ProviderId::new();
        Request::new(
            NewRequest {
                kind: RequestKind::Order,
                category: RequestCategory::Hardware,
                managed_by: ManagedBy::Jagedo,
                title: "  Cement and rebar ".into(),
                line_items: vec![
                    LineItem {
                        description: "Cement 50kg".into(),
                        seller_id: seller,
                        quantity: 20,
                        unit_price: Amount::from_major(850),
                    },
                    LineItem {
                        description: "Rebar Y12".into(),
                        seller_id: seller,
                        quantity: 10,
                        unit_price: Amount::from_minor(120_050),
                    },
                ],
            },
            CustomerId::new(),
        )
    }

    #[test]
    fn new_request_is_draft() {
        let r = order();
        assert_eq!(r.stage, Stage::Draft);
        assert_eq!(r.version, 1);
        assert_eq!(r.title, "Cement and rebar");
        assert!(!r.is_assigned());
        assert!(r.transitions.is_empty());
    }

    #[test]
    fn sellers_are_distinct() {
        assert_eq!(order().line_item_sellers().len(), 1);
    }

    #[test]
    fn order_total_sums_lines() {
        assert_eq!(order().order_total(), Some(Amount::from_minor(2_900_500)));
    }

    #[test]
    fn stage_wire_names() {
        assert_eq!(
            serde_json::to_string(&Stage::UnderReview).unwrap(),
            "\"UNDERREVIEW\""
        );
        assert_eq!(Stage::UnderReview.to_string(), "UNDERREVIEW");
    }

    #[test]
    fn terminal_stages_have_no_transitions() {
        for stage in [Stage::Complete, Stage::Recalled] {
            assert!(stage.is_terminal());
            assert!(stage.valid_transitions().is_empty());
        }
        assert!(!Stage::Assigned.is_recallable());
        assert!(Stage::Bidding.is_recallable());
    }

    #[test]
    fn record_stage_appends_audit_entry() {
        let mut r = order();
        let caller = Caller::new(CallerRole::Customer, ActorId::new());
        r.record_stage(Stage::New, &caller, None);
        assert_eq!(r.stage, Stage::New);
        assert_eq!(r.transitions.len(), 1);
        assert_eq!(r.transitions[0].from_stage, Stage::Draft);
        assert_eq!(r.transitions[0].actor_role, CallerRole::Customer);
    }
}
