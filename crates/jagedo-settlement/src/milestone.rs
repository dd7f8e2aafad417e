//! # Milestones
//!
//! A milestone is one disbursement tranche of a winning bid.
//!
//! ```text
//! PENDING ──approve──▶ APPROVED ──(fully confirmed)──▶ PAID
//!    │                    │
//!    └──reject──▶ REJECTED ◀──reject──┘
//! ```
//!
//! PAID and REJECTED are terminal.

use serde::{Deserialize, Serialize};

use jagedo_core::{Amount, BidId, EngineError, MilestoneId, Percentage, Timestamp};

/// The lifecycle state of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    /// Work not yet signed off.
    Pending,
    /// The provider has marked the work done.
    Approved,
    /// Fully covered by confirmed payments. Terminal state.
    Paid,
    /// Disputed and withdrawn from disbursement. Terminal state.
    Rejected,
}

impl MilestoneStatus {
    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Paid => "PAID",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Rejected)
    }

    /// Valid target states from this state.
    pub fn valid_transitions(&self) -> &'static [MilestoneStatus] {
        match self {
            Self::Pending => &[Self::Approved, Self::Paid, Self::Rejected],
            Self::Approved => &[Self::Paid, Self::Rejected],
            Self::Paid | Self::Rejected => &[],
        }
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a bid's milestone plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestonePlanItem {
    /// Human-readable tranche name ("Foundation", "Roofing").
    pub name: String,
    /// Share of the bid total released by this tranche.
    pub percentage_disbursement: Percentage,
}

impl MilestonePlanItem {
    /// Construct a plan item.
    pub fn new(name: impl Into<String>, percentage_disbursement: Percentage) -> Self {
        Self {
            name: name.into(),
            percentage_disbursement,
        }
    }
}

/// A disbursement tranche of an accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub bid_id: BidId,
    pub name: String,
    pub percentage_disbursement: Percentage,
    /// The tranche amount, fixed when the milestone is created.
    pub amount: Amount,
    pub status: MilestoneStatus,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Milestone {
    pub(crate) fn new(bid_id: BidId, plan: &MilestonePlanItem, amount: Amount) -> Self {
        let now = Timestamp::now();
        Self {
            id: MilestoneId::new(),
            bid_id,
            name: plan.name.clone(),
            percentage_disbursement: plan.percentage_disbursement,
            amount,
            status: MilestoneStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target`, bumping the version.
    pub(crate) fn transition(
        &mut self,
        target: MilestoneStatus,
        command: &'static str,
    ) -> Result<(), EngineError> {
        if !self.status.valid_transitions().contains(&target) {
            return Err(EngineError::invalid_transition("milestone", self.status, command));
        }
        self.status = target;
        self.version += 1;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}
