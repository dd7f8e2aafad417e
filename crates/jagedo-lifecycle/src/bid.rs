//! # Bids
//!
//! The [`BidRegistry`] tracks the bids submitted against one request. It
//! enforces one live bid per provider and at most one ACCEPTED bid.
//!
//! ```text
//! SUBMITTED ──accept──▶ ACCEPTED
//!     │
//!     └──reject / sibling accepted──▶ REJECTED
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use jagedo_core::{Amount, BidId, EngineError, Outcome, Percentage, ProviderId, Rate, RequestId, Timestamp};
use jagedo_settlement::{commission, milestone_schedule, MilestonePlanItem};

use crate::request::Stage;

/// The state of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Submitted,
    /// The winning bid. Terminal state.
    Accepted,
    /// Terminal state.
    Rejected,
}

impl BidStatus {
    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether the bid still competes (or has won).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Submitted | Self::Accepted)
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for submitting a bid. The provider is the calling actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBid {
    pub total_amount: Amount,
    pub commission_rate: Rate,
    pub milestone_plan: Vec<MilestonePlanItem>,
}

/// A provider's priced proposal against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub request_id: RequestId,
    pub provider_id: ProviderId,
    pub total_amount: Amount,
    pub commission_rate: Rate,
    /// `round(total_amount × commission_rate)`.
    pub jagedo_commission: Amount,
    /// `total_amount − jagedo_commission`.
    pub payable_to_provider: Amount,
    pub status: BidStatus,
    pub milestone_plan: Vec<MilestonePlanItem>,
    pub version: u64,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Bid {
    fn set_status(&mut self, status: BidStatus) {
        self.status = status;
        self.version += 1;
        self.updated_at = Timestamp::now();
    }
}

/// Bids against a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidRegistry {
    request_id: RequestId,
    bids: Vec<Bid>,
}

impl BidRegistry {
    /// An empty registry for `request_id`.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            bids: Vec::new(),
        }
    }

    /// Submit a bid. The request must be in BIDDING.
    pub fn submit(&mut self, stage: Stage, provider_id: ProviderId, input: NewBid) -> Result<Bid, EngineError> {
        if stage != Stage::Bidding {
            return Err(EngineError::invalid_transition("request", stage, "submit_bid"));
        }
        let split = commission(input.total_amount, input.commission_rate)?;
        let percentages: Vec<Percentage> = input
            .milestone_plan
            .iter()
            .map(|item| item.percentage_disbursement)
            .collect();
        milestone_schedule(input.total_amount, &percentages)?;
        if self
            .bids
            .iter()
            .any(|b| b.provider_id == provider_id && b.status.is_live())
        {
            return Err(EngineError::DuplicateBid {
                request_id: self.request_id.to_string(),
                provider_id: provider_id.to_string(),
            });
        }

        let now = Timestamp::now();
        let bid = Bid {
            id: BidId::new(),
            request_id: self.request_id,
            provider_id,
            total_amount: split.total_amount,
            commission_rate: split.commission_rate,
            jagedo_commission: split.jagedo_commission,
            payable_to_provider: split.payable_to_provider,
            status: BidStatus::Submitted,
            milestone_plan: input.milestone_plan,
            version: 1,
            submitted_at: now,
            updated_at: now,
        };
        self.bids.push(bid.clone());
        Ok(bid)
    }

    /// SUBMITTED → REJECTED. Replaying on a REJECTED bid is a no-op.
    pub fn reject(&mut self, bid_id: BidId) -> Result<Outcome<Bid>, EngineError> {
        let bid = self.bid_mut(bid_id)?;
        match bid.status {
            BidStatus::Rejected => Ok(Outcome::unchanged(bid.clone())),
            BidStatus::Accepted => Err(EngineError::invalid_transition("bid", bid.status, "reject")),
            BidStatus::Submitted => {
                bid.set_status(BidStatus::Rejected);
                Ok(Outcome::applied(bid.clone()))
            }
        }
    }

    /// Accept `bid_id` and reject every other SUBMITTED bid.
    pub fn accept(&mut self, bid_id: BidId) -> Result<Outcome<Bid>, EngineError> {
        let status = self.bid_mut(bid_id)?.status;
        if let Some(winner) = self.accepted() {
            if winner.id == bid_id {
                debug!(%bid_id, "bid already accepted");
                return Ok(Outcome::unchanged(winner.clone()));
            }
            return Err(EngineError::invalid_transition("bid", status, "accept"));
        }
        if status != BidStatus::Submitted {
            return Err(EngineError::invalid_transition("bid", status, "accept"));
        }

        for bid in &mut self.bids {
            if bid.id == bid_id {
                bid.set_status(BidStatus::Accepted);
            } else if bid.status == BidStatus::Submitted {
                bid.set_status(BidStatus::Rejected);
            }
        }
        let accepted = self.bid_mut(bid_id)?.clone();
        Ok(Outcome::applied(accepted))
    }

    /// Reject every SUBMITTED bid. Returns how many were rejected.
    pub fn reject_all_submitted(&mut self) -> usize {
        let mut rejected = 0;
        for bid in &mut self.bids {
            if bid.status == BidStatus::Submitted {
                bid.set_status(BidStatus::Rejected);
                rejected += 1;
            }
        }
        rejected
    }

    /// Every bid, in submission order.
    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    /// Look up a bid.
    pub fn bid(&self, bid_id: BidId) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id == bid_id)
    }

    /// The accepted bid, if any.
    pub fn accepted(&self) -> Option<&Bid> {
        self.bids.iter().find(|b| b.status == BidStatus::Accepted)
    }

    fn bid_mut(&mut self, bid_id: BidId) -> Result<&mut Bid, EngineError> {
        self.bids
            .iter_mut()
            .find(|b| b.id == bid_id)
            .ok_or_else(|| EngineError::not_found("bid", bid_id))
    }
}
