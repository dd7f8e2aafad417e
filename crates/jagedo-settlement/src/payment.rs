//! # Payments
//!
//! A payment is a money movement raised against a milestone (or against the
//! request directly, for ad-hoc charges). Two independent flags track it:
//! `status` follows the gateway (PENDING until completion is reported) and
//! `approved` records the platform's confirmation, which flips false→true
//! exactly once.

use serde::{Deserialize, Serialize};

use jagedo_core::{Amount, MilestoneId, PaymentId, RequestId, Timestamp};

/// Why money is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Deposit,
    Milestone,
    Settlement,
    AdHoc,
}

impl PaymentType {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Milestone => "MILESTONE",
            Self::Settlement => "SETTLEMENT",
            Self::AdHoc => "AD_HOC",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Raised, not yet captured by the gateway.
    Pending,
    /// The gateway reported completion.
    Completed,
}

impl PaymentStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A money movement tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub request_id: RequestId,
    /// `None` for ad-hoc payments against the request.
    pub milestone_id: Option<MilestoneId>,
    pub amount: Amount,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub approved: bool,
    pub created_at: Timestamp,
    pub approved_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    pub version: u64,
}

impl Payment {
    pub(crate) fn new(
        request_id: RequestId,
        milestone_id: Option<MilestoneId>,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaymentId::new(),
            request_id,
            milestone_id,
            amount,
            payment_type,
            status: PaymentStatus::Pending,
            approved: false,
            created_at: now,
            approved_at: None,
            updated_at: now,
            version: 1,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_hoc_wire_name() {
        assert_eq!(
            serde_json::to_string(&PaymentType::AdHoc).unwrap(),
            "\"AD_HOC\""
        );
        assert_eq!(PaymentType::AdHoc.to_string(), "AD_HOC");
    }

    #[test]
    fn new_payment_is_pending_and_unapproved() {
        let p = Payment::new(
            RequestId::new(),
            None,
            Amount::from_major(500),
            PaymentType::Deposit,
        );
        assert_eq!(p.status, PaymentStatus::Pending);
        assert!(!p.approved);
        assert!(p.approved_at.is_none());
        assert_eq!(p.version, 1);
    }
}
