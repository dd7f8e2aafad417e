//! # Milestone Ledger
//!
//! Owns the milestones of a request's winning bid and every payment raised
//! against the request. The ledger enforces the money invariants:
//!
//! - a milestone plan sums to exactly 100% and its amounts to the bid total;
//! - a payment is never recorded beyond what is still outstanding on its
//!   milestone (amount minus completed payments);
//! - confirmed payments on a milestone never exceed its amount, and
//!   confirming a payment twice counts it once;
//! - a milestone becomes PAID exactly when it is APPROVED and its confirmed
//!   payments cover its amount.
//!
//! Every mutating method returns an [`Outcome`] so callers can tell an
//! applied change from an idempotent replay.

use tracing::debug;

use jagedo_core::{Amount, BidId, EngineError, MilestoneId, Outcome, PaymentId, RequestId, Timestamp};

use crate::milestone::{Milestone, MilestonePlanItem, MilestoneStatus};
use crate::payment::{Payment, PaymentStatus, PaymentType};
use crate::pricing::milestone_schedule;

/// The result of confirming a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// The payment after confirmation.
    pub payment: Payment,
    /// The milestone it pays, after any advance to PAID.
    pub milestone: Option<Milestone>,
}

/// Milestones and payments of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneLedger {
    request_id: RequestId,
    milestones: Vec<Milestone>,
    payments: Vec<Payment>,
}

impl MilestoneLedger {
    /// An empty ledger for `request_id`.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            milestones: Vec::new(),
            payments: Vec::new(),
        }
    }

    /// The request this ledger belongs to.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Materialise a bid's milestone plan.
    ///
    /// Replaying the identical plan returns the existing milestones; a
    /// different plan for a bid that already has milestones is rejected.
    pub fn add_milestones(
        &mut self,
        bid_id: BidId,
        total_amount: Amount,
        plan: &[MilestonePlanItem],
    ) -> Result<Outcome<Vec<Milestone>>, EngineError> {
        let percentages: Vec<_> = plan.iter().map(|p| p.percentage_disbursement).collect();
        let amounts = milestone_schedule(total_amount, &percentages)?;

        let existing: Vec<Milestone> = self.milestones(bid_id).cloned().collect();
        if !existing.is_empty() {
            let same_plan = existing.len() == plan.len()
                && existing.iter().zip(plan.iter().zip(&amounts)).all(|(m, (p, a))| {
                    m.name == p.name
                        && m.percentage_disbursement == p.percentage_disbursement
                        && m.amount == *a
                });
            if same_plan {
                debug!(%bid_id, "milestone plan already materialised");
                return Ok(Outcome::unchanged(existing));
            }
            return Err(EngineError::invalid_transition(
                "milestone",
                "SCHEDULED",
                "add_milestones",
            ));
        }

        let created: Vec<Milestone> = plan
            .iter()
            .zip(amounts)
            .map(|(item, amount)| Milestone::new(bid_id, item, amount))
            .collect();
        self.milestones.extend(created.iter().cloned());
        Ok(Outcome::applied(created))
    }

    /// PENDING → APPROVED, or straight on to PAID when confirmed payments
    /// already cover the milestone.
    pub fn approve(&mut self, milestone_id: MilestoneId) -> Result<Outcome<Milestone>, EngineError> {
        let confirmed = self.confirmed_total(milestone_id)?;
        let milestone = self.milestone_mut(milestone_id)?;
        match milestone.status {
            MilestoneStatus::Approved => return Ok(Outcome::unchanged(milestone.clone())),
            MilestoneStatus::Pending => {}
            other => return Err(EngineError::invalid_transition("milestone", other, "approve")),
        }
        let target = if confirmed == milestone.amount {
            MilestoneStatus::Paid
        } else {
            MilestoneStatus::Approved
        };
        milestone.transition(target, "approve")?;
        Ok(Outcome::applied(milestone.clone()))
    }

    /// PENDING | APPROVED → REJECTED.
    pub fn reject(&mut self, milestone_id: MilestoneId) -> Result<Outcome<Milestone>, EngineError> {
        let milestone = self.milestone_mut(milestone_id)?;
        if milestone.status == MilestoneStatus::Rejected {
            return Ok(Outcome::unchanged(milestone.clone()));
        }
        milestone.transition(MilestoneStatus::Rejected, "reject")?;
        Ok(Outcome::applied(milestone.clone()))
    }

    /// Raise a PENDING, unapproved payment against a milestone.
    pub fn record_payment(
        &mut self,
        milestone_id: MilestoneId,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<Payment, EngineError> {
        require_positive(amount)?;
        let milestone = self.milestone(milestone_id).ok_or_else(|| EngineError::not_found("milestone", milestone_id))?;
        if milestone.status.is_terminal() {
            return Err(EngineError::invalid_transition(
                "milestone",
                milestone.status,
                "record_payment",
            ));
        }
        let outstanding = self.outstanding(milestone_id)?;
        if amount > outstanding {
            return Err(EngineError::AmountExceedsOutstanding {
                milestone_id: milestone_id.to_string(),
                requested: amount.to_string(),
                outstanding: outstanding.to_string(),
            });
        }
        let payment = Payment::new(self.request_id, Some(milestone_id), amount, payment_type);
        self.payments.push(payment.clone());
        Ok(payment)
    }

    /// Raise a payment against the request with no milestone.
    pub fn record_ad_hoc_payment(
        &mut self,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<Payment, EngineError> {
        require_positive(amount)?;
        let payment = Payment::new(self.request_id, None, amount, payment_type);
        self.payments.push(payment.clone());
        Ok(payment)
    }

    /// Gateway completion report: PENDING → COMPLETED.
    pub fn complete_payment(&mut self, payment_id: PaymentId) -> Result<Outcome<Payment>, EngineError> {
        let payment = self.payment_mut(payment_id)?;
        if payment.status == PaymentStatus::Completed {
            return Ok(Outcome::unchanged(payment.clone()));
        }
        payment.status = PaymentStatus::Completed;
        payment.touch();
        Ok(Outcome::applied(payment.clone()))
    }

    /// Approve a payment, advancing its milestone to PAID once the
    /// milestone is APPROVED and fully covered.
    pub fn confirm_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Outcome<PaymentConfirmation>, EngineError> {
        let payment = self
            .payment(payment_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("payment", payment_id))?;
        let milestone = match payment.milestone_id {
            Some(id) => Some(
                self.milestone(id)
                    .cloned()
                    .ok_or_else(|| EngineError::not_found("milestone", id))?,
            ),
            None => None,
        };

        if payment.approved {
            debug!(%payment_id, "payment already confirmed");
            return Ok(Outcome::unchanged(PaymentConfirmation { payment, milestone }));
        }

        let mut covered = false;
        if let Some(m) = &milestone {
            if m.status == MilestoneStatus::Rejected {
                return Err(EngineError::invalid_transition(
                    "milestone",
                    m.status,
                    "confirm_payment",
                ));
            }
            let confirmed = self.confirmed_total(m.id)?;
            let outstanding = m.amount.checked_sub(confirmed).unwrap_or(Amount::ZERO);
            if payment.amount > outstanding {
                return Err(EngineError::AmountExceedsOutstanding {
                    milestone_id: m.id.to_string(),
                    requested: payment.amount.to_string(),
                    outstanding: outstanding.to_string(),
                });
            }
            covered = confirmed.checked_add(payment.amount) == Some(m.amount);
        }

        let now = Timestamp::now();
        let payment = {
            let p = self.payment_mut(payment_id)?;
            p.approved = true;
            p.approved_at = Some(now);
            p.touch();
            p.clone()
        };

        let milestone = match milestone {
            Some(m) if covered && m.status == MilestoneStatus::Approved => {
                let stored = self.milestone_mut(m.id)?;
                stored.transition(MilestoneStatus::Paid, "confirm_payment")?;
                Some(stored.clone())
            }
            other => other,
        };

        Ok(Outcome::applied(PaymentConfirmation { payment, milestone }))
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Milestones of `bid_id`, in plan order.
    pub fn milestones(&self, bid_id: BidId) -> impl Iterator<Item = &Milestone> + '_ {
        self.milestones.iter().filter(move |m| m.bid_id == bid_id)
    }

    /// Every milestone in the ledger.
    pub fn all_milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Look up a milestone.
    pub fn milestone(&self, milestone_id: MilestoneId) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == milestone_id)
    }

    /// Every payment, in the order raised.
    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    /// Look up a payment.
    pub fn payment(&self, payment_id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    /// Whether `bid_id` has milestones and every one of them is PAID.
    pub fn all_milestones_paid(&self, bid_id: BidId) -> bool {
        let mut milestones = self.milestones(bid_id).peekable();
        milestones.peek().is_some() && milestones.all(|m| m.status == MilestoneStatus::Paid)
    }

    /// Milestone amount minus completed payments against it.
    pub fn outstanding(&self, milestone_id: MilestoneId) -> Result<Amount, EngineError> {
        let milestone = self
            .milestone(milestone_id)
            .ok_or_else(|| EngineError::not_found("milestone", milestone_id))?;
        let completed = self.sum_payments(milestone_id, |p| p.status == PaymentStatus::Completed)?;
        Ok(milestone.amount.checked_sub(completed).unwrap_or(Amount::ZERO))
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn confirmed_total(&self, milestone_id: MilestoneId) -> Result<Amount, EngineError> {
        self.sum_payments(milestone_id, |p| p.approved)
    }

    fn sum_payments(
        &self,
        milestone_id: MilestoneId,
        include: impl Fn(&Payment) -> bool,
    ) -> Result<Amount, EngineError> {
        Amount::checked_sum(
            self.payments
                .iter()
                .filter(|p| p.milestone_id == Some(milestone_id) && include(p))
                .map(|p| p.amount),
        )
        .ok_or_else(|| EngineError::InvalidAmount(format!("payment total on {milestone_id} overflows")))
    }

    fn milestone_mut(&mut self, milestone_id: MilestoneId) -> Result<&mut Milestone, EngineError> {
        self.milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or_else(|| EngineError::not_found("milestone", milestone_id))
    }

    fn payment_mut(&mut self, payment_id: PaymentId) -> Result<&mut Payment, EngineError> {
        self.payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| EngineError::not_found("payment", payment_id))
    }
}

fn require_positive(amount: Amount) -> Result<(), EngineError> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "payment amount must be greater than zero, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jagedo_core::Percentage;

    fn plan(parts: &[(&str, u8)]) -> Vec<MilestonePlanItem> {
        parts
            .iter()
            .map(|(name, pct)| MilestonePlanItem::new(*name, Percentage::new(*pct).unwrap()))
            .collect()
    }

    fn ledger_with_plan() -> (MilestoneLedger, BidId, Vec<Milestone>) {
        let mut ledger = MilestoneLedger::new(RequestId::new());
        let bid = BidId::new();
        let created = ledger
            .add_milestones(
                bid,
                Amount::from_major(100_000),
                &plan(&[("Foundation", 30), ("Walling", 40), ("Roofing", 30)]),
            )
            .unwrap();
        assert!(created.changed);
        (ledger, bid, created.value)
    }

    #[test]
    fn add_milestones_materialises_schedule() {
        let (ledger, bid, milestones) = ledger_with_plan();
        let amounts: Vec<_> = milestones.iter().map(|m| m.amount).collect();
        assert_eq!(
            amounts,
            vec![
                Amount::from_major(30_000),
                Amount::from_major(40_000),
                Amount::from_major(30_000)
            ]
        );
        assert_eq!(ledger.milestones(bid).count(), 3);
        assert!(milestones.iter().all(|m| m.status == MilestoneStatus::Pending));
    }

    #[test]
    fn add_milestones_rejects_bad_sum() {
        let mut ledger = MilestoneLedger::new(RequestId::new());
        let err = ledger
            .add_milestones(BidId::new(), Amount::from_major(1_000), &plan(&[("A", 50), ("B", 40)]))
            .unwrap_err();
        assert_eq!(err, EngineError::PercentageMismatch { total: "90".into() });
        assert!(ledger.all_milestones().is_empty());
    }

    #[test]
    fn add_milestones_replay_is_idempotent() {
        let (mut ledger, bid, milestones) = ledger_with_plan();
        let again = ledger
            .add_milestones(
                bid,
                Amount::from_major(100_000),
                &plan(&[("Foundation", 30), ("Walling", 40), ("Roofing", 30)]),
            )
            .unwrap();
        assert!(!again.changed);
        assert_eq!(again.value, milestones);

        let different = ledger.add_milestones(
            bid,
            Amount::from_major(100_000),
            &plan(&[("Everything", 100)]),
        );
        assert!(matches!(
            different,
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn approve_then_replay() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        let id = milestones[0].id;
        let first = ledger.approve(id).unwrap();
        assert!(first.changed);
        assert_eq!(first.value.status, MilestoneStatus::Approved);
        assert_eq!(first.value.version, 2);
        let replay = ledger.approve(id).unwrap();
        assert!(!replay.changed);
        assert_eq!(replay.value.version, 2);
    }

    #[test]
    fn reject_from_pending_and_approved_but_not_paid() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        assert!(ledger.reject(milestones[0].id).unwrap().changed);
        assert!(!ledger.reject(milestones[0].id).unwrap().changed);

        ledger.approve(milestones[1].id).unwrap();
        assert_eq!(
            ledger.reject(milestones[1].id).unwrap().value.status,
            MilestoneStatus::Rejected
        );

        let m = milestones[2].id;
        ledger.approve(m).unwrap();
        let p = ledger
            .record_payment(m, Amount::from_major(30_000), PaymentType::Milestone)
            .unwrap();
        ledger.confirm_payment(p.id).unwrap();
        assert_eq!(ledger.milestone(m).unwrap().status, MilestoneStatus::Paid);
        assert!(matches!(
            ledger.reject(m),
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn record_payment_checks_outstanding() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        let m = milestones[0].id;
        let over = ledger.record_payment(m, Amount::from_major(30_001), PaymentType::Milestone);
        assert!(matches!(
            over,
            Err(EngineError::AmountExceedsOutstanding { .. })
        ));

        let p = ledger
            .record_payment(m, Amount::from_major(20_000), PaymentType::Deposit)
            .unwrap();
        ledger.complete_payment(p.id).unwrap();
        assert_eq!(ledger.outstanding(m).unwrap(), Amount::from_major(10_000));

        let err = ledger
            .record_payment(m, Amount::from_major(10_001), PaymentType::Milestone)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::AmountExceedsOutstanding {
                milestone_id: m.to_string(),
                requested: "10001.00".into(),
                outstanding: "10000.00".into(),
            }
        );
    }

    #[test]
    fn record_payment_rejects_non_positive_and_rejected_milestone() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        assert!(matches!(
            ledger.record_payment(milestones[0].id, Amount::ZERO, PaymentType::Milestone),
            Err(EngineError::InvalidAmount(_))
        ));
        ledger.reject(milestones[0].id).unwrap();
        assert!(matches!(
            ledger.record_payment(milestones[0].id, Amount::from_major(1), PaymentType::Milestone),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            ledger.record_payment(MilestoneId::new(), Amount::from_major(1), PaymentType::Milestone),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn confirm_twice_counts_once() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        let m = milestones[0].id;
        ledger.approve(m).unwrap();
        let p = ledger
            .record_payment(m, Amount::from_major(15_000), PaymentType::Milestone)
            .unwrap();

        let first = ledger.confirm_payment(p.id).unwrap();
        assert!(first.changed);
        assert!(first.value.payment.approved);
        assert!(first.value.payment.approved_at.is_some());
        let version = first.value.payment.version;

        let second = ledger.confirm_payment(p.id).unwrap();
        assert!(!second.changed);
        assert_eq!(second.value.payment.version, version);
        assert_eq!(ledger.confirmed_total(m).unwrap(), Amount::from_major(15_000));
        assert_eq!(ledger.milestone(m).unwrap().status, MilestoneStatus::Approved);
    }

    #[test]
    fn confirm_rejects_over_approval() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        let m = milestones[0].id;
        // Two pending payments may be raised while nothing is completed.
        let a = ledger
            .record_payment(m, Amount::from_major(20_000), PaymentType::Milestone)
            .unwrap();
        let b = ledger
            .record_payment(m, Amount::from_major(20_000), PaymentType::Milestone)
            .unwrap();
        ledger.confirm_payment(a.id).unwrap();
        let err = ledger.confirm_payment(b.id).unwrap_err();
        assert_eq!(
            err,
            EngineError::AmountExceedsOutstanding {
                milestone_id: m.to_string(),
                requested: "20000.00".into(),
                outstanding: "10000.00".into(),
            }
        );
        assert!(!ledger.payment(b.id).unwrap().approved);
    }

    #[test]
    fn full_confirmation_marks_approved_milestone_paid() {
        let (mut ledger, bid, milestones) = ledger_with_plan();
        for m in &milestones {
            ledger.approve(m.id).unwrap();
            let p = ledger
                .record_payment(m.id, m.amount, PaymentType::Milestone)
                .unwrap();
            let confirmed = ledger.confirm_payment(p.id).unwrap();
            assert_eq!(
                confirmed.value.milestone.unwrap().status,
                MilestoneStatus::Paid
            );
        }
        assert!(ledger.all_milestones_paid(bid));
    }

    #[test]
    fn approving_a_fully_confirmed_milestone_pays_it() {
        let (mut ledger, _, milestones) = ledger_with_plan();
        let m = milestones[0].id;
        let p = ledger
            .record_payment(m, Amount::from_major(30_000), PaymentType::Milestone)
            .unwrap();
        let confirmed = ledger.confirm_payment(p.id).unwrap();
        assert_eq!(
            confirmed.value.milestone.unwrap().status,
            MilestoneStatus::Pending
        );
        let approved = ledger.approve(m).unwrap();
        assert_eq!(approved.value.status, MilestoneStatus::Paid);
        assert_eq!(approved.value.version, 2);
    }

    #[test]
    fn ad_hoc_payments_have_no_milestone() {
        let mut ledger = MilestoneLedger::new(RequestId::new());
        let p = ledger
            .record_ad_hoc_payment(Amount::from_major(750), PaymentType::AdHoc)
            .unwrap();
        assert!(p.milestone_id.is_none());
        let completed = ledger.complete_payment(p.id).unwrap();
        assert_eq!(completed.value.status, PaymentStatus::Completed);
        assert!(!ledger.complete_payment(p.id).unwrap().changed);
        let confirmed = ledger.confirm_payment(p.id).unwrap();
        assert!(confirmed.value.payment.approved);
        assert!(confirmed.value.milestone.is_none());
    }

    #[test]
    fn all_milestones_paid_is_false_without_milestones() {
        let ledger = MilestoneLedger::new(RequestId::new());
        assert!(!ledger.all_milestones_paid(BidId::new()));
    }
}
