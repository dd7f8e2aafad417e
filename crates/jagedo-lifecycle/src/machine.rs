//! # Request State Machine
//!
//! [`RequestAggregate`] bundles a request with its bid registry and
//! milestone ledger, and is the only writer of `stage`. Every command:
//!
//! 1. validates against the current state and returns a typed error
//!    without touching anything when the command does not apply;
//! 2. detects a replay of an already-applied transition and returns
//!    without changes, events or version bumps;
//! 3. otherwise mutates the aggregate, appends transition records and
//!    queues outbound events.
//!
//! The aggregate is not synchronized. The engine runs each command against
//! a working copy under the request's lock and keeps the copy only if the
//! command succeeds, so a failed command never leaves partial writes.
//!
//! ## Decisions on replay and ordering
//!
//! - `start_review` on an UNDERREVIEW request succeeds unchanged; likewise
//!   `submit` on NEW, `begin` on ACTIVE, `complete` on COMPLETE, and
//!   `recall` on RECALLED.
//! - `recall` checks, in order: blank reason (`MissingReason`), existing
//!   assignment (`AlreadyAssigned`), then the stage (`InvalidTransition`).
//! - A category with a forced RESTRICTED method turns `choose_competitive`
//!   into a restricted assignment with no caller-supplied ids.
//! - A RECALLED request takes no new payment state. `complete_payment` and
//!   `confirm_payment` fail there unless they replay an applied change.
//! - ACTIVE → COMPLETE fires from whichever of `approve_milestone` or
//!   `confirm_payment` leaves the last milestone PAID.

use std::collections::BTreeSet;

use tracing::{debug, info};

use jagedo_core::{
    Amount, BidId, Caller, EngineError, MilestoneId, Outcome, PaymentId, ProviderId,
};
use jagedo_settlement::{
    Milestone, MilestoneLedger, Payment, PaymentConfirmation, PaymentStatus, PaymentType,
};

use crate::assignment::AssignmentResolver;
use crate::bid::{Bid, BidRegistry, BidStatus, NewBid};
use crate::event::LifecycleEvent;
use crate::policy::PolicyTable;
use crate::request::{AssignmentMethod, NewRequest, Request, Stage};

/// A request together with everything it owns.
#[derive(Debug, Clone)]
pub struct RequestAggregate {
    request: Request,
    bids: BidRegistry,
    ledger: MilestoneLedger,
    changed: bool,
    pending_events: Vec<LifecycleEvent>,
}

impl RequestAggregate {
    /// A new DRAFT request owned by the calling customer.
    pub fn create(caller: &Caller, input: NewRequest, policy: &PolicyTable) -> Result<Self, EngineError> {
        policy.validate(&input)?;
        let request = Request::new(input, caller.customer_id());
        let id = request.id;
        Ok(Self {
            request,
            bids: BidRegistry::new(id),
            ledger: MilestoneLedger::new(id),
            changed: false,
            pending_events: Vec::new(),
        })
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn bids(&self) -> &BidRegistry {
        &self.bids
    }

    pub fn ledger(&self) -> &MilestoneLedger {
        &self.ledger
    }

    /// Close out a successful command: bump the request version once if
    /// anything changed and hand back the queued events.
    pub fn finish(&mut self) -> Vec<LifecycleEvent> {
        if std::mem::take(&mut self.changed) {
            self.request.touch();
        }
        std::mem::take(&mut self.pending_events)
    }

    // ── Stage commands ──────────────────────────────────────────────────

    /// DRAFT → NEW.
    pub fn submit(&mut self, caller: &Caller) -> Result<(), EngineError> {
        if self.request.stage == Stage::New {
            self.replay("submit");
            return Ok(());
        }
        self.require_stage(&[Stage::Draft], "submit")?;
        self.move_to(Stage::New, caller, None, "submit")
    }

    /// NEW → UNDERREVIEW.
    pub fn start_review(&mut self, caller: &Caller) -> Result<(), EngineError> {
        if self.request.stage == Stage::UnderReview {
            self.replay("start_review");
            return Ok(());
        }
        self.require_stage(&[Stage::New], "start_review")?;
        self.move_to(Stage::UnderReview, caller, None, "start_review")
    }

    /// UNDERREVIEW → ASSIGNED with a restricted provider set.
    pub fn choose_restricted(
        &mut self,
        caller: &Caller,
        policy: &PolicyTable,
        provider_ids: &[ProviderId],
    ) -> Result<(), EngineError> {
        let resolver = AssignmentResolver::new(policy);
        if let Some(method) = self.request.assignment_method {
            let already_assigned = method == AssignmentMethod::Restricted
                && resolver
                    .resolve_restricted(&self.request, provider_ids)
                    .map(|ids| ids.is_subset(&self.request.assigned_provider_ids))
                    .unwrap_or(false);
            if already_assigned {
                self.replay("choose_restricted");
                return Ok(());
            }
            return Err(self.method_already_set(method));
        }
        self.require_stage(&[Stage::UnderReview], "choose_restricted")?;

        let providers = resolver.resolve_restricted(&self.request, provider_ids)?;
        AssignmentResolver::assign(&mut self.request, &providers);
        self.request.assignment_method = Some(AssignmentMethod::Restricted);
        info!(
            request_id = %self.request.id,
            providers = providers.len(),
            "restricted assignment"
        );
        self.move_to(Stage::Assigned, caller, None, "choose_restricted")
    }

    /// UNDERREVIEW → BIDDING, unless the category forces RESTRICTED.
    pub fn choose_competitive(&mut self, caller: &Caller, policy: &PolicyTable) -> Result<(), EngineError> {
        let method = policy.effective_method(self.request.category, AssignmentMethod::Competitive)?;
        if method == AssignmentMethod::Restricted {
            debug!(
                request_id = %self.request.id,
                category = %self.request.category,
                "category forces restricted assignment"
            );
            return self.choose_restricted(caller, policy, &[]);
        }
        if let Some(existing) = self.request.assignment_method {
            if existing == AssignmentMethod::Competitive {
                self.replay("choose_competitive");
                return Ok(());
            }
            return Err(self.method_already_set(existing));
        }
        self.require_stage(&[Stage::UnderReview], "choose_competitive")?;

        AssignmentResolver::new(policy).resolve_competitive(&self.request)?;
        self.request.assignment_method = Some(AssignmentMethod::Competitive);
        self.move_to(Stage::Bidding, caller, None, "choose_competitive")
    }

    /// BIDDING → ASSIGNED with `bid_id` as the winner.
    ///
    /// Accepts the bid, rejects its SUBMITTED siblings, records the winning
    /// provider, and materialises the bid's milestones.
    pub fn accept_bid(&mut self, caller: &Caller, bid_id: BidId) -> Result<Bid, EngineError> {
        let bid = self
            .bids
            .bid(bid_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("bid", bid_id))?;
        if self.request.accepted_bid_id == Some(bid_id) {
            self.replay("accept_bid");
            return Ok(bid);
        }
        self.require_stage(&[Stage::Bidding], "accept_bid")?;

        let accepted = self.bids.accept(bid_id)?.into_inner();
        self.ledger
            .add_milestones(accepted.id, accepted.total_amount, &accepted.milestone_plan)?;
        self.request.accepted_bid_id = Some(accepted.id);
        AssignmentResolver::assign(&mut self.request, &BTreeSet::from([accepted.provider_id]));
        self.move_to(Stage::Assigned, caller, None, "accept_bid")?;
        self.pending_events.push(LifecycleEvent::BidAccepted {
            request_id: self.request.id,
            bid_id: accepted.id,
        });
        Ok(accepted)
    }

    /// ASSIGNED → ACTIVE.
    pub fn begin(&mut self, caller: &Caller) -> Result<(), EngineError> {
        if self.request.stage == Stage::Active {
            self.replay("begin");
            return Ok(());
        }
        self.require_stage(&[Stage::Assigned], "begin")?;
        self.move_to(Stage::Active, caller, None, "begin")
    }

    /// ACTIVE → COMPLETE once every milestone of the accepted bid is PAID.
    /// Restricted assignments have no milestones and complete directly.
    pub fn complete(&mut self, caller: &Caller) -> Result<(), EngineError> {
        if self.request.stage == Stage::Complete {
            self.replay("complete");
            return Ok(());
        }
        self.require_stage(&[Stage::Active], "complete")?;
        if let Some(bid_id) = self.request.accepted_bid_id {
            if !self.ledger.all_milestones_paid(bid_id) {
                return Err(EngineError::invalid_transition(
                    "request",
                    "ACTIVE with unpaid milestones",
                    "complete",
                ));
            }
        }
        self.move_to(Stage::Complete, caller, None, "complete")
    }

    /// {NEW, UNDERREVIEW, BIDDING} → RECALLED.
    pub fn recall(&mut self, caller: &Caller, reason: &str) -> Result<(), EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::MissingReason);
        }
        if self.request.stage == Stage::Recalled {
            self.replay("recall");
            return Ok(());
        }
        if self.request.is_assigned() {
            return Err(EngineError::AlreadyAssigned {
                request_id: self.request.id.to_string(),
            });
        }
        self.require_stage(&[Stage::New, Stage::UnderReview, Stage::Bidding], "recall")?;

        let rejected = self.bids.reject_all_submitted();
        if rejected > 0 {
            debug!(request_id = %self.request.id, rejected, "open bids rejected on recall");
        }
        self.request.recall_reason = Some(reason.to_string());
        self.move_to(Stage::Recalled, caller, Some(reason.to_string()), "recall")?;
        self.pending_events.push(LifecycleEvent::RequestRecalled {
            request_id: self.request.id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    // ── Bid commands ────────────────────────────────────────────────────

    /// Submit the calling provider's bid.
    pub fn submit_bid(&mut self, caller: &Caller, input: NewBid) -> Result<Bid, EngineError> {
        let bid = self.bids.submit(self.request.stage, caller.provider_id(), input)?;
        info!(
            request_id = %self.request.id,
            bid_id = %bid.id,
            provider_id = %bid.provider_id,
            total = %bid.total_amount,
            "bid submitted"
        );
        self.changed = true;
        Ok(bid)
    }

    /// Reject a SUBMITTED bid while the request is BIDDING.
    pub fn reject_bid(&mut self, caller: &Caller, bid_id: BidId) -> Result<Bid, EngineError> {
        let current = self
            .bids
            .bid(bid_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("bid", bid_id))?;
        if current.status == BidStatus::Rejected {
            self.replay("reject_bid");
            return Ok(current);
        }
        self.require_stage(&[Stage::Bidding], "reject_bid")?;
        let outcome = self.bids.reject(bid_id)?;
        if outcome.changed {
            info!(
                request_id = %self.request.id,
                %bid_id,
                actor_role = %caller.role,
                "bid rejected"
            );
            self.changed = true;
        }
        Ok(outcome.value)
    }

    // ── Ledger commands ─────────────────────────────────────────────────

    /// PENDING → APPROVED (provider marks the work done), or straight to
    /// PAID when confirmed payments already cover it.
    pub fn approve_milestone(&mut self, caller: &Caller, milestone_id: MilestoneId) -> Result<Milestone, EngineError> {
        self.require_milestone(milestone_id)?;
        self.require_stage(&[Stage::Active], "approve_milestone")?;
        let outcome = self.ledger.approve(milestone_id)?;
        self.note_ledger_change(&outcome, "milestone approved", caller);
        if outcome.changed {
            self.complete_if_settled(caller, "approve_milestone")?;
        }
        Ok(outcome.value)
    }

    /// PENDING | APPROVED → REJECTED (disputed).
    pub fn reject_milestone(&mut self, caller: &Caller, milestone_id: MilestoneId) -> Result<Milestone, EngineError> {
        self.require_milestone(milestone_id)?;
        self.require_stage(&[Stage::Assigned, Stage::Active], "reject_milestone")?;
        let outcome = self.ledger.reject(milestone_id)?;
        self.note_ledger_change(&outcome, "milestone rejected", caller);
        Ok(outcome.value)
    }

    /// Raise a payment against a milestone.
    pub fn record_payment(
        &mut self,
        caller: &Caller,
        milestone_id: MilestoneId,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<Payment, EngineError> {
        self.require_milestone(milestone_id)?;
        self.require_stage(&[Stage::Assigned, Stage::Active], "record_payment")?;
        let payment = self.ledger.record_payment(milestone_id, amount, payment_type)?;
        info!(
            request_id = %self.request.id,
            payment_id = %payment.id,
            %milestone_id,
            %amount,
            payment_type = %payment_type,
            actor_role = %caller.role,
            "payment recorded"
        );
        self.changed = true;
        Ok(payment)
    }

    /// Raise a payment against the request itself.
    pub fn record_ad_hoc_payment(
        &mut self,
        caller: &Caller,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<Payment, EngineError> {
        if matches!(self.request.stage, Stage::Draft | Stage::Recalled) {
            return Err(EngineError::invalid_transition(
                "request",
                self.request.stage,
                "record_ad_hoc_payment",
            ));
        }
        let payment = self.ledger.record_ad_hoc_payment(amount, payment_type)?;
        info!(
            request_id = %self.request.id,
            payment_id = %payment.id,
            %amount,
            payment_type = %payment_type,
            actor_role = %caller.role,
            "ad-hoc payment recorded"
        );
        self.changed = true;
        Ok(payment)
    }

    /// Gateway reports the payment captured.
    pub fn complete_payment(&mut self, caller: &Caller, payment_id: PaymentId) -> Result<Payment, EngineError> {
        self.require_payment_open(payment_id, |p| p.status == PaymentStatus::Completed, "complete_payment")?;
        let outcome = self.ledger.complete_payment(payment_id)?;
        self.note_ledger_change(&outcome, "payment completed", caller);
        Ok(outcome.value)
    }

    /// Confirm a payment. Completes the request when this leaves every
    /// milestone of the accepted bid PAID while the request is ACTIVE.
    pub fn confirm_payment(
        &mut self,
        caller: &Caller,
        payment_id: PaymentId,
    ) -> Result<PaymentConfirmation, EngineError> {
        self.require_payment_open(payment_id, |p| p.approved, "confirm_payment")?;
        let outcome = self.ledger.confirm_payment(payment_id)?;
        if !outcome.changed {
            self.replay("confirm_payment");
            return Ok(outcome.value);
        }
        info!(
            request_id = %self.request.id,
            %payment_id,
            amount = %outcome.value.payment.amount,
            actor_role = %caller.role,
            "payment confirmed"
        );
        self.changed = true;
        self.pending_events.push(LifecycleEvent::PaymentConfirmed {
            request_id: self.request.id,
            payment_id,
        });

        self.complete_if_settled(caller, "confirm_payment")?;
        Ok(outcome.value)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn replay(&self, command: &'static str) {
        debug!(
            request_id = %self.request.id,
            stage = %self.request.stage,
            command,
            "already applied"
        );
    }

    fn require_stage(&self, allowed: &[Stage], command: &'static str) -> Result<(), EngineError> {
        if allowed.contains(&self.request.stage) {
            Ok(())
        } else {
            Err(EngineError::invalid_transition(
                "request",
                self.request.stage,
                command,
            ))
        }
    }

    fn require_milestone(&self, milestone_id: MilestoneId) -> Result<(), EngineError> {
        self.ledger
            .milestone(milestone_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("milestone", milestone_id))
    }

    /// Fails on a RECALLED request unless `applied` says the payment already
    /// carries the change, so replays stay no-ops.
    fn require_payment_open(
        &self,
        payment_id: PaymentId,
        applied: impl Fn(&Payment) -> bool,
        command: &'static str,
    ) -> Result<(), EngineError> {
        if self.request.stage != Stage::Recalled {
            return Ok(());
        }
        let payment = self
            .ledger
            .payment(payment_id)
            .ok_or_else(|| EngineError::not_found("payment", payment_id))?;
        if applied(payment) {
            Ok(())
        } else {
            Err(EngineError::invalid_transition("request", self.request.stage, command))
        }
    }

    /// ACTIVE → COMPLETE once every milestone of the accepted bid is PAID.
    fn complete_if_settled(&mut self, caller: &Caller, command: &'static str) -> Result<(), EngineError> {
        let Some(bid_id) = self.request.accepted_bid_id else {
            return Ok(());
        };
        if self.request.stage == Stage::Active && self.ledger.all_milestones_paid(bid_id) {
            self.move_to(Stage::Complete, caller, None, command)?;
        }
        Ok(())
    }

    fn method_already_set(&self, method: AssignmentMethod) -> EngineError {
        EngineError::AssignmentMethodAlreadySet {
            request_id: self.request.id.to_string(),
            method: method.to_string(),
        }
    }

    fn note_ledger_change<T>(&mut self, outcome: &Outcome<T>, message: &'static str, caller: &Caller) {
        if outcome.changed {
            info!(
                request_id = %self.request.id,
                actor_role = %caller.role,
                "{message}"
            );
            self.changed = true;
        }
    }

    fn move_to(
        &mut self,
        to: Stage,
        caller: &Caller,
        reason: Option<String>,
        command: &'static str,
    ) -> Result<(), EngineError> {
        let from = self.request.stage;
        if !from.valid_transitions().contains(&to) {
            return Err(EngineError::invalid_transition("request", from, command));
        }
        self.request.record_stage(to, caller, reason);
        self.changed = true;
        info!(
            request_id = %self.request.id,
            %from,
            %to,
            actor_role = %caller.role,
            actor_id = %caller.id,
            "request stage changed"
        );
        self.pending_events.push(LifecycleEvent::RequestStageChanged {
            request_id: self.request.id,
            old_stage: from,
            new_stage: to,
        });
        Ok(())
    }

}
