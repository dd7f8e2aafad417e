//! # Lifecycle Engine
//!
//! The command and query facade over every request.
//!
//! ## Concurrency
//!
//! Each request lives in its own slot, an `Arc<Mutex<RequestAggregate>>`,
//! held in a sharded `DashMap`. A command:
//!
//! 1. clones the slot's `Arc` out of the map (no map guard is held after);
//! 2. locks the slot, clones the aggregate into a working copy, and runs
//!    the command against the copy;
//! 3. on `Ok`, bumps versions, swaps the copy in, and releases the lock;
//! 4. publishes the command's events, outside the lock.
//!
//! Commands on different requests never contend. Commands on the same
//! request are serialized, so the loser of a race observes the winner's
//! state. Nothing awaits while a slot is locked.
//!
//! Child records (bids, milestones, payments) are reachable by their own id
//! through secondary indexes that point back at the owning request.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use jagedo_core::{
    Amount, BidId, Caller, CallerRole, EngineError, MilestoneId, PaymentId, ProviderId, RequestId,
};
use jagedo_settlement::{
    commission, CommissionBreakdown, DiscountPolicy, DiscountQuote, Milestone, Payment,
    PaymentConfirmation, PaymentType,
};

use crate::bid::{Bid, NewBid};
use crate::event::{EventSink, TracingSink};
use crate::machine::RequestAggregate;
use crate::policy::PolicyTable;
use crate::request::{NewRequest, Request};

type Slot = Arc<Mutex<RequestAggregate>>;

/// What a viewer is shown for a request's accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub request_id: RequestId,
    pub bid_id: BidId,
    pub viewer_role: CallerRole,
    pub commission: CommissionBreakdown,
    pub discount: DiscountQuote,
}

/// Per-request serialized command/query facade.
pub struct LifecycleEngine {
    requests: DashMap<RequestId, Slot>,
    bid_index: DashMap<BidId, RequestId>,
    milestone_index: DashMap<MilestoneId, RequestId>,
    payment_index: DashMap<PaymentId, RequestId>,
    policy: PolicyTable,
    discount: DiscountPolicy,
    sink: Arc<dyn EventSink>,
}

impl LifecycleEngine {
    /// An engine publishing to `sink`, with the standard policy table and
    /// discount policy.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            requests: DashMap::new(),
            bid_index: DashMap::new(),
            milestone_index: DashMap::new(),
            payment_index: DashMap::new(),
            policy: PolicyTable::standard(),
            discount: DiscountPolicy::default(),
            sink,
        }
    }

    /// Replace the category policy table.
    pub fn with_policy(mut self, policy: PolicyTable) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the customer discount policy.
    pub fn with_discount_policy(mut self, discount: DiscountPolicy) -> Self {
        self.discount = discount;
        self
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn discount_policy(&self) -> &DiscountPolicy {
        &self.discount
    }

    // ── Request commands ────────────────────────────────────────────────

    /// Create a DRAFT request owned by the caller.
    pub fn create_request(&self, caller: &Caller, input: NewRequest) -> Result<Request, EngineError> {
        let aggregate = RequestAggregate::create(caller, input, &self.policy)?;
        let request = aggregate.request().clone();
        self.requests
            .insert(request.id, Arc::new(Mutex::new(aggregate)));
        info!(
            request_id = %request.id,
            kind = %request.kind,
            category = %request.category,
            customer_id = %request.customer_id,
            "request created"
        );
        Ok(request)
    }

    pub fn submit(&self, id: RequestId, caller: &Caller) -> Result<Request, EngineError> {
        self.execute(id, "submit", |agg| agg.submit(caller))
            .map(|(_, request)| request)
    }

    pub fn start_review(&self, id: RequestId, caller: &Caller) -> Result<Request, EngineError> {
        self.execute(id, "start_review", |agg| agg.start_review(caller))
            .map(|(_, request)| request)
    }

    pub fn choose_restricted(
        &self,
        id: RequestId,
        caller: &Caller,
        provider_ids: &[ProviderId],
    ) -> Result<Request, EngineError> {
        let policy = &self.policy;
        self.execute(id, "choose_restricted", |agg| {
            agg.choose_restricted(caller, policy, provider_ids)
        })
        .map(|(_, request)| request)
    }

    pub fn choose_competitive(&self, id: RequestId, caller: &Caller) -> Result<Request, EngineError> {
        let policy = &self.policy;
        self.execute(id, "choose_competitive", |agg| {
            agg.choose_competitive(caller, policy)
        })
        .map(|(_, request)| request)
    }

    pub fn accept_bid(&self, id: RequestId, caller: &Caller, bid_id: BidId) -> Result<Request, EngineError> {
        self.execute(id, "accept_bid", |agg| agg.accept_bid(caller, bid_id))
            .map(|(_, request)| request)
    }

    pub fn begin(&self, id: RequestId, caller: &Caller) -> Result<Request, EngineError> {
        self.execute(id, "begin", |agg| agg.begin(caller))
            .map(|(_, request)| request)
    }

    pub fn complete(&self, id: RequestId, caller: &Caller) -> Result<Request, EngineError> {
        self.execute(id, "complete", |agg| agg.complete(caller))
            .map(|(_, request)| request)
    }

    pub fn recall(&self, id: RequestId, caller: &Caller, reason: &str) -> Result<Request, EngineError> {
        self.execute(id, "recall", |agg| agg.recall(caller, reason))
            .map(|(_, request)| request)
    }

    // ── Bid commands ────────────────────────────────────────────────────

    /// Submit the calling provider's bid on a BIDDING request.
    pub fn submit_bid(&self, id: RequestId, caller: &Caller, input: NewBid) -> Result<Bid, EngineError> {
        self.execute(id, "submit_bid", |agg| agg.submit_bid(caller, input))
            .map(|(bid, _)| bid)
    }

    pub fn reject_bid(&self, id: RequestId, caller: &Caller, bid_id: BidId) -> Result<Bid, EngineError> {
        self.execute(id, "reject_bid", |agg| agg.reject_bid(caller, bid_id))
            .map(|(bid, _)| bid)
    }

    // ── Ledger commands ─────────────────────────────────────────────────

    pub fn approve_milestone(&self, milestone_id: MilestoneId, caller: &Caller) -> Result<Milestone, EngineError> {
        let id = self.owner(&self.milestone_index, "milestone", milestone_id)?;
        self.execute(id, "approve_milestone", |agg| {
            agg.approve_milestone(caller, milestone_id)
        })
        .map(|(milestone, _)| milestone)
    }

    pub fn reject_milestone(&self, milestone_id: MilestoneId, caller: &Caller) -> Result<Milestone, EngineError> {
        let id = self.owner(&self.milestone_index, "milestone", milestone_id)?;
        self.execute(id, "reject_milestone", |agg| {
            agg.reject_milestone(caller, milestone_id)
        })
        .map(|(milestone, _)| milestone)
    }

    pub fn record_payment(
        &self,
        milestone_id: MilestoneId,
        caller: &Caller,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<Payment, EngineError> {
        let id = self.owner(&self.milestone_index, "milestone", milestone_id)?;
        self.execute(id, "record_payment", |agg| {
            agg.record_payment(caller, milestone_id, amount, payment_type)
        })
        .map(|(payment, _)| payment)
    }

    pub fn record_ad_hoc_payment(
        &self,
        id: RequestId,
        caller: &Caller,
        amount: Amount,
        payment_type: PaymentType,
    ) -> Result<Payment, EngineError> {
        self.execute(id, "record_ad_hoc_payment", |agg| {
            agg.record_ad_hoc_payment(caller, amount, payment_type)
        })
        .map(|(payment, _)| payment)
    }

    pub fn complete_payment(&self, payment_id: PaymentId, caller: &Caller) -> Result<Payment, EngineError> {
        let id = self.owner(&self.payment_index, "payment", payment_id)?;
        self.execute(id, "complete_payment", |agg| {
            agg.complete_payment(caller, payment_id)
        })
        .map(|(payment, _)| payment)
    }

    pub fn confirm_payment(
        &self,
        payment_id: PaymentId,
        caller: &Caller,
    ) -> Result<PaymentConfirmation, EngineError> {
        let id = self.owner(&self.payment_index, "payment", payment_id)?;
        self.execute(id, "confirm_payment", |agg| {
            agg.confirm_payment(caller, payment_id)
        })
        .map(|(confirmation, _)| confirmation)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get_request(&self, id: RequestId) -> Result<Request, EngineError> {
        Ok(self.slot(id)?.lock().request().clone())
    }

    /// Every request, oldest first.
    pub fn list_requests(&self) -> Vec<Request> {
        let slots: Vec<Slot> = self.requests.iter().map(|e| Arc::clone(e.value())).collect();
        let mut requests: Vec<Request> = slots
            .iter()
            .map(|slot| slot.lock().request().clone())
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        requests
    }

    pub fn get_bids(&self, id: RequestId) -> Result<Vec<Bid>, EngineError> {
        Ok(self.slot(id)?.lock().bids().bids().to_vec())
    }

    pub fn get_bid(&self, bid_id: BidId) -> Result<Bid, EngineError> {
        let id = self.owner(&self.bid_index, "bid", bid_id)?;
        self.slot(id)?
            .lock()
            .bids()
            .bid(bid_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("bid", bid_id))
    }

    /// Milestones of a bid, in plan order. Empty until the bid is accepted.
    pub fn get_milestones(&self, bid_id: BidId) -> Result<Vec<Milestone>, EngineError> {
        let id = self.owner(&self.bid_index, "bid", bid_id)?;
        Ok(self
            .slot(id)?
            .lock()
            .ledger()
            .milestones(bid_id)
            .cloned()
            .collect())
    }

    pub fn get_payments(&self, id: RequestId) -> Result<Vec<Payment>, EngineError> {
        Ok(self.slot(id)?.lock().ledger().payments().to_vec())
    }

    /// The accepted bid's commission split and the discount `viewer_role`
    /// sees.
    pub fn quote(&self, id: RequestId, viewer_role: CallerRole) -> Result<Quote, EngineError> {
        let slot = self.slot(id)?;
        let agg = slot.lock();
        let request = agg.request();
        let bid = agg
            .bids()
            .accepted()
            .ok_or_else(|| EngineError::not_found("accepted bid for", request.id))?;
        Ok(Quote {
            request_id: request.id,
            bid_id: bid.id,
            viewer_role,
            commission: commission(bid.total_amount, bid.commission_rate)?,
            discount: self
                .discount
                .quote(bid.total_amount, request.managed_by, viewer_role)?,
        })
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn slot(&self, id: RequestId) -> Result<Slot, EngineError> {
        self.requests
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::not_found("request", id))
    }

    fn owner<K>(&self, index: &DashMap<K, RequestId>, kind: &'static str, key: K) -> Result<RequestId, EngineError>
    where
        K: std::hash::Hash + Eq + std::fmt::Display,
    {
        index
            .get(&key)
            .map(|entry| *entry.value())
            .ok_or_else(|| EngineError::not_found(kind, key))
    }

    /// Run `command` against a working copy of the request and commit it
    /// only on success. Returns the command's value and the committed
    /// request snapshot.
    fn execute<T>(
        &self,
        id: RequestId,
        name: &'static str,
        command: impl FnOnce(&mut RequestAggregate) -> Result<T, EngineError>,
    ) -> Result<(T, Request), EngineError> {
        let slot = self.slot(id)?;
        let (value, request, events) = {
            let mut stored = slot.lock();
            let mut working = stored.clone();
            let value = match command(&mut working) {
                Ok(value) => value,
                Err(err) => {
                    warn!(request_id = %id, command = name, error = %err, "command rejected");
                    return Err(err);
                }
            };
            let events = working.finish();
            self.index_children(&working);
            let request = working.request().clone();
            *stored = working;
            (value, request, events)
        };
        for event in &events {
            self.sink.publish(event);
        }
        Ok((value, request))
    }

    fn index_children(&self, agg: &RequestAggregate) {
        let id = agg.request().id;
        for bid in agg.bids().bids() {
            self.bid_index.entry(bid.id).or_insert(id);
        }
        for milestone in agg.ledger().all_milestones() {
            self.milestone_index.entry(milestone.id).or_insert(id);
        }
        for payment in agg.ledger().payments() {
            self.payment_index.entry(payment.id).or_insert(id);
        }
    }
}

impl Default for LifecycleEngine {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("requests", &self.requests.len())
            .field("policy", &self.policy)
            .field("discount", &self.discount)
            .finish()
    }
}
