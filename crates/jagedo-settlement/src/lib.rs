//! # jagedo-settlement — Money Model and Milestone Ledger
//!
//! Two layers:
//!
//! - [`pricing`] holds pure functions: commission split, customer
//!   discount, milestone amounts and schedules. All arithmetic is integer
//!   minor units with round-half-up.
//!
//! - [`ledger`] owns the milestones of a winning bid and the payments raised
//!   against them, enforcing that a milestone is never paid beyond its
//!   amount and that confirming a payment twice counts it once.
//!
//! Nothing here knows about requests or stages; the lifecycle crate drives
//! the ledger from inside its request lock.

pub mod ledger;
pub mod milestone;
pub mod payment;
pub mod pricing;

pub use ledger::{MilestoneLedger, PaymentConfirmation};
pub use milestone::{Milestone, MilestonePlanItem, MilestoneStatus};
pub use payment::{Payment, PaymentStatus, PaymentType};
pub use pricing::{
    commission, customer_discount, milestone_amount, milestone_schedule, validate_percentages,
    CommissionBreakdown, DiscountPolicy, DiscountQuote,
};
