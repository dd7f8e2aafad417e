//! # jagedo-core — Foundational Types for the Settlement Engine
//!
//! The leaf of the workspace DAG. Every other `jagedo-*` crate depends on
//! this one; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `RequestId`, `BidId`, `MilestoneId`,
//!    `PaymentId`, `ProviderId`, `CustomerId`, `ActorId`. No bare UUIDs
//!    cross a crate boundary.
//!
//! 2. **Integer money.** [`Amount`] holds minor units (cents) in an `i64`
//!    and serializes as a decimal string. [`Rate`] holds basis points.
//!    Floats never represent money.
//!
//! 3. **One error taxonomy.** [`EngineError`] is the single error type
//!    returned by every engine command, with a stable machine code per
//!    variant for UI surfaces.
//!
//! 4. **Explicit callers.** [`Caller`] carries the role and id of whoever
//!    issued a command; the engine holds no session state.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `jagedo-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod error;
pub mod identity;
pub mod outcome;
pub mod role;
pub mod temporal;

pub use amount::{format_hundredths, Amount, Percentage, Rate, BPS_SCALE, PERCENT_SCALE};
pub use error::EngineError;
pub use identity::{ActorId, BidId, CustomerId, MilestoneId, PaymentId, ProviderId, RequestId};
pub use outcome::Outcome;
pub use role::{Caller, CallerRole, ManagedBy};
pub use temporal::Timestamp;
