//! # jagedo-lifecycle — Request Lifecycle State Machine
//!
//! Moves a customer's job or goods order from creation through provider
//! assignment to completion.
//!
//! ## Layers
//!
//! - [`request`], [`bid`]: the records and their status enums.
//! - [`policy`], [`assignment`]: per-category rules and the resolver that
//!   turns a chosen assignment method into a provider set.
//! - [`machine`]: [`RequestAggregate`], the single writer of `stage`,
//!   driving the bid registry and the milestone ledger.
//! - [`engine`]: [`LifecycleEngine`], per-request serialized commands over
//!   a shared store, all-or-nothing commits, events after commit.
//! - [`event`]: outbound [`LifecycleEvent`]s and the sinks that receive them.

pub mod assignment;
pub mod bid;
pub mod engine;
pub mod event;
pub mod machine;
pub mod policy;
pub mod request;

pub use assignment::AssignmentResolver;
pub use bid::{Bid, BidRegistry, BidStatus, NewBid};
pub use engine::{LifecycleEngine, Quote};
pub use event::{EventSink, FanOutSink, InMemorySink, LifecycleEvent, RecordedEvent, TracingSink};
pub use machine::RequestAggregate;
pub use policy::{CandidateStrategy, CategoryPolicy, PolicyTable};
pub use request::{
    AssignmentMethod, LineItem, NewRequest, Request, RequestCategory, RequestKind, Stage,
    StageTransition,
};
