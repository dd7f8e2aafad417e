//! # API Route Modules
//!
//! | Prefix                         | Module          |
//! |--------------------------------|-----------------|
//! | `/v1/requests/*`               | [`requests`]    |
//! | `/v1/requests/:id/bids/*`      | [`bids`]        |
//! | `/v1/bids/:bid_id/milestones`  | [`bids`]        |
//! | `/v1/milestones/*`             | [`payments`]    |
//! | `/v1/requests/:id/payments`    | [`payments`]    |
//! | `/v1/payments/*`               | [`payments`]    |
//! | `/v1/events`                   | [`events`]      |
//!
//! Handlers only translate HTTP to engine calls. Every command names its
//! caller through [`crate::extractors::CallerIdentity`].

pub mod bids;
pub mod events;
pub mod payments;
pub mod requests;
