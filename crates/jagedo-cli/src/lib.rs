//! # jagedo-cli — Settlement Quote Tool
//!
//! Runs the money model from the command line so operations and support
//! staff can answer "what does this bid pay out?" without a running
//! service.
//!
//! ## Subcommands
//!
//! - `quote commission` — platform commission and provider payout
//! - `quote discount` — what a viewer is shown for a request total
//! - `quote milestones` — tranche amounts for a milestone plan
//!
//! Handlers parse flags into core types and delegate to
//! [`jagedo_settlement::pricing`]; no arithmetic lives here.

pub mod quote;
