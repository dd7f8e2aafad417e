//! # Middleware
//!
//! Tower middleware applied to the API router. Request tracing comes from
//! `tower_http::trace::TraceLayer`; HTTP metrics are recorded here.

pub mod metrics;
