//! # Assignment Resolver
//!
//! Turns a chosen assignment method into a provider set. The resolver is the
//! only writer of `assigned_provider_ids`, and it only ever adds to it.

use std::collections::BTreeSet;

use jagedo_core::{EngineError, ProviderId};

use crate::policy::{CandidateStrategy, PolicyTable};
use crate::request::Request;

/// Resolves candidate providers under a policy table.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentResolver<'a> {
    policy: &'a PolicyTable,
}

impl<'a> AssignmentResolver<'a> {
    pub fn new(policy: &'a PolicyTable) -> Self {
        Self { policy }
    }

    /// Candidate providers for a restricted assignment.
    ///
    /// Fails with `NoCandidateProviders` when the set is empty.
    pub fn resolve_restricted(
        &self,
        request: &Request,
        caller_ids: &[ProviderId],
    ) -> Result<BTreeSet<ProviderId>, EngineError> {
        let row = self.policy.lookup(request.category)?;
        let candidates: BTreeSet<ProviderId> = match row.candidates {
            CandidateStrategy::CallerSupplied => caller_ids.iter().copied().collect(),
            CandidateStrategy::LineItemSellers => request.line_item_sellers(),
        };
        if candidates.is_empty() {
            return Err(EngineError::NoCandidateProviders {
                request_id: request.id.to_string(),
            });
        }
        Ok(candidates)
    }

    /// Competitive assignment pre-selects nobody; it only checks that the
    /// category has a policy row.
    pub fn resolve_competitive(&self, request: &Request) -> Result<(), EngineError> {
        self.policy.lookup(request.category).map(|_| ())
    }

    /// Set-union `providers` into the request. Returns whether anything was
    /// added.
    pub fn assign(request: &mut Request, providers: &BTreeSet<ProviderId>) -> bool {
        let before = request.assigned_provider_ids.len();
        request
            .assigned_provider_ids
            .extend(providers.iter().copied());
        request.assigned_provider_ids.len() != before
    }
}
