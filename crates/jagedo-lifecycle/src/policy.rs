//! # Category Policy Table
//!
//! Per-category rules live in data, not in branches. Each row says what
//! kind of request a category takes, whether the assignment method is
//! forced, and where restricted-assignment candidates come from.
//!
//! | Category | Kind | Forced method | Candidates |
//! |---|---|---|---|
//! | FUNDI | JOB | RESTRICTED | caller-supplied |
//! | PROFESSIONAL | JOB | RESTRICTED | caller-supplied |
//! | CONTRACTOR | JOB | none | caller-supplied |
//! | HARDWARE | ORDER | none | line-item sellers |

use std::collections::BTreeMap;

use jagedo_core::EngineError;

use crate::request::{AssignmentMethod, NewRequest, RequestCategory, RequestKind};

/// Where restricted-assignment candidates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStrategy {
    /// Operations supplies already-vetted provider ids.
    CallerSupplied,
    /// The distinct sellers named on the order's line items.
    LineItemSellers,
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub category: RequestCategory,
    pub kind: RequestKind,
    /// When set, overrides whichever method the caller chose.
    pub forced_method: Option<AssignmentMethod>,
    pub candidates: CandidateStrategy,
}

/// Category → policy rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    rows: BTreeMap<RequestCategory, CategoryPolicy>,
}

impl PolicyTable {
    /// The platform's standard rows.
    pub fn standard() -> Self {
        Self::from_rows([
            CategoryPolicy {
                category: RequestCategory::Fundi,
                kind: RequestKind::Job,
                forced_method: Some(AssignmentMethod::Restricted),
                candidates: CandidateStrategy::CallerSupplied,
            },
            CategoryPolicy {
                category: RequestCategory::Professional,
                kind: RequestKind::Job,
                forced_method: Some(AssignmentMethod::Restricted),
                candidates: CandidateStrategy::CallerSupplied,
            },
            CategoryPolicy {
                category: RequestCategory::Contractor,
                kind: RequestKind::Job,
                forced_method: None,
                candidates: CandidateStrategy::CallerSupplied,
            },
            CategoryPolicy {
                category: RequestCategory::Hardware,
                kind: RequestKind::Order,
                forced_method: None,
                candidates: CandidateStrategy::LineItemSellers,
            },
        ])
    }

    /// Build a table from rows. Later rows replace earlier ones.
    pub fn from_rows(rows: impl IntoIterator<Item = CategoryPolicy>) -> Self {
        Self {
            rows: rows.into_iter().map(|row| (row.category, row)).collect(),
        }
    }

    /// Add or replace a row.
    pub fn with_row(mut self, row: CategoryPolicy) -> Self {
        self.rows.insert(row.category, row);
        self
    }

    /// The row for `category`.
    pub fn lookup(&self, category: RequestCategory) -> Result<&CategoryPolicy, EngineError> {
        self.rows
            .get(&category)
            .ok_or_else(|| EngineError::InvalidRequest(format!("no policy for category {category}")))
    }

    /// The method actually applied when `requested` is chosen.
    pub fn effective_method(
        &self,
        category: RequestCategory,
        requested: AssignmentMethod,
    ) -> Result<AssignmentMethod, EngineError> {
        Ok(self.lookup(category)?.forced_method.unwrap_or(requested))
    }

    /// Validate a new request against its category row.
    pub fn validate(&self, input: &NewRequest) -> Result<(), EngineError> {
        let row = self.lookup(input.category)?;
        if input.title.trim().is_empty() {
            return Err(EngineError::InvalidRequest("title must not be blank".into()));
        }
        if row.kind != input.kind {
            return Err(EngineError::InvalidRequest(format!(
                "category {} takes {} requests, not {}",
                input.category, row.kind, input.kind
            )));
        }
        match input.kind {
            RequestKind::Order if input.line_items.is_empty() => {
                return Err(EngineError::InvalidRequest(
                    "an ORDER requires at least one line item".into(),
                ));
            }
            RequestKind::Job if !input.line_items.is_empty() => {
                return Err(EngineError::InvalidRequest(
                    "line items are only valid on ORDER requests".into(),
                ));
            }
            _ => {}
        }
        for item in &input.line_items {
            if item.quantity == 0 {
                return Err(EngineError::InvalidRequest(format!(
                    "line item {:?} has zero quantity",
                    item.description
                )));
            }
            if !item.unit_price.is_positive() {
                return Err(EngineError::InvalidAmount(format!(
                    "line item {:?} has unit price {}",
                    item.description, item.unit_price
                )));
            }
        }
        Ok(())
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}
