//! # Money Model
//!
//! Pure functions deciding who gets paid what. All results are integer
//! minor units; every fractional cent is resolved with round-half-up.
//!
//! ## Commission
//!
//! `commission = round(total × rate)`, `payable = total − commission`. The
//! two parts always sum back to the bid total.
//!
//! ## Customer discount
//!
//! Self-managed requests are shown to customers and admins at a discount
//! (20% unless the deployment overrides it). Providers always see the
//! undiscounted figure.
//!
//! ## Milestone schedule
//!
//! Each tranche is `round(total × pct / 100)`, except the last, which takes
//! the residual so the schedule sums to the total exactly. Percentages may
//! carry two fraction digits (`12.5`, `33.33`); the plan must sum to exactly
//! 100.00.

use serde::{Deserialize, Serialize};

use jagedo_core::{
    format_hundredths, Amount, CallerRole, EngineError, ManagedBy, Percentage, Rate, BPS_SCALE,
    PERCENT_SCALE,
};

/// Default discount shown to customers on self-managed requests (20%).
pub const DEFAULT_SELF_MANAGED_DISCOUNT_BPS: u32 = 2_000;

// ── Commission ──────────────────────────────────────────────────────────

/// The platform commission split of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    /// The bid total.
    pub total_amount: Amount,
    /// The commission rate applied.
    pub commission_rate: Rate,
    /// The platform's share.
    pub jagedo_commission: Amount,
    /// What the provider receives.
    pub payable_to_provider: Amount,
}

/// Split a bid total into platform commission and provider payout.
pub fn commission(total_amount: Amount, commission_rate: Rate) -> Result<CommissionBreakdown, EngineError> {
    require_positive(total_amount)?;
    let jagedo_commission = total_amount
        .scale_round_half_up(i64::from(commission_rate.bps()), BPS_SCALE)
        .ok_or_else(|| overflow(total_amount))?;
    let payable_to_provider = total_amount
        .checked_sub(jagedo_commission)
        .ok_or_else(|| overflow(total_amount))?;
    Ok(CommissionBreakdown {
        total_amount,
        commission_rate,
        jagedo_commission,
        payable_to_provider,
    })
}

// ── Discount ────────────────────────────────────────────────────────────

/// What a given viewer is shown for a request total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountQuote {
    /// The undiscounted total.
    pub total_amount: Amount,
    /// The discount applied (zero when none applies).
    pub discount: Amount,
    /// `total_amount − discount`.
    pub discounted_total: Amount,
}

/// The discount rate offered on self-managed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountPolicy {
    rate: Rate,
}

impl DiscountPolicy {
    /// A policy with the given self-managed discount rate.
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }

    /// The self-managed discount rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Whether a discount applies for this management mode and viewer.
    pub fn applies(&self, managed_by: ManagedBy, viewer_role: CallerRole) -> bool {
        managed_by == ManagedBy::SelfManaged
            && matches!(viewer_role, CallerRole::Customer | CallerRole::Admin)
    }

    /// Compute the discount a viewer sees on `total_amount`.
    pub fn quote(
        &self,
        total_amount: Amount,
        managed_by: ManagedBy,
        viewer_role: CallerRole,
    ) -> Result<DiscountQuote, EngineError> {
        require_positive(total_amount)?;
        let discount = if self.applies(managed_by, viewer_role) {
            total_amount
                .scale_round_half_up(i64::from(self.rate.bps()), BPS_SCALE)
                .ok_or_else(|| overflow(total_amount))?
        } else {
            Amount::ZERO
        };
        let discounted_total = total_amount
            .checked_sub(discount)
            .ok_or_else(|| overflow(total_amount))?;
        Ok(DiscountQuote {
            total_amount,
            discount,
            discounted_total,
        })
    }
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            rate: Rate::DEFAULT_DISCOUNT,
        }
    }
}

/// Customer discount under the default policy.
pub fn customer_discount(
    total_amount: Amount,
    managed_by: ManagedBy,
    viewer_role: CallerRole,
) -> Result<DiscountQuote, EngineError> {
    DiscountPolicy::default().quote(total_amount, managed_by, viewer_role)
}

// ── Milestones ──────────────────────────────────────────────────────────

/// One tranche: `round(total × percentage / 100)`.
pub fn milestone_amount(total_amount: Amount, percentage: Percentage) -> Result<Amount, EngineError> {
    require_positive(total_amount)?;
    total_amount
        .scale_round_half_up(i64::from(percentage.hundredths()), i64::from(PERCENT_SCALE))
        .ok_or_else(|| overflow(total_amount))
}

/// Check that every percentage is above zero and they sum to exactly 100.
pub fn validate_percentages(percentages: &[Percentage]) -> Result<(), EngineError> {
    let total: u64 = percentages.iter().map(|p| u64::from(p.hundredths())).sum();
    if percentages.is_empty()
        || percentages.iter().any(|p| p.is_zero())
        || total != u64::from(PERCENT_SCALE)
    {
        return Err(EngineError::PercentageMismatch {
            total: format_hundredths(total),
        });
    }
    Ok(())
}

/// Split `total_amount` into tranches that sum to it exactly.
///
/// The last tranche absorbs the rounding residual. Fails with
/// `InvalidAmount` if that residual would be negative, which only happens
/// for totals of a few minor units.
pub fn milestone_schedule(total_amount: Amount, percentages: &[Percentage]) -> Result<Vec<Amount>, EngineError> {
    validate_percentages(percentages)?;
    require_positive(total_amount)?;

    let head = percentages.split_last().map_or(&[][..], |(_, head)| head);

    let mut amounts = Vec::with_capacity(percentages.len());
    let mut allocated = Amount::ZERO;
    for pct in head {
        let amount = milestone_amount(total_amount, *pct)?;
        allocated = allocated
            .checked_add(amount)
            .ok_or_else(|| overflow(total_amount))?;
        amounts.push(amount);
    }
    let residual = total_amount
        .checked_sub(allocated)
        .ok_or_else(|| overflow(total_amount))?;
    if residual.minor_units() < 0 {
        return Err(EngineError::InvalidAmount(format!(
            "rounded tranches of {total_amount} leave a negative final tranche of {residual}"
        )));
    }
    amounts.push(residual);
    Ok(amounts)
}

fn require_positive(amount: Amount) -> Result<(), EngineError> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    Ok(())
}

fn overflow(amount: Amount) -> EngineError {
    EngineError::InvalidAmount(format!("arithmetic overflow on {amount}"))
}
