//! Payment allocation: distributes one payment across a loan's unpaid
//! instalments, oldest obligation first.
//!
//! Waterfall within each instalment: penalty, then interest, then
//! principal. Insurance (for products that track it) comes last, so
//! the three-way order is unchanged for loans without it. Each step
//! applies `min(remaining, shortfall)`, so a paid component can never
//! exceed its expected counterpart and no allocation is ever negative.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{store::InstalmentRow, types::Money};

/// Where one payment went, plus whatever was left once every
/// outstanding obligation was covered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllocationTotals {
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
    pub insurance: Money,
    /// Unallocated remainder. The caller credits this elsewhere (for
    /// example a savings account); it never lands on an instalment.
    pub overpayment: Money,
}

impl AllocationTotals {
    /// Total applied to instalments, excluding the overpayment.
    pub fn allocated(&self) -> Money {
        self.principal + self.interest + self.penalty + self.insurance
    }
}

/// Allocate `amount` across `instalments` (ordered by sequence
/// ascending), mutating paid components and statuses in place.
///
/// Inputs are validated by the caller: the amount is strictly positive
/// and the slice holds the loan's unpaid instalments in order. Fully
/// paid instalments in the slice are walked over without effect, which
/// lets a replay reuse one working set across many payments.
pub fn allocate(amount: Money, instalments: &mut [InstalmentRow]) -> AllocationTotals {
    let mut remaining = amount;
    let mut totals = AllocationTotals::default();

    for inst in instalments.iter_mut() {
        if remaining <= Decimal::ZERO {
            break;
        }
        apply_to_instalment(&mut remaining, inst, &mut totals);
    }

    totals.overpayment = remaining;
    totals
}

fn apply_to_instalment(
    remaining: &mut Money,
    inst: &mut InstalmentRow,
    totals: &mut AllocationTotals,
) {
    apply_component(remaining, inst.expected_penalty, &mut inst.paid_penalty, &mut totals.penalty);
    apply_component(remaining, inst.expected_interest, &mut inst.paid_interest, &mut totals.interest);
    apply_component(remaining, inst.expected_principal, &mut inst.paid_principal, &mut totals.principal);
    apply_component(remaining, inst.expected_insurance, &mut inst.paid_insurance, &mut totals.insurance);

    // Status: fully covered settles the instalment; a first partial
    // payment moves pending to partial; anything else (notably an
    // overdue instalment partially paid) keeps its status.
    if inst.total_paid() >= inst.total_due() {
        inst.status = "paid".into();
    } else if inst.total_paid() > Decimal::ZERO && inst.status == "pending" {
        inst.status = "partial".into();
    }
}

fn apply_component(remaining: &mut Money, expected: Money, paid: &mut Money, total: &mut Money) {
    let shortfall = expected - *paid;
    if shortfall <= Decimal::ZERO || *remaining <= Decimal::ZERO {
        return;
    }
    let applied = shortfall.min(*remaining);
    *paid += applied;
    *total += applied;
    *remaining -= applied;
}
