//! Backfill reconciliation: retroactive schedule construction for
//! loans disbursed before instalment tracking existed.
//!
//! The schedule is generated once, then the loan's historical payment
//! ledger is replayed through the allocator in original chronology.
//! The end state matches what would exist had the schedule been
//! tracked from day one. Replay order matters: a divergent order would
//! split payments differently than they actually landed.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    allocation,
    config::ProductTerms,
    error::EngineResult,
    schedule,
    store::{LoanRow, LoanStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackfillOutcome {
    /// The loan already has a schedule; nothing was touched.
    AlreadyScheduled,
    Completed {
        instalments: usize,
        repayments_replayed: usize,
    },
}

/// Construct a schedule for a loan that has none, and replay its
/// repayment history against it. Idempotent: a second invocation is a
/// no-op.
///
/// The replay mutates instalments only. Repayment rows are history and
/// stay untouched, and the loan's running totals already reflect the
/// payments, so neither is written here.
pub fn reconcile(
    store: &LoanStore,
    loan: &LoanRow,
    terms: &ProductTerms,
    as_of: NaiveDate,
) -> EngineResult<BackfillOutcome> {
    if store.instalment_count(&loan.loan_id)? > 0 {
        return Ok(BackfillOutcome::AlreadyScheduled);
    }

    let rows = schedule::build_schedule(loan, terms)?;
    for row in &rows {
        store.insert_instalment(row)?;
    }

    // One working set for the whole replay: the allocator walks over
    // instalments it has already settled without effect.
    let mut instalments = store.unpaid_instalments(&loan.loan_id)?;
    let history = store.repayments_for_loan(&loan.loan_id)?;
    for payment in &history {
        allocation::allocate(payment.amount, &mut instalments);
    }

    // Anything still unpaid and past due has been delinquent all
    // along; flag it so the present state is honest about arrears.
    for inst in &mut instalments {
        if inst.due_on < as_of && matches!(inst.status.as_str(), "pending" | "partial") {
            inst.status = "overdue".into();
        }
    }

    for inst in &instalments {
        store.update_instalment_payment(inst)?;
    }

    log::debug!(
        "loan {}: backfilled {} instalments, replayed {} repayments",
        loan.loan_id,
        rows.len(),
        history.len()
    );
    Ok(BackfillOutcome::Completed {
        instalments: rows.len(),
        repayments_replayed: history.len(),
    })
}
