//! Mid-life restructuring: keeps settled history verbatim and
//! regenerates the unsettled tail under the loan's current terms.
//!
//! The caller has already validated and committed the new loan terms;
//! this component only computes their numeric consequences. Running it
//! twice with the same terms is a no-op on settled data: the pending
//! tail is rebuilt identically both times.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    config::ProductTerms,
    error::{EngineError, EngineResult},
    schedule,
    store::{LoanRow, LoanStore},
    types::Money,
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RestructureOutcome {
    /// Settled instalments left untouched.
    pub settled: usize,
    /// Instalments regenerated for the unsettled remainder.
    pub regenerated: usize,
}

/// Regenerate the unsettled portion of a loan's schedule.
///
/// Settled instalments (paid or partial) are never altered or deleted;
/// pending and overdue instalments are dropped and rebuilt from the
/// remaining principal, interest, and term. Due dates continue from the
/// last settled instalment's due date, or from the disbursement date if
/// nothing is settled yet.
pub fn regenerate(
    store: &LoanStore,
    loan: &LoanRow,
    terms: &ProductTerms,
) -> EngineResult<RestructureOutcome> {
    let settled = store.settled_instalments(&loan.loan_id)?;
    store.delete_unsettled_instalments(&loan.loan_id)?;

    let remaining_term = loan.term - settled.len() as i64;
    if remaining_term <= 0 {
        // Every period is already settled; the loan has nothing left
        // to amortize.
        return Ok(RestructureOutcome {
            settled: settled.len(),
            regenerated: 0,
        });
    }

    let settled_principal: Money = settled.iter().map(|i| i.expected_principal).sum();
    let settled_interest: Money = settled.iter().map(|i| i.expected_interest).sum();
    let remaining_principal = loan.principal - settled_principal;
    let remaining_interest = loan.total_interest - settled_interest;
    if remaining_principal <= Decimal::ZERO {
        // A lengthened term with the full principal already scheduled
        // into settled periods leaves nothing to regenerate.
        return Ok(RestructureOutcome {
            settled: settled.len(),
            regenerated: 0,
        });
    }

    let anchor = settled
        .last()
        .map(|i| i.due_on)
        .or(loan.disbursed_on)
        .ok_or(EngineError::InvalidInput {
            field: "disbursed_on",
            reason: "loan has no disbursement date".into(),
        })?;
    let first_seq = settled.last().map(|i| i.seq).unwrap_or(0) + 1;

    let rows = schedule::build_tail(
        loan,
        terms,
        remaining_principal,
        remaining_interest,
        remaining_term,
        first_seq,
        anchor,
    )?;
    for row in &rows {
        store.insert_instalment(row)?;
    }

    log::debug!(
        "loan {}: restructured, {} settled kept, {} regenerated",
        loan.loan_id,
        settled.len(),
        rows.len()
    );
    Ok(RestructureOutcome {
        settled: settled.len(),
        regenerated: rows.len(),
    })
}
