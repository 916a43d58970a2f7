//! Schedule generation: turns a disbursed loan into its full sequence
//! of instalment obligations.
//!
//! Three mutually exclusive plans, selected by precedence: a loan with
//! upfront-deducted interest always splits principal evenly with zero
//! per-period interest, regardless of product; otherwise the product's
//! interest method decides between flat and declining-balance.
//!
//! Rounding residue is reconciled once after generation and always
//! lands in the final instalment, never spread across periods. That
//! keeps the correction auditable in one place.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::{
    config::{InterestMethod, ProductTerms},
    error::{EngineError, EngineResult},
    money::{pct_of, round2},
    store::{InstalmentRow, LoanRow},
    types::Money,
};

/// Which repayment plan a loan amortizes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    UpfrontInterest,
    Flat,
    DecliningBalance,
}

impl PlanKind {
    pub fn name(self) -> &'static str {
        match self {
            PlanKind::UpfrontInterest => "upfront_interest",
            PlanKind::Flat => "flat",
            PlanKind::DecliningBalance => "declining_balance",
        }
    }
}

/// Plan selection. The upfront-interest flag on the loan wins over the
/// product's interest method.
pub fn plan_kind(loan: &LoanRow, terms: &ProductTerms) -> PlanKind {
    if loan.interest_upfront {
        PlanKind::UpfrontInterest
    } else {
        match terms.method {
            InterestMethod::Flat => PlanKind::Flat,
            InterestMethod::DecliningBalance => PlanKind::DecliningBalance,
        }
    }
}

/// Build the full schedule for a freshly disbursed loan. Pure: no
/// store access, nothing persisted.
pub fn build_schedule(loan: &LoanRow, terms: &ProductTerms) -> EngineResult<Vec<InstalmentRow>> {
    let disbursed_on = loan.disbursed_on.ok_or(EngineError::InvalidInput {
        field: "disbursed_on",
        reason: "loan has no disbursement date".into(),
    })?;
    build_tail(
        loan,
        terms,
        loan.principal,
        loan.total_interest,
        loan.term,
        1,
        disbursed_on,
    )
}

/// Build a schedule tail: `term` instalments amortizing `principal`
/// (and `total_interest` for non-upfront plans), numbered from
/// `first_seq`, with due dates offset period-by-period from `anchor`.
///
/// Initial generation passes the whole loan with the disbursement date
/// as anchor; restructuring passes the unsettled remainder anchored on
/// the last settled due date.
pub fn build_tail(
    loan: &LoanRow,
    terms: &ProductTerms,
    principal: Money,
    total_interest: Money,
    term: i64,
    first_seq: i64,
    anchor: NaiveDate,
) -> EngineResult<Vec<InstalmentRow>> {
    if term <= 0 {
        return Err(EngineError::InvalidInput {
            field: "term",
            reason: format!("term must be positive, got {term}"),
        });
    }
    if principal <= Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "principal",
            reason: format!("principal must be positive, got {principal}"),
        });
    }

    let period_days = terms.frequency.period_days();
    let due_on = |n: i64| anchor + Duration::days(period_days * (n + 1));
    let kind = plan_kind(loan, terms);

    let mut rows = Vec::with_capacity(term as usize);
    match kind {
        PlanKind::UpfrontInterest => {
            // Interest was charged at disbursement; each period carries
            // an even principal share and nothing else.
            let share = round2(principal / Decimal::from(term));
            for n in 0..term {
                rows.push(instalment(loan, first_seq + n, due_on(n), share, Decimal::ZERO));
            }
        }
        PlanKind::Flat => {
            let principal_share = round2(principal / Decimal::from(term));
            let interest_share = round2(total_interest / Decimal::from(term));
            for n in 0..term {
                rows.push(instalment(
                    loan,
                    first_seq + n,
                    due_on(n),
                    principal_share,
                    interest_share,
                ));
            }
        }
        PlanKind::DecliningBalance => {
            let payment = loan
                .instalment_amount
                .filter(|p| *p > Decimal::ZERO)
                .unwrap_or_else(|| round2(principal / Decimal::from(term)));
            let mut balance = principal;
            for n in 0..term {
                if n == term - 1 {
                    // Final period: force exact amortization no matter
                    // what rounding accumulated along the way.
                    let interest = round2((payment - balance).max(Decimal::ZERO));
                    rows.push(instalment(loan, first_seq + n, due_on(n), balance, interest));
                    balance = Decimal::ZERO;
                } else {
                    let mut interest = pct_of(balance, loan.interest_rate);
                    let mut principal_due = payment - interest;
                    if principal_due > balance {
                        interest = round2(payment - balance);
                        principal_due = balance;
                    }
                    if principal_due < Decimal::ZERO {
                        // Payment does not even cover the period's
                        // interest; the principal share floors at zero
                        // and the final period absorbs the rest.
                        principal_due = Decimal::ZERO;
                    }
                    balance -= principal_due;
                    rows.push(instalment(
                        loan,
                        first_seq + n,
                        due_on(n),
                        principal_due,
                        interest,
                    ));
                }
            }
        }
    }

    reconcile_rounding(loan, &mut rows, principal, total_interest, kind);
    Ok(rows)
}

/// Absorb rounding residue into the final instalment.
///
/// Principal is always corrected exactly: the schedule must sum to the
/// amount disbursed. Interest is corrected only when the residue is
/// smaller than the final instalment's own interest; a larger residue
/// would distort (or negate) the final figure, so it is skipped and
/// logged instead.
fn reconcile_rounding(
    loan: &LoanRow,
    rows: &mut [InstalmentRow],
    principal: Money,
    total_interest: Money,
    kind: PlanKind,
) {
    let Some(last) = rows.len().checked_sub(1) else {
        return;
    };

    let principal_sum: Decimal = rows.iter().map(|r| r.expected_principal).sum();
    let diff = principal - principal_sum;
    if diff != Decimal::ZERO {
        rows[last].expected_principal += diff;
    }

    if kind == PlanKind::UpfrontInterest {
        return;
    }
    let interest_sum: Decimal = rows.iter().map(|r| r.expected_interest).sum();
    let diff = total_interest - interest_sum;
    if diff != Decimal::ZERO {
        if diff.abs() < rows[last].expected_interest {
            rows[last].expected_interest += diff;
        } else {
            log::warn!(
                "loan {}: interest correction {} exceeds final instalment interest {}, skipped",
                loan.loan_id,
                diff,
                rows[last].expected_interest
            );
        }
    }
}

fn instalment(
    loan: &LoanRow,
    seq: i64,
    due_on: NaiveDate,
    expected_principal: Money,
    expected_interest: Money,
) -> InstalmentRow {
    InstalmentRow {
        instalment_id: None,
        loan_id: loan.loan_id.clone(),
        seq,
        due_on,
        expected_principal,
        expected_interest,
        expected_penalty: Decimal::ZERO,
        expected_insurance: Decimal::ZERO,
        paid_principal: Decimal::ZERO,
        paid_interest: Decimal::ZERO,
        paid_penalty: Decimal::ZERO,
        paid_insurance: Decimal::ZERO,
        status: "pending".into(),
    }
}
