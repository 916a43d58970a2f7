//! The engine facade — one method per operation, one transaction per
//! call.
//!
//! RULES:
//!   - Every mutating operation runs inside a single transaction; any
//!     error rolls the whole call back.
//!   - Callers validate lifecycle decisions (may this loan disburse,
//!     restructure, be written off); the engine computes the numeric
//!     consequences.
//!   - No retries, no cancellation, no cross-loan shared state. Two
//!     workers must not touch the same loan concurrently; callers
//!     serialize per loan.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    allocation::{self, AllocationTotals},
    backfill::{self, BackfillOutcome},
    config::ProductTerms,
    delinquency::{self, SweepSummary},
    error::{EngineError, EngineResult},
    event::EngineEvent,
    restructure::{self, RestructureOutcome},
    schedule::{self, plan_kind},
    store::{InstalmentRow, LoanRow, LoanStore, RepaymentRow},
    types::Money,
};

/// Loan statuses the allocator accepts payments against.
const REPAYABLE: [&str; 3] = ["disbursed", "active", "restructured"];

#[derive(Debug, Clone, Serialize)]
pub struct RepaymentOutcome {
    pub repayment_id: String,
    pub totals: AllocationTotals,
    /// True when this payment brought the loan's outstanding balance
    /// to zero.
    pub loan_settled: bool,
}

pub struct LoanEngine {
    pub store: LoanStore,
}

impl LoanEngine {
    pub fn new(store: LoanStore) -> Self {
        Self { store }
    }

    /// Open (or create) an engine over the database at `path`, with
    /// migrations applied.
    pub fn open(path: &str) -> EngineResult<Self> {
        let store = LoanStore::open(path)?;
        store.migrate()?;
        Ok(Self::new(store))
    }

    /// In-memory engine for tests and demo runs.
    pub fn in_memory() -> EngineResult<Self> {
        let store = LoanStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store))
    }

    /// Generate and persist the instalment schedule for a freshly
    /// disbursed loan. Returns the created instalments for display.
    pub fn disburse_schedule(&self, loan_id: &str) -> EngineResult<Vec<InstalmentRow>> {
        self.store.with_tx(|store| {
            let loan = Self::require_loan(store, loan_id)?;
            if store.instalment_count(loan_id)? > 0 {
                return Err(EngineError::InvalidInput {
                    field: "loan_id",
                    reason: format!("loan '{loan_id}' already has a schedule"),
                });
            }
            let disbursed_on = loan.disbursed_on.ok_or(EngineError::InvalidInput {
                field: "disbursed_on",
                reason: "loan has no disbursement date".into(),
            })?;
            let terms = Self::terms_for(store, &loan)?;
            let rows = schedule::build_schedule(&loan, &terms)?;
            for row in &rows {
                store.insert_instalment(row)?;
            }
            store.append_event(
                &EngineEvent::ScheduleGenerated {
                    loan_id: loan.loan_id.clone(),
                    instalments: rows.len(),
                    method: plan_kind(&loan, &terms).name().to_string(),
                },
                disbursed_on,
            )?;
            log::debug!("loan {loan_id}: generated {} instalments", rows.len());
            store.instalments_for_loan(loan_id)
        })
    }

    /// Allocate one validated payment against a loan, record it in the
    /// repayment ledger, and update the loan's running totals.
    ///
    /// The returned totals satisfy
    /// `amount == allocated() + overpayment`; the caller credits any
    /// overpayment elsewhere and posts the ledger entries.
    pub fn repay(
        &self,
        loan_id: &str,
        amount: Money,
        paid_on: NaiveDate,
        method: Option<&str>,
        reference: Option<&str>,
    ) -> EngineResult<RepaymentOutcome> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidInput {
                field: "amount",
                reason: format!("payment amount must be positive, got {amount}"),
            });
        }
        self.store.with_tx(|store| {
            let loan = Self::require_loan(store, loan_id)?;
            if !REPAYABLE.contains(&loan.status.as_str()) {
                return Err(EngineError::LoanNotRepayable {
                    loan_id: loan.loan_id.clone(),
                    status: loan.status.clone(),
                });
            }

            let mut instalments = store.unpaid_instalments(loan_id)?;
            let totals = allocation::allocate(amount, &mut instalments);
            for inst in &instalments {
                store.update_instalment_payment(inst)?;
            }

            let repayment_id = Uuid::new_v4().to_string();
            store.insert_repayment(&RepaymentRow {
                repayment_id: repayment_id.clone(),
                loan_id: loan.loan_id.clone(),
                amount,
                paid_on,
                principal_applied: totals.principal,
                interest_applied: totals.interest,
                penalty_applied: totals.penalty,
                insurance_applied: totals.insurance,
                overpayment: totals.overpayment,
                method: method.map(str::to_string),
                reference: reference.map(str::to_string),
            })?;

            let applied = totals.allocated();
            let amount_repaid = loan.amount_repaid + applied;
            let outstanding = (loan.outstanding - applied).max(Decimal::ZERO);
            store.update_loan_totals(loan_id, amount_repaid, outstanding)?;

            store.append_event(
                &EngineEvent::RepaymentAllocated {
                    loan_id: loan.loan_id.clone(),
                    repayment_id: repayment_id.clone(),
                    amount,
                    principal: totals.principal,
                    interest: totals.interest,
                    penalty: totals.penalty,
                    insurance: totals.insurance,
                    overpayment: totals.overpayment,
                },
                paid_on,
            )?;

            let loan_settled = outstanding <= Decimal::ZERO;
            if loan_settled {
                store.update_loan_status(loan_id, "paid")?;
                if let Some(record) = store.active_default(loan_id)? {
                    store.resolve_default(&record.default_id, paid_on)?;
                }
                store.append_event(
                    &EngineEvent::LoanSettled {
                        loan_id: loan.loan_id.clone(),
                    },
                    paid_on,
                )?;
            }

            log::debug!(
                "loan {loan_id}: allocated {} (principal {}, interest {}, penalty {}, overpayment {})",
                amount,
                totals.principal,
                totals.interest,
                totals.penalty,
                totals.overpayment
            );
            Ok(RepaymentOutcome {
                repayment_id,
                totals,
                loan_settled,
            })
        })
    }

    /// Regenerate the unsettled schedule tail after the restructuring
    /// workflow has committed new terms to the loan. `effective_on`
    /// dates the audit record only; due dates anchor on the schedule
    /// itself.
    pub fn restructure(
        &self,
        loan_id: &str,
        effective_on: NaiveDate,
    ) -> EngineResult<RestructureOutcome> {
        self.store.with_tx(|store| {
            let loan = Self::require_loan(store, loan_id)?;
            let terms = Self::terms_for(store, &loan)?;
            let outcome = restructure::regenerate(store, &loan, &terms)?;
            store.append_event(
                &EngineEvent::ScheduleRegenerated {
                    loan_id: loan.loan_id.clone(),
                    settled: outcome.settled,
                    regenerated: outcome.regenerated,
                },
                effective_on,
            )?;
            Ok(outcome)
        })
    }

    /// Retroactively construct a schedule for a loan that predates
    /// instalment tracking, replaying its payment history.
    pub fn backfill(&self, loan_id: &str, as_of: NaiveDate) -> EngineResult<BackfillOutcome> {
        self.store.with_tx(|store| {
            let loan = Self::require_loan(store, loan_id)?;
            let terms = Self::terms_for(store, &loan)?;
            let outcome = backfill::reconcile(store, &loan, &terms, as_of)?;
            if let BackfillOutcome::Completed {
                instalments,
                repayments_replayed,
            } = outcome
            {
                store.append_event(
                    &EngineEvent::BackfillCompleted {
                        loan_id: loan.loan_id.clone(),
                        instalments,
                        repayments_replayed,
                    },
                    as_of,
                )?;
            }
            Ok(outcome)
        })
    }

    /// Run the delinquency sweep over the whole book as of `as_of`.
    pub fn sweep(&self, as_of: NaiveDate) -> EngineResult<SweepSummary> {
        self.store.with_tx(|store| delinquency::sweep(store, as_of))
    }

    fn require_loan(store: &LoanStore, loan_id: &str) -> EngineResult<LoanRow> {
        store
            .get_loan(loan_id)?
            .ok_or_else(|| EngineError::LoanNotFound {
                loan_id: loan_id.to_string(),
            })
    }

    fn terms_for(store: &LoanStore, loan: &LoanRow) -> EngineResult<ProductTerms> {
        let product = match loan.product_id.as_deref() {
            Some(id) => store.get_product(id)?,
            None => None,
        };
        Ok(ProductTerms::resolve(product.as_ref()))
    }
}
