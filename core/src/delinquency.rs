//! Delinquency sweep: flags past-due obligations, ages delinquency
//! records, and resolves them once arrears clear.
//!
//! Runs as a batch over the whole book, not per request: candidate
//! loans and their unpaid instalments are fetched in bulk and grouped
//! in memory, so cost does not scale as one query per loan. The sweep
//! takes an explicit as-of date and reads no clock, which makes it a
//! pure function of (book, date).
//!
//! The sweep never writes off a record; write-off is an explicit
//! external action. A repayment landing mid-sweep can race the sweep's
//! read of the same loan; the next sweep corrects the record.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::ProductTerms,
    error::EngineResult,
    event::EngineEvent,
    money::pct_of,
    store::{InstalmentRow, LoanDefaultRow, LoanStore},
    types::Money,
};

/// Classify an overdue age in days into a reporting bucket.
pub fn aging_bucket(days_overdue: i64) -> &'static str {
    match days_overdue {
        d if d <= 30 => "1-30",
        d if d <= 60 => "31-60",
        d if d <= 90 => "61-90",
        _ => "90+",
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepSummary {
    pub loans_scanned: usize,
    pub instalments_marked_overdue: usize,
    pub defaults_flagged: usize,
    pub defaults_updated: usize,
    pub defaults_resolved: usize,
}

/// Sweep the whole book as of `as_of`.
pub fn sweep(store: &LoanStore, as_of: NaiveDate) -> EngineResult<SweepSummary> {
    let products: HashMap<String, _> = store
        .all_products()?
        .into_iter()
        .map(|p| (p.product_id.clone(), p))
        .collect();

    // Bulk read, then group by loan in memory. BTreeMap keeps the
    // per-loan processing order deterministic.
    let mut by_loan: BTreeMap<String, Vec<InstalmentRow>> = BTreeMap::new();
    for inst in store.unpaid_instalments_for_active_loans()? {
        by_loan.entry(inst.loan_id.clone()).or_default().push(inst);
    }

    let mut summary = SweepSummary::default();
    for loan in store.active_loans()? {
        if loan.outstanding <= Decimal::ZERO {
            continue;
        }
        summary.loans_scanned += 1;

        let instalments = by_loan.remove(&loan.loan_id).unwrap_or_default();
        let mut past_due: Vec<InstalmentRow> = Vec::new();
        for mut inst in instalments {
            if inst.due_on >= as_of {
                continue;
            }
            // Untouched past-due obligations get flagged; a partial
            // instalment past due stays partial and still counts as
            // delinquent exposure.
            if inst.status == "pending" {
                inst.status = "overdue".into();
                if let Some(id) = inst.instalment_id {
                    store.update_instalment_status(id, "overdue")?;
                }
                summary.instalments_marked_overdue += 1;
            }
            past_due.push(inst);
        }

        if past_due.is_empty() {
            resolve_if_active(store, &loan.loan_id, as_of, &mut summary)?;
            continue;
        }

        let earliest_due = past_due.iter().map(|i| i.due_on).min().unwrap_or(as_of);
        let days_overdue = (as_of - earliest_due).num_days();
        let amount_overdue: Money = past_due
            .iter()
            .map(|i| {
                (i.expected_principal - i.paid_principal)
                    + (i.expected_interest - i.paid_interest)
                    + (i.expected_penalty - i.paid_penalty)
            })
            .sum();

        if amount_overdue <= Decimal::ZERO {
            resolve_if_active(store, &loan.loan_id, as_of, &mut summary)?;
            continue;
        }

        let terms = ProductTerms::resolve(
            loan.product_id.as_deref().and_then(|id| products.get(id)),
        );
        let penalty = pct_of(amount_overdue, terms.late_penalty_rate);
        let bucket = aging_bucket(days_overdue);

        match store.active_default(&loan.loan_id)? {
            Some(record) => {
                store.update_default(
                    &record.default_id,
                    days_overdue,
                    amount_overdue,
                    penalty,
                    bucket,
                    as_of,
                )?;
                summary.defaults_updated += 1;
                store.append_event(
                    &EngineEvent::DefaultUpdated {
                        loan_id: loan.loan_id.clone(),
                        days_overdue,
                        amount_overdue,
                    },
                    as_of,
                )?;
            }
            None => {
                store.insert_default(&LoanDefaultRow {
                    default_id: Uuid::new_v4().to_string(),
                    loan_id: loan.loan_id.clone(),
                    days_overdue,
                    amount_overdue,
                    penalty_accrued: penalty,
                    aging_bucket: bucket.into(),
                    status: "overdue".into(),
                    flagged_on: as_of,
                    updated_on: as_of,
                    resolved_on: None,
                })?;
                summary.defaults_flagged += 1;
                store.append_event(
                    &EngineEvent::DefaultFlagged {
                        loan_id: loan.loan_id.clone(),
                        days_overdue,
                        amount_overdue,
                    },
                    as_of,
                )?;
            }
        }
    }

    log::info!(
        "sweep as of {as_of}: {} loans, {} marked overdue, {} flagged, {} updated, {} resolved",
        summary.loans_scanned,
        summary.instalments_marked_overdue,
        summary.defaults_flagged,
        summary.defaults_updated,
        summary.defaults_resolved
    );
    Ok(summary)
}

fn resolve_if_active(
    store: &LoanStore,
    loan_id: &str,
    as_of: NaiveDate,
    summary: &mut SweepSummary,
) -> EngineResult<()> {
    if let Some(record) = store.active_default(loan_id)? {
        store.resolve_default(&record.default_id, as_of)?;
        summary.defaults_resolved += 1;
        store.append_event(
            &EngineEvent::DefaultResolved {
                loan_id: loan_id.to_string(),
            },
            as_of,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::aging_bucket;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(aging_bucket(1), "1-30");
        assert_eq!(aging_bucket(30), "1-30");
        assert_eq!(aging_bucket(31), "31-60");
        assert_eq!(aging_bucket(60), "31-60");
        assert_eq!(aging_bucket(61), "61-90");
        assert_eq!(aging_bucket(90), "61-90");
        assert_eq!(aging_bucket(91), "90+");
        assert_eq!(aging_bucket(365), "90+");
    }
}
