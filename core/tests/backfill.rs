//! Integration tests for backfill reconciliation.
//!
//! The properties that matter:
//! 1. Replaying the historical ledger produces the same instalment
//!    state as if the schedule had been tracked from day one.
//! 2. A loan that already has instalments is never touched again.
//! 3. Past-due instalments left unpaid by the replay end up overdue.
//! 4. The replay writes no repayment rows and no loan totals.

use chrono::NaiveDate;
use loanbook_core::{
    backfill::BackfillOutcome,
    engine::LoanEngine,
    store::{LoanProductRow, LoanRow, RepaymentRow},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn build() -> LoanEngine {
    let engine = LoanEngine::in_memory().expect("in_memory failed");
    engine
        .store
        .insert_product(&LoanProductRow {
            product_id: "prod-1".into(),
            name: "Test Product".into(),
            repayment_frequency: Some("monthly".into()),
            interest_method: Some("flat".into()),
            late_penalty_rate: Some(dec!(5)),
        })
        .unwrap();
    engine
}

/// 6,000 over 6 months flat with 600 interest: 1,000 + 100 per period.
fn flat_loan(loan_id: &str) -> LoanRow {
    LoanRow {
        loan_id: loan_id.into(),
        borrower_id: "member-1".into(),
        product_id: Some("prod-1".into()),
        principal: dec!(6000),
        term: 6,
        interest_rate: dec!(1.6666),
        total_interest: dec!(600),
        instalment_amount: None,
        interest_upfront: false,
        amount_repaid: Decimal::ZERO,
        outstanding: dec!(6600),
        status: "disbursed".into(),
        disbursed_on: Some(date(2024, 1, 1)),
    }
}

fn historical_payment(loan_id: &str, n: i64, amount: Decimal, paid_on: NaiveDate) -> RepaymentRow {
    RepaymentRow {
        repayment_id: format!("hist-{loan_id}-{n}"),
        loan_id: loan_id.into(),
        amount,
        paid_on,
        principal_applied: Decimal::ZERO,
        interest_applied: Decimal::ZERO,
        penalty_applied: Decimal::ZERO,
        insurance_applied: Decimal::ZERO,
        overpayment: Decimal::ZERO,
        method: Some("cash".into()),
        reference: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: replay matches a loan tracked from day one
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn backfill_matches_live_tracking() {
    // Twin A: schedule generated at disbursement, payments through the
    // engine. Twin B: bare repayment ledger, schedule backfilled later.
    let live = build();
    let legacy = build();
    live.store.insert_loan(&flat_loan("loan-1")).unwrap();
    legacy.store.insert_loan(&flat_loan("loan-1")).unwrap();

    live.disburse_schedule("loan-1").unwrap();
    live.repay("loan-1", dec!(1100), date(2024, 2, 1), None, None)
        .unwrap();
    live.repay("loan-1", dec!(700), date(2024, 2, 20), None, None)
        .unwrap();

    for (n, (amount, paid_on)) in [
        (dec!(1100), date(2024, 2, 1)),
        (dec!(700), date(2024, 2, 20)),
    ]
    .iter()
    .enumerate()
    {
        legacy
            .store
            .insert_repayment(&historical_payment("loan-1", n as i64, *amount, *paid_on))
            .unwrap();
    }

    // As-of before any due date: no overdue marking muddies the diff.
    let outcome = legacy.backfill("loan-1", date(2024, 1, 15)).unwrap();
    assert_eq!(
        outcome,
        BackfillOutcome::Completed {
            instalments: 6,
            repayments_replayed: 2
        }
    );

    let a = live.store.instalments_for_loan("loan-1").unwrap();
    let b = legacy.store.instalments_for_loan("loan-1").unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.seq, y.seq);
        assert_eq!(x.expected_principal, y.expected_principal, "seq {}", x.seq);
        assert_eq!(x.paid_principal, y.paid_principal, "seq {}", x.seq);
        assert_eq!(x.paid_interest, y.paid_interest, "seq {}", x.seq);
        assert_eq!(x.status, y.status, "seq {}", x.seq);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: idempotent guard
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn second_backfill_is_a_no_op() {
    let engine = build();
    engine.store.insert_loan(&flat_loan("loan-1")).unwrap();
    engine
        .store
        .insert_repayment(&historical_payment("loan-1", 0, dec!(1100), date(2024, 2, 1)))
        .unwrap();

    let first = engine.backfill("loan-1", date(2024, 3, 15)).unwrap();
    assert!(matches!(first, BackfillOutcome::Completed { .. }));
    let snapshot = engine.store.instalments_for_loan("loan-1").unwrap();

    let second = engine.backfill("loan-1", date(2024, 3, 15)).unwrap();
    assert_eq!(second, BackfillOutcome::AlreadyScheduled);
    assert_eq!(engine.store.instalments_for_loan("loan-1").unwrap(), snapshot);

    // And the guard also protects loans scheduled the normal way.
    engine.store.insert_loan(&flat_loan("loan-2")).unwrap();
    engine.disburse_schedule("loan-2").unwrap();
    assert_eq!(
        engine.backfill("loan-2", date(2024, 3, 15)).unwrap(),
        BackfillOutcome::AlreadyScheduled
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: unpaid past-due instalments end up overdue
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn past_due_instalments_are_flagged_after_replay() {
    let engine = build();
    engine.store.insert_loan(&flat_loan("loan-1")).unwrap();
    // History covers instalment 1 and half of instalment 2.
    engine
        .store
        .insert_repayment(&historical_payment("loan-1", 0, dec!(1650), date(2024, 2, 1)))
        .unwrap();

    // Three due dates have passed by mid-April.
    let outcome = engine.backfill("loan-1", date(2024, 4, 15)).unwrap();
    assert!(matches!(outcome, BackfillOutcome::Completed { .. }));

    let instalments = engine.store.instalments_for_loan("loan-1").unwrap();
    assert_eq!(instalments[0].status, "paid");
    // Partially covered but past due: flagged overdue by the backfill.
    assert_eq!(instalments[1].status, "overdue");
    assert_eq!(instalments[1].paid_interest, dec!(100));
    assert_eq!(instalments[1].paid_principal, dec!(450));
    assert_eq!(instalments[2].status, "overdue");
    assert_eq!(instalments[2].total_paid(), Decimal::ZERO);
    // Periods 4..6 are not yet due.
    for inst in &instalments[3..] {
        assert_eq!(inst.status, "pending");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: replay order is payment chronology, not insertion order
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn replay_follows_payment_chronology() {
    let engine = build();
    engine.store.insert_loan(&flat_loan("loan-1")).unwrap();
    // Inserted out of order: the later payment lands in the ledger first.
    engine
        .store
        .insert_repayment(&historical_payment("loan-1", 1, dec!(700), date(2024, 3, 5)))
        .unwrap();
    engine
        .store
        .insert_repayment(&historical_payment("loan-1", 0, dec!(1100), date(2024, 2, 1)))
        .unwrap();

    engine.backfill("loan-1", date(2024, 1, 15)).unwrap();

    // 1,100 on Feb 1 clears instalment 1; 700 on Mar 5 covers the
    // interest and 600 principal of instalment 2. Divergent order
    // would have split the 1,100 across both instalments instead.
    let instalments = engine.store.instalments_for_loan("loan-1").unwrap();
    assert_eq!(instalments[0].status, "paid");
    assert_eq!(instalments[1].paid_interest, dec!(100));
    assert_eq!(instalments[1].paid_principal, dec!(600));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: the replay leaves ledger and loan totals alone
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn replay_writes_no_new_history() {
    let engine = build();
    engine.store.insert_loan(&flat_loan("loan-1")).unwrap();
    engine
        .store
        .insert_repayment(&historical_payment("loan-1", 0, dec!(1100), date(2024, 2, 1)))
        .unwrap();

    engine.backfill("loan-1", date(2024, 2, 15)).unwrap();

    assert_eq!(engine.store.repayment_count("loan-1").unwrap(), 1);
    let loan = engine.store.get_loan("loan-1").unwrap().unwrap();
    // Running totals belong to the original payment path; backfill
    // only reconstructs instalment state.
    assert_eq!(loan.amount_repaid, Decimal::ZERO);
    assert_eq!(loan.outstanding, dec!(6600));
}
