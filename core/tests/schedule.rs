//! Integration tests for schedule generation.
//!
//! The properties that matter:
//! 1. Expected principal always sums to the amount disbursed, exactly.
//! 2. Rounding residue lands only in the final instalment.
//! 3. The declining-balance plan fully amortizes regardless of
//!    accumulated rounding.
//! 4. Upfront-interest loans carry zero per-period interest.
//! 5. An oversized interest correction is skipped, not applied.

use chrono::{Duration, NaiveDate};
use loanbook_core::{
    engine::LoanEngine,
    store::{LoanProductRow, LoanRow},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn build(frequency: &str, method: &str) -> LoanEngine {
    let engine = LoanEngine::in_memory().expect("in_memory failed");
    engine
        .store
        .insert_product(&LoanProductRow {
            product_id: "prod-1".into(),
            name: "Test Product".into(),
            repayment_frequency: Some(frequency.into()),
            interest_method: Some(method.into()),
            late_penalty_rate: Some(dec!(5)),
        })
        .unwrap();
    engine
}

fn loan(
    loan_id: &str,
    principal: Decimal,
    term: i64,
    rate: Decimal,
    total_interest: Decimal,
    instalment_amount: Option<Decimal>,
    interest_upfront: bool,
) -> LoanRow {
    LoanRow {
        loan_id: loan_id.into(),
        borrower_id: "member-1".into(),
        product_id: Some("prod-1".into()),
        principal,
        term,
        interest_rate: rate,
        total_interest,
        instalment_amount,
        interest_upfront,
        amount_repaid: Decimal::ZERO,
        outstanding: if interest_upfront {
            principal
        } else {
            principal + total_interest
        },
        status: "disbursed".into(),
        disbursed_on: Some(date(2024, 1, 1)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: the annuity worked example fully amortizes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn declining_balance_annuity_amortizes_exactly() {
    let engine = build("monthly", "declining_balance");
    // 100,000 over 12 months at 10% annual (0.833333% per period),
    // annuity payment 8,791.59.
    engine
        .store
        .insert_loan(&loan(
            "loan-1",
            dec!(100000),
            12,
            dec!(0.833333),
            dec!(5499.08),
            Some(dec!(8791.59)),
            false,
        ))
        .unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    assert_eq!(schedule.len(), 12);

    // Period 1: interest on the full balance, remainder to principal.
    assert_eq!(schedule[0].expected_interest, dec!(833.33));
    assert_eq!(schedule[0].expected_principal, dec!(7958.26));

    // Principal sums to the amount disbursed, exactly.
    let principal_sum: Decimal = schedule.iter().map(|i| i.expected_principal).sum();
    assert_eq!(principal_sum, dec!(100000));

    // Interest reconciles to the originated total, exactly (the small
    // residue fits inside the final instalment's interest).
    let interest_sum: Decimal = schedule.iter().map(|i| i.expected_interest).sum();
    assert_eq!(interest_sum, dec!(5499.08));

    // Every instalment starts pending with nothing paid.
    for inst in &schedule {
        assert_eq!(inst.status, "pending", "instalment {} not pending", inst.seq);
        assert_eq!(inst.paid_principal, Decimal::ZERO);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: declining-balance clamps principal to the running balance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn declining_balance_clamps_final_period() {
    let engine = build("monthly", "declining_balance");
    // Payment target far above the even split: the balance runs out in
    // the final period and the overshoot is recharacterized as interest.
    engine
        .store
        .insert_loan(&loan(
            "loan-1",
            dec!(1000),
            2,
            dec!(1),
            dec!(200),
            Some(dec!(600)),
            false,
        ))
        .unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    assert_eq!(schedule[0].expected_interest, dec!(10.00));
    assert_eq!(schedule[0].expected_principal, dec!(590.00));
    // Final period: principal is the remaining balance exactly.
    assert_eq!(schedule[1].expected_principal, dec!(410.00));
    assert_eq!(schedule[1].expected_interest, dec!(190.00));

    let principal_sum: Decimal = schedule.iter().map(|i| i.expected_principal).sum();
    assert_eq!(principal_sum, dec!(1000));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: flat interest splits evenly, residue in the final instalment
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn flat_interest_rounding_residue_lands_in_final_instalment() {
    let engine = build("monthly", "flat");
    // 10,000 / 3 does not divide evenly: 3,333.33 + 3,333.33 + 3,333.34.
    engine
        .store
        .insert_loan(&loan("loan-1", dec!(10000), 3, dec!(10), dec!(1000), None, false))
        .unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    assert_eq!(schedule[0].expected_principal, dec!(3333.33));
    assert_eq!(schedule[1].expected_principal, dec!(3333.33));
    assert_eq!(schedule[2].expected_principal, dec!(3333.34));

    assert_eq!(schedule[0].expected_interest, dec!(333.33));
    assert_eq!(schedule[2].expected_interest, dec!(333.34));

    let principal_sum: Decimal = schedule.iter().map(|i| i.expected_principal).sum();
    assert_eq!(principal_sum, dec!(10000));
    let interest_sum: Decimal = schedule.iter().map(|i| i.expected_interest).sum();
    assert_eq!(interest_sum, dec!(1000));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: upfront-deducted interest wins over the product method
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn upfront_interest_loan_carries_zero_period_interest() {
    // Product says declining-balance; the loan's upfront flag overrides.
    let engine = build("monthly", "declining_balance");
    engine
        .store
        .insert_loan(&loan("loan-1", dec!(9000), 4, dec!(2), dec!(720), None, true))
        .unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    assert_eq!(schedule.len(), 4);
    for inst in &schedule {
        assert_eq!(inst.expected_interest, Decimal::ZERO);
        assert_eq!(inst.expected_principal, dec!(2250));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: oversized interest correction is skipped
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn oversized_interest_correction_is_skipped() {
    let engine = build("monthly", "declining_balance");
    // Zero rate with an even payment: the schedule accrues no interest
    // at all, so the 100.00 originated total cannot be reconciled into
    // the final instalment and must be left alone.
    engine
        .store
        .insert_loan(&loan("loan-1", dec!(1200), 3, dec!(0), dec!(100), None, false))
        .unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    for inst in &schedule {
        assert_eq!(inst.expected_interest, Decimal::ZERO);
    }
    let principal_sum: Decimal = schedule.iter().map(|i| i.expected_principal).sum();
    assert_eq!(principal_sum, dec!(1200));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: due dates follow the product frequency in fixed-length periods
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn due_dates_step_by_fixed_period_length() {
    let engine = build("weekly", "flat");
    engine
        .store
        .insert_loan(&loan("loan-1", dec!(700), 7, dec!(1), dec!(70), None, false))
        .unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    let disbursed = date(2024, 1, 1);
    for (n, inst) in schedule.iter().enumerate() {
        assert_eq!(inst.seq, n as i64 + 1);
        assert_eq!(inst.due_on, disbursed + Duration::days(7 * (n as i64 + 1)));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 7: invalid inputs are rejected before anything is written
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rejects_bad_terms_and_double_generation() {
    let engine = build("monthly", "flat");
    engine
        .store
        .insert_loan(&loan("loan-zero-term", dec!(1000), 0, dec!(1), dec!(10), None, false))
        .unwrap();
    assert!(engine.disburse_schedule("loan-zero-term").is_err());
    assert_eq!(engine.store.instalment_count("loan-zero-term").unwrap(), 0);

    engine
        .store
        .insert_loan(&loan("loan-1", dec!(1000), 2, dec!(1), dec!(10), None, false))
        .unwrap();
    engine.disburse_schedule("loan-1").unwrap();
    // A second generation must refuse rather than double the schedule.
    assert!(engine.disburse_schedule("loan-1").is_err());
    assert_eq!(engine.store.instalment_count("loan-1").unwrap(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 8: missing product metadata falls back to monthly declining-balance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_product_defaults_do_not_block_generation() {
    let engine = LoanEngine::in_memory().unwrap();
    // No product row at all: legacy data.
    let mut l = loan("loan-1", dec!(1200), 3, dec!(1), dec!(24.18), None, false);
    l.product_id = None;
    engine.store.insert_loan(&l).unwrap();

    let schedule = engine.disburse_schedule("loan-1").unwrap();
    assert_eq!(schedule.len(), 3);
    // Monthly default: 30-day periods.
    assert_eq!(schedule[0].due_on, date(2024, 1, 31));
    let principal_sum: Decimal = schedule.iter().map(|i| i.expected_principal).sum();
    assert_eq!(principal_sum, dec!(1200));
}
