//! loan-runner: headless operations runner for the loan engine.
//!
//! Usage:
//!   loan-runner --db loans.db --as-of 2026-08-01 --sweep
//!   loan-runner --db loans.db --backfill
//!   loan-runner --demo --as-of 2026-08-01
//!
//! --backfill walks every disbursed loan with no schedule and
//! reconstructs it from the repayment ledger. --sweep runs the
//! delinquency sweep for the given as-of date. --demo seeds a small
//! portfolio first (in memory unless --db is given).

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use loanbook_core::{
    backfill::BackfillOutcome,
    engine::LoanEngine,
    store::{LoanProductRow, LoanRow, RepaymentRow},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = parse_arg(&args, "--db");
    let as_of = match parse_arg(&args, "--as-of") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
        None => chrono::Local::now().date_naive(),
    };
    let do_demo = args.iter().any(|a| a == "--demo");
    let do_backfill = args.iter().any(|a| a == "--backfill");
    let do_sweep = args.iter().any(|a| a == "--sweep");
    let json_out = args.iter().any(|a| a == "--json");

    let engine = match db.as_deref() {
        Some(path) => LoanEngine::open(path)?,
        None => LoanEngine::in_memory()?,
    };

    println!("loan-runner");
    println!("  db:     {}", db.as_deref().unwrap_or(":memory:"));
    println!("  as-of:  {as_of}");
    println!();

    if do_demo {
        seed_demo(&engine, as_of)?;
    }
    if do_backfill || do_demo {
        run_backfill(&engine, as_of)?;
    }
    if do_sweep || do_demo {
        run_sweep(&engine, as_of, json_out)?;
    }

    print_book_summary(&engine)?;
    Ok(())
}

/// Seed a small portfolio: one product, a current loan, a delinquent
/// loan, and a legacy loan with payment history but no schedule (the
/// backfill pass picks that one up).
fn seed_demo(engine: &LoanEngine, as_of: NaiveDate) -> Result<()> {
    let store = &engine.store;

    store.insert_product(&LoanProductRow {
        product_id: "prod-dev".into(),
        name: "Development Loan".into(),
        repayment_frequency: Some("monthly".into()),
        interest_method: Some("declining_balance".into()),
        late_penalty_rate: Some(dec!(5)),
    })?;

    let disbursed_on = as_of - Duration::days(120);
    let loans = [
        demo_loan("loan-current", "member-001", dec!(100000), 12, dec!(0.8333), dec!(5499.08), Some(dec!(8791.59)), disbursed_on),
        demo_loan("loan-late", "member-002", dec!(60000), 6, dec!(1.25), dec!(2650.00), None, disbursed_on),
        demo_loan("loan-legacy", "member-003", dec!(24000), 12, dec!(1.0), dec!(1600.00), None, as_of - Duration::days(210)),
    ];
    for loan in &loans {
        store.insert_loan(loan)?;
    }

    // The current and late loans get schedules the normal way.
    engine.disburse_schedule("loan-current")?;
    engine.disburse_schedule("loan-late")?;

    // loan-current keeps up with its payments.
    engine.repay("loan-current", dec!(8791.59), disbursed_on + Duration::days(30), Some("mpesa"), None)?;
    engine.repay("loan-current", dec!(8791.59), disbursed_on + Duration::days(60), Some("mpesa"), None)?;
    engine.repay("loan-current", dec!(8791.59), disbursed_on + Duration::days(90), Some("mpesa"), None)?;
    // loan-late paid once, then went quiet.
    engine.repay("loan-late", dec!(5000), disbursed_on + Duration::days(35), Some("cash"), None)?;

    // loan-legacy predates schedule tracking: a bare repayment ledger
    // and no instalments at all.
    let legacy_start = as_of - Duration::days(210);
    for (n, amount) in [dec!(2133.33), dec!(2133.33), dec!(2000.00)].iter().enumerate() {
        store.insert_repayment(&RepaymentRow {
            repayment_id: format!("hist-{n}"),
            loan_id: "loan-legacy".into(),
            amount: *amount,
            paid_on: legacy_start + Duration::days(30 * (n as i64 + 1)),
            principal_applied: Decimal::ZERO,
            interest_applied: Decimal::ZERO,
            penalty_applied: Decimal::ZERO,
            insurance_applied: Decimal::ZERO,
            overpayment: Decimal::ZERO,
            method: Some("cash".into()),
            reference: None,
        })?;
    }

    println!("seeded demo portfolio: {} loans", loans.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn demo_loan(
    loan_id: &str,
    borrower_id: &str,
    principal: Decimal,
    term: i64,
    rate: Decimal,
    total_interest: Decimal,
    instalment_amount: Option<Decimal>,
    disbursed_on: NaiveDate,
) -> LoanRow {
    LoanRow {
        loan_id: loan_id.into(),
        borrower_id: borrower_id.into(),
        product_id: Some("prod-dev".into()),
        principal,
        term,
        interest_rate: rate,
        total_interest,
        instalment_amount,
        interest_upfront: false,
        amount_repaid: Decimal::ZERO,
        outstanding: principal + total_interest,
        status: "disbursed".into(),
        disbursed_on: Some(disbursed_on),
    }
}

fn run_backfill(engine: &LoanEngine, as_of: NaiveDate) -> Result<()> {
    let candidates = engine.store.loans_without_schedule()?;
    let mut completed = 0;
    for loan in &candidates {
        match engine.backfill(&loan.loan_id, as_of)? {
            BackfillOutcome::Completed {
                instalments,
                repayments_replayed,
            } => {
                completed += 1;
                println!(
                    "backfilled {}: {instalments} instalments, {repayments_replayed} repayments replayed",
                    loan.loan_id
                );
            }
            BackfillOutcome::AlreadyScheduled => {}
        }
    }
    log::info!("backfill pass finished: {completed} loans reconstructed");
    println!("backfill: {completed} of {} candidates completed", candidates.len());
    println!();
    Ok(())
}

fn run_sweep(engine: &LoanEngine, as_of: NaiveDate, json_out: bool) -> Result<()> {
    let summary = engine.sweep(as_of)?;
    if json_out {
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }
    println!("=== SWEEP SUMMARY ===");
    println!("  loans scanned:     {}", summary.loans_scanned);
    println!("  marked overdue:    {}", summary.instalments_marked_overdue);
    println!("  defaults flagged:  {}", summary.defaults_flagged);
    println!("  defaults updated:  {}", summary.defaults_updated);
    println!("  defaults resolved: {}", summary.defaults_resolved);
    println!();
    Ok(())
}

fn print_book_summary(engine: &LoanEngine) -> Result<()> {
    let active = engine.store.active_loans()?;
    let defaults = engine.store.all_active_defaults()?;

    println!("=== BOOK SUMMARY ===");
    println!("  active loans:    {}", active.len());
    println!("  active defaults: {}", defaults.len());

    if !defaults.is_empty() {
        println!();
        println!("=== DELINQUENCY AGING ===");
        for bucket in ["1-30", "31-60", "61-90", "90+"] {
            let in_bucket: Vec<_> = defaults.iter().filter(|d| d.aging_bucket == bucket).collect();
            if in_bucket.is_empty() {
                continue;
            }
            let exposure: Decimal = in_bucket.iter().map(|d| d.amount_overdue).sum();
            println!("  {bucket:>5}: {} loans, {exposure} overdue", in_bucket.len());
        }
        println!();
        for d in &defaults {
            println!(
                "  {} | {} days | {} overdue | penalty {} | {}",
                d.loan_id, d.days_overdue, d.amount_overdue, d.penalty_accrued, d.status
            );
        }
    }
    Ok(())
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}
