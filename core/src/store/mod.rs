//! SQLite persistence layer.
//!
//! RULE: only the store talks to the database. Engine components call
//! store methods; they never execute SQL directly. Monetary columns are
//! TEXT holding canonical decimal strings, converted here and nowhere
//! else.

mod delinquency;
mod instalment;
mod loan;
mod repayment;

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::EngineResult,
    event::{EngineEvent, EventLogEntry},
    types::{LoanId, Money, ProductId},
};

pub struct LoanStore {
    conn: Connection,
}

impl LoanStore {
    /// Open (or create) the loan database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests and demo runs).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_loans.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_instalments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_repayments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_delinquency.sql"))?;
        Ok(())
    }

    /// Run `f` inside a single transaction. Any error rolls the whole
    /// operation back, leaving prior state untouched.
    pub fn with_tx<T>(&self, f: impl FnOnce(&LoanStore) -> EngineResult<T>) -> EngineResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &EngineEvent, recorded_on: NaiveDate) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (loan_id, event_type, payload, recorded_on)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.loan_id(),
                event.type_name(),
                serde_json::to_string(event)?,
                recorded_on,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_loan(&self, loan_id: &str) -> EngineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, event_type, payload, recorded_on
             FROM event_log WHERE loan_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![loan_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    loan_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    recorded_on: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ── Row structs ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanProductRow {
    pub product_id: ProductId,
    pub name: String,
    pub repayment_frequency: Option<String>,
    pub interest_method: Option<String>,
    pub late_penalty_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRow {
    pub loan_id: LoanId,
    pub borrower_id: String,
    pub product_id: Option<ProductId>,
    pub principal: Money,
    /// Count of repayment periods.
    pub term: i64,
    /// Percent per repayment period.
    pub interest_rate: Decimal,
    /// Total interest precomputed at origination.
    pub total_interest: Money,
    /// Optional periodic payment target for declining-balance plans.
    pub instalment_amount: Option<Money>,
    /// Interest charged entirely at disbursement, outside the schedule.
    pub interest_upfront: bool,
    pub amount_repaid: Money,
    pub outstanding: Money,
    pub status: String,
    pub disbursed_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalmentRow {
    pub instalment_id: Option<i64>,
    pub loan_id: LoanId,
    pub seq: i64,
    pub due_on: NaiveDate,
    pub expected_principal: Money,
    pub expected_interest: Money,
    pub expected_penalty: Money,
    pub expected_insurance: Money,
    pub paid_principal: Money,
    pub paid_interest: Money,
    pub paid_penalty: Money,
    pub paid_insurance: Money,
    pub status: String,
}

impl InstalmentRow {
    pub fn total_due(&self) -> Money {
        self.expected_principal + self.expected_interest + self.expected_penalty + self.expected_insurance
    }

    pub fn total_paid(&self) -> Money {
        self.paid_principal + self.paid_interest + self.paid_penalty + self.paid_insurance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepaymentRow {
    pub repayment_id: String,
    pub loan_id: LoanId,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub principal_applied: Money,
    pub interest_applied: Money,
    pub penalty_applied: Money,
    pub insurance_applied: Money,
    pub overpayment: Money,
    pub method: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanDefaultRow {
    pub default_id: String,
    pub loan_id: LoanId,
    pub days_overdue: i64,
    pub amount_overdue: Money,
    pub penalty_accrued: Money,
    pub aging_bucket: String,
    pub status: String,
    pub flagged_on: NaiveDate,
    pub updated_on: NaiveDate,
    pub resolved_on: Option<NaiveDate>,
}

// ── Decimal column helpers ─────────────────────────────────────────

/// Read a monetary TEXT column as an exact decimal.
pub(crate) fn money(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a nullable monetary TEXT column.
pub(crate) fn opt_money(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(text) => Decimal::from_str(&text).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}
