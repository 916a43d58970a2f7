use super::{money, LoanDefaultRow, LoanStore};
use crate::{error::EngineResult, types::Money};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

impl LoanStore {
    /// The loan's active delinquency record, if any. Resolved and
    /// written-off records are history, not active state.
    pub fn active_default(&self, loan_id: &str) -> EngineResult<Option<LoanDefaultRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT default_id, loan_id, days_overdue, amount_overdue, penalty_accrued,
                        aging_bucket, status, flagged_on, updated_on, resolved_on
                 FROM loan_default
                 WHERE loan_id = ?1 AND status IN ('overdue','in_collection')
                 ORDER BY flagged_on DESC LIMIT 1",
                params![loan_id],
                Self::map_default_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn insert_default(&self, record: &LoanDefaultRow) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO loan_default
             (default_id, loan_id, days_overdue, amount_overdue, penalty_accrued,
              aging_bucket, status, flagged_on, updated_on, resolved_on)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                record.default_id,
                record.loan_id,
                record.days_overdue,
                record.amount_overdue.to_string(),
                record.penalty_accrued.to_string(),
                record.aging_bucket,
                record.status,
                record.flagged_on,
                record.updated_on,
                record.resolved_on,
            ],
        )?;
        Ok(())
    }

    /// Re-age an active record in place. Status is deliberately left
    /// alone so an in_collection record keeps its collections state.
    pub fn update_default(
        &self,
        default_id: &str,
        days_overdue: i64,
        amount_overdue: Money,
        penalty_accrued: Money,
        aging_bucket: &str,
        updated_on: NaiveDate,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE loan_default
             SET days_overdue = ?1, amount_overdue = ?2, penalty_accrued = ?3,
                 aging_bucket = ?4, updated_on = ?5
             WHERE default_id = ?6",
            params![
                days_overdue,
                amount_overdue.to_string(),
                penalty_accrued.to_string(),
                aging_bucket,
                updated_on,
                default_id,
            ],
        )?;
        Ok(())
    }

    pub fn resolve_default(&self, default_id: &str, resolved_on: NaiveDate) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE loan_default
             SET status = 'resolved', resolved_on = ?1, updated_on = ?1
             WHERE default_id = ?2",
            params![resolved_on, default_id],
        )?;
        Ok(())
    }

    pub fn defaults_for_loan(&self, loan_id: &str) -> EngineResult<Vec<LoanDefaultRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT default_id, loan_id, days_overdue, amount_overdue, penalty_accrued,
                    aging_bucket, status, flagged_on, updated_on, resolved_on
             FROM loan_default WHERE loan_id = ?1
             ORDER BY flagged_on ASC",
        )?;
        let rows = stmt
            .query_map(params![loan_id], Self::map_default_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All active delinquency records across the book, for collections
    /// and the summary tooling.
    pub fn all_active_defaults(&self) -> EngineResult<Vec<LoanDefaultRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT default_id, loan_id, days_overdue, amount_overdue, penalty_accrued,
                    aging_bucket, status, flagged_on, updated_on, resolved_on
             FROM loan_default
             WHERE status IN ('overdue','in_collection')
             ORDER BY days_overdue DESC, loan_id ASC",
        )?;
        let rows = stmt
            .query_map([], Self::map_default_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_default_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoanDefaultRow> {
        Ok(LoanDefaultRow {
            default_id: row.get(0)?,
            loan_id: row.get(1)?,
            days_overdue: row.get(2)?,
            amount_overdue: money(row, 3)?,
            penalty_accrued: money(row, 4)?,
            aging_bucket: row.get(5)?,
            status: row.get(6)?,
            flagged_on: row.get(7)?,
            updated_on: row.get(8)?,
            resolved_on: row.get(9)?,
        })
    }
}
