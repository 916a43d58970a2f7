use super::{money, LoanStore, RepaymentRow};
use crate::error::EngineResult;
use rusqlite::params;

impl LoanStore {
    pub fn insert_repayment(&self, repayment: &RepaymentRow) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO repayment
             (repayment_id, loan_id, amount, paid_on,
              principal_applied, interest_applied, penalty_applied, insurance_applied,
              overpayment, method, reference)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                repayment.repayment_id,
                repayment.loan_id,
                repayment.amount.to_string(),
                repayment.paid_on,
                repayment.principal_applied.to_string(),
                repayment.interest_applied.to_string(),
                repayment.penalty_applied.to_string(),
                repayment.insurance_applied.to_string(),
                repayment.overpayment.to_string(),
                repayment.method,
                repayment.reference,
            ],
        )?;
        Ok(())
    }

    /// The loan's historical payment ledger in original chronology.
    /// Ties on paid_on break by insertion order so a replay always
    /// walks the ledger the way it actually happened.
    pub fn repayments_for_loan(&self, loan_id: &str) -> EngineResult<Vec<RepaymentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT repayment_id, loan_id, amount, paid_on,
                    principal_applied, interest_applied, penalty_applied, insurance_applied,
                    overpayment, method, reference
             FROM repayment
             WHERE loan_id = ?1
             ORDER BY paid_on ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![loan_id], |row| {
                Ok(RepaymentRow {
                    repayment_id: row.get(0)?,
                    loan_id: row.get(1)?,
                    amount: money(row, 2)?,
                    paid_on: row.get(3)?,
                    principal_applied: money(row, 4)?,
                    interest_applied: money(row, 5)?,
                    penalty_applied: money(row, 6)?,
                    insurance_applied: money(row, 7)?,
                    overpayment: money(row, 8)?,
                    method: row.get(9)?,
                    reference: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn repayment_count(&self, loan_id: &str) -> EngineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM repayment WHERE loan_id = ?1",
            params![loan_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
