use super::{money, InstalmentRow, LoanStore};
use crate::error::EngineResult;
use rusqlite::params;

impl LoanStore {
    pub fn insert_instalment(&self, inst: &InstalmentRow) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO instalment
             (loan_id, seq, due_on,
              expected_principal, expected_interest, expected_penalty, expected_insurance,
              paid_principal, paid_interest, paid_penalty, paid_insurance, status)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                inst.loan_id,
                inst.seq,
                inst.due_on,
                inst.expected_principal.to_string(),
                inst.expected_interest.to_string(),
                inst.expected_penalty.to_string(),
                inst.expected_insurance.to_string(),
                inst.paid_principal.to_string(),
                inst.paid_interest.to_string(),
                inst.paid_penalty.to_string(),
                inst.paid_insurance.to_string(),
                inst.status,
            ],
        )?;
        Ok(())
    }

    pub fn instalments_for_loan(&self, loan_id: &str) -> EngineResult<Vec<InstalmentRow>> {
        self.instalments_where(loan_id, "1=1")
    }

    /// Unpaid instalments (pending, partial, overdue) ordered by
    /// sequence ascending: the allocation walk order.
    pub fn unpaid_instalments(&self, loan_id: &str) -> EngineResult<Vec<InstalmentRow>> {
        self.instalments_where(loan_id, "status IN ('pending','partial','overdue')")
    }

    /// Settled instalments (paid or partial): the history restructuring
    /// must preserve verbatim.
    pub fn settled_instalments(&self, loan_id: &str) -> EngineResult<Vec<InstalmentRow>> {
        self.instalments_where(loan_id, "status IN ('paid','partial')")
    }

    /// Delete all pending/overdue instalments for a loan. Returns the
    /// number of rows removed.
    pub fn delete_unsettled_instalments(&self, loan_id: &str) -> EngineResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM instalment
             WHERE loan_id = ?1 AND status IN ('pending','overdue')",
            params![loan_id],
        )?;
        Ok(deleted)
    }

    /// Persist the paid components and status of one instalment after
    /// allocation. Expected components are never rewritten.
    pub fn update_instalment_payment(&self, inst: &InstalmentRow) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE instalment
             SET paid_principal = ?1, paid_interest = ?2,
                 paid_penalty = ?3, paid_insurance = ?4, status = ?5
             WHERE instalment_id = ?6",
            params![
                inst.paid_principal.to_string(),
                inst.paid_interest.to_string(),
                inst.paid_penalty.to_string(),
                inst.paid_insurance.to_string(),
                inst.status,
                inst.instalment_id,
            ],
        )?;
        Ok(())
    }

    pub fn update_instalment_status(&self, instalment_id: i64, status: &str) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE instalment SET status = ?1 WHERE instalment_id = ?2",
            params![status, instalment_id],
        )?;
        Ok(())
    }

    pub fn instalment_count(&self, loan_id: &str) -> EngineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM instalment WHERE loan_id = ?1",
            params![loan_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Bulk fetch for the delinquency sweep: every unpaid instalment
    /// belonging to a disbursed-family loan, in one query. Callers
    /// group by loan in memory.
    pub fn unpaid_instalments_for_active_loans(&self) -> EngineResult<Vec<InstalmentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.instalment_id, i.loan_id, i.seq, i.due_on,
                    i.expected_principal, i.expected_interest, i.expected_penalty, i.expected_insurance,
                    i.paid_principal, i.paid_interest, i.paid_penalty, i.paid_insurance, i.status
             FROM instalment i
             JOIN loan l ON l.loan_id = i.loan_id
             WHERE l.status IN ('disbursed','active','restructured')
               AND i.status IN ('pending','partial','overdue')
             ORDER BY i.loan_id ASC, i.seq ASC",
        )?;
        let rows = stmt
            .query_map([], Self::map_instalment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn instalments_where(&self, loan_id: &str, filter: &str) -> EngineResult<Vec<InstalmentRow>> {
        let sql = format!(
            "SELECT instalment_id, loan_id, seq, due_on,
                    expected_principal, expected_interest, expected_penalty, expected_insurance,
                    paid_principal, paid_interest, paid_penalty, paid_insurance, status
             FROM instalment
             WHERE loan_id = ?1 AND {filter}
             ORDER BY seq ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![loan_id], Self::map_instalment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_instalment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstalmentRow> {
        Ok(InstalmentRow {
            instalment_id: Some(row.get(0)?),
            loan_id: row.get(1)?,
            seq: row.get(2)?,
            due_on: row.get(3)?,
            expected_principal: money(row, 4)?,
            expected_interest: money(row, 5)?,
            expected_penalty: money(row, 6)?,
            expected_insurance: money(row, 7)?,
            paid_principal: money(row, 8)?,
            paid_interest: money(row, 9)?,
            paid_penalty: money(row, 10)?,
            paid_insurance: money(row, 11)?,
            status: row.get(12)?,
        })
    }
}
