use super::{money, opt_money, LoanProductRow, LoanRow, LoanStore};
use crate::{error::EngineResult, types::Money};
use rusqlite::{params, OptionalExtension};

impl LoanStore {
    // ── Loan products ──────────────────────────────────────────

    pub fn insert_product(&self, product: &LoanProductRow) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO loan_product
             (product_id, name, repayment_frequency, interest_method, late_penalty_rate)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                product.product_id,
                product.name,
                product.repayment_frequency,
                product.interest_method,
                product.late_penalty_rate.map(|r| r.to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn get_product(&self, product_id: &str) -> EngineResult<Option<LoanProductRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT product_id, name, repayment_frequency, interest_method, late_penalty_rate
                 FROM loan_product WHERE product_id = ?1",
                params![product_id],
                |row| {
                    Ok(LoanProductRow {
                        product_id: row.get(0)?,
                        name: row.get(1)?,
                        repayment_frequency: row.get(2)?,
                        interest_method: row.get(3)?,
                        late_penalty_rate: opt_money(row, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn all_products(&self) -> EngineResult<Vec<LoanProductRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, name, repayment_frequency, interest_method, late_penalty_rate
             FROM loan_product ORDER BY product_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LoanProductRow {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    repayment_frequency: row.get(2)?,
                    interest_method: row.get(3)?,
                    late_penalty_rate: opt_money(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Loans ──────────────────────────────────────────────────

    pub fn insert_loan(&self, loan: &LoanRow) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO loan
             (loan_id, borrower_id, product_id, principal, term, interest_rate,
              total_interest, instalment_amount, interest_upfront,
              amount_repaid, outstanding, status, disbursed_on)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                loan.loan_id,
                loan.borrower_id,
                loan.product_id,
                loan.principal.to_string(),
                loan.term,
                loan.interest_rate.to_string(),
                loan.total_interest.to_string(),
                loan.instalment_amount.map(|a| a.to_string()),
                loan.interest_upfront,
                loan.amount_repaid.to_string(),
                loan.outstanding.to_string(),
                loan.status,
                loan.disbursed_on,
            ],
        )?;
        Ok(())
    }

    pub fn get_loan(&self, loan_id: &str) -> EngineResult<Option<LoanRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT loan_id, borrower_id, product_id, principal, term, interest_rate,
                        total_interest, instalment_amount, interest_upfront,
                        amount_repaid, outstanding, status, disbursed_on
                 FROM loan WHERE loan_id = ?1",
                params![loan_id],
                Self::map_loan_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All loans in a disbursed-family status, for the delinquency sweep.
    pub fn active_loans(&self) -> EngineResult<Vec<LoanRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT loan_id, borrower_id, product_id, principal, term, interest_rate,
                    total_interest, instalment_amount, interest_upfront,
                    amount_repaid, outstanding, status, disbursed_on
             FROM loan WHERE status IN ('disbursed','active','restructured')
             ORDER BY loan_id ASC",
        )?;
        let rows = stmt
            .query_map([], Self::map_loan_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Disbursed-family loans with no instalments at all; the backfill
    /// tooling walks this list.
    pub fn loans_without_schedule(&self) -> EngineResult<Vec<LoanRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.loan_id, l.borrower_id, l.product_id, l.principal, l.term, l.interest_rate,
                    l.total_interest, l.instalment_amount, l.interest_upfront,
                    l.amount_repaid, l.outstanding, l.status, l.disbursed_on
             FROM loan l
             WHERE l.status IN ('disbursed','active','restructured')
               AND NOT EXISTS (SELECT 1 FROM instalment i WHERE i.loan_id = l.loan_id)
             ORDER BY l.loan_id ASC",
        )?;
        let rows = stmt
            .query_map([], Self::map_loan_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Commit new terms ahead of a restructure. The restructuring
    /// workflow owns the decision; the engine only reads the result.
    pub fn update_loan_terms(
        &self,
        loan_id: &str,
        term: i64,
        interest_rate: Money,
        total_interest: Money,
        instalment_amount: Option<Money>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE loan
             SET term = ?1, interest_rate = ?2, total_interest = ?3, instalment_amount = ?4
             WHERE loan_id = ?5",
            params![
                term,
                interest_rate.to_string(),
                total_interest.to_string(),
                instalment_amount.map(|a| a.to_string()),
                loan_id,
            ],
        )?;
        Ok(())
    }

    pub fn update_loan_totals(
        &self,
        loan_id: &str,
        amount_repaid: Money,
        outstanding: Money,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE loan SET amount_repaid = ?1, outstanding = ?2 WHERE loan_id = ?3",
            params![amount_repaid.to_string(), outstanding.to_string(), loan_id],
        )?;
        Ok(())
    }

    pub fn update_loan_status(&self, loan_id: &str, status: &str) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE loan SET status = ?1 WHERE loan_id = ?2",
            params![status, loan_id],
        )?;
        Ok(())
    }

    fn map_loan_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoanRow> {
        Ok(LoanRow {
            loan_id: row.get(0)?,
            borrower_id: row.get(1)?,
            product_id: row.get(2)?,
            principal: money(row, 3)?,
            term: row.get(4)?,
            interest_rate: money(row, 5)?,
            total_interest: money(row, 6)?,
            instalment_amount: opt_money(row, 7)?,
            interest_upfront: row.get(8)?,
            amount_repaid: money(row, 9)?,
            outstanding: money(row, 10)?,
            status: row.get(11)?,
            disbursed_on: row.get(12)?,
        })
    }
}
