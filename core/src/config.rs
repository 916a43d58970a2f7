//! Product term resolution.
//!
//! Legacy products can be missing the repayment frequency, the interest
//! method, or the penalty rate. Each engine operation resolves an
//! explicit `ProductTerms` once, up front, instead of scattering
//! per-field fallbacks through the math.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::LoanProductRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentFrequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
}

impl RepaymentFrequency {
    /// Fixed day count per period. Monthly is a fixed 30-day period,
    /// not calendar-month-aware.
    pub fn period_days(self) -> i64 {
        match self {
            RepaymentFrequency::Daily => 1,
            RepaymentFrequency::Weekly => 7,
            RepaymentFrequency::BiWeekly => 14,
            RepaymentFrequency::Monthly => 30,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(RepaymentFrequency::Daily),
            "weekly" => Some(RepaymentFrequency::Weekly),
            "bi_weekly" | "biweekly" => Some(RepaymentFrequency::BiWeekly),
            "monthly" => Some(RepaymentFrequency::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestMethod {
    Flat,
    DecliningBalance,
}

impl InterestMethod {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "flat" => Some(InterestMethod::Flat),
            "declining_balance" | "reducing_balance" => Some(InterestMethod::DecliningBalance),
            _ => None,
        }
    }
}

/// Fully resolved product terms for one engine operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductTerms {
    pub frequency: RepaymentFrequency,
    pub method: InterestMethod,
    /// Late-payment penalty rate in percent, applied to the overdue amount.
    pub late_penalty_rate: Decimal,
}

impl ProductTerms {
    /// Resolve terms from an optional product row.
    ///
    /// Defaults when the product (or a field) is absent or unrecognized:
    /// monthly frequency, declining-balance interest, zero penalty rate.
    /// A missing product never blocks disbursement.
    pub fn resolve(product: Option<&LoanProductRow>) -> Self {
        let frequency = product
            .and_then(|p| p.repayment_frequency.as_deref())
            .and_then(RepaymentFrequency::parse)
            .unwrap_or(RepaymentFrequency::Monthly);
        let method = product
            .and_then(|p| p.interest_method.as_deref())
            .and_then(InterestMethod::parse)
            .unwrap_or(InterestMethod::DecliningBalance);
        let late_penalty_rate = product
            .and_then(|p| p.late_penalty_rate)
            .unwrap_or(Decimal::ZERO);
        Self {
            frequency,
            method,
            late_penalty_rate,
        }
    }
}
