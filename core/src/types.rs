//! Shared primitive types used across the entire engine.

/// A stable, unique identifier for a loan.
pub type LoanId = String;

/// A stable, unique identifier for a loan product.
pub type ProductId = String;

/// All monetary values. Exact decimal, never binary floating point.
pub type Money = rust_decimal::Decimal;
