//! Monetary rounding rules.
//!
//! RULE: money is always `rust_decimal::Decimal`, never f64.
//! Rounding to two places happens only at instalment-generation
//! boundaries; intermediate arithmetic stays exact.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round half-up to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A percentage rate applied to a base amount, rounded to cents.
/// `rate` is in percent (10 means 10%).
pub fn pct_of(base: Decimal, rate: Decimal) -> Decimal {
    round2(base * rate / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up_at_two_places() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(8333.333333)), dec!(8333.33));
    }

    #[test]
    fn rounds_away_from_zero_for_negatives() {
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn pct_of_is_rate_over_hundred() {
        assert_eq!(pct_of(dec!(100000), dec!(10)), dec!(10000.00));
        assert_eq!(pct_of(dec!(4500.50), dec!(5)), dec!(225.03));
    }
}
