use rust_decimal::{Decimal, RoundingStrategy};

/// Percentage of the target amount reached, rounded to one decimal place
/// (half-up). Computed on every campaign read, never stored.
///
/// A non-positive target yields 0 so a misconfigured campaign can never
/// produce a division by zero. The result is deliberately not clamped:
/// an over-funded campaign reads above 100.
pub fn derive_progress(current_amount: Decimal, target_amount: Decimal) -> Decimal {
    if target_amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (current_amount / target_amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_target_yields_zero_progress() {
        assert_eq!(derive_progress(dec!(750), dec!(0)), dec!(0));
    }

    #[test]
    fn negative_target_yields_zero_progress() {
        assert_eq!(derive_progress(dec!(500), dec!(-1000)), dec!(0));
    }

    #[test]
    fn partial_funding_rounds_to_one_decimal() {
        assert_eq!(derive_progress(dec!(750), dec!(1000)), dec!(75.0));
        assert_eq!(derive_progress(dec!(333), dec!(999)), dec!(33.3));
    }

    #[test]
    fn over_funding_is_not_clamped() {
        assert_eq!(derive_progress(dec!(1200), dec!(1000)), dec!(120.0));
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        // 2.5 / 1000 * 100 = 0.25, half-up to one decimal
        assert_eq!(derive_progress(dec!(2.5), dec!(1000)), dec!(0.3));
    }

    #[test]
    fn recomputing_without_writes_is_stable() {
        let first = derive_progress(dec!(450), dec!(1000));
        let second = derive_progress(dec!(450), dec!(1000));
        assert_eq!(first, second);
        assert_eq!(first, dec!(45.0));
    }
}
