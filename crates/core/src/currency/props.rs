//! Property-based tests for currency conversion.

use chrono::NaiveDate;
use outlay_shared::CurrencyCode;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::conversion::convert_amount;
use super::converter::FixedRateConverter;
use super::exchange::ExchangeRate;

/// Strategy to generate positive expense amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive exchange rates with eight decimals.
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000_000i64).prop_map(|v| Decimal::new(v, 8))
}

/// Strategy to generate decimal places (0 to 4).
fn decimal_places() -> impl Strategy<Value = u32> {
    0u32..=4
}

fn code(s: &str) -> CurrencyCode {
    CurrencyCode::new(s).unwrap_or_else(|e| panic!("{e}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Converted amounts never carry more decimals than requested.
    #[test]
    fn prop_convert_respects_decimal_places(
        amount in positive_amount(),
        rate in positive_rate(),
        dp in decimal_places(),
    ) {
        let result = convert_amount(amount, rate, dp);
        prop_assert!(result.scale() <= dp, "{} has more than {} decimals", result, dp);
    }

    /// Rate 1 keeps a two-decimal amount unchanged.
    #[test]
    fn prop_identity_rate(amount in positive_amount()) {
        prop_assert_eq!(convert_amount(amount, Decimal::ONE, 2), amount);
    }

    /// Conversion is monotonic in the amount.
    #[test]
    fn prop_monotonic(
        a in positive_amount(),
        b in positive_amount(),
        rate in positive_rate(),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(convert_amount(lo, rate, 2) <= convert_amount(hi, rate, 2));
    }

    /// Without a direct rate, the converter uses the inverse of the opposite rate.
    #[test]
    fn prop_inverse_lookup(rate in positive_rate()) {
        let stored = ExchangeRate::new(
            code("USD"),
            code("EUR"),
            rate,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
        ).unwrap();
        let converter = FixedRateConverter::new(2).with_rate(stored.clone());

        prop_assert_eq!(converter.lookup(&code("USD"), &code("EUR")), Some(rate));
        prop_assert_eq!(
            converter.lookup(&code("EUR"), &code("USD")),
            stored.inverse().map(|r| r.rate)
        );
    }
}
