//! Currency conversion arithmetic.
//!
//! Converted expense amounts are rounded once, to the company currency's
//! decimal places, with banker's rounding (round half to even).

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Converts an amount using the given exchange rate.
///
/// `rate` is "1 unit of the source currency = `rate` units of the target".
#[must_use]
pub fn convert_amount(amount: Decimal, rate: Decimal, decimal_places: u32) -> Decimal {
    (amount * rate).round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
}
