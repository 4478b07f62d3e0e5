//! Exchange rate types and logic.

use chrono::NaiveDate;
use outlay_shared::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::converter::ConversionError;

/// Exchange rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency code.
    pub from_currency: CurrencyCode,
    /// Target currency code.
    pub to_currency: CurrencyCode,
    /// Exchange rate (1 from_currency = rate to_currency).
    pub rate: Decimal,
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    ///
    /// # Errors
    ///
    /// `InvalidRate` if the rate is not positive or both currencies are the same.
    pub fn new(
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Result<Self, ConversionError> {
        if rate <= Decimal::ZERO {
            return Err(ConversionError::InvalidRate(format!(
                "rate {from_currency}->{to_currency} must be positive, got {rate}"
            )));
        }
        if from_currency == to_currency {
            return Err(ConversionError::InvalidRate(format!(
                "rate must join two different currencies, got {from_currency} twice"
            )));
        }
        Ok(Self {
            from_currency,
            to_currency,
            rate,
            effective_date,
        })
    }

    /// Returns true if this rate converts `from` into `to`.
    #[must_use]
    pub fn joins(&self, from: &CurrencyCode, to: &CurrencyCode) -> bool {
        &self.from_currency == from && &self.to_currency == to
    }

    /// Returns the inverse rate, if it is representable.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        Decimal::ONE.checked_div(self.rate).map(|rate| Self {
            from_currency: self.to_currency.clone(),
            to_currency: self.from_currency.clone(),
            rate,
            effective_date: self.effective_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert!(ExchangeRate::new(code("EUR"), code("USD"), Decimal::ZERO, date()).is_err());
        assert!(ExchangeRate::new(code("EUR"), code("USD"), dec!(-1), date()).is_err());
    }

    #[test]
    fn test_rejects_same_currency() {
        assert!(ExchangeRate::new(code("usd"), code("USD"), dec!(1), date()).is_err());
    }

    #[test]
    fn test_inverse() {
        let rate = ExchangeRate::new(code("USD"), code("EUR"), dec!(0.8), date()).unwrap();
        let inverse = rate.inverse().unwrap();
        assert_eq!(inverse.rate, dec!(1.25));
        assert!(inverse.joins(&code("EUR"), &code("USD")));
    }
}
