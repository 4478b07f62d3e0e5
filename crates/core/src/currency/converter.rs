//! Currency converter abstraction.
//!
//! The workflow engine converts an expense into the company currency once,
//! when the expense resolves. It only sees the [`CurrencyConverter`] trait;
//! the db crate provides a table-backed implementation and tests use
//! [`FixedRateConverter`] or their own fakes.

use std::future::Future;

use outlay_shared::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::conversion::convert_amount;
use super::exchange::ExchangeRate;

/// Errors raised by a currency converter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// No rate is known for the pair, directly or inverted.
    #[error("No exchange rate from {from} to {to}")]
    RateNotFound {
        /// Source currency.
        from: CurrencyCode,
        /// Target currency.
        to: CurrencyCode,
    },

    /// A rate exists but cannot be used.
    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    /// The rate source itself failed.
    #[error("Rate provider failed: {0}")]
    Provider(String),
}

/// A converted amount and the rate that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Amount in the target currency, rounded.
    pub converted: Decimal,
    /// Rate applied (1 source = rate target).
    pub rate: Decimal,
}

/// Converts amounts between currencies.
pub trait CurrencyConverter: Send + Sync {
    /// Converts `amount` from one currency into another.
    fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> impl Future<Output = Result<Conversion, ConversionError>> + Send;
}

/// In-memory converter over a fixed set of rates.
#[derive(Debug, Clone)]
pub struct FixedRateConverter {
    rates: Vec<ExchangeRate>,
    decimal_places: u32,
}

impl FixedRateConverter {
    /// Creates an empty converter rounding to `decimal_places`.
    #[must_use]
    pub const fn new(decimal_places: u32) -> Self {
        Self {
            rates: Vec::new(),
            decimal_places,
        }
    }

    /// Adds a rate.
    #[must_use]
    pub fn with_rate(mut self, rate: ExchangeRate) -> Self {
        self.rates.push(rate);
        self
    }

    /// Finds the rate for a pair: identity, then the latest direct rate,
    /// then the inverse of the latest opposite rate.
    #[must_use]
    pub fn lookup(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        let latest = |f: &CurrencyCode, t: &CurrencyCode| {
            self.rates
                .iter()
                .filter(|r| r.joins(f, t))
                .max_by_key(|r| r.effective_date)
        };

        latest(from, to).map(|r| r.rate).or_else(|| {
            latest(to, from)
                .and_then(ExchangeRate::inverse)
                .map(|r| r.rate)
        })
    }
}

impl CurrencyConverter for FixedRateConverter {
    async fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Conversion, ConversionError> {
        let rate = self
            .lookup(from, to)
            .ok_or_else(|| ConversionError::RateNotFound {
                from: from.clone(),
                to: to.clone(),
            })?;
        Ok(Conversion {
            converted: convert_amount(amount, rate, self.decimal_places),
            rate,
        })
    }
}
