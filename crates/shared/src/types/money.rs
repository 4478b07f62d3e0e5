//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing a currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyCodeError {
    /// The code is not three ASCII letters.
    #[error("Invalid currency code '{0}': expected three ASCII letters")]
    Malformed(String),
}

/// ISO 4217 currency code, normalised to uppercase.
///
/// Codes arrive with whatever casing the submitter used ("usd", "Usd").
/// Normalising on construction means two codes compare equal exactly when
/// they name the same currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalises a currency code.
    pub fn new(code: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError::Malformed(code.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the normalised code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major units (e.g., 12.50).
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "USD", "EUR").
    pub currency: CurrencyCode,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
