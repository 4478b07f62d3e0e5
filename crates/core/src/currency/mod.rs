//! Multi-currency handling for expense resolution.

pub mod conversion;
pub mod converter;
pub mod exchange;

#[cfg(test)]
mod props;

pub use conversion::convert_amount;
pub use converter::{Conversion, ConversionError, CurrencyConverter, FixedRateConverter};
pub use exchange::ExchangeRate;
