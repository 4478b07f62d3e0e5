//! Exchange rate repository for currency conversion database operations.
//!
//! Rates are stored per company. [`CompanyRateConverter`] exposes them to
//! the workflow engine through the `CurrencyConverter` trait.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use outlay_core::currency::{Conversion, ConversionError, CurrencyConverter, convert_amount};
use outlay_shared::CurrencyCode;

use crate::entities::exchange_rates;

/// Error types for exchange rate operations.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeRateError {
    /// Rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// Currencies must be different.
    #[error("From and to currencies must be different")]
    SameCurrency,

    /// Exchange rate not found.
    #[error("No exchange rate found for {0}/{1} on or before {2}")]
    RateNotFound(CurrencyCode, CurrencyCode, NaiveDate),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating or updating an exchange rate.
#[derive(Debug, Clone)]
pub struct SetRateInput {
    /// Company the rate applies to.
    pub company_id: Uuid,
    /// Source currency.
    pub from_currency: CurrencyCode,
    /// Target currency.
    pub to_currency: CurrencyCode,
    /// Exchange rate (from_currency * rate = to_currency).
    pub rate: Decimal,
    /// Effective date for this rate.
    pub effective_date: NaiveDate,
}

/// Result of an exchange rate lookup.
#[derive(Debug, Clone)]
pub struct ExchangeRateLookup {
    /// The exchange rate.
    pub rate: Decimal,
    /// How the rate was obtained.
    pub lookup_method: RateLookupMethod,
    /// The effective date of the rate.
    pub effective_date: NaiveDate,
}

/// How an exchange rate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLookupMethod {
    /// Direct rate found (from_currency -> to_currency).
    Direct,
    /// Inverse rate calculated (to_currency -> from_currency, then inverted).
    Inverse,
}

/// Exchange rate repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    db: DatabaseConnection,
}

impl ExchangeRateRepository {
    /// Creates a new exchange rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates or updates an exchange rate (upsert behavior).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Rate is not positive
    /// - From and to currencies are the same
    pub async fn set_rate(
        &self,
        input: SetRateInput,
    ) -> Result<exchange_rates::Model, ExchangeRateError> {
        if input.rate <= Decimal::ZERO {
            return Err(ExchangeRateError::NonPositiveRate);
        }
        if input.from_currency == input.to_currency {
            return Err(ExchangeRateError::SameCurrency);
        }

        let existing = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::CompanyId.eq(input.company_id))
            .filter(exchange_rates::Column::FromCurrency.eq(input.from_currency.as_str()))
            .filter(exchange_rates::Column::ToCurrency.eq(input.to_currency.as_str()))
            .filter(exchange_rates::Column::EffectiveDate.eq(input.effective_date))
            .one(&self.db)
            .await?;

        if let Some(existing_rate) = existing {
            let mut active: exchange_rates::ActiveModel = existing_rate.into();
            active.rate = Set(input.rate);
            // created_at is not touched on upsert
            return Ok(active.update(&self.db).await?);
        }

        let rate = exchange_rates::ActiveModel {
            id: Set(Uuid::now_v7()),
            company_id: Set(input.company_id),
            from_currency: Set(input.from_currency.as_str().to_string()),
            to_currency: Set(input.to_currency.as_str().to_string()),
            rate: Set(input.rate),
            effective_date: Set(input.effective_date),
            created_at: Set(chrono::Utc::now().into()),
        };
        Ok(rate.insert(&self.db).await?)
    }

    /// Finds an exchange rate for a currency pair on or before a date.
    ///
    /// Lookup priority:
    /// 1. Direct rate (from_currency -> to_currency)
    /// 2. Inverse rate (to_currency -> from_currency, then invert)
    ///
    /// # Errors
    ///
    /// Returns `RateNotFound` if neither direction has a rate.
    pub async fn find_rate(
        &self,
        company_id: Uuid,
        from_currency: &CurrencyCode,
        to_currency: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<ExchangeRateLookup, ExchangeRateError> {
        if from_currency == to_currency {
            return Ok(ExchangeRateLookup {
                rate: Decimal::ONE,
                lookup_method: RateLookupMethod::Direct,
                effective_date: date,
            });
        }

        if let Some(direct) = self
            .find_direct_rate(company_id, from_currency, to_currency, date)
            .await?
        {
            return Ok(ExchangeRateLookup {
                rate: direct.rate,
                lookup_method: RateLookupMethod::Direct,
                effective_date: direct.effective_date,
            });
        }

        if let Some(inverse) = self
            .find_direct_rate(company_id, to_currency, from_currency, date)
            .await?
            && let Some(rate) = Decimal::ONE.checked_div(inverse.rate)
        {
            // USD/EUR = 0.85 means EUR/USD = 1/0.85
            return Ok(ExchangeRateLookup {
                rate,
                lookup_method: RateLookupMethod::Inverse,
                effective_date: inverse.effective_date,
            });
        }

        Err(ExchangeRateError::RateNotFound(
            from_currency.clone(),
            to_currency.clone(),
            date,
        ))
    }

    /// Lists all exchange rates for a company.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_rates(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<exchange_rates::Model>, ExchangeRateError> {
        let rates = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::CompanyId.eq(company_id))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .order_by_asc(exchange_rates::Column::FromCurrency)
            .order_by_asc(exchange_rates::Column::ToCurrency)
            .all(&self.db)
            .await?;

        Ok(rates)
    }

    /// Returns a converter backed by this company's rates.
    #[must_use]
    pub fn converter(&self, company_id: Uuid, decimal_places: u32) -> CompanyRateConverter {
        CompanyRateConverter {
            rates: self.clone(),
            company_id,
            decimal_places,
        }
    }

    /// Finds a direct exchange rate (most recent on or before date).
    async fn find_direct_rate(
        &self,
        company_id: Uuid,
        from_currency: &CurrencyCode,
        to_currency: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Option<exchange_rates::Model>, ExchangeRateError> {
        let rate = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::CompanyId.eq(company_id))
            .filter(exchange_rates::Column::FromCurrency.eq(from_currency.as_str()))
            .filter(exchange_rates::Column::ToCurrency.eq(to_currency.as_str()))
            .filter(exchange_rates::Column::EffectiveDate.lte(date))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .one(&self.db)
            .await?;

        Ok(rate)
    }
}

/// Converts with a company's stored rates as of today.
#[derive(Debug, Clone)]
pub struct CompanyRateConverter {
    rates: ExchangeRateRepository,
    company_id: Uuid,
    decimal_places: u32,
}

impl CurrencyConverter for CompanyRateConverter {
    async fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<Conversion, ConversionError> {
        let today = chrono::Utc::now().date_naive();
        let lookup = self
            .rates
            .find_rate(self.company_id, from, to, today)
            .await
            .map_err(|e| match e {
                ExchangeRateError::RateNotFound(from, to, _) => {
                    ConversionError::RateNotFound { from, to }
                }
                other => ConversionError::Provider(other.to_string()),
            })?;

        Ok(Conversion {
            converted: convert_amount(amount, lookup.rate, self.decimal_places),
            rate: lookup.rate,
        })
    }
}
