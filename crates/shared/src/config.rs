//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Currency conversion configuration.
    #[serde(default)]
    pub currency: CurrencyConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Whether sqlx statement logging is enabled.
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Currency conversion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    /// Decimal places converted amounts are rounded to.
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            decimal_places: default_decimal_places(),
        }
    }
}

fn default_decimal_places() -> u32 {
    2
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `OUTLAY__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("OUTLAY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
