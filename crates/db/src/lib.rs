//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access
//! - The approval workflow engine, which drives expenses through their rule
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    ApprovalHistoryRepository, ApprovalRuleRepository, CompanyRepository, ExchangeRateRepository,
    ExpenseRepository, UserRepository, WorkflowEngine,
};

use std::time::Duration;

use outlay_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the application configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(config.sqlx_logging);

    tracing::debug!(
        max_connections = config.max_connections,
        "Connecting to database"
    );
    Database::connect(options).await
}
