//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration and written with the
//! schema builder so the same migration runs on Postgres and SQLite.

pub use sea_orm_migration::prelude::*;

mod m20261017_000001_approval_workflow;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20261017_000001_approval_workflow::Migration)]
    }
}
