//! Shared fixtures for the integration suites.
//!
//! Every test gets its own in-memory SQLite database with the migrations
//! applied. The pool holds a single connection, because each SQLite memory
//! connection is a separate database. Tests that race transactions use
//! `setup_shared_db`, a temporary database file behind several connections.

#![allow(dead_code)]
#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use uuid::Uuid;

use outlay_core::currency::{ExchangeRate, FixedRateConverter};
use outlay_core::workflow::{RuleApprover, RuleDraft, RuleType, UserRole};
use outlay_db::entities::{companies, users};
use outlay_db::migration::{Migrator, MigratorTrait};
use outlay_db::repositories::{CreateExpenseInput, CreateUserInput, RuleWithApprovers};
use outlay_db::{ApprovalRuleRepository, CompanyRepository, UserRepository, WorkflowEngine};
use outlay_shared::CurrencyCode;

/// Opens a fresh migrated in-memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// Opens a fresh migrated database file shared by several connections.
pub async fn setup_shared_db() -> DatabaseConnection {
    let path = std::env::temp_dir().join(format!("outlay-{}.db", Uuid::new_v4().simple()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(8)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open database file");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub fn code(s: &str) -> CurrencyCode {
    CurrencyCode::new(s).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

/// Converter knowing only EUR/USD = 0.85.
pub fn eur_usd_converter() -> FixedRateConverter {
    FixedRateConverter::new(2)
        .with_rate(ExchangeRate::new(code("EUR"), code("USD"), dec!(0.85), day(1)).unwrap())
}

/// A USD company with an admin, three managers and an employee reporting to
/// `manager`.
pub struct Fixture {
    pub db: DatabaseConnection,
    pub company: companies::Model,
    pub admin: users::Model,
    pub manager: users::Model,
    pub finance: users::Model,
    pub director: users::Model,
    pub employee: users::Model,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::on(setup_db().await).await
    }

    /// The same fixture on a multi-connection database.
    pub async fn shared() -> Self {
        Self::on(setup_shared_db().await).await
    }

    async fn on(db: DatabaseConnection) -> Self {
        let company = CompanyRepository::new(db.clone())
            .create_company("Acme Corp", &code("USD"))
            .await
            .unwrap();

        let admin = create_user(&db, company.id, "admin", UserRole::Admin, None).await;
        let manager = create_user(&db, company.id, "manager", UserRole::Manager, None).await;
        let finance = create_user(&db, company.id, "finance", UserRole::Manager, None).await;
        let director = create_user(&db, company.id, "director", UserRole::Manager, None).await;
        let employee = create_user(
            &db,
            company.id,
            "employee",
            UserRole::Employee,
            Some(manager.id),
        )
        .await;

        Self {
            db,
            company,
            admin,
            manager,
            finance,
            director,
            employee,
        }
    }

    pub fn engine(&self) -> WorkflowEngine<FixedRateConverter> {
        WorkflowEngine::new(self.db.clone(), Arc::new(eur_usd_converter()))
    }

    pub fn rules(&self) -> ApprovalRuleRepository {
        ApprovalRuleRepository::new(self.db.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.db.clone())
    }

    /// Creates an active rule for the fixture company.
    pub async fn rule(
        &self,
        rule_type: RuleType,
        percentage_threshold: Option<i32>,
        specific_approver_id: Option<Uuid>,
        approvers: Vec<RuleApprover>,
    ) -> RuleWithApprovers {
        self.rules()
            .create_rule(self.draft(
                rule_type,
                percentage_threshold,
                specific_approver_id,
                approvers,
            ))
            .await
            .unwrap()
    }

    pub fn draft(
        &self,
        rule_type: RuleType,
        percentage_threshold: Option<i32>,
        specific_approver_id: Option<Uuid>,
        approvers: Vec<RuleApprover>,
    ) -> RuleDraft {
        RuleDraft {
            company_id: self.company.id,
            name: format!("{rule_type} rule"),
            description: None,
            rule_type,
            percentage_threshold,
            specific_approver_id,
            priority: 1,
            approvers,
        }
    }

    pub fn expense(&self, amount: Decimal, currency: &str) -> CreateExpenseInput {
        CreateExpenseInput {
            company_id: self.company.id,
            submitter_id: self.employee.id,
            description: "Taxi to client office".to_string(),
            category: Some("Travel".to_string()),
            expense_date: day(15),
            amount,
            currency: currency.to_string(),
        }
    }
}

pub async fn create_user(
    db: &DatabaseConnection,
    company_id: Uuid,
    name: &str,
    role: UserRole,
    manager_id: Option<Uuid>,
) -> users::Model {
    UserRepository::new(db.clone())
        .create_user(CreateUserInput {
            company_id,
            email: format!("{name}-{}@example.com", Uuid::new_v4().simple()),
            full_name: name.to_string(),
            role,
            manager_id,
            is_manager_approver: false,
        })
        .await
        .unwrap()
}

/// The `action` column of an expense's history, in order.
pub async fn actions<C>(engine: &WorkflowEngine<C>, expense_id: Uuid) -> Vec<String>
where
    C: outlay_core::currency::CurrencyConverter,
{
    engine
        .history(expense_id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect()
}
