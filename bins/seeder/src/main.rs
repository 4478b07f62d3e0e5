//! Database seeder for Outlay development and testing.
//!
//! Seeds a demo company with an admin, a manager who approves their reports
//! first, a finance manager and one employee, plus a sequential approval rule
//! and an EUR/USD rate. It then walks one EUR expense through the workflow
//! and logs the resulting audit trail.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use outlay_core::workflow::{Decision, RuleApprover, RuleDraft, RuleType, UserRole};
use outlay_db::migration::{Migrator, MigratorTrait};
use outlay_db::repositories::{CreateExpenseInput, CreateUserInput, SetRateInput};
use outlay_db::{
    ApprovalRuleRepository, CompanyRepository, ExchangeRateRepository, UserRepository,
    WorkflowEngine,
};
use outlay_shared::{AppConfig, CurrencyCode};

const ADMIN_EMAIL: &str = "admin@outlay.dev";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outlay_db=debug,seeder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    tracing::info!("Connecting to database...");
    let db = outlay_db::connect_with_config(&config.database)
        .await
        .context("failed to connect to database")?;
    Migrator::up(&db, None)
        .await
        .context("failed to run migrations")?;

    let users = UserRepository::new(db.clone());
    if users.find_by_email(ADMIN_EMAIL).await?.is_some() {
        tracing::info!(email = ADMIN_EMAIL, "Demo data already present, skipping");
        return Ok(());
    }

    let usd = CurrencyCode::new("USD")?;
    let eur = CurrencyCode::new("EUR")?;

    let company = CompanyRepository::new(db.clone())
        .create_company("Outlay Demo Inc.", &usd)
        .await?;
    tracing::info!(company_id = %company.id, "Seeded company");

    let person = |email: &str, name: &str, role: UserRole| CreateUserInput {
        company_id: company.id,
        email: email.to_string(),
        full_name: name.to_string(),
        role,
        manager_id: None,
        is_manager_approver: false,
    };

    let admin = users
        .create_user(person(ADMIN_EMAIL, "Ada Admin", UserRole::Admin))
        .await?;
    let manager = users
        .create_user(CreateUserInput {
            is_manager_approver: true,
            ..person("manager@outlay.dev", "Max Manager", UserRole::Manager)
        })
        .await?;
    let finance = users
        .create_user(person("finance@outlay.dev", "Fay Finance", UserRole::Manager))
        .await?;
    let employee = users
        .create_user(CreateUserInput {
            manager_id: Some(manager.id),
            ..person("employee@outlay.dev", "Eve Employee", UserRole::Employee)
        })
        .await?;
    tracing::info!("Seeded 4 users");

    let rule = ApprovalRuleRepository::new(db.clone())
        .create_rule(RuleDraft {
            company_id: company.id,
            name: "Finance then admin".to_string(),
            description: Some("Finance reviews, an admin signs off".to_string()),
            rule_type: RuleType::Sequential,
            percentage_threshold: None,
            specific_approver_id: None,
            priority: 1,
            approvers: vec![
                RuleApprover::required(finance.id, 1),
                RuleApprover::required(admin.id, 2),
            ],
        })
        .await?;
    tracing::info!(rule_id = %rule.rule.id, "Seeded approval rule");

    let rates = ExchangeRateRepository::new(db.clone());
    rates
        .set_rate(SetRateInput {
            company_id: company.id,
            from_currency: eur.clone(),
            to_currency: usd,
            rate: Decimal::new(85, 2),
            effective_date: Utc::now().date_naive(),
        })
        .await?;
    tracing::info!("Seeded EUR/USD rate");

    let converter = rates.converter(company.id, config.currency.decimal_places);
    let engine = WorkflowEngine::new(db, Arc::new(converter));

    let submitted = engine
        .create_and_submit(CreateExpenseInput {
            company_id: company.id,
            submitter_id: employee.id,
            description: "Client dinner in Berlin".to_string(),
            category: Some("Meals".to_string()),
            expense_date: Utc::now().date_naive(),
            amount: Decimal::new(100, 0),
            currency: eur.as_str().to_string(),
        })
        .await?;
    let expense_id = submitted.expense.id;
    tracing::info!(%expense_id, requests = submitted.requests.len(), "Submitted demo expense");

    // Manager first, then the rule's chain in order.
    for approver in [manager.id, finance.id, admin.id] {
        let outcome = engine
            .decide(expense_id, approver, Decision::Approve, Some("Looks good"))
            .await?;
        tracing::info!(%approver, outcome = outcome.outcome.as_str(), "Decision recorded");
    }

    let entries = engine
        .history(expense_id)
        .await?
        .into_iter()
        .inspect(|entry| {
            tracing::info!(
                action = %entry.action,
                actor = %entry.actor,
                metadata = %entry.metadata,
                "History"
            );
        })
        .count();
    tracing::info!(entries, "Seeding complete");

    Ok(())
}
