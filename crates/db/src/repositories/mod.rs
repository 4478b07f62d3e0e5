//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

mod admin_override;
pub mod approval_history;
pub mod approval_rule;
pub mod company;
pub mod exchange_rate;
pub mod expense;
pub mod user;
pub mod workflow;

pub use approval_history::ApprovalHistoryRepository;
pub use approval_rule::{ApprovalRuleRepository, RuleWithApprovers, UpdateRuleInput};
pub use company::CompanyRepository;
pub use exchange_rate::{
    CompanyRateConverter, ExchangeRateError, ExchangeRateLookup, ExchangeRateRepository,
    RateLookupMethod, SetRateInput,
};
pub use expense::{CreateExpenseInput, ExpenseRepository};
pub use user::{CreateUserInput, UserRepository};
pub use workflow::{
    ActionableRequest, ConversionOutcome, DecisionOutcome, SubmittedExpense, WorkflowEngine,
};

use outlay_core::workflow::WorkflowError;
use sea_orm::DbErr;

/// Maps a database error into the workflow taxonomy.
pub(crate) fn db_error(err: DbErr) -> WorkflowError {
    WorkflowError::Database(err.to_string())
}
