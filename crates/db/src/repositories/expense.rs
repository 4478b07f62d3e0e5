//! Expense repository for database operations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use outlay_core::workflow::WorkflowError;
use outlay_shared::CurrencyCode;

use crate::entities::{
    companies, expenses,
    sea_orm_active_enums::ExpenseStatus,
    users,
};

use super::db_error;

/// Input for creating an expense.
#[derive(Debug, Clone)]
pub struct CreateExpenseInput {
    /// Company the expense is charged to.
    pub company_id: Uuid,
    /// Employee claiming the expense.
    pub submitter_id: Uuid,
    /// What was paid for.
    pub description: String,
    /// Free-form category (travel, meals, ...).
    pub category: Option<String>,
    /// Day the expense was incurred.
    pub expense_date: NaiveDate,
    /// Amount as submitted, must be positive.
    pub amount: Decimal,
    /// Currency of `amount`; any casing.
    pub currency: String,
}

/// Expense repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an expense in DRAFT status.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Amount is not positive, description is blank or currency is malformed
    /// - Company or submitter does not exist
    /// - Submitter belongs to another company
    /// - Database operation fails
    pub async fn create_draft(
        &self,
        input: CreateExpenseInput,
    ) -> Result<expenses::Model, WorkflowError> {
        insert_draft(&self.db, input).await
    }

    /// Finds an expense by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<expenses::Model>, WorkflowError> {
        expenses::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error)
    }

    /// Lists a user's expenses, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_submitter(
        &self,
        submitter_id: Uuid,
    ) -> Result<Vec<expenses::Model>, WorkflowError> {
        expenses::Entity::find()
            .filter(expenses::Column::SubmitterId.eq(submitter_id))
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_error)
    }
}

/// Validates and inserts a DRAFT expense.
pub(crate) async fn insert_draft<C: ConnectionTrait>(
    conn: &C,
    input: CreateExpenseInput,
) -> Result<expenses::Model, WorkflowError> {
    if input.amount <= Decimal::ZERO {
        return Err(WorkflowError::InvalidExpense(format!(
            "amount must be positive, got {}",
            input.amount
        )));
    }
    let description = input.description.trim();
    if description.is_empty() {
        return Err(WorkflowError::InvalidExpense(
            "description is required".to_string(),
        ));
    }
    let currency = CurrencyCode::new(&input.currency)
        .map_err(|e| WorkflowError::InvalidExpense(e.to_string()))?;

    companies::Entity::find_by_id(input.company_id)
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or(WorkflowError::CompanyNotFound(input.company_id))?;

    let submitter = users::Entity::find_by_id(input.submitter_id)
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or(WorkflowError::UserNotFound(input.submitter_id))?;
    if submitter.company_id != input.company_id {
        return Err(WorkflowError::InvalidExpense(format!(
            "submitter {} does not belong to company {}",
            input.submitter_id, input.company_id
        )));
    }

    let now = chrono::Utc::now().into();
    let expense = expenses::ActiveModel {
        id: Set(Uuid::now_v7()),
        company_id: Set(input.company_id),
        submitter_id: Set(input.submitter_id),
        description: Set(description.to_string()),
        category: Set(input
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())),
        expense_date: Set(input.expense_date),
        amount: Set(input.amount),
        currency: Set(currency.as_str().to_string()),
        converted_amount: Set(None),
        converted_currency: Set(None),
        status: Set(ExpenseStatus::Draft),
        approval_rule_id: Set(None),
        submitted_at: Set(None),
        resolved_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    expense.insert(conn).await.map_err(db_error)
}

/// Loads an expense, taking a row lock where the backend supports one.
///
/// SQLite has no row locks. There the transaction's first statement is a
/// no-op write, so the database write lock is held before anything is read
/// and concurrent transactions queue behind it instead of failing to upgrade.
pub(crate) async fn lock_expense<C: ConnectionTrait>(
    conn: &C,
    expense_id: Uuid,
) -> Result<expenses::Model, WorkflowError> {
    let mut query = expenses::Entity::find_by_id(expense_id);
    match conn.get_database_backend() {
        DbBackend::Postgres => query = query.lock_exclusive(),
        _ => {
            expenses::Entity::update_many()
                .col_expr(
                    expenses::Column::UpdatedAt,
                    Expr::col(expenses::Column::UpdatedAt).into(),
                )
                .filter(expenses::Column::Id.eq(expense_id))
                .exec(conn)
                .await
                .map_err(db_error)?;
        }
    }
    query
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or(WorkflowError::ExpenseNotFound(expense_id))
}
