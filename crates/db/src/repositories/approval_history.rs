//! Approval history repository: the append-only audit trail.
//!
//! Entries are written through whatever connection the caller holds, so a
//! workflow step and its audit entry commit or roll back together. Nothing
//! here updates or deletes a row.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use outlay_core::workflow::{AuditEntry, WorkflowError};

use crate::entities::approval_history;

use super::db_error;

/// Repository for the approval history ledger.
#[derive(Debug, Clone)]
pub struct ApprovalHistoryRepository {
    db: DatabaseConnection,
}

impl ApprovalHistoryRepository {
    /// Creates a new approval history repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends an entry through `conn`, typically an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn record<C: ConnectionTrait>(
        conn: &C,
        entry: &AuditEntry,
    ) -> Result<approval_history::Model, WorkflowError> {
        approval_history::ActiveModel {
            id: Set(Uuid::now_v7()),
            expense_id: Set(entry.expense_id),
            actor: Set(entry.actor.to_string()),
            action: Set(entry.action.as_str().to_string()),
            comments: Set(entry.comments.clone()),
            metadata: Set(entry.metadata.clone()),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(conn)
        .await
        .map_err(db_error)
    }

    /// Returns an expense's history in the order it happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn history(
        &self,
        expense_id: Uuid,
    ) -> Result<Vec<approval_history::Model>, WorkflowError> {
        approval_history::Entity::find()
            .filter(approval_history::Column::ExpenseId.eq(expense_id))
            .order_by_asc(approval_history::Column::CreatedAt)
            .order_by_asc(approval_history::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_error)
    }
}
