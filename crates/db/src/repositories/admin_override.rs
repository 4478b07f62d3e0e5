//! Admin override: force-resolves a pending expense.
//!
//! Skips turn and policy checks but not the audit trail. An override
//! rejection cancels open requests the same way a normal rejection does.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait};
use uuid::Uuid;

use outlay_core::currency::CurrencyConverter;
use outlay_core::workflow::{AuditEntry, Decision, PolicyOutcome, WorkflowError, WorkflowService};

use crate::entities::{approval_requests, sea_orm_active_enums::RequestStatus, users};

use super::approval_history::ApprovalHistoryRepository;
use super::db_error;
use super::expense::lock_expense;
use super::user::to_profile;
use super::workflow::{DecisionOutcome, WorkflowEngine, cancel_open_requests, resolve_expense};

const CANCELLED_BY_OVERRIDE: &str = "Cancelled: expense was rejected by an administrator";

impl<C: CurrencyConverter> WorkflowEngine<C> {
    /// Approves a pending expense regardless of its approval requests.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Comments are blank
    /// - Expense is not found or not pending
    /// - The actor is not an admin of the expense's company
    pub async fn override_approve(
        &self,
        expense_id: Uuid,
        admin_id: Uuid,
        comments: &str,
    ) -> Result<DecisionOutcome, WorkflowError> {
        self.override_decision(expense_id, admin_id, Decision::Approve, comments)
            .await
    }

    /// Rejects a pending expense regardless of its approval requests.
    ///
    /// # Errors
    ///
    /// Same as [`Self::override_approve`].
    pub async fn override_reject(
        &self,
        expense_id: Uuid,
        admin_id: Uuid,
        comments: &str,
    ) -> Result<DecisionOutcome, WorkflowError> {
        self.override_decision(expense_id, admin_id, Decision::Reject, comments)
            .await
    }

    async fn override_decision(
        &self,
        expense_id: Uuid,
        admin_id: Uuid,
        decision: Decision,
        comments: &str,
    ) -> Result<DecisionOutcome, WorkflowError> {
        if comments.trim().is_empty() {
            return Err(WorkflowError::MissingComments);
        }

        let txn = self.db.begin().await.map_err(db_error)?;

        let expense = lock_expense(&txn, expense_id).await?;
        let action = WorkflowService::override_decision(
            expense_id,
            expense.status.into(),
            admin_id,
            decision,
            comments,
        )?;

        let admin = users::Entity::find_by_id(admin_id)
            .one(&txn)
            .await
            .map_err(db_error)?
            .map(|user| to_profile(&user));
        WorkflowService::ensure_override_authority(admin_id, admin.as_ref(), expense.company_id)?;

        let open_requests = approval_requests::Entity::find()
            .filter(approval_requests::Column::ExpenseId.eq(expense_id))
            .filter(approval_requests::Column::Status.eq(RequestStatus::Pending))
            .count(&txn)
            .await
            .map_err(db_error)?;

        ApprovalHistoryRepository::record(
            &txn,
            &AuditEntry::overridden(
                expense_id,
                admin_id,
                decision,
                comments,
                usize::try_from(open_requests).unwrap_or(usize::MAX),
            ),
        )
        .await?;

        if decision == Decision::Reject {
            cancel_open_requests(&txn, expense_id, CANCELLED_BY_OVERRIDE).await?;
        }
        let (expense, settlement) = resolve_expense(&txn, expense, &action).await?;

        txn.commit().await.map_err(db_error)?;

        tracing::info!(
            %expense_id,
            %admin_id,
            decision = decision.as_str(),
            open_requests,
            "Expense resolved by admin override"
        );

        let outcome = match decision {
            Decision::Approve => PolicyOutcome::Approved,
            Decision::Reject => PolicyOutcome::Rejected,
        };
        self.finish(expense, outcome, settlement).await
    }
}
