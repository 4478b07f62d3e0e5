//! Workflow service for expense state transitions.
//!
//! This module implements the state machine guarding the expense status.
//! It decides whether a transition is legal; the db crate persists it.

use chrono::Utc;
use uuid::Uuid;

use crate::workflow::approval::{ApproverProfile, UserRole};
use crate::workflow::error::WorkflowError;
use crate::workflow::policy::PolicyOutcome;
use crate::workflow::types::{Decision, ExpenseStatus, WorkflowAction};

/// Stateless service for managing expense workflow transitions.
pub struct WorkflowService;

impl WorkflowService {
    /// Submit a draft expense.
    ///
    /// # Errors
    ///
    /// `AlreadySubmitted` unless the expense is a draft.
    pub fn submit(
        expense_id: Uuid,
        current_status: ExpenseStatus,
        submitted_by: Uuid,
    ) -> Result<WorkflowAction, WorkflowError> {
        match current_status {
            ExpenseStatus::Draft => Ok(WorkflowAction::Submit {
                new_status: ExpenseStatus::Pending,
                submitted_by,
                submitted_at: Utc::now(),
            }),
            status => Err(WorkflowError::AlreadySubmitted { expense_id, status }),
        }
    }

    /// Fails unless the expense awaits decisions.
    pub fn ensure_pending(
        expense_id: Uuid,
        current_status: ExpenseStatus,
    ) -> Result<(), WorkflowError> {
        if current_status == ExpenseStatus::Pending {
            Ok(())
        } else {
            Err(WorkflowError::ExpenseNotPending {
                expense_id,
                status: current_status,
            })
        }
    }

    /// Turns a policy outcome into a resolution, if it is one.
    ///
    /// Returns `Ok(None)` when the outcome keeps the expense pending.
    ///
    /// # Errors
    ///
    /// `ExpenseNotPending` if the expense has already left the workflow.
    pub fn resolve(
        expense_id: Uuid,
        current_status: ExpenseStatus,
        outcome: &PolicyOutcome,
        decided_by: Uuid,
    ) -> Result<Option<WorkflowAction>, WorkflowError> {
        Self::ensure_pending(expense_id, current_status)?;
        let Some(new_status) = outcome.resolved_status() else {
            return Ok(None);
        };
        Self::ensure_transition(expense_id, current_status, new_status)?;

        Ok(Some(WorkflowAction::Resolve {
            new_status,
            decided_by,
            resolved_at: Utc::now(),
        }))
    }

    /// Admin force-resolution.
    ///
    /// # Errors
    ///
    /// * `MissingComments` if the justification is blank (checked first)
    /// * `ExpenseNotPending` if the expense is not awaiting decisions
    pub fn override_decision(
        expense_id: Uuid,
        current_status: ExpenseStatus,
        admin_id: Uuid,
        decision: Decision,
        comments: &str,
    ) -> Result<WorkflowAction, WorkflowError> {
        let comments = comments.trim();
        if comments.is_empty() {
            return Err(WorkflowError::MissingComments);
        }
        Self::ensure_pending(expense_id, current_status)?;
        let new_status = decision.expense_status();
        Self::ensure_transition(expense_id, current_status, new_status)?;

        Ok(WorkflowAction::Override {
            new_status,
            admin_id,
            comments: comments.to_string(),
            resolved_at: Utc::now(),
        })
    }

    /// Only an admin of the expense's own company may override.
    pub fn ensure_override_authority(
        user_id: Uuid,
        profile: Option<&ApproverProfile>,
        company_id: Uuid,
    ) -> Result<(), WorkflowError> {
        match profile {
            Some(p) if p.role == UserRole::Admin && p.company_id == company_id => Ok(()),
            _ => Err(WorkflowError::NotAuthorizedToOverride { user_id }),
        }
    }

    /// Fails with `InvariantViolation` on a transition the state machine
    /// does not allow.
    pub fn ensure_transition(
        expense_id: Uuid,
        from: ExpenseStatus,
        to: ExpenseStatus,
    ) -> Result<(), WorkflowError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(WorkflowError::InvariantViolation(format!(
                "expense {expense_id}: illegal transition {from} -> {to}"
            )))
        }
    }

    /// Check if a status transition is valid.
    ///
    /// Valid transitions:
    /// - Draft → Pending (submit)
    /// - Pending → Approved (resolve or override)
    /// - Pending → Rejected (resolve or override)
    #[must_use]
    pub fn is_valid_transition(from: ExpenseStatus, to: ExpenseStatus) -> bool {
        matches!(
            (from, to),
            (ExpenseStatus::Draft, ExpenseStatus::Pending)
                | (
                    ExpenseStatus::Pending,
                    ExpenseStatus::Approved | ExpenseStatus::Rejected
                )
        )
    }
}
