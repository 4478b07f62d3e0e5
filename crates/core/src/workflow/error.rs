//! Workflow error types for the expense approval lifecycle.
//!
//! Every failure the engine can report is a variant of [`WorkflowError`].
//! [`WorkflowError::kind`] groups them so callers can decide between
//! surfacing a message, fixing configuration, or paging someone.

use outlay_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::workflow::types::ExpenseStatus;

/// Broad classification of a [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rule or directory data is unusable; an admin has to fix it.
    Configuration,
    /// The request conflicts with the current workflow state.
    WorkflowState,
    /// An external collaborator failed.
    Integration,
    /// Persisted data broke an invariant the engine relies on.
    Invariant,
    /// Storage failure.
    Infrastructure,
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Rule definition failed validation.
    #[error("Invalid approval rule '{rule}': {reason}")]
    InvalidRuleConfig {
        /// Rule name or id.
        rule: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A referenced approver cannot approve for this company.
    #[error("User {approver_id} cannot be an approver: {reason}")]
    InvalidApprover {
        /// The offending user.
        approver_id: Uuid,
        /// Why the user was refused.
        reason: String,
    },

    /// Rule governs an expense that still has pending requests.
    #[error("Approval rule {0} is in use by a pending expense")]
    RuleInUse(Uuid),

    /// Rule does not exist for this company.
    #[error("Approval rule {0} not found")]
    RuleNotFound(Uuid),

    /// Expense input failed validation.
    #[error("Invalid expense: {0}")]
    InvalidExpense(String),

    /// Manager assignment refused.
    #[error("Cannot make {manager_id} the manager of {user_id}: {reason}")]
    InvalidManager {
        /// The user being reassigned.
        user_id: Uuid,
        /// The proposed manager.
        manager_id: Uuid,
        /// Why the assignment was refused.
        reason: String,
    },

    /// Company does not exist.
    #[error("Company {0} not found")]
    CompanyNotFound(Uuid),

    /// Company has no active approval rule.
    #[error("No active approval rule configured for company {company_id}")]
    NoApplicableRule {
        /// The expense's company.
        company_id: Uuid,
    },

    /// Expense has already left the draft state.
    #[error("Expense {expense_id} was already submitted (status {status})")]
    AlreadySubmitted {
        /// The expense.
        expense_id: Uuid,
        /// Its current status.
        status: ExpenseStatus,
    },

    /// Expense not found.
    #[error("Expense {0} not found")]
    ExpenseNotFound(Uuid),

    /// Expense is not awaiting decisions.
    #[error("Expense {expense_id} is not pending (status {status})")]
    ExpenseNotPending {
        /// The expense.
        expense_id: Uuid,
        /// Its current status.
        status: ExpenseStatus,
    },

    /// The user holds no request on this expense.
    #[error("User {approver_id} has no approval request on expense {expense_id}")]
    NoSuchRequest {
        /// The expense.
        expense_id: Uuid,
        /// The user who tried to decide.
        approver_id: Uuid,
    },

    /// A sequential chain has an earlier step still open.
    #[error(
        "Approver {approver_id} is at step {sequence} of expense {expense_id}, \
         but step {live_sequence} is still open"
    )]
    NotYourTurn {
        /// The expense.
        expense_id: Uuid,
        /// The user who tried to decide.
        approver_id: Uuid,
        /// The user's step.
        sequence: i32,
        /// The step currently awaiting a decision.
        live_sequence: i32,
    },

    /// The request was already decided.
    #[error("Approver {approver_id} already responded on expense {expense_id}")]
    AlreadyResponded {
        /// The expense.
        expense_id: Uuid,
        /// The approver.
        approver_id: Uuid,
    },

    /// Overrides require a justification.
    #[error("Comments are required for an admin override")]
    MissingComments,

    /// Only an admin of the expense's company may override.
    #[error("User {user_id} is not authorized to override this expense")]
    NotAuthorizedToOverride {
        /// The user who attempted the override.
        user_id: Uuid,
    },

    /// User not found.
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    /// Currency conversion failed.
    #[error("Currency conversion failed: {0}")]
    CurrencyConversionFailed(String),

    /// Persisted workflow data is inconsistent.
    #[error("Workflow invariant violated: {0}")]
    InvariantViolation(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl WorkflowError {
    /// Shorthand for [`WorkflowError::InvalidRuleConfig`].
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRuleConfig {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRuleConfig { .. }
            | Self::InvalidApprover { .. }
            | Self::RuleInUse(_)
            | Self::RuleNotFound(_)
            | Self::InvalidExpense(_)
            | Self::InvalidManager { .. }
            | Self::CompanyNotFound(_) => ErrorKind::Configuration,

            Self::NoApplicableRule { .. }
            | Self::AlreadySubmitted { .. }
            | Self::ExpenseNotFound(_)
            | Self::ExpenseNotPending { .. }
            | Self::NoSuchRequest { .. }
            | Self::NotYourTurn { .. }
            | Self::AlreadyResponded { .. }
            | Self::MissingComments
            | Self::NotAuthorizedToOverride { .. }
            | Self::UserNotFound(_) => ErrorKind::WorkflowState,

            Self::CurrencyConversionFailed(_) => ErrorKind::Integration,
            Self::InvariantViolation(_) => ErrorKind::Invariant,
            Self::Database(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRuleConfig { .. }
            | Self::InvalidApprover { .. }
            | Self::InvalidExpense(_)
            | Self::InvalidManager { .. }
            | Self::MissingComments => 400,

            Self::NotYourTurn { .. } | Self::NotAuthorizedToOverride { .. } => 403,

            Self::RuleNotFound(_)
            | Self::CompanyNotFound(_)
            | Self::ExpenseNotFound(_)
            | Self::NoSuchRequest { .. }
            | Self::UserNotFound(_) => 404,

            Self::RuleInUse(_)
            | Self::AlreadySubmitted { .. }
            | Self::ExpenseNotPending { .. }
            | Self::AlreadyResponded { .. } => 409,

            Self::NoApplicableRule { .. } => 422,
            Self::CurrencyConversionFailed(_) => 502,
            Self::InvariantViolation(_) | Self::Database(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRuleConfig { .. } => "INVALID_RULE_CONFIG",
            Self::InvalidApprover { .. } => "INVALID_APPROVER",
            Self::RuleInUse(_) => "RULE_IN_USE",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::InvalidExpense(_) => "INVALID_EXPENSE",
            Self::InvalidManager { .. } => "INVALID_MANAGER",
            Self::CompanyNotFound(_) => "COMPANY_NOT_FOUND",
            Self::NoApplicableRule { .. } => "NO_APPLICABLE_RULE",
            Self::AlreadySubmitted { .. } => "ALREADY_SUBMITTED",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::ExpenseNotPending { .. } => "EXPENSE_NOT_PENDING",
            Self::NoSuchRequest { .. } => "NO_SUCH_REQUEST",
            Self::NotYourTurn { .. } => "NOT_YOUR_TURN",
            Self::AlreadyResponded { .. } => "ALREADY_RESPONDED",
            Self::MissingComments => "MISSING_COMMENTS",
            Self::NotAuthorizedToOverride { .. } => "NOT_AUTHORIZED_TO_OVERRIDE",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::CurrencyConversionFailed(_) => "CURRENCY_CONVERSION_FAILED",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if the same call may succeed when retried unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::RuleNotFound(_)
            | WorkflowError::CompanyNotFound(_)
            | WorkflowError::ExpenseNotFound(_)
            | WorkflowError::NoSuchRequest { .. }
            | WorkflowError::UserNotFound(_) => Self::NotFound(message),

            WorkflowError::InvalidRuleConfig { .. }
            | WorkflowError::InvalidApprover { .. }
            | WorkflowError::InvalidExpense(_)
            | WorkflowError::InvalidManager { .. }
            | WorkflowError::MissingComments => Self::Validation(message),

            WorkflowError::NotYourTurn { .. } | WorkflowError::NotAuthorizedToOverride { .. } => {
                Self::Forbidden(message)
            }

            WorkflowError::RuleInUse(_)
            | WorkflowError::AlreadySubmitted { .. }
            | WorkflowError::ExpenseNotPending { .. }
            | WorkflowError::AlreadyResponded { .. } => Self::Conflict(message),

            WorkflowError::NoApplicableRule { .. } => Self::BusinessRule(message),
            WorkflowError::CurrencyConversionFailed(_) => Self::ExternalService(message),
            WorkflowError::InvariantViolation(_) => Self::Internal(message),
            WorkflowError::Database(_) => Self::Database(message),
        }
    }
}
