//! Workflow domain types for the expense approval lifecycle.
//!
//! This module defines the statuses an expense and its approval requests
//! move through, the rule types that route an expense, and the workflow
//! actions produced by state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Expense status in the approval workflow.
///
/// The valid transitions are:
/// - Draft → Pending (submit)
/// - Pending → Approved (policy resolution or admin override)
/// - Pending → Rejected (policy resolution or admin override)
///
/// Approved and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    /// Expense is being drafted and has not entered the workflow.
    Draft,
    /// Expense is waiting on approvers.
    Pending,
    /// Expense has been approved.
    Approved,
    /// Expense has been rejected.
    Rejected,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses a status from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true once the expense can no longer change status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single approver's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting the approver's decision.
    Pending,
    /// The approver approved.
    Approved,
    /// The approver rejected, or the request was cancelled by a rejection.
    Rejected,
}

impl RequestStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses a status from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An approver's decision on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Approve the expense.
    Approve,
    /// Reject the expense.
    Reject,
}

impl Decision {
    /// Request status recorded for this decision.
    #[must_use]
    pub const fn request_status(self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }

    /// Expense status reached when this decision resolves the expense.
    #[must_use]
    pub const fn expense_status(self) -> ExpenseStatus {
        match self {
            Self::Approve => ExpenseStatus::Approved,
            Self::Reject => ExpenseStatus::Rejected,
        }
    }

    /// Returns the string representation of the decision.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an approval rule resolves an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    /// Approvers act one at a time in sequence order; all must approve.
    Sequential,
    /// Approvers act in parallel; resolves once a share of them approve.
    Percentage,
    /// Resolves as soon as one designated approver approves.
    SpecificApprover,
    /// Percentage threshold OR the designated approver, whichever comes first.
    Hybrid,
}

impl RuleType {
    /// Returns the string representation of the rule type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "SEQUENTIAL",
            Self::Percentage => "PERCENTAGE",
            Self::SpecificApprover => "SPECIFIC_APPROVER",
            Self::Hybrid => "HYBRID",
        }
    }

    /// Parses a rule type from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SEQUENTIAL" => Some(Self::Sequential),
            "PERCENTAGE" => Some(Self::Percentage),
            "SPECIFIC_APPROVER" => Some(Self::SpecificApprover),
            "HYBRID" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Rule types that carry a percentage threshold.
    #[must_use]
    pub const fn uses_threshold(self) -> bool {
        matches!(self, Self::Percentage | Self::Hybrid)
    }

    /// Rule types that carry a designated approver.
    #[must_use]
    pub const fn uses_specific_approver(self) -> bool {
        matches!(self, Self::SpecificApprover | Self::Hybrid)
    }

    /// Rule types whose approver list may be empty.
    #[must_use]
    pub const fn allows_empty_pool(self) -> bool {
        self.uses_specific_approver()
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Workflow action representing a state transition with audit data.
#[derive(Debug, Clone)]
pub enum WorkflowAction {
    /// Submit a draft expense into the workflow.
    Submit {
        /// The new status after submission.
        new_status: ExpenseStatus,
        /// The submitting employee.
        submitted_by: Uuid,
        /// When the expense was submitted.
        submitted_at: DateTime<Utc>,
    },
    /// Resolve a pending expense through its approval rule.
    Resolve {
        /// Approved or Rejected.
        new_status: ExpenseStatus,
        /// The approver whose decision resolved the expense.
        decided_by: Uuid,
        /// When the expense was resolved.
        resolved_at: DateTime<Utc>,
    },
    /// Force-resolve a pending expense, bypassing the rule.
    Override {
        /// Approved or Rejected.
        new_status: ExpenseStatus,
        /// The admin performing the override.
        admin_id: Uuid,
        /// Mandatory justification.
        comments: String,
        /// When the expense was resolved.
        resolved_at: DateTime<Utc>,
    },
}

impl WorkflowAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub fn new_status(&self) -> ExpenseStatus {
        match self {
            Self::Submit { new_status, .. }
            | Self::Resolve { new_status, .. }
            | Self::Override { new_status, .. } => *new_status,
        }
    }

    /// Returns when the action took effect.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Submit { submitted_at, .. } => *submitted_at,
            Self::Resolve { resolved_at, .. } | Self::Override { resolved_at, .. } => {
                *resolved_at
            }
        }
    }
}
