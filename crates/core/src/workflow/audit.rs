//! Audit trail entries.
//!
//! Every workflow step produces one [`AuditEntry`]. The db crate appends
//! them to `approval_history` inside the same transaction as the step.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use outlay_shared::CurrencyCode;

use crate::workflow::chain::ApprovalChain;
use crate::workflow::policy::{PolicyOutcome, RulePolicy, Tally};
use crate::workflow::types::Decision;

/// Kind of audited workflow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    /// Expense entered the workflow.
    Submitted,
    /// Approval requests were generated.
    ApprovalRequestCreated,
    /// An approver approved.
    Approved,
    /// An approver rejected.
    Rejected,
    /// Remaining requests were closed by a rejection.
    RequestCancelled,
    /// Converted amount was fixed.
    CurrencyConversion,
    /// Converter failed; amount left unconverted.
    CurrencyConversionFailed,
    /// Admin force-approved.
    OverrideApproved,
    /// Admin force-rejected.
    OverrideRejected,
}

impl HistoryAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::ApprovalRequestCreated => "APPROVAL_REQUEST_CREATED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::RequestCancelled => "REQUEST_CANCELLED",
            Self::CurrencyConversion => "CURRENCY_CONVERSION",
            Self::CurrencyConversionFailed => "CURRENCY_CONVERSION_FAILED",
            Self::OverrideApproved => "OVERRIDE_APPROVED",
            Self::OverrideRejected => "OVERRIDE_REJECTED",
        }
    }

    /// Parses an action from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUBMITTED" => Some(Self::Submitted),
            "APPROVAL_REQUEST_CREATED" => Some(Self::ApprovalRequestCreated),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "REQUEST_CANCELLED" => Some(Self::RequestCancelled),
            "CURRENCY_CONVERSION" => Some(Self::CurrencyConversion),
            "CURRENCY_CONVERSION_FAILED" => Some(Self::CurrencyConversionFailed),
            "OVERRIDE_APPROVED" => Some(Self::OverrideApproved),
            "OVERRIDE_REJECTED" => Some(Self::OverrideRejected),
            _ => None,
        }
    }

    /// Action recorded for an approver's decision.
    #[must_use]
    pub const fn for_decision(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::Approved,
            Decision::Reject => Self::Rejected,
        }
    }

    /// Action recorded for an admin override.
    #[must_use]
    pub const fn for_override(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::OverrideApproved,
            Decision::Reject => Self::OverrideRejected,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Actor {
    /// The engine itself.
    System,
    /// A user.
    User(Uuid),
}

impl Actor {
    const SYSTEM: &'static str = "SYSTEM";

    /// Parses `"SYSTEM"` or a user id.
    pub fn parse(s: &str) -> Option<Self> {
        if s == Self::SYSTEM {
            return Some(Self::System);
        }
        Uuid::parse_str(s).ok().map(Self::User)
    }

    /// The user id, unless the engine acted.
    #[must_use]
    pub const fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::System => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str(Self::SYSTEM),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

impl From<Actor> for String {
    fn from(actor: Actor) -> Self {
        actor.to_string()
    }
}

impl TryFrom<String> for Actor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid actor '{value}'"))
    }
}

/// One audit trail entry, prior to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The expense the event belongs to.
    pub expense_id: Uuid,
    /// Who acted.
    pub actor: Actor,
    /// What happened.
    pub action: HistoryAction,
    /// Free-form comments.
    pub comments: Option<String>,
    /// Structured details, always a JSON object.
    pub metadata: Value,
}

impl AuditEntry {
    /// Creates an entry with empty metadata.
    #[must_use]
    pub fn new(expense_id: Uuid, actor: Actor, action: HistoryAction) -> Self {
        Self {
            expense_id,
            actor,
            action,
            comments: None,
            metadata: json!({}),
        }
    }

    /// Attaches comments; blank comments are dropped.
    #[must_use]
    pub fn with_comments(mut self, comments: Option<&str>) -> Self {
        self.comments = comments
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);
        self
    }

    /// Replaces the metadata object.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// The submitter put the expense into the workflow.
    #[must_use]
    pub fn submitted(expense_id: Uuid, submitter_id: Uuid, policy: &RulePolicy) -> Self {
        Self::new(expense_id, Actor::User(submitter_id), HistoryAction::Submitted).with_metadata(
            json!({
                "rule_id": policy.rule_id,
                "rule_type": policy.rule_type,
            }),
        )
    }

    /// The engine generated the approval requests.
    #[must_use]
    pub fn chain_created(expense_id: Uuid, policy: &RulePolicy, chain: &ApprovalChain) -> Self {
        Self::new(expense_id, Actor::System, HistoryAction::ApprovalRequestCreated).with_metadata(
            json!({
                "rule_id": policy.rule_id,
                "rule_type": policy.rule_type,
                "percentage_threshold": policy.percentage_threshold,
                "specific_approver_id": policy.specific_approver_id,
                "requests": chain.steps(),
            }),
        )
    }

    /// An approver answered their request.
    #[must_use]
    pub fn decision(
        expense_id: Uuid,
        approver_id: Uuid,
        decision: Decision,
        comments: Option<&str>,
        policy: &RulePolicy,
        tally: &Tally,
        outcome: &PolicyOutcome,
    ) -> Self {
        Self::new(
            expense_id,
            Actor::User(approver_id),
            HistoryAction::for_decision(decision),
        )
        .with_comments(comments)
        .with_metadata(json!({
            "rule_type": policy.rule_type,
            "tally": tally,
            "outcome": outcome,
        }))
    }

    /// Remaining requests were closed because the expense was rejected.
    #[must_use]
    pub fn requests_cancelled(expense_id: Uuid, cancelled: &[Uuid], reason: &str) -> Self {
        Self::new(expense_id, Actor::System, HistoryAction::RequestCancelled)
            .with_comments(Some(reason))
            .with_metadata(json!({ "cancelled_approvers": cancelled }))
    }

    /// An admin force-resolved the expense.
    #[must_use]
    pub fn overridden(
        expense_id: Uuid,
        admin_id: Uuid,
        decision: Decision,
        comments: &str,
        open_requests: usize,
    ) -> Self {
        Self::new(
            expense_id,
            Actor::User(admin_id),
            HistoryAction::for_override(decision),
        )
        .with_comments(Some(comments))
        .with_metadata(json!({
            "admin_id": admin_id,
            "open_requests": open_requests,
        }))
    }

    /// The converted amount was fixed.
    #[must_use]
    pub fn converted(
        expense_id: Uuid,
        amount: Decimal,
        from: &CurrencyCode,
        converted: Decimal,
        to: &CurrencyCode,
        rate: Decimal,
    ) -> Self {
        Self::new(expense_id, Actor::System, HistoryAction::CurrencyConversion).with_metadata(
            json!({
                "amount": amount.to_string(),
                "from": from.as_str(),
                "converted_amount": converted.to_string(),
                "to": to.as_str(),
                "rate": rate.to_string(),
            }),
        )
    }

    /// The converter failed.
    #[must_use]
    pub fn conversion_failed(
        expense_id: Uuid,
        from: &CurrencyCode,
        to: &CurrencyCode,
        error: &str,
    ) -> Self {
        Self::new(
            expense_id,
            Actor::System,
            HistoryAction::CurrencyConversionFailed,
        )
        .with_comments(Some(error))
        .with_metadata(json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "error": error,
        }))
    }
}
