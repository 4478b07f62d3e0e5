//! Approval rule definitions and their validation.
//!
//! Rules are validated here, before anything reaches the database. The
//! caller loads an [`ApproverProfile`] for every user the draft references
//! (see [`RuleValidator::referenced_users`]) and hands them in.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::error::WorkflowError;
use crate::workflow::types::RuleType;

/// User role within a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Configures rules and may override decisions.
    Admin,
    /// Approves expenses of their reports.
    Manager,
    /// Submits expenses.
    Employee,
}

impl UserRole {
    /// Parse a role from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "MANAGER" => Some(Self::Manager),
            "EMPLOYEE" => Some(Self::Employee),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Employee => "EMPLOYEE",
        }
    }

    /// Only admins and managers may be named approvers.
    #[must_use]
    pub const fn can_approve(self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

/// One approver slot of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApprover {
    /// The approving user.
    pub approver_id: Uuid,
    /// 1-based position in the chain.
    pub sequence: i32,
    /// Marks the approver as mandatory. Stored with the rule and copied onto
    /// each request; resolution is decided by the rule type alone.
    pub is_required: bool,
}

impl RuleApprover {
    /// Creates a required approver slot.
    #[must_use]
    pub const fn required(approver_id: Uuid, sequence: i32) -> Self {
        Self {
            approver_id,
            sequence,
            is_required: true,
        }
    }

    /// Creates an optional approver slot.
    #[must_use]
    pub const fn optional(approver_id: Uuid, sequence: i32) -> Self {
        Self {
            approver_id,
            sequence,
            is_required: false,
        }
    }
}

/// A rule as submitted for creation or as merged for an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    /// Owning company.
    pub company_id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Resolution policy.
    pub rule_type: RuleType,
    /// Approval share in percent, for PERCENTAGE and HYBRID.
    pub percentage_threshold: Option<i32>,
    /// Designated approver, for SPECIFIC_APPROVER and HYBRID.
    pub specific_approver_id: Option<Uuid>,
    /// Selection priority; lower wins.
    pub priority: i32,
    /// Ordered approver pool.
    pub approvers: Vec<RuleApprover>,
}

/// What the engine needs to know about a user to accept them as approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverProfile {
    /// The user.
    pub user_id: Uuid,
    /// The user's company.
    pub company_id: Uuid,
    /// The user's role.
    pub role: UserRole,
}

/// Stateless validator for approval rule drafts.
pub struct RuleValidator;

impl RuleValidator {
    /// Every user the draft references: pool members plus the specific approver.
    #[must_use]
    pub fn referenced_users(draft: &RuleDraft) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        draft
            .approvers
            .iter()
            .map(|a| a.approver_id)
            .chain(draft.specific_approver_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Validates a draft against the given approver profiles.
    ///
    /// # Errors
    ///
    /// * `InvalidRuleConfig` for structural problems (name, priority,
    ///   threshold, missing or extra parameters, bad sequences)
    /// * `InvalidApprover` naming the first user who may not approve
    pub fn validate(draft: &RuleDraft, profiles: &[ApproverProfile]) -> Result<(), WorkflowError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(WorkflowError::invalid_rule("<unnamed>", "name is required"));
        }
        if draft.priority < 1 {
            return Err(WorkflowError::invalid_rule(
                name,
                format!("priority must be at least 1, got {}", draft.priority),
            ));
        }

        Self::check_parameters(name, draft)?;

        if draft.approvers.is_empty() && !draft.rule_type.allows_empty_pool() {
            return Err(WorkflowError::invalid_rule(
                name,
                format!("{} rules need at least one approver", draft.rule_type),
            ));
        }

        check_sequences(draft.approvers.iter().map(|a| a.sequence))
            .map_err(|reason| WorkflowError::invalid_rule(name, reason))?;

        let mut ids = HashSet::new();
        if let Some(dup) = draft
            .approvers
            .iter()
            .find(|a| !ids.insert(a.approver_id))
        {
            return Err(WorkflowError::invalid_rule(
                name,
                format!("approver {} is listed more than once", dup.approver_id),
            ));
        }

        for user_id in Self::referenced_users(draft) {
            Self::check_eligible(user_id, draft.company_id, profiles)?;
        }

        Ok(())
    }

    fn check_parameters(name: &str, draft: &RuleDraft) -> Result<(), WorkflowError> {
        let rule_type = draft.rule_type;

        match (rule_type.uses_threshold(), draft.percentage_threshold) {
            (true, None) => {
                return Err(WorkflowError::invalid_rule(
                    name,
                    format!("{rule_type} rules require a percentage threshold"),
                ));
            }
            (true, Some(t)) if !(1..=100).contains(&t) => {
                return Err(WorkflowError::invalid_rule(
                    name,
                    format!("percentage threshold must be between 1 and 100, got {t}"),
                ));
            }
            (false, Some(_)) => {
                return Err(WorkflowError::invalid_rule(
                    name,
                    format!("{rule_type} rules do not take a percentage threshold"),
                ));
            }
            _ => {}
        }

        match (rule_type.uses_specific_approver(), draft.specific_approver_id) {
            (true, None) => Err(WorkflowError::invalid_rule(
                name,
                format!("{rule_type} rules require a specific approver"),
            )),
            (false, Some(_)) => Err(WorkflowError::invalid_rule(
                name,
                format!("{rule_type} rules do not take a specific approver"),
            )),
            _ => Ok(()),
        }
    }

    fn check_eligible(
        user_id: Uuid,
        company_id: Uuid,
        profiles: &[ApproverProfile],
    ) -> Result<(), WorkflowError> {
        let refuse = |reason: String| WorkflowError::InvalidApprover {
            approver_id: user_id,
            reason,
        };

        let profile = profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| refuse("user does not exist".to_string()))?;

        if profile.company_id != company_id {
            return Err(refuse("user belongs to another company".to_string()));
        }
        if !profile.role.can_approve() {
            return Err(refuse(format!(
                "role {} cannot approve expenses",
                profile.role.as_str()
            )));
        }
        Ok(())
    }
}

/// Checks that sequences are exactly `1..=n` in some order.
pub(crate) fn check_sequences(sequences: impl Iterator<Item = i32>) -> Result<(), String> {
    let mut sorted: Vec<i32> = sequences.collect();
    sorted.sort_unstable();

    let mut expected = 1;
    for seq in sorted {
        if seq < 1 {
            return Err(format!("sequences start at 1, found {seq}"));
        }
        if seq < expected {
            return Err(format!("sequence {seq} is used more than once"));
        }
        if seq > expected {
            return Err(format!("sequence {expected} is missing"));
        }
        expected += 1;
    }
    Ok(())
}
