//! Materialises the approval requests for a submitted expense.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::approval::{RuleApprover, check_sequences};
use crate::workflow::error::WorkflowError;
use crate::workflow::policy::RulePolicy;
use crate::workflow::types::RuleType;

/// One request to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStep {
    /// The approver.
    pub approver_id: Uuid,
    /// Position in the chain, 1-based.
    pub sequence: i32,
    /// Copied from the rule's approver slot.
    pub is_required: bool,
    /// Counts toward the percentage threshold. Only the rule's own
    /// approvers do.
    pub in_pool: bool,
}

/// Ordered set of approval requests for one expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain {
    steps: Vec<ChainStep>,
}

impl ApprovalChain {
    /// Plans the chain for an expense governed by `policy`.
    ///
    /// `manager` is the submitter's manager when that manager is flagged as
    /// an approver. On a SEQUENTIAL chain they take step 1 unless the rule
    /// already routes to them; pool-based rules ignore them. A designated
    /// approver the rule does not list is appended last, outside the pool.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the persisted rule is no longer
    /// well-formed (bad sequences, empty pool, missing specific approver).
    pub fn plan(
        policy: &RulePolicy,
        approvers: &[RuleApprover],
        manager: Option<Uuid>,
    ) -> Result<Self, WorkflowError> {
        let broken = |reason: String| {
            WorkflowError::InvariantViolation(format!("rule {}: {reason}", policy.rule_id))
        };

        check_sequences(approvers.iter().map(|a| a.sequence)).map_err(broken)?;
        if approvers.is_empty() && !policy.rule_type.allows_empty_pool() {
            return Err(broken(format!(
                "{} rule has no approvers",
                policy.rule_type
            )));
        }

        let specific = if policy.rule_type.uses_specific_approver() {
            Some(
                policy
                    .specific_approver_id
                    .ok_or_else(|| broken("specific approver is missing".to_string()))?,
            )
        } else {
            None
        };

        let mut ordered = approvers.to_vec();
        ordered.sort_by_key(|a| a.sequence);
        let listed = |id: Uuid| ordered.iter().any(|a| a.approver_id == id);

        let mut steps = Vec::with_capacity(ordered.len() + 2);
        if policy.rule_type == RuleType::Sequential
            && let Some(manager) = manager
            && !listed(manager)
        {
            steps.push(ChainStep {
                approver_id: manager,
                sequence: 1,
                is_required: true,
                in_pool: false,
            });
        }

        let offset = i32::try_from(steps.len()).map_err(|e| broken(e.to_string()))?;
        steps.extend(ordered.iter().map(|a| ChainStep {
            approver_id: a.approver_id,
            sequence: a.sequence + offset,
            is_required: a.is_required,
            in_pool: true,
        }));

        if let Some(specific) = specific
            && !listed(specific)
        {
            let sequence = i32::try_from(steps.len() + 1).map_err(|e| broken(e.to_string()))?;
            steps.push(ChainStep {
                approver_id: specific,
                sequence,
                is_required: false,
                in_pool: false,
            });
        }

        Ok(Self { steps })
    }

    /// Steps ordered by sequence.
    #[must_use]
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    /// Number of requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn policy(rule_type: RuleType, specific: Option<u128>) -> RulePolicy {
        RulePolicy {
            rule_id: Uuid::from_u128(500),
            rule_type,
            percentage_threshold: rule_type.uses_threshold().then_some(50),
            specific_approver_id: specific.map(user),
        }
    }

    fn ids(chain: &ApprovalChain) -> Vec<(Uuid, i32)> {
        chain
            .steps()
            .iter()
            .map(|s| (s.approver_id, s.sequence))
            .collect()
    }

    #[test]
    fn test_plan_orders_by_sequence() {
        let approvers = [
            RuleApprover::required(user(2), 2),
            RuleApprover::required(user(1), 1),
        ];
        let chain = ApprovalChain::plan(&policy(RuleType::Sequential, None), &approvers, None)
            .unwrap();
        assert_eq!(ids(&chain), vec![(user(1), 1), (user(2), 2)]);
    }

    #[test]
    fn test_manager_goes_first() {
        let approvers = [
            RuleApprover::required(user(1), 1),
            RuleApprover::optional(user(2), 2),
        ];
        let chain = ApprovalChain::plan(
            &policy(RuleType::Sequential, None),
            &approvers,
            Some(user(9)),
        )
        .unwrap();
        assert_eq!(
            ids(&chain),
            vec![(user(9), 1), (user(1), 2), (user(2), 3)]
        );
        assert!(chain.steps()[0].is_required);
        assert!(!chain.steps()[0].in_pool);
        assert!(!chain.steps()[2].is_required);
        assert!(chain.steps()[2].in_pool);
    }

    #[test]
    fn test_pool_rules_ignore_manager() {
        let approvers = [
            RuleApprover::required(user(1), 1),
            RuleApprover::required(user(2), 2),
        ];
        for rule_type in [RuleType::Percentage, RuleType::Hybrid] {
            let specific = rule_type.uses_specific_approver().then_some(1);
            let chain =
                ApprovalChain::plan(&policy(rule_type, specific), &approvers, Some(user(9)))
                    .unwrap();
            assert_eq!(ids(&chain), vec![(user(1), 1), (user(2), 2)]);
            assert!(chain.steps().iter().all(|s| s.in_pool));
        }
    }

    #[test]
    fn test_manager_already_listed_is_not_duplicated() {
        let approvers = [
            RuleApprover::required(user(1), 1),
            RuleApprover::required(user(2), 2),
        ];
        let chain = ApprovalChain::plan(
            &policy(RuleType::Sequential, None),
            &approvers,
            Some(user(2)),
        )
        .unwrap();
        assert_eq!(ids(&chain), vec![(user(1), 1), (user(2), 2)]);
    }

    #[test]
    fn test_specific_approver_appended_when_unlisted() {
        let approvers = [RuleApprover::optional(user(1), 1)];
        let chain = ApprovalChain::plan(
            &policy(RuleType::Hybrid, Some(7)),
            &approvers,
            None,
        )
        .unwrap();
        assert_eq!(ids(&chain), vec![(user(1), 1), (user(7), 2)]);
        assert!(chain.steps()[0].in_pool);
        assert!(!chain.steps()[1].in_pool);
    }

    #[test]
    fn test_specific_rule_with_empty_pool() {
        let chain = ApprovalChain::plan(&policy(RuleType::SpecificApprover, Some(7)), &[], None)
            .unwrap();
        assert_eq!(ids(&chain), vec![(user(7), 1)]);
    }

    #[test]
    fn test_specific_rule_ignores_manager() {
        let approvers = [RuleApprover::optional(user(1), 1)];
        let chain = ApprovalChain::plan(
            &policy(RuleType::SpecificApprover, Some(7)),
            &approvers,
            Some(user(7)),
        )
        .unwrap();
        assert_eq!(ids(&chain), vec![(user(1), 1), (user(7), 2)]);
    }

    #[test]
    fn test_broken_rules_are_invariant_violations() {
        assert!(matches!(
            ApprovalChain::plan(&policy(RuleType::Sequential, None), &[], None),
            Err(WorkflowError::InvariantViolation(_))
        ));

        let gap = [
            RuleApprover::required(user(1), 1),
            RuleApprover::required(user(2), 3),
        ];
        assert!(matches!(
            ApprovalChain::plan(&policy(RuleType::Sequential, None), &gap, None),
            Err(WorkflowError::InvariantViolation(_))
        ));

        assert!(matches!(
            ApprovalChain::plan(&policy(RuleType::SpecificApprover, None), &[], None),
            Err(WorkflowError::InvariantViolation(_))
        ));
    }
}
