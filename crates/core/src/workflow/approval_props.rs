//! Property-based tests for rule validation and chain planning.

use proptest::prelude::*;
use uuid::Uuid;

use crate::workflow::approval::{
    ApproverProfile, RuleApprover, RuleDraft, RuleValidator, UserRole,
};
use crate::workflow::chain::ApprovalChain;
use crate::workflow::error::WorkflowError;
use crate::workflow::policy::RulePolicy;
use crate::workflow::types::RuleType;

const COMPANY: Uuid = Uuid::from_u128(1);

fn approver(seq: i32) -> Uuid {
    Uuid::from_u128(1000 + u128::try_from(seq).unwrap_or_default())
}

fn profiles(sequences: &[i32]) -> Vec<ApproverProfile> {
    sequences
        .iter()
        .map(|&seq| ApproverProfile {
            user_id: approver(seq),
            company_id: COMPANY,
            role: UserRole::Manager,
        })
        .collect()
}

fn sequential(sequences: &[i32]) -> RuleDraft {
    RuleDraft {
        company_id: COMPANY,
        name: "Chain".to_string(),
        description: None,
        rule_type: RuleType::Sequential,
        percentage_threshold: None,
        specific_approver_id: None,
        priority: 1,
        approvers: sequences
            .iter()
            .map(|&seq| RuleApprover::required(approver(seq), seq))
            .collect(),
    }
}

/// Strategy for a shuffled `1..=n`.
fn arb_contiguous() -> impl Strategy<Value = Vec<i32>> {
    (1i32..12).prop_flat_map(|n| Just((1..=n).collect::<Vec<i32>>()).prop_shuffle())
}

/// Strategy for a role.
fn arb_role() -> impl Strategy<Value = UserRole> {
    prop_oneof![
        Just(UserRole::Admin),
        Just(UserRole::Manager),
        Just(UserRole::Employee),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any ordering of 1..=n is accepted.
    #[test]
    fn prop_contiguous_sequences_accepted(sequences in arb_contiguous()) {
        let draft = sequential(&sequences);
        prop_assert!(RuleValidator::validate(&draft, &profiles(&sequences)).is_ok());
    }

    /// Dropping any step except the last leaves a gap, which is rejected.
    #[test]
    fn prop_gap_rejected(sequences in arb_contiguous(), pick in any::<prop::sample::Index>()) {
        let n = i32::try_from(sequences.len()).unwrap();
        prop_assume!(n >= 2);
        let dropped = i32::try_from(pick.index(sequences.len() - 1)).unwrap() + 1;
        prop_assume!(dropped < n);

        let remaining: Vec<i32> = sequences.into_iter().filter(|&s| s != dropped).collect();
        let result = RuleValidator::validate(&sequential(&remaining), &profiles(&remaining));
        prop_assert!(
            matches!(result, Err(WorkflowError::InvalidRuleConfig { .. })),
            "expected gap at {} to be rejected", dropped
        );
    }

    /// Approver eligibility depends only on role.
    #[test]
    fn prop_role_decides_eligibility(role in arb_role()) {
        let mut profs = profiles(&[1]);
        profs[0].role = role;
        let result = RuleValidator::validate(&sequential(&[1]), &profs);
        prop_assert_eq!(result.is_ok(), role.can_approve());
    }

    /// A planned chain is always numbered 1..=len without duplicates.
    #[test]
    fn prop_planned_chain_is_contiguous(
        sequences in arb_contiguous(),
        with_manager in any::<bool>(),
        rule_type in prop_oneof![
            Just(RuleType::Sequential),
            Just(RuleType::Percentage),
            Just(RuleType::SpecificApprover),
            Just(RuleType::Hybrid),
        ],
    ) {
        let approvers: Vec<RuleApprover> = sequences
            .iter()
            .map(|&seq| RuleApprover::optional(approver(seq), seq))
            .collect();
        let policy = RulePolicy {
            rule_id: Uuid::from_u128(2),
            rule_type,
            percentage_threshold: rule_type.uses_threshold().then_some(50),
            specific_approver_id: rule_type.uses_specific_approver().then(|| Uuid::from_u128(9)),
        };
        let manager = with_manager.then(|| Uuid::from_u128(8));

        let chain = ApprovalChain::plan(&policy, &approvers, manager).unwrap();

        let numbered: Vec<i32> = chain.steps().iter().map(|s| s.sequence).collect();
        let expected: Vec<i32> = (1..=i32::try_from(chain.len()).unwrap()).collect();
        prop_assert_eq!(numbered, expected);

        let mut ids: Vec<Uuid> = chain.steps().iter().map(|s| s.approver_id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), chain.len());

        if with_manager && rule_type == RuleType::Sequential {
            prop_assert_eq!(chain.steps()[0].approver_id, Uuid::from_u128(8));
        }

        // The threshold pool is exactly the rule's own approvers.
        let pool = chain.steps().iter().filter(|s| s.in_pool).count();
        prop_assert_eq!(pool, approvers.len());
    }
}
