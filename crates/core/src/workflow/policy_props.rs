//! Property-based tests for DecisionPolicy.

use proptest::prelude::*;
use uuid::Uuid;

use crate::workflow::error::WorkflowError;
use crate::workflow::policy::{DecisionPolicy, PolicyOutcome, RequestState, RulePolicy};
use crate::workflow::types::{RequestStatus, RuleType};

fn approver(index: usize) -> Uuid {
    Uuid::from_u128(100 + index as u128)
}

/// `approved` leading approvals followed by pending requests.
fn pool(size: usize, approved: usize) -> Vec<RequestState> {
    (0..size)
        .map(|i| RequestState {
            approver_id: approver(i),
            sequence: i32::try_from(i + 1).unwrap(),
            in_pool: true,
            status: if i < approved {
                RequestStatus::Approved
            } else {
                RequestStatus::Pending
            },
        })
        .collect()
}

fn rule(rule_type: RuleType, threshold: i32, specific: Option<Uuid>) -> RulePolicy {
    RulePolicy {
        rule_id: Uuid::from_u128(1),
        rule_type,
        percentage_threshold: rule_type.uses_threshold().then_some(threshold),
        specific_approver_id: specific,
    }
}

/// Strategy for (pool size, approvals).
fn arb_pool_shape() -> impl Strategy<Value = (usize, usize)> {
    (1usize..20).prop_flat_map(|n| (Just(n), 0..=n))
}

fn arb_rule_type() -> impl Strategy<Value = RuleType> {
    prop_oneof![
        Just(RuleType::Sequential),
        Just(RuleType::Percentage),
        Just(RuleType::SpecificApprover),
        Just(RuleType::Hybrid),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A single rejection rejects, whatever the rule and the other answers.
    #[test]
    fn prop_any_rejection_rejects(
        (size, approved) in arb_pool_shape(),
        rejecter in any::<prop::sample::Index>(),
        rule_type in arb_rule_type(),
        threshold in 1i32..=100,
    ) {
        let mut requests = pool(size, approved);
        let idx = rejecter.index(size);
        requests[idx].status = RequestStatus::Rejected;
        let policy = rule(rule_type, threshold, Some(approver(0)));

        prop_assert_eq!(
            DecisionPolicy::evaluate(&policy, &requests).unwrap(),
            PolicyOutcome::Rejected
        );
    }

    /// Percentage rules approve exactly when approved/total >= threshold%.
    #[test]
    fn prop_percentage_matches_integer_threshold(
        (size, approved) in arb_pool_shape(),
        threshold in 1i32..=100,
    ) {
        let requests = pool(size, approved);
        let policy = rule(RuleType::Percentage, threshold, None);
        let outcome = DecisionPolicy::evaluate(&policy, &requests).unwrap();

        let t = usize::try_from(threshold).unwrap();
        let expected = approved * 100 >= t * size;
        prop_assert_eq!(outcome == PolicyOutcome::Approved, expected);
    }

    /// Requests outside the pool never change a percentage result.
    #[test]
    fn prop_outside_requests_do_not_dilute(
        (size, approved) in arb_pool_shape(),
        extra_approved in any::<bool>(),
        threshold in 1i32..=100,
    ) {
        let policy = rule(RuleType::Percentage, threshold, None);
        let requests = pool(size, approved);
        let mut extended = requests.clone();
        extended.push(RequestState {
            approver_id: approver(size),
            sequence: i32::try_from(size + 1).unwrap(),
            in_pool: false,
            status: if extra_approved {
                RequestStatus::Approved
            } else {
                RequestStatus::Pending
            },
        });

        prop_assert_eq!(
            DecisionPolicy::evaluate(&policy, &requests).unwrap(),
            DecisionPolicy::evaluate(&policy, &extended).unwrap()
        );
    }

    /// Hybrid approves as soon as the designated approver approves.
    #[test]
    fn prop_hybrid_specific_short_circuit(
        (size, approved) in arb_pool_shape(),
        threshold in 1i32..=100,
    ) {
        prop_assume!(approved >= 1);
        // Approver 0 is always among the approvals.
        let requests = pool(size, approved);
        let policy = rule(RuleType::Hybrid, threshold, Some(approver(0)));
        prop_assert_eq!(
            DecisionPolicy::evaluate(&policy, &requests).unwrap(),
            PolicyOutcome::Approved
        );
    }

    /// Sequential chains accept exactly the live step.
    #[test]
    fn prop_sequential_only_live_step_acts((size, approved) in arb_pool_shape()) {
        prop_assume!(approved < size);
        let requests = pool(size, approved);

        for (i, request) in requests.iter().enumerate() {
            let result = DecisionPolicy::ensure_turn(
                Uuid::nil(),
                request.approver_id,
                RuleType::Sequential,
                &requests,
            );
            if i < approved {
                let is_answered = matches!(result, Err(WorkflowError::AlreadyResponded { .. }));
                prop_assert!(is_answered);
            } else if i == approved {
                prop_assert!(result.is_ok());
            } else {
                let is_early = matches!(result, Err(WorkflowError::NotYourTurn { .. }));
                prop_assert!(is_early);
            }
        }

        let outcome = DecisionPolicy::evaluate(&rule(RuleType::Sequential, 0, None), &requests)
            .unwrap();
        let is_advance = matches!(outcome, PolicyOutcome::Advance { next_sequence, .. }
                if next_sequence == i32::try_from(approved + 1).unwrap());
        prop_assert!(is_advance);
    }
}
