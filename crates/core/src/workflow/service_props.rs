//! Property-based tests for WorkflowService.

use proptest::prelude::*;
use uuid::Uuid;

use crate::workflow::error::WorkflowError;
use crate::workflow::policy::PolicyOutcome;
use crate::workflow::service::WorkflowService;
use crate::workflow::types::{Decision, ExpenseStatus, WorkflowAction};

/// Strategy for generating random ExpenseStatus values.
fn arb_status() -> impl Strategy<Value = ExpenseStatus> {
    prop_oneof![
        Just(ExpenseStatus::Draft),
        Just(ExpenseStatus::Pending),
        Just(ExpenseStatus::Approved),
        Just(ExpenseStatus::Rejected),
    ]
}

/// Strategy for generating random UUIDs.
fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Approve), Just(Decision::Reject)]
}

fn arb_outcome() -> impl Strategy<Value = PolicyOutcome> {
    prop_oneof![
        Just(PolicyOutcome::Approved),
        Just(PolicyOutcome::Rejected),
        (1i32..10, arb_uuid()).prop_map(|(next_sequence, next_approver)| {
            PolicyOutcome::Advance {
                next_sequence,
                next_approver,
            }
        }),
        (0usize..10).prop_map(|approved| PolicyOutcome::Waiting {
            approved,
            total: 10,
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Submission succeeds only from Draft and records the submitter.
    #[test]
    fn prop_submit_only_from_draft(status in arb_status(), user_id in arb_uuid()) {
        match WorkflowService::submit(Uuid::nil(), status, user_id) {
            Ok(WorkflowAction::Submit { new_status, submitted_by, .. }) => {
                prop_assert_eq!(status, ExpenseStatus::Draft);
                prop_assert_eq!(new_status, ExpenseStatus::Pending);
                prop_assert_eq!(submitted_by, user_id);
            }
            Ok(other) => prop_assert!(false, "unexpected action {:?}", other),
            Err(WorkflowError::AlreadySubmitted { status: reported, .. }) => {
                prop_assert_ne!(status, ExpenseStatus::Draft);
                prop_assert_eq!(reported, status);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Every produced transition is a valid one.
    #[test]
    fn prop_resolution_respects_state_machine(
        status in arb_status(),
        outcome in arb_outcome(),
    ) {
        match WorkflowService::resolve(Uuid::nil(), status, &outcome, Uuid::nil()) {
            Ok(Some(action)) => {
                prop_assert!(WorkflowService::is_valid_transition(status, action.new_status()));
                prop_assert_eq!(Some(action.new_status()), outcome.resolved_status());
            }
            Ok(None) => prop_assert!(outcome.resolved_status().is_none()),
            Err(err) => {
                let not_pending = matches!(err, WorkflowError::ExpenseNotPending { .. });
                prop_assert!(not_pending);
                prop_assert_ne!(status, ExpenseStatus::Pending);
            }
        }
    }

    /// Terminal statuses never change again.
    #[test]
    fn prop_terminal_is_final(from in arb_status(), to in arb_status()) {
        if from.is_terminal() {
            prop_assert!(!WorkflowService::is_valid_transition(from, to));
        }
    }

    /// Blank override comments fail before anything else is checked.
    #[test]
    fn prop_blank_override_comments(
        status in arb_status(),
        decision in arb_decision(),
        blank in "[ \t\n]{0,5}",
    ) {
        let result =
            WorkflowService::override_decision(Uuid::nil(), status, Uuid::nil(), decision, &blank);
        let missing = matches!(result, Err(WorkflowError::MissingComments));
        prop_assert!(missing);
    }

    /// Overrides with comments resolve pending expenses to the chosen status.
    #[test]
    fn prop_override_from_pending(
        decision in arb_decision(),
        admin in arb_uuid(),
        comments in "[a-z]{1,20}",
    ) {
        let action = WorkflowService::override_decision(
            Uuid::nil(),
            ExpenseStatus::Pending,
            admin,
            decision,
            &comments,
        ).unwrap();
        prop_assert_eq!(action.new_status(), decision.expense_status());
    }
}
