//! Concurrent decision tests.
//!
//! Every test runs on a database file behind several connections, and the
//! racing tasks are released together by a barrier.
//!
//! These tests verify that:
//! - A double-submitted decision is accepted once, the rest see `AlreadyResponded`
//! - Approvers racing on one expense resolve it exactly once
//! - Decisions on different expenses do not interfere
//! - A rule edit racing a submission either lands first or is refused

// Allow common test patterns that trigger clippy warnings
#![allow(clippy::uninlined_format_args)]

mod common;

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use outlay_core::workflow::{Decision, ExpenseStatus, RuleApprover, RuleType, WorkflowError};
use outlay_db::ExpenseRepository;
use outlay_db::entities::sea_orm_active_enums::RequestStatus;
use outlay_db::repositories::UpdateRuleInput;

use common::Fixture;

#[tokio::test]
async fn test_double_submitted_decision_is_accepted_once() {
    const ATTEMPTS: usize = 5;

    let fx = Fixture::shared().await;
    fx.rule(
        RuleType::Percentage,
        Some(100),
        None,
        vec![
            RuleApprover::optional(fx.finance.id, 1),
            RuleApprover::optional(fx.director.id, 2),
        ],
    )
    .await;
    let engine = fx.engine();
    let expense_id = engine
        .create_and_submit(fx.expense(dec!(99), "USD"))
        .await
        .unwrap()
        .expense
        .id;

    let barrier = Arc::new(Barrier::new(ATTEMPTS));
    let mut handles = Vec::with_capacity(ATTEMPTS);
    for i in 0..ATTEMPTS {
        let engine = engine.clone();
        let barrier_clone = Arc::clone(&barrier);
        let approver = fx.finance.id;
        handles.push(tokio::spawn(async move {
            barrier_clone.wait().await;
            let comment = format!("attempt {}", i);
            engine
                .decide(expense_id, approver, Decision::Approve, Some(&comment))
                .await
        }));
    }
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(result, Err(WorkflowError::AlreadyResponded { .. })),
            "unexpected result {:?}",
            result
        );
    }

    let approvals = engine
        .history(expense_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == "APPROVED")
        .count();
    assert_eq!(approvals, 1);
}

#[tokio::test]
async fn test_racing_approvers_resolve_exactly_once() {
    let fx = Fixture::shared().await;
    fx.rule(
        RuleType::Percentage,
        Some(50),
        None,
        vec![
            RuleApprover::optional(fx.finance.id, 1),
            RuleApprover::optional(fx.director.id, 2),
            RuleApprover::optional(fx.admin.id, 3),
            RuleApprover::optional(fx.manager.id, 4),
        ],
    )
    .await;
    let engine = fx.engine();
    let expense_id = engine
        .create_and_submit(fx.expense(dec!(250), "USD"))
        .await
        .unwrap()
        .expense
        .id;

    let votes = [
        (fx.finance.id, Decision::Approve),
        (fx.director.id, Decision::Reject),
        (fx.admin.id, Decision::Approve),
        (fx.manager.id, Decision::Reject),
    ];
    let barrier = Arc::new(Barrier::new(votes.len()));
    let handles = votes.into_iter().map(|(approver, decision)| {
        let engine = engine.clone();
        let barrier_clone = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier_clone.wait().await;
            engine.decide(expense_id, approver, decision, None).await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let resolutions: Vec<ExpenseStatus> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|o| o.conversion.is_some())
        .map(|o| o.status)
        .collect();
    assert_eq!(resolutions.len(), 1, "expense resolved {:?}", resolutions);
    assert!(resolutions[0].is_terminal());

    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    WorkflowError::ExpenseNotPending { .. }
                        | WorkflowError::AlreadyResponded { .. }
                ),
                "unexpected error {:?}",
                err
            );
        }
    }

    let requests = engine.requests_for(expense_id).await.unwrap();
    if resolutions[0] == ExpenseStatus::Rejected {
        assert!(requests.iter().all(|r| r.status != RequestStatus::Pending));
    }

    let history = engine.history(expense_id).await.unwrap();
    let terminal = history
        .iter()
        .filter(|e| e.action == "APPROVED" || e.action == "REJECTED")
        .count();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(terminal, accepted);
}

#[tokio::test]
async fn test_decisions_on_separate_expenses() {
    const EXPENSES: usize = 10;

    let fx = Fixture::shared().await;
    fx.rule(
        RuleType::Sequential,
        None,
        None,
        vec![RuleApprover::required(fx.finance.id, 1)],
    )
    .await;
    let engine = fx.engine();

    let mut expense_ids = Vec::with_capacity(EXPENSES);
    for i in 1..=EXPENSES {
        let submitted = engine
            .create_and_submit(fx.expense(Decimal::from(i * 10), "USD"))
            .await
            .unwrap();
        expense_ids.push(submitted.expense.id);
    }
    assert_eq!(
        engine.actionable_requests(fx.finance.id).await.unwrap().len(),
        EXPENSES
    );

    let barrier = Arc::new(Barrier::new(EXPENSES));
    let handles = expense_ids.iter().map(|&expense_id| {
        let engine = engine.clone();
        let barrier_clone = Arc::clone(&barrier);
        let approver = fx.finance.id;
        tokio::spawn(async move {
            barrier_clone.wait().await;
            engine
                .decide(expense_id, approver, Decision::Approve, None)
                .await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    assert!(results.iter().all(|r| r
        .as_ref()
        .is_ok_and(|o| o.status == ExpenseStatus::Approved)));
    assert!(engine.actionable_requests(fx.finance.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rule_edit_racing_submission() {
    let fx = Fixture::shared().await;
    let rule = fx
        .rule(
            RuleType::Sequential,
            None,
            None,
            vec![RuleApprover::required(fx.finance.id, 1)],
        )
        .await;
    let draft = ExpenseRepository::new(fx.db.clone())
        .create_draft(fx.expense(dec!(75), "USD"))
        .await
        .unwrap();
    let engine = fx.engine();
    let rules = fx.rules();

    let barrier = Arc::new(Barrier::new(2));
    let submit = {
        let barrier_clone = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier_clone.wait().await;
            engine.submit(draft.id).await
        })
    };
    let edit = {
        let barrier_clone = Arc::clone(&barrier);
        let company_id = fx.company.id;
        let rule_id = rule.rule.id;
        let director = fx.director.id;
        tokio::spawn(async move {
            barrier_clone.wait().await;
            rules
                .update_rule(
                    company_id,
                    rule_id,
                    UpdateRuleInput {
                        approvers: Some(vec![RuleApprover::required(director, 1)]),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    let submitted = submit.await.expect("task panicked").unwrap();
    let edited = edit.await.expect("task panicked");

    let approvers: Vec<_> = submitted.requests.iter().map(|r| r.approver_id).collect();
    match edited {
        // The edit committed first, so the submission saw the new approvers.
        Ok(_) => assert_eq!(approvers, vec![fx.director.id]),
        // The submission committed first and holds the rule.
        Err(err) => {
            assert!(
                matches!(err, WorkflowError::RuleInUse(id) if id == rule.rule.id),
                "unexpected error {:?}",
                err
            );
            assert_eq!(approvers, vec![fx.finance.id]);
            let current = fx.rules().get_rule(fx.company.id, rule.rule.id).await.unwrap();
            assert_eq!(current.approvers[0].approver_id, fx.finance.id);
        }
    }
}
