//! Resolution policy: who may act now, and what a set of answers means.
//!
//! [`DecisionPolicy`] is stateless. The caller records the individual
//! decision first, then passes the full request set to
//! [`DecisionPolicy::evaluate`] to learn whether the expense resolves.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::approval::check_sequences;
use crate::workflow::error::WorkflowError;
use crate::workflow::types::{ExpenseStatus, RequestStatus, RuleType};

/// The parts of an approval rule the policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePolicy {
    /// The rule.
    pub rule_id: Uuid,
    /// Resolution strategy.
    pub rule_type: RuleType,
    /// Approval share in percent.
    pub percentage_threshold: Option<i32>,
    /// Designated approver.
    pub specific_approver_id: Option<Uuid>,
}

impl RulePolicy {
    fn threshold(&self) -> Result<usize, WorkflowError> {
        let threshold = self.percentage_threshold.ok_or_else(|| {
            WorkflowError::InvariantViolation(format!(
                "{} rule {} has no percentage threshold",
                self.rule_type, self.rule_id
            ))
        })?;
        if !(1..=100).contains(&threshold) {
            return Err(WorkflowError::InvariantViolation(format!(
                "rule {} has threshold {threshold} outside 1..=100",
                self.rule_id
            )));
        }
        usize::try_from(threshold)
            .map_err(|e| WorkflowError::InvariantViolation(e.to_string()))
    }

    fn specific_approver(&self) -> Result<Uuid, WorkflowError> {
        self.specific_approver_id.ok_or_else(|| {
            WorkflowError::InvariantViolation(format!(
                "{} rule {} has no specific approver",
                self.rule_type, self.rule_id
            ))
        })
    }
}

/// Snapshot of one approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestState {
    /// The approver.
    pub approver_id: Uuid,
    /// Position in the chain.
    pub sequence: i32,
    /// Counts toward the percentage threshold.
    pub in_pool: bool,
    /// Current answer.
    pub status: RequestStatus,
}

/// Counts of the answers inside the rule's approver pool.
///
/// Requests outside the pool (the manager-first step, an appended specific
/// approver) are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    /// Approved requests.
    pub approved: usize,
    /// Rejected requests.
    pub rejected: usize,
    /// Unanswered requests.
    pub pending: usize,
    /// Pool size.
    pub total: usize,
}

impl Tally {
    /// Counts the pool members among `requests`.
    #[must_use]
    pub fn of(requests: &[RequestState]) -> Self {
        requests
            .iter()
            .filter(|r| r.in_pool)
            .fold(Self::default(), |mut tally, r| {
                match r.status {
                    RequestStatus::Approved => tally.approved += 1,
                    RequestStatus::Rejected => tally.rejected += 1,
                    RequestStatus::Pending => tally.pending += 1,
                }
                tally.total += 1;
                tally
            })
    }
}

/// What the expense does after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyOutcome {
    /// Resolve APPROVED.
    Approved,
    /// Resolve REJECTED.
    Rejected,
    /// Sequential chain moves to the next step.
    Advance {
        /// The step now live.
        next_sequence: i32,
        /// Who holds that step.
        next_approver: Uuid,
    },
    /// Parallel pool keeps waiting for more answers.
    Waiting {
        /// Approvals so far.
        approved: usize,
        /// Pool size.
        total: usize,
    },
}

impl PolicyOutcome {
    /// Terminal status, when the outcome resolves the expense.
    #[must_use]
    pub const fn resolved_status(&self) -> Option<ExpenseStatus> {
        match self {
            Self::Approved => Some(ExpenseStatus::Approved),
            Self::Rejected => Some(ExpenseStatus::Rejected),
            Self::Advance { .. } | Self::Waiting { .. } => None,
        }
    }

    /// Short label for logs and audit metadata.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Advance { .. } => "ADVANCE",
            Self::Waiting { .. } => "WAITING",
        }
    }
}

/// Stateless evaluator of approval rules.
pub struct DecisionPolicy;

impl DecisionPolicy {
    /// Lowest sequence still awaiting an answer.
    #[must_use]
    pub fn live_sequence(requests: &[RequestState]) -> Option<i32> {
        requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .map(|r| r.sequence)
            .min()
    }

    /// Whether the approver holding `request` may decide right now.
    #[must_use]
    pub fn is_actionable(
        rule_type: RuleType,
        requests: &[RequestState],
        request: &RequestState,
    ) -> bool {
        if request.status != RequestStatus::Pending {
            return false;
        }
        match rule_type {
            RuleType::Sequential => Self::live_sequence(requests) == Some(request.sequence),
            RuleType::Percentage | RuleType::SpecificApprover | RuleType::Hybrid => true,
        }
    }

    /// Finds the approver's request and checks it may be decided now.
    ///
    /// # Errors
    ///
    /// * `NoSuchRequest` if the approver holds no request
    /// * `AlreadyResponded` if the request was already answered
    /// * `NotYourTurn` if a sequential chain has an earlier open step
    pub fn ensure_turn(
        expense_id: Uuid,
        approver_id: Uuid,
        rule_type: RuleType,
        requests: &[RequestState],
    ) -> Result<RequestState, WorkflowError> {
        let request = requests
            .iter()
            .find(|r| r.approver_id == approver_id)
            .copied()
            .ok_or(WorkflowError::NoSuchRequest {
                expense_id,
                approver_id,
            })?;

        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::AlreadyResponded {
                expense_id,
                approver_id,
            });
        }

        if rule_type == RuleType::Sequential
            && let Some(live_sequence) = Self::live_sequence(requests)
            && live_sequence != request.sequence
        {
            return Err(WorkflowError::NotYourTurn {
                expense_id,
                approver_id,
                sequence: request.sequence,
                live_sequence,
            });
        }

        Ok(request)
    }

    /// Inclusive percentage check in integer arithmetic.
    #[must_use]
    pub fn threshold_met(threshold: usize, tally: &Tally) -> bool {
        tally.total > 0
            && tally.approved.saturating_mul(100) >= threshold.saturating_mul(tally.total)
    }

    /// Evaluates the request set after the latest decision was recorded.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` when the requests or rule parameters are
    /// inconsistent (empty pool, duplicate sequences, missing parameters).
    pub fn evaluate(
        policy: &RulePolicy,
        requests: &[RequestState],
    ) -> Result<PolicyOutcome, WorkflowError> {
        Self::check_integrity(policy, requests)?;

        if requests.iter().any(|r| r.status == RequestStatus::Rejected) {
            return Ok(PolicyOutcome::Rejected);
        }

        let tally = Tally::of(requests);
        let approved = match policy.rule_type {
            RuleType::Sequential => requests.iter().all(|r| r.status == RequestStatus::Approved),
            RuleType::Percentage => Self::threshold_met(policy.threshold()?, &tally),
            RuleType::SpecificApprover => Self::specific_condition(policy, requests)?,
            RuleType::Hybrid => {
                Self::threshold_met(policy.threshold()?, &tally)
                    || Self::specific_condition(policy, requests)?
            }
        };

        if approved {
            return Ok(PolicyOutcome::Approved);
        }

        if policy.rule_type == RuleType::Sequential {
            let next = requests
                .iter()
                .filter(|r| r.status == RequestStatus::Pending)
                .min_by_key(|r| r.sequence)
                .ok_or_else(|| {
                    WorkflowError::InvariantViolation(format!(
                        "sequential rule {} has no open step yet is unresolved",
                        policy.rule_id
                    ))
                })?;
            return Ok(PolicyOutcome::Advance {
                next_sequence: next.sequence,
                next_approver: next.approver_id,
            });
        }

        Ok(PolicyOutcome::Waiting {
            approved: tally.approved,
            total: tally.total,
        })
    }

    fn specific_condition(
        policy: &RulePolicy,
        requests: &[RequestState],
    ) -> Result<bool, WorkflowError> {
        let specific = policy.specific_approver()?;
        let request = requests
            .iter()
            .find(|r| r.approver_id == specific)
            .ok_or_else(|| {
                WorkflowError::InvariantViolation(format!(
                    "specific approver {specific} holds no request under rule {}",
                    policy.rule_id
                ))
            })?;
        Ok(request.status == RequestStatus::Approved)
    }

    fn check_integrity(
        policy: &RulePolicy,
        requests: &[RequestState],
    ) -> Result<(), WorkflowError> {
        if requests.is_empty() {
            return Err(WorkflowError::InvariantViolation(format!(
                "expense under rule {} has no approval requests",
                policy.rule_id
            )));
        }
        check_sequences(requests.iter().map(|r| r.sequence)).map_err(|reason| {
            WorkflowError::InvariantViolation(format!(
                "requests under rule {}: {reason}",
                policy.rule_id
            ))
        })?;
        if policy.rule_type.uses_threshold() {
            policy.threshold()?;
        }
        if policy.rule_type.uses_specific_approver() {
            policy.specific_approver()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn user(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn policy(
        rule_type: RuleType,
        threshold: Option<i32>,
        specific: Option<u128>,
    ) -> RulePolicy {
        RulePolicy {
            rule_id: Uuid::from_u128(77),
            rule_type,
            percentage_threshold: threshold,
            specific_approver_id: specific.map(user),
        }
    }

    /// Builds requests from (status, in_pool) pairs; approver n has sequence n.
    fn requests(states: &[(RequestStatus, bool)]) -> Vec<RequestState> {
        states
            .iter()
            .zip(1..)
            .map(|(&(status, in_pool), seq)| RequestState {
                approver_id: user(u128::try_from(seq).unwrap()),
                sequence: seq,
                in_pool,
                status,
            })
            .collect()
    }

    use RequestStatus::{Approved as A, Pending as P, Rejected as R};

    #[test]
    fn test_sequential_advances_then_approves() {
        let p = policy(RuleType::Sequential, None, None);

        let reqs = requests(&[(A, true), (P, true), (P, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Advance {
                next_sequence: 2,
                next_approver: user(2)
            }
        );

        let reqs = requests(&[(A, true), (A, true), (A, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );
    }

    #[rstest]
    #[case(RuleType::Sequential, None, None)]
    #[case(RuleType::Percentage, Some(50), None)]
    #[case(RuleType::SpecificApprover, None, Some(1))]
    #[case(RuleType::Hybrid, Some(50), Some(1))]
    fn test_any_rejection_rejects(
        #[case] rule_type: RuleType,
        #[case] threshold: Option<i32>,
        #[case] specific: Option<u128>,
    ) {
        let p = policy(rule_type, threshold, specific);
        let reqs = requests(&[(A, true), (R, true), (P, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Rejected
        );
    }

    #[test]
    fn test_percentage_threshold_is_inclusive() {
        let p = policy(RuleType::Percentage, Some(60), None);

        let reqs = requests(&[(A, true), (A, true), (P, true), (P, true), (P, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Waiting {
                approved: 2,
                total: 5
            }
        );

        // 3 of 5 is exactly 60%.
        let reqs = requests(&[(A, true), (A, true), (A, true), (P, true), (P, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );
    }

    #[test]
    fn test_two_of_three_meets_sixty_percent() {
        let p = policy(RuleType::Percentage, Some(60), None);
        let reqs = requests(&[(A, true), (P, true), (A, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );
    }

    #[test]
    fn test_threshold_counts_pool_only() {
        let p = policy(RuleType::Percentage, Some(60), None);
        let reqs = requests(&[(A, true), (P, true), (P, true), (P, false)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Waiting {
                approved: 1,
                total: 3
            }
        );

        // An appended specific approver does not dilute a HYBRID pool.
        let p = policy(RuleType::Hybrid, Some(50), Some(3));
        let reqs = requests(&[(A, true), (P, true), (P, false)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );
    }

    #[test]
    fn test_specific_approver_short_circuits() {
        let p = policy(RuleType::SpecificApprover, None, Some(2));

        let reqs = requests(&[(A, false), (P, true), (P, false)]);
        assert!(matches!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Waiting { .. }
        ));

        let reqs = requests(&[(P, false), (A, true), (P, false)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );
    }

    #[test]
    fn test_hybrid_either_condition() {
        let p = policy(RuleType::Hybrid, Some(60), Some(3));

        // Specific approver alone.
        let reqs = requests(&[(P, true), (P, true), (A, true), (P, true), (P, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );

        // Threshold alone.
        let reqs = requests(&[(A, true), (A, true), (P, true), (A, true), (P, true)]);
        assert_eq!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Approved
        );

        // Neither.
        let reqs = requests(&[(A, true), (A, true), (P, true), (P, true), (P, true)]);
        assert!(matches!(
            DecisionPolicy::evaluate(&p, &reqs).unwrap(),
            PolicyOutcome::Waiting { .. }
        ));
    }

    #[test]
    fn test_invariant_violations() {
        let p = policy(RuleType::Sequential, None, None);
        assert!(matches!(
            DecisionPolicy::evaluate(&p, &[]),
            Err(WorkflowError::InvariantViolation(_))
        ));

        let mut reqs = requests(&[(P, true), (P, true)]);
        reqs[1].sequence = 1;
        assert!(matches!(
            DecisionPolicy::evaluate(&p, &reqs),
            Err(WorkflowError::InvariantViolation(_))
        ));

        let p = policy(RuleType::Percentage, None, None);
        assert!(matches!(
            DecisionPolicy::evaluate(&p, &requests(&[(A, true)])),
            Err(WorkflowError::InvariantViolation(_))
        ));

        let p = policy(RuleType::SpecificApprover, None, Some(9));
        assert!(matches!(
            DecisionPolicy::evaluate(&p, &requests(&[(A, true)])),
            Err(WorkflowError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_ensure_turn_sequential() {
        let expense = Uuid::nil();
        let reqs = requests(&[(A, true), (P, true), (P, true)]);

        assert_eq!(
            DecisionPolicy::ensure_turn(expense, user(2), RuleType::Sequential, &reqs)
                .unwrap()
                .sequence,
            2
        );
        assert!(matches!(
            DecisionPolicy::ensure_turn(expense, user(3), RuleType::Sequential, &reqs),
            Err(WorkflowError::NotYourTurn {
                sequence: 3,
                live_sequence: 2,
                ..
            })
        ));
        assert!(matches!(
            DecisionPolicy::ensure_turn(expense, user(1), RuleType::Sequential, &reqs),
            Err(WorkflowError::AlreadyResponded { .. })
        ));
        assert!(matches!(
            DecisionPolicy::ensure_turn(expense, user(42), RuleType::Sequential, &reqs),
            Err(WorkflowError::NoSuchRequest { .. })
        ));
    }

    #[test]
    fn test_parallel_rules_any_pending_may_act() {
        let reqs = requests(&[(P, true), (P, true), (P, true)]);
        for r in &reqs {
            assert!(DecisionPolicy::is_actionable(RuleType::Percentage, &reqs, r));
        }
        assert!(DecisionPolicy::is_actionable(RuleType::Sequential, &reqs, &reqs[0]));
        assert!(!DecisionPolicy::is_actionable(RuleType::Sequential, &reqs, &reqs[2]));
    }

    #[rstest]
    #[case(100, 3, 3, true)]
    #[case(100, 2, 3, false)]
    #[case(50, 1, 2, true)]
    #[case(34, 1, 3, false)]
    #[case(33, 1, 3, true)]
    #[case(1, 0, 5, false)]
    fn test_threshold_met(
        #[case] threshold: usize,
        #[case] approved: usize,
        #[case] total: usize,
        #[case] expected: bool,
    ) {
        let tally = Tally {
            approved,
            rejected: 0,
            pending: total - approved,
            total,
        };
        assert_eq!(DecisionPolicy::threshold_met(threshold, &tally), expected);
    }
}
