//! Workflow engine for expense approval.
//!
//! Drives an expense from submission to resolution: selects the governing
//! rule, materialises the approval requests, records each decision and asks
//! the decision policy whether the expense resolves. Every step writes its
//! audit entry in the same transaction as the state change.
//!
//! Currency conversion runs after the resolving transaction commits, so no
//! row lock is held across the converter call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use outlay_core::currency::{Conversion, CurrencyConverter};
use outlay_core::workflow::{
    ApprovalChain, AuditEntry, Decision, DecisionPolicy, ExpenseStatus as CoreExpenseStatus,
    PolicyOutcome, RequestState, Tally, WorkflowAction, WorkflowError, WorkflowService,
};
use outlay_shared::CurrencyCode;

use crate::entities::{
    approval_history, approval_requests, approval_rules, companies, expenses,
    sea_orm_active_enums::{ExpenseStatus, RequestStatus, RuleType},
    users,
};

use super::approval_history::ApprovalHistoryRepository;
use super::approval_rule::{active_rule, rule_approvers, to_policy};
use super::db_error;
use super::expense::{CreateExpenseInput, insert_draft, lock_expense};

/// Comment written on requests cancelled by a rejection.
const CANCELLED_BY_REJECTION: &str = "Cancelled: expense was rejected";

/// A submitted expense with the rule and requests generated for it.
#[derive(Debug, Clone)]
pub struct SubmittedExpense {
    /// Expense, now PENDING.
    pub expense: expenses::Model,
    /// Rule governing the workflow.
    pub rule: approval_rules::Model,
    /// Generated requests in sequence order.
    pub requests: Vec<approval_requests::Model>,
}

/// What happened to the company-currency amount on resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The expense was already in the company currency.
    SameCurrency,
    /// The converter produced an amount.
    Converted(Conversion),
    /// The converter failed; the failure is in the audit trail.
    Failed(String),
}

/// Result of a decision or an override.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// Expense after the decision (and conversion, if any).
    pub expense: expenses::Model,
    /// Resulting expense status.
    pub status: CoreExpenseStatus,
    /// What the policy concluded.
    pub outcome: PolicyOutcome,
    /// Present when the decision resolved the expense.
    pub conversion: Option<ConversionOutcome>,
}

/// A request the approver can act on now, with its expense.
#[derive(Debug, Clone)]
pub struct ActionableRequest {
    /// The open request.
    pub request: approval_requests::Model,
    /// The pending expense it belongs to.
    pub expense: expenses::Model,
}

/// Conversion owed once the resolving transaction has committed.
#[derive(Debug, Clone)]
pub(super) struct PendingConversion {
    expense_id: Uuid,
    amount: Decimal,
    from: CurrencyCode,
    to: CurrencyCode,
}

/// Where the company-currency amount stands after a transaction.
#[derive(Debug, Clone)]
pub(super) enum Settlement {
    /// The expense is still pending.
    Unresolved,
    /// Resolved, converted amount already written.
    Settled,
    /// Resolved, conversion still owed.
    Owed(PendingConversion),
}

/// Approval workflow engine.
pub struct WorkflowEngine<C> {
    pub(super) db: DatabaseConnection,
    pub(super) converter: Arc<C>,
}

impl<C> Clone for WorkflowEngine<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            converter: Arc::clone(&self.converter),
        }
    }
}

impl<C: CurrencyConverter> WorkflowEngine<C> {
    /// Creates a new workflow engine.
    #[must_use]
    pub const fn new(db: DatabaseConnection, converter: Arc<C>) -> Self {
        Self { db, converter }
    }

    /// Submits a draft expense for approval.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Expense is not found
    /// - Expense is not in draft status
    /// - The company has no active approval rule
    /// - The rule's approvers are corrupt
    pub async fn submit(&self, expense_id: Uuid) -> Result<SubmittedExpense, WorkflowError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let expense = lock_expense(&txn, expense_id).await?;
        let action =
            WorkflowService::submit(expense_id, expense.status.into(), expense.submitter_id)?;
        let submitted = instantiate(&txn, expense, &action).await?;

        txn.commit().await.map_err(db_error)?;
        Ok(submitted)
    }

    /// Creates an expense and submits it in one transaction.
    ///
    /// Nothing is written if the submission fails.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of `create_draft` and those of `submit`.
    pub async fn create_and_submit(
        &self,
        input: CreateExpenseInput,
    ) -> Result<SubmittedExpense, WorkflowError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let expense = insert_draft(&txn, input).await?;
        let action =
            WorkflowService::submit(expense.id, expense.status.into(), expense.submitter_id)?;
        let submitted = instantiate(&txn, expense, &action).await?;

        txn.commit().await.map_err(db_error)?;
        Ok(submitted)
    }

    /// Records an approver's decision and resolves the expense if the rule
    /// says so.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Expense is not found or not pending
    /// - The approver holds no request, or already answered it
    /// - A sequential chain has not reached the approver yet
    /// - The stored workflow state is inconsistent
    pub async fn decide(
        &self,
        expense_id: Uuid,
        approver_id: Uuid,
        decision: Decision,
        comments: Option<&str>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let expense = lock_expense(&txn, expense_id).await?;
        let status: CoreExpenseStatus = expense.status.into();
        WorkflowService::ensure_pending(expense_id, status)?;

        let rule = governing_rule(&txn, &expense).await?;
        let policy = to_policy(&rule);
        let rows = load_requests(&txn, expense_id).await?;
        let mut states: Vec<RequestState> = rows.iter().map(to_state).collect();

        DecisionPolicy::ensure_turn(expense_id, approver_id, policy.rule_type, &states)?;
        let request_id = rows
            .iter()
            .find(|r| r.approver_id == approver_id)
            .map(|r| r.id)
            .ok_or(WorkflowError::NoSuchRequest {
                expense_id,
                approver_id,
            })?;

        let comments = comments
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);

        if !answer_request(&txn, request_id, decision, comments.clone()).await? {
            return Err(WorkflowError::AlreadyResponded {
                expense_id,
                approver_id,
            });
        }

        for state in states.iter_mut().filter(|s| s.approver_id == approver_id) {
            state.status = decision.request_status();
        }
        let outcome = DecisionPolicy::evaluate(&policy, &states)?;
        let tally = Tally::of(&states);

        ApprovalHistoryRepository::record(
            &txn,
            &AuditEntry::decision(
                expense_id,
                approver_id,
                decision,
                comments.as_deref(),
                &policy,
                &tally,
                &outcome,
            ),
        )
        .await?;

        let (expense, settlement) =
            match WorkflowService::resolve(expense_id, status, &outcome, approver_id)? {
                Some(action) => {
                    if action.new_status() == CoreExpenseStatus::Rejected {
                        cancel_open_requests(&txn, expense_id, CANCELLED_BY_REJECTION).await?;
                    }
                    resolve_expense(&txn, expense, &action).await?
                }
                None => (expense, Settlement::Unresolved),
            };

        txn.commit().await.map_err(db_error)?;

        tracing::info!(
            %expense_id,
            %approver_id,
            decision = decision.as_str(),
            outcome = outcome.as_str(),
            approved = tally.approved,
            total = tally.total,
            "Approval decision recorded"
        );

        self.finish(expense, outcome, settlement).await
    }

    /// Lists an expense's approval requests in sequence order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn requests_for(
        &self,
        expense_id: Uuid,
    ) -> Result<Vec<approval_requests::Model>, WorkflowError> {
        load_requests(&self.db, expense_id).await
    }

    /// Lists the requests an approver can act on right now.
    ///
    /// Sequential chains only offer their live step.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn actionable_requests(
        &self,
        approver_id: Uuid,
    ) -> Result<Vec<ActionableRequest>, WorkflowError> {
        let open = approval_requests::Entity::find()
            .filter(approval_requests::Column::ApproverId.eq(approver_id))
            .filter(approval_requests::Column::Status.eq(RequestStatus::Pending))
            .find_also_related(expenses::Entity)
            .order_by_asc(approval_requests::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_error)?;

        let mut actionable = Vec::with_capacity(open.len());
        for (request, expense) in open {
            let Some(expense) = expense.filter(|e| e.status == ExpenseStatus::Pending) else {
                continue;
            };
            let rule = governing_rule(&self.db, &expense).await?;
            if rule.rule_type == RuleType::Sequential {
                let states: Vec<RequestState> = load_requests(&self.db, expense.id)
                    .await?
                    .iter()
                    .map(to_state)
                    .collect();
                let own = to_state(&request);
                if !DecisionPolicy::is_actionable(rule.rule_type.into(), &states, &own) {
                    continue;
                }
            }
            actionable.push(ActionableRequest { request, expense });
        }
        Ok(actionable)
    }

    /// Returns an expense's audit trail in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn history(
        &self,
        expense_id: Uuid,
    ) -> Result<Vec<approval_history::Model>, WorkflowError> {
        ApprovalHistoryRepository::new(self.db.clone())
            .history(expense_id)
            .await
    }

    /// Runs the conversion owed by a resolution and builds the outcome.
    pub(super) async fn finish(
        &self,
        expense: expenses::Model,
        outcome: PolicyOutcome,
        settlement: Settlement,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let (expense, conversion) = match settlement {
            Settlement::Unresolved => (expense, None),
            Settlement::Settled => (expense, Some(ConversionOutcome::SameCurrency)),
            Settlement::Owed(pending) => {
                let (expense, conversion) = self.convert(pending).await?;
                (expense, Some(conversion))
            }
        };

        Ok(DecisionOutcome {
            status: expense.status.into(),
            expense,
            outcome,
            conversion,
        })
    }

    /// Calls the converter, then records the result under a fresh lock.
    async fn convert(
        &self,
        pending: PendingConversion,
    ) -> Result<(expenses::Model, ConversionOutcome), WorkflowError> {
        let PendingConversion {
            expense_id,
            amount,
            from,
            to,
        } = pending;

        let result = self.converter.convert(amount, &from, &to).await;

        let txn = self.db.begin().await.map_err(db_error)?;
        let expense = lock_expense(&txn, expense_id).await?;

        let (expense, outcome) = match result {
            Ok(conversion) => {
                let mut active: expenses::ActiveModel = expense.into();
                active.converted_amount = Set(Some(conversion.converted));
                active.converted_currency = Set(Some(to.as_str().to_string()));
                active.updated_at = Set(Utc::now().into());
                let expense = active.update(&txn).await.map_err(db_error)?;

                ApprovalHistoryRepository::record(
                    &txn,
                    &AuditEntry::converted(
                        expense_id,
                        amount,
                        &from,
                        conversion.converted,
                        &to,
                        conversion.rate,
                    ),
                )
                .await?;
                (expense, ConversionOutcome::Converted(conversion))
            }
            Err(err) => {
                let failure = WorkflowError::CurrencyConversionFailed(err.to_string());
                tracing::warn!(
                    %expense_id,
                    from = from.as_str(),
                    to = to.as_str(),
                    error = %failure,
                    "Currency conversion failed, converted amount left unset"
                );
                ApprovalHistoryRepository::record(
                    &txn,
                    &AuditEntry::conversion_failed(expense_id, &from, &to, &err.to_string()),
                )
                .await?;
                (expense, ConversionOutcome::Failed(err.to_string()))
            }
        };

        txn.commit().await.map_err(db_error)?;
        Ok((expense, outcome))
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

/// Selects the rule, writes the requests and moves the expense to PENDING.
async fn instantiate(
    txn: &DatabaseTransaction,
    expense: expenses::Model,
    action: &WorkflowAction,
) -> Result<SubmittedExpense, WorkflowError> {
    let expense_id = expense.id;
    let rule = active_rule(txn, expense.company_id)
        .await?
        .ok_or(WorkflowError::NoApplicableRule {
            company_id: expense.company_id,
        })?;
    let policy = to_policy(&rule);
    let approvers = rule_approvers(txn, rule.id).await?;
    let manager = manager_step(txn, &expense).await?;
    let chain = ApprovalChain::plan(&policy, &approvers, manager)?;

    let created_at: DateTimeWithTimeZone = action.occurred_at().into();
    let mut requests = Vec::with_capacity(chain.len());
    for step in chain.steps() {
        let request = approval_requests::ActiveModel {
            id: Set(Uuid::now_v7()),
            expense_id: Set(expense_id),
            approver_id: Set(step.approver_id),
            sequence: Set(step.sequence),
            is_required: Set(step.is_required),
            in_pool: Set(step.in_pool),
            status: Set(RequestStatus::Pending),
            comments: Set(None),
            responded_at: Set(None),
            created_at: Set(created_at),
        }
        .insert(txn)
        .await
        .map_err(db_error)?;
        requests.push(request);
    }

    let submitter_id = expense.submitter_id;
    let mut active: expenses::ActiveModel = expense.into();
    active.status = Set(action.new_status().into());
    active.approval_rule_id = Set(Some(rule.id));
    active.submitted_at = Set(Some(created_at));
    active.updated_at = Set(created_at);
    let expense = active.update(txn).await.map_err(db_error)?;

    let submitted = AuditEntry::submitted(expense_id, submitter_id, &policy);
    ApprovalHistoryRepository::record(txn, &submitted).await?;
    let created = AuditEntry::chain_created(expense_id, &policy, &chain);
    ApprovalHistoryRepository::record(txn, &created).await?;

    tracing::info!(
        %expense_id,
        rule_id = %rule.id,
        rule_type = %policy.rule_type,
        requests = requests.len(),
        pool = requests.iter().filter(|r| r.in_pool).count(),
        "Expense submitted for approval"
    );

    Ok(SubmittedExpense {
        expense,
        rule,
        requests,
    })
}

/// The submitter's manager, if they approve their reports' expenses first.
async fn manager_step(
    txn: &DatabaseTransaction,
    expense: &expenses::Model,
) -> Result<Option<Uuid>, WorkflowError> {
    let submitter = users::Entity::find_by_id(expense.submitter_id)
        .one(txn)
        .await
        .map_err(db_error)?
        .ok_or(WorkflowError::UserNotFound(expense.submitter_id))?;

    let Some(manager_id) = submitter.manager_id else {
        return Ok(None);
    };
    let manager = users::Entity::find_by_id(manager_id)
        .one(txn)
        .await
        .map_err(db_error)?;

    Ok(manager
        .filter(|m| {
            m.is_manager_approver
                && m.company_id == expense.company_id
                && outlay_core::workflow::UserRole::from(m.role).can_approve()
        })
        .map(|m| m.id))
}

async fn governing_rule<C: ConnectionTrait>(
    conn: &C,
    expense: &expenses::Model,
) -> Result<approval_rules::Model, WorkflowError> {
    let rule_id = expense.approval_rule_id.ok_or_else(|| {
        WorkflowError::InvariantViolation(format!(
            "pending expense {} has no approval rule",
            expense.id
        ))
    })?;
    approval_rules::Entity::find_by_id(rule_id)
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            WorkflowError::InvariantViolation(format!(
                "expense {} references missing rule {rule_id}",
                expense.id
            ))
        })
}

async fn load_requests<C: ConnectionTrait>(
    conn: &C,
    expense_id: Uuid,
) -> Result<Vec<approval_requests::Model>, WorkflowError> {
    approval_requests::Entity::find()
        .filter(approval_requests::Column::ExpenseId.eq(expense_id))
        .order_by_asc(approval_requests::Column::Sequence)
        .all(conn)
        .await
        .map_err(db_error)
}

fn to_state(request: &approval_requests::Model) -> RequestState {
    RequestState {
        approver_id: request.approver_id,
        sequence: request.sequence,
        in_pool: request.in_pool,
        status: request.status.into(),
    }
}

/// Rejects every still-pending request and records one cancellation entry.
pub(super) async fn cancel_open_requests(
    txn: &DatabaseTransaction,
    expense_id: Uuid,
    reason: &str,
) -> Result<Vec<Uuid>, WorkflowError> {
    let open: Vec<Uuid> = approval_requests::Entity::find()
        .filter(approval_requests::Column::ExpenseId.eq(expense_id))
        .filter(approval_requests::Column::Status.eq(RequestStatus::Pending))
        .order_by_asc(approval_requests::Column::Sequence)
        .all(txn)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|r| r.approver_id)
        .collect();
    if open.is_empty() {
        return Ok(open);
    }

    approval_requests::Entity::update_many()
        .set(approval_requests::ActiveModel {
            status: Set(RequestStatus::Rejected),
            comments: Set(Some(reason.to_string())),
            responded_at: Set(Some(Utc::now().into())),
            ..Default::default()
        })
        .filter(approval_requests::Column::ExpenseId.eq(expense_id))
        .filter(approval_requests::Column::Status.eq(RequestStatus::Pending))
        .exec(txn)
        .await
        .map_err(db_error)?;

    let cancelled = AuditEntry::requests_cancelled(expense_id, &open, reason);
    ApprovalHistoryRepository::record(txn, &cancelled).await?;
    Ok(open)
}

/// Writes the terminal status, conditional on the expense still pending.
///
/// Same-currency expenses get their converted amount here; otherwise the
/// conversion owed is returned for after the commit.
pub(super) async fn resolve_expense(
    txn: &DatabaseTransaction,
    expense: expenses::Model,
    action: &WorkflowAction,
) -> Result<(expenses::Model, Settlement), WorkflowError> {
    let expense_id = expense.id;
    let company = companies::Entity::find_by_id(expense.company_id)
        .one(txn)
        .await
        .map_err(db_error)?
        .ok_or(WorkflowError::CompanyNotFound(expense.company_id))?;

    let from = stored_code(&expense.currency, expense_id)?;
    let to = stored_code(&company.currency, expense_id)?;
    let same_currency = from == to;

    let resolved_at: DateTime<Utc> = action.occurred_at();
    let mut update = expenses::ActiveModel {
        status: Set(action.new_status().into()),
        resolved_at: Set(Some(resolved_at.into())),
        updated_at: Set(resolved_at.into()),
        ..Default::default()
    };
    if same_currency {
        update.converted_amount = Set(Some(expense.amount));
        update.converted_currency = Set(Some(to.as_str().to_string()));
    }

    if !mark_resolved(txn, expense_id, update).await? {
        let current = lock_expense(txn, expense_id).await?;
        return Err(WorkflowError::ExpenseNotPending {
            expense_id,
            status: current.status.into(),
        });
    }

    let expense = lock_expense(txn, expense_id).await?;
    tracing::info!(%expense_id, status = %action.new_status(), "Expense resolved");

    let settlement = if same_currency {
        Settlement::Settled
    } else {
        Settlement::Owed(PendingConversion {
            expense_id,
            amount: expense.amount,
            from,
            to,
        })
    };
    Ok((expense, settlement))
}

/// Answers a request only if it is still pending. Returns whether it was.
pub(crate) async fn answer_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    decision: Decision,
    comments: Option<String>,
) -> Result<bool, WorkflowError> {
    let answered = approval_requests::Entity::update_many()
        .set(approval_requests::ActiveModel {
            status: Set(decision.request_status().into()),
            comments: Set(comments),
            responded_at: Set(Some(Utc::now().into())),
            ..Default::default()
        })
        .filter(approval_requests::Column::Id.eq(request_id))
        .filter(approval_requests::Column::Status.eq(RequestStatus::Pending))
        .exec(conn)
        .await
        .map_err(db_error)?;
    Ok(answered.rows_affected > 0)
}

/// Writes a terminal status only if the expense is still pending. Returns
/// whether it was.
pub(crate) async fn mark_resolved<C: ConnectionTrait>(
    conn: &C,
    expense_id: Uuid,
    update: expenses::ActiveModel,
) -> Result<bool, WorkflowError> {
    let written = expenses::Entity::update_many()
        .set(update)
        .filter(expenses::Column::Id.eq(expense_id))
        .filter(expenses::Column::Status.eq(ExpenseStatus::Pending))
        .exec(conn)
        .await
        .map_err(db_error)?;
    Ok(written.rows_affected > 0)
}

fn stored_code(code: &str, expense_id: Uuid) -> Result<CurrencyCode, WorkflowError> {
    CurrencyCode::new(code).map_err(|e| {
        WorkflowError::InvariantViolation(format!("expense {expense_id}: {e}"))
    })
}
