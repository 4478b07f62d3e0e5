//! Approval Rule Repository
//!
//! Persists approval rules and their ordered approver lists. Rules are
//! validated by `RuleValidator` before anything is written; a rule and its
//! approvers are always written in one transaction.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use outlay_core::workflow::{
    RuleApprover, RuleDraft, RulePolicy, RuleType, RuleValidator, WorkflowError,
};

use crate::entities::{
    approval_requests, approval_rule_approvers, approval_rules, expenses,
    sea_orm_active_enums::{ExpenseStatus, RequestStatus},
};

use super::db_error;
use super::user::load_profiles;

/// An approval rule with its approvers ordered by sequence.
#[derive(Debug, Clone)]
pub struct RuleWithApprovers {
    /// The rule row.
    pub rule: approval_rules::Model,
    /// Approvers in sequence order.
    pub approvers: Vec<RuleApprover>,
}

/// Input for updating an approval rule. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleInput {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New rule type.
    pub rule_type: Option<RuleType>,
    /// New percentage threshold.
    pub percentage_threshold: Option<Option<i32>>,
    /// New specific approver.
    pub specific_approver_id: Option<Option<Uuid>>,
    /// New priority.
    pub priority: Option<i32>,
    /// Replacement approver list.
    pub approvers: Option<Vec<RuleApprover>>,
}

/// Repository for approval rule operations.
#[derive(Debug, Clone)]
pub struct ApprovalRuleRepository {
    db: DatabaseConnection,
}

impl ApprovalRuleRepository {
    /// Creates a new ApprovalRuleRepository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Validates and creates an approval rule with its approvers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleConfig` or `InvalidApprover` if validation fails.
    pub async fn create_rule(&self, draft: RuleDraft) -> Result<RuleWithApprovers, WorkflowError> {
        validate_draft(&self.db, &draft).await?;

        let txn = self.db.begin().await.map_err(db_error)?;

        let now = chrono::Utc::now().into();
        let rule = approval_rules::ActiveModel {
            id: Set(Uuid::now_v7()),
            company_id: Set(draft.company_id),
            name: Set(draft.name.trim().to_string()),
            description: Set(draft.description.clone()),
            rule_type: Set(draft.rule_type.into()),
            percentage_threshold: Set(draft.percentage_threshold),
            specific_approver_id: Set(draft.specific_approver_id),
            is_hybrid: Set(draft.rule_type == RuleType::Hybrid),
            priority: Set(draft.priority),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;

        insert_approvers(&txn, rule.id, &draft.approvers).await?;
        txn.commit().await.map_err(db_error)?;

        tracing::info!(
            rule_id = %rule.id,
            company_id = %rule.company_id,
            rule_type = %draft.rule_type,
            approvers = draft.approvers.len(),
            "Approval rule created"
        );

        Ok(RuleWithApprovers {
            rule,
            approvers: sorted(draft.approvers),
        })
    }

    /// Updates an approval rule, re-validating the merged result.
    ///
    /// The rule row is locked first, so the in-use check and the write see
    /// the same state as any submission racing against the edit.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The rule is not found in the company
    /// - A pending expense governed by the rule still has open requests
    /// - The merged rule fails validation
    pub async fn update_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
        input: UpdateRuleInput,
    ) -> Result<RuleWithApprovers, WorkflowError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let existing = lock_rule(&txn, company_id, rule_id).await?;
        ensure_not_in_use(&txn, rule_id).await?;

        let replace_approvers = input.approvers.is_some();
        let approvers = match input.approvers {
            Some(approvers) => approvers,
            None => rule_approvers(&txn, rule_id).await?,
        };
        let draft = RuleDraft {
            company_id,
            name: input.name.unwrap_or(existing.name.clone()),
            description: input.description.unwrap_or(existing.description.clone()),
            rule_type: input
                .rule_type
                .unwrap_or_else(|| existing.rule_type.into()),
            percentage_threshold: input
                .percentage_threshold
                .unwrap_or(existing.percentage_threshold),
            specific_approver_id: input
                .specific_approver_id
                .unwrap_or(existing.specific_approver_id),
            priority: input.priority.unwrap_or(existing.priority),
            approvers,
        };
        validate_draft(&txn, &draft).await?;

        let mut active: approval_rules::ActiveModel = existing.into();
        active.name = Set(draft.name.trim().to_string());
        active.description = Set(draft.description.clone());
        active.rule_type = Set(draft.rule_type.into());
        active.percentage_threshold = Set(draft.percentage_threshold);
        active.specific_approver_id = Set(draft.specific_approver_id);
        active.is_hybrid = Set(draft.rule_type == RuleType::Hybrid);
        active.priority = Set(draft.priority);
        active.updated_at = Set(chrono::Utc::now().into());
        let rule = active.update(&txn).await.map_err(db_error)?;

        if replace_approvers {
            approval_rule_approvers::Entity::delete_many()
                .filter(approval_rule_approvers::Column::RuleId.eq(rule_id))
                .exec(&txn)
                .await
                .map_err(db_error)?;
            insert_approvers(&txn, rule_id, &draft.approvers).await?;
        }

        txn.commit().await.map_err(db_error)?;
        tracing::info!(%rule_id, "Approval rule updated");

        Ok(RuleWithApprovers {
            rule,
            approvers: sorted(draft.approvers),
        })
    }

    /// Soft deletes an approval rule by setting is_active to false.
    ///
    /// Resolved expenses keep pointing at the rule that governed them.
    ///
    /// # Errors
    ///
    /// Returns `RuleInUse` while a pending expense under the rule has open
    /// requests, `RuleNotFound` if the rule is unknown.
    pub async fn delete_rule(&self, company_id: Uuid, rule_id: Uuid) -> Result<(), WorkflowError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let existing = lock_rule(&txn, company_id, rule_id).await?;
        ensure_not_in_use(&txn, rule_id).await?;

        let mut rule: approval_rules::ActiveModel = existing.into();
        rule.is_active = Set(false);
        rule.updated_at = Set(chrono::Utc::now().into());
        rule.update(&txn).await.map_err(db_error)?;

        txn.commit().await.map_err(db_error)?;
        tracing::info!(%rule_id, "Approval rule deactivated");
        Ok(())
    }

    /// Gets a specific approval rule by ID, with its approvers.
    ///
    /// # Errors
    ///
    /// Returns `RuleNotFound` if the rule does not exist in the company.
    pub async fn get_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
    ) -> Result<RuleWithApprovers, WorkflowError> {
        let rule = approval_rules::Entity::find_by_id(rule_id)
            .filter(approval_rules::Column::CompanyId.eq(company_id))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .ok_or(WorkflowError::RuleNotFound(rule_id))?;
        let approvers = rule_approvers(&self.db, rule_id).await?;

        Ok(RuleWithApprovers { rule, approvers })
    }

    /// Lists all active approval rules for a company in selection order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_rules(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<approval_rules::Model>, WorkflowError> {
        approval_rules::Entity::find()
            .filter(approval_rules::Column::CompanyId.eq(company_id))
            .filter(approval_rules::Column::IsActive.eq(true))
            .order_by_asc(approval_rules::Column::Priority)
            .order_by_asc(approval_rules::Column::CreatedAt)
            .order_by_asc(approval_rules::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_error)
    }

    /// Returns the rule that governs new submissions in a company.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_active_rule(
        &self,
        company_id: Uuid,
    ) -> Result<Option<approval_rules::Model>, WorkflowError> {
        active_rule(&self.db, company_id).await
    }

    /// Returns a rule's approvers ordered by sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_approvers(&self, rule_id: Uuid) -> Result<Vec<RuleApprover>, WorkflowError> {
        rule_approvers(&self.db, rule_id).await
    }
}

async fn validate_draft<C: ConnectionTrait>(
    conn: &C,
    draft: &RuleDraft,
) -> Result<(), WorkflowError> {
    let referenced = RuleValidator::referenced_users(draft);
    let profiles = load_profiles(conn, &referenced).await?;
    RuleValidator::validate(draft, &profiles)
}

/// Loads a company's rule for writing.
///
/// Postgres takes a row lock that submissions selecting the rule wait on.
/// SQLite claims the database write lock with a no-op update first.
async fn lock_rule<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
    rule_id: Uuid,
) -> Result<approval_rules::Model, WorkflowError> {
    let mut query = approval_rules::Entity::find_by_id(rule_id)
        .filter(approval_rules::Column::CompanyId.eq(company_id));
    match conn.get_database_backend() {
        DbBackend::Postgres => query = query.lock_exclusive(),
        _ => {
            approval_rules::Entity::update_many()
                .col_expr(
                    approval_rules::Column::UpdatedAt,
                    Expr::col(approval_rules::Column::UpdatedAt).into(),
                )
                .filter(approval_rules::Column::Id.eq(rule_id))
                .exec(conn)
                .await
                .map_err(db_error)?;
        }
    }
    query
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or(WorkflowError::RuleNotFound(rule_id))
}

/// Fails while any pending expense under the rule still waits on a request.
async fn ensure_not_in_use<C: ConnectionTrait>(
    conn: &C,
    rule_id: Uuid,
) -> Result<(), WorkflowError> {
    let pending: Vec<Uuid> = expenses::Entity::find()
        .filter(expenses::Column::ApprovalRuleId.eq(rule_id))
        .filter(expenses::Column::Status.eq(ExpenseStatus::Pending))
        .all(conn)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let open = approval_requests::Entity::find()
        .filter(approval_requests::Column::ExpenseId.is_in(pending))
        .filter(approval_requests::Column::Status.eq(RequestStatus::Pending))
        .count(conn)
        .await
        .map_err(db_error)?;

    if open > 0 {
        return Err(WorkflowError::RuleInUse(rule_id));
    }
    Ok(())
}

/// Selects the active rule with the lowest priority value.
///
/// On Postgres the row is share locked, so an edit of the same rule waits
/// until the selecting transaction commits.
pub(crate) async fn active_rule<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
) -> Result<Option<approval_rules::Model>, WorkflowError> {
    let mut query = approval_rules::Entity::find()
        .filter(approval_rules::Column::CompanyId.eq(company_id))
        .filter(approval_rules::Column::IsActive.eq(true))
        .order_by_asc(approval_rules::Column::Priority)
        .order_by_asc(approval_rules::Column::CreatedAt)
        .order_by_asc(approval_rules::Column::Id);
    if conn.get_database_backend() == DbBackend::Postgres {
        query = query.lock_shared();
    }
    query.one(conn).await.map_err(db_error)
}

pub(crate) async fn rule_approvers<C: ConnectionTrait>(
    conn: &C,
    rule_id: Uuid,
) -> Result<Vec<RuleApprover>, WorkflowError> {
    let rows = approval_rule_approvers::Entity::find()
        .filter(approval_rule_approvers::Column::RuleId.eq(rule_id))
        .order_by_asc(approval_rule_approvers::Column::Sequence)
        .all(conn)
        .await
        .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|row| RuleApprover {
            approver_id: row.approver_id,
            sequence: row.sequence,
            is_required: row.is_required,
        })
        .collect())
}

pub(crate) fn to_policy(rule: &approval_rules::Model) -> RulePolicy {
    RulePolicy {
        rule_id: rule.id,
        rule_type: rule.rule_type.into(),
        percentage_threshold: rule.percentage_threshold,
        specific_approver_id: rule.specific_approver_id,
    }
}

async fn insert_approvers<C: ConnectionTrait>(
    conn: &C,
    rule_id: Uuid,
    approvers: &[RuleApprover],
) -> Result<(), WorkflowError> {
    if approvers.is_empty() {
        return Ok(());
    }
    let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();
    let rows = approvers.iter().map(|a| approval_rule_approvers::ActiveModel {
        id: Set(Uuid::now_v7()),
        rule_id: Set(rule_id),
        approver_id: Set(a.approver_id),
        sequence: Set(a.sequence),
        is_required: Set(a.is_required),
        created_at: Set(now),
    });
    approval_rule_approvers::Entity::insert_many(rows)
        .exec(conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

fn sorted(mut approvers: Vec<RuleApprover>) -> Vec<RuleApprover> {
    approvers.sort_by_key(|a| a.sequence);
    approvers
}
