//! User repository for database operations.
//!
//! Besides plain lookups this is the user directory the workflow consults:
//! approver profiles for rule validation and admin checks, and the manager
//! relation used for manager-first approval steps.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use outlay_core::hierarchy::would_create_cycle;
use outlay_core::workflow::{ApproverProfile, UserRole, WorkflowError};

use crate::entities::{companies, users};

use super::db_error;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Company the user belongs to.
    pub company_id: Uuid,
    /// Login email, unique across companies.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role within the company.
    pub role: UserRole,
    /// Optional manager, who must belong to the same company.
    pub manager_id: Option<Uuid>,
    /// Whether this user approves their reports' expenses first.
    pub is_manager_approver: bool,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The company does not exist
    /// - The manager does not exist or belongs to another company
    /// - Database operation fails
    pub async fn create_user(&self, input: CreateUserInput) -> Result<users::Model, WorkflowError> {
        companies::Entity::find_by_id(input.company_id)
            .one(&self.db)
            .await
            .map_err(db_error)?
            .ok_or(WorkflowError::CompanyNotFound(input.company_id))?;

        let id = Uuid::now_v7();
        if let Some(manager_id) = input.manager_id {
            let manager = self.require(manager_id).await?;
            if manager.company_id != input.company_id {
                return Err(WorkflowError::InvalidManager {
                    user_id: id,
                    manager_id,
                    reason: "manager belongs to another company".to_string(),
                });
            }
        }

        let now = chrono::Utc::now().into();
        let user = users::ActiveModel {
            id: Set(id),
            company_id: Set(input.company_id),
            email: Set(input.email.trim().to_lowercase()),
            full_name: Set(input.full_name.trim().to_string()),
            role: Set(input.role.into()),
            manager_id: Set(input.manager_id),
            is_manager_approver: Set(input.is_manager_approver),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(&self.db).await.map_err(db_error)
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, WorkflowError> {
        users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error)
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<users::Model>, WorkflowError> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await
            .map_err(db_error)
    }

    /// Returns the approver profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user does not exist.
    pub async fn profile(&self, user_id: Uuid) -> Result<ApproverProfile, WorkflowError> {
        self.require(user_id).await.map(|user| to_profile(&user))
    }

    /// Returns the profiles of every existing user among `user_ids`.
    ///
    /// Unknown ids are skipped; rule validation reports them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn profiles(&self, user_ids: &[Uuid]) -> Result<Vec<ApproverProfile>, WorkflowError> {
        load_profiles(&self.db, user_ids).await
    }

    /// Sets whether a manager approves their reports' expenses first.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user does not exist.
    pub async fn set_manager_approver(
        &self,
        user_id: Uuid,
        is_manager_approver: bool,
    ) -> Result<users::Model, WorkflowError> {
        let user = self.require(user_id).await?;
        let mut active: users::ActiveModel = user.into();
        active.is_manager_approver = Set(is_manager_approver);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await.map_err(db_error)
    }

    /// Assigns (or clears) a user's manager.
    ///
    /// # Errors
    ///
    /// Returns `InvalidManager` if the manager belongs to another company or
    /// the assignment would make the user report to themselves, directly or
    /// through a chain of managers.
    pub async fn assign_manager(
        &self,
        user_id: Uuid,
        manager_id: Option<Uuid>,
    ) -> Result<users::Model, WorkflowError> {
        let user = self.require(user_id).await?;

        if let Some(manager_id) = manager_id {
            let manager = self.require(manager_id).await?;
            let refuse = |reason: &str| WorkflowError::InvalidManager {
                user_id,
                manager_id,
                reason: reason.to_string(),
            };

            if manager.company_id != user.company_id {
                return Err(refuse("manager belongs to another company"));
            }

            let managers: HashMap<Uuid, Option<Uuid>> = users::Entity::find()
                .filter(users::Column::CompanyId.eq(user.company_id))
                .all(&self.db)
                .await
                .map_err(db_error)?
                .into_iter()
                .map(|u| (u.id, u.manager_id))
                .collect();

            let lookup = |id: Uuid| managers.get(&id).copied().flatten();
            if would_create_cycle(user_id, manager_id, lookup, managers.len()) {
                return Err(refuse("the manager hierarchy would contain a cycle"));
            }
        }

        let mut active: users::ActiveModel = user.into();
        active.manager_id = Set(manager_id);
        active.updated_at = Set(chrono::Utc::now().into());
        let updated = active.update(&self.db).await.map_err(db_error)?;

        tracing::info!(%user_id, ?manager_id, "Manager assigned");
        Ok(updated)
    }

    async fn require(&self, user_id: Uuid) -> Result<users::Model, WorkflowError> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(db_error)?
            .ok_or(WorkflowError::UserNotFound(user_id))
    }
}

/// Loads approver profiles through any connection or transaction.
pub(crate) async fn load_profiles<C: ConnectionTrait>(
    conn: &C,
    user_ids: &[Uuid],
) -> Result<Vec<ApproverProfile>, WorkflowError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let users = users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids.iter().copied()))
        .all(conn)
        .await
        .map_err(db_error)?;
    Ok(users.iter().map(to_profile).collect())
}

pub(crate) fn to_profile(user: &users::Model) -> ApproverProfile {
    ApproverProfile {
        user_id: user.id,
        company_id: user.company_id,
        role: user.role.into(),
    }
}
