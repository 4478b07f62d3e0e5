//! Company repository for database operations.

use outlay_shared::CurrencyCode;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::companies;

/// Company repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    db: DatabaseConnection,
}

impl CompanyRepository {
    /// Creates a new company repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a company with its base currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create_company(
        &self,
        name: &str,
        currency: &CurrencyCode,
    ) -> Result<companies::Model, DbErr> {
        let company = companies::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.trim().to_string()),
            currency: Set(currency.as_str().to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        company.insert(&self.db).await
    }

    /// Finds a company by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<companies::Model>, DbErr> {
        companies::Entity::find_by_id(id).one(&self.db).await
    }
}
