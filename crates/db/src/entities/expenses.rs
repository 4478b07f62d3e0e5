//! `SeaORM` Entity for expenses table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ExpenseStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub submitter_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: Option<String>,
    pub expense_date: Date,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub converted_amount: Option<Decimal>,
    pub converted_currency: Option<String>,
    pub status: ExpenseStatus,
    pub approval_rule_id: Option<Uuid>,
    pub submitted_at: Option<DateTimeWithTimeZone>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id",
        on_delete = "Cascade"
    )]
    Companies,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SubmitterId",
        to = "super::users::Column::Id"
    )]
    Submitter,
    #[sea_orm(
        belongs_to = "super::approval_rules::Entity",
        from = "Column::ApprovalRuleId",
        to = "super::approval_rules::Column::Id"
    )]
    ApprovalRules,
    #[sea_orm(has_many = "super::approval_requests::Entity")]
    ApprovalRequests,
    #[sea_orm(has_many = "super::approval_history::Entity")]
    ApprovalHistory,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::approval_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRules.def()
    }
}

impl Related<super::approval_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRequests.def()
    }
}

impl Related<super::approval_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
