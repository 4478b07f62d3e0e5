//! `SeaORM` Entity for approval_rules table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::RuleType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub rule_type: RuleType,
    pub percentage_threshold: Option<i32>,
    pub specific_approver_id: Option<Uuid>,
    pub is_hybrid: bool,
    pub priority: i32,
    pub is_active: bool,
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
        from = "Column::SpecificApproverId",
        to = "super::users::Column::Id"
    )]
    SpecificApprover,
    #[sea_orm(has_many = "super::approval_rule_approvers::Entity")]
    ApprovalRuleApprovers,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::approval_rule_approvers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRuleApprovers.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
