//! `SeaORM` Entity for approval_rule_approvers table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_rule_approvers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub rule_id: Uuid,
    pub approver_id: Uuid,
    pub sequence: i32,
    pub is_required: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::approval_rules::Entity",
        from = "Column::RuleId",
        to = "super::approval_rules::Column::Id",
        on_delete = "Cascade"
    )]
    ApprovalRules,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ApproverId",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::approval_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalRules.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
