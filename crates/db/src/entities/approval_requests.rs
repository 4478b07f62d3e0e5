//! `SeaORM` Entity for approval_requests table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::RequestStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    pub sequence: i32,
    pub is_required: bool,
    pub in_pool: bool,
    pub status: RequestStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,
    pub responded_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_delete = "Cascade"
    )]
    Expenses,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ApproverId",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
