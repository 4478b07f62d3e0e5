//! `SeaORM` Entity for approval_history table.
//!
//! Append-only. Rows are inserted by the workflow engine and never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_id: Uuid,
    /// "SYSTEM" or the acting user's id.
    pub actor: String,
    pub action: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,
    pub metadata: Json,
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
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
