//! `SeaORM` entity definitions.

pub mod prelude;

pub mod approval_history;
pub mod approval_requests;
pub mod approval_rule_approvers;
pub mod approval_rules;
pub mod companies;
pub mod exchange_rates;
pub mod expenses;
pub mod sea_orm_active_enums;
pub mod users;
