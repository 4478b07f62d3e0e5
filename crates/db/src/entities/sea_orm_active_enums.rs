//! `SeaORM` active enums for the string-typed status and kind columns.
//!
//! Stored as upper-case strings so the schema stays portable between
//! Postgres and SQLite.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

use outlay_core::workflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum UserRole {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "MANAGER")]
    Manager,
    #[sea_orm(string_value = "EMPLOYEE")]
    Employee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ExpenseStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RequestStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RuleType {
    #[sea_orm(string_value = "SEQUENTIAL")]
    Sequential,
    #[sea_orm(string_value = "PERCENTAGE")]
    Percentage,
    #[sea_orm(string_value = "SPECIFIC_APPROVER")]
    SpecificApprover,
    #[sea_orm(string_value = "HYBRID")]
    Hybrid,
}

// ============================================================================
// Conversions to and from the core domain enums
// ============================================================================

impl From<UserRole> for workflow::UserRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Self::Admin,
            UserRole::Manager => Self::Manager,
            UserRole::Employee => Self::Employee,
        }
    }
}

impl From<workflow::UserRole> for UserRole {
    fn from(role: workflow::UserRole) -> Self {
        match role {
            workflow::UserRole::Admin => Self::Admin,
            workflow::UserRole::Manager => Self::Manager,
            workflow::UserRole::Employee => Self::Employee,
        }
    }
}

impl From<ExpenseStatus> for workflow::ExpenseStatus {
    fn from(status: ExpenseStatus) -> Self {
        match status {
            ExpenseStatus::Draft => Self::Draft,
            ExpenseStatus::Pending => Self::Pending,
            ExpenseStatus::Approved => Self::Approved,
            ExpenseStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<workflow::ExpenseStatus> for ExpenseStatus {
    fn from(status: workflow::ExpenseStatus) -> Self {
        match status {
            workflow::ExpenseStatus::Draft => Self::Draft,
            workflow::ExpenseStatus::Pending => Self::Pending,
            workflow::ExpenseStatus::Approved => Self::Approved,
            workflow::ExpenseStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<RequestStatus> for workflow::RequestStatus {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Pending => Self::Pending,
            RequestStatus::Approved => Self::Approved,
            RequestStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<workflow::RequestStatus> for RequestStatus {
    fn from(status: workflow::RequestStatus) -> Self {
        match status {
            workflow::RequestStatus::Pending => Self::Pending,
            workflow::RequestStatus::Approved => Self::Approved,
            workflow::RequestStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<RuleType> for workflow::RuleType {
    fn from(rule_type: RuleType) -> Self {
        match rule_type {
            RuleType::Sequential => Self::Sequential,
            RuleType::Percentage => Self::Percentage,
            RuleType::SpecificApprover => Self::SpecificApprover,
            RuleType::Hybrid => Self::Hybrid,
        }
    }
}

impl From<workflow::RuleType> for RuleType {
    fn from(rule_type: workflow::RuleType) -> Self {
        match rule_type {
            workflow::RuleType::Sequential => Self::Sequential,
            workflow::RuleType::Percentage => Self::Percentage,
            workflow::RuleType::SpecificApprover => Self::SpecificApprover,
            workflow::RuleType::Hybrid => Self::Hybrid,
        }
    }
}
