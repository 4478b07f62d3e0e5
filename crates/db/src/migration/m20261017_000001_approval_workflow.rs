//! Approval workflow schema.
//!
//! Creates companies, users, expenses, approval rules with their approver
//! lists, approval requests, the approval history ledger and exchange rates.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Companies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Companies::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Companies::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Companies::Currency).string_len(3).not_null())
                    .col(timestamp(Companies::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Users::Email).string_len(255).not_null())
                    .col(ColumnDef::new(Users::FullName).string_len(255).not_null())
                    .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                    .col(ColumnDef::new(Users::ManagerId).uuid().null())
                    .col(
                        ColumnDef::new(Users::IsManagerApprover)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp(Users::CreatedAt))
                    .col(timestamp(Users::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_company")
                            .from(Users::Table, Users::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_manager")
                            .from(Users::Table, Users::ManagerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalRules::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ApprovalRules::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ApprovalRules::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRules::Name).string_len(255).not_null())
                    .col(ColumnDef::new(ApprovalRules::Description).text().null())
                    .col(ColumnDef::new(ApprovalRules::RuleType).string_len(32).not_null())
                    .col(ColumnDef::new(ApprovalRules::PercentageThreshold).integer().null())
                    .col(ColumnDef::new(ApprovalRules::SpecificApproverId).uuid().null())
                    .col(
                        ColumnDef::new(ApprovalRules::IsHybrid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ApprovalRules::Priority).integer().not_null())
                    .col(
                        ColumnDef::new(ApprovalRules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(timestamp(ApprovalRules::CreatedAt))
                    .col(timestamp(ApprovalRules::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_rules_company")
                            .from(ApprovalRules::Table, ApprovalRules::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_rules_specific_approver")
                            .from(ApprovalRules::Table, ApprovalRules::SpecificApproverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_rules_selection")
                    .table(ApprovalRules::Table)
                    .col(ApprovalRules::CompanyId)
                    .col(ApprovalRules::IsActive)
                    .col(ApprovalRules::Priority)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalRuleApprovers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalRuleApprovers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalRuleApprovers::RuleId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRuleApprovers::ApproverId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRuleApprovers::Sequence).integer().not_null())
                    .col(
                        ColumnDef::new(ApprovalRuleApprovers::IsRequired)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(timestamp(ApprovalRuleApprovers::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_approvers_rule")
                            .from(ApprovalRuleApprovers::Table, ApprovalRuleApprovers::RuleId)
                            .to(ApprovalRules::Table, ApprovalRules::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_approvers_user")
                            .from(
                                ApprovalRuleApprovers::Table,
                                ApprovalRuleApprovers::ApproverId,
                            )
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_rule_approvers_sequence")
                    .table(ApprovalRuleApprovers::Table)
                    .col(ApprovalRuleApprovers::RuleId)
                    .col(ApprovalRuleApprovers::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_rule_approvers_approver")
                    .table(ApprovalRuleApprovers::Table)
                    .col(ApprovalRuleApprovers::RuleId)
                    .col(ApprovalRuleApprovers::ApproverId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::SubmitterId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::Description).text().not_null())
                    .col(ColumnDef::new(Expenses::Category).string_len(64).null())
                    .col(ColumnDef::new(Expenses::ExpenseDate).date().not_null())
                    .col(ColumnDef::new(Expenses::Amount).decimal_len(14, 2).not_null())
                    .col(ColumnDef::new(Expenses::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Expenses::ConvertedAmount).decimal_len(14, 2).null())
                    .col(ColumnDef::new(Expenses::ConvertedCurrency).string_len(3).null())
                    .col(ColumnDef::new(Expenses::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Expenses::ApprovalRuleId).uuid().null())
                    .col(
                        ColumnDef::new(Expenses::SubmittedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(timestamp(Expenses::CreatedAt))
                    .col(timestamp(Expenses::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_company")
                            .from(Expenses::Table, Expenses::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_submitter")
                            .from(Expenses::Table, Expenses::SubmitterId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expenses_rule")
                            .from(Expenses::Table, Expenses::ApprovalRuleId)
                            .to(ApprovalRules::Table, ApprovalRules::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_expenses_rule_status")
                    .table(Expenses::Table)
                    .col(Expenses::ApprovalRuleId)
                    .col(Expenses::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalRequests::ExpenseId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRequests::ApproverId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRequests::Sequence).integer().not_null())
                    .col(ColumnDef::new(ApprovalRequests::IsRequired).boolean().not_null())
                    .col(ColumnDef::new(ApprovalRequests::InPool).boolean().not_null())
                    .col(ColumnDef::new(ApprovalRequests::Status).string_len(32).not_null())
                    .col(ColumnDef::new(ApprovalRequests::Comments).text().null())
                    .col(
                        ColumnDef::new(ApprovalRequests::RespondedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(timestamp(ApprovalRequests::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_requests_expense")
                            .from(ApprovalRequests::Table, ApprovalRequests::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_requests_approver")
                            .from(ApprovalRequests::Table, ApprovalRequests::ApproverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_approval_requests_expense_approver")
                    .table(ApprovalRequests::Table)
                    .col(ApprovalRequests::ExpenseId)
                    .col(ApprovalRequests::ApproverId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_requests_approver_status")
                    .table(ApprovalRequests::Table)
                    .col(ApprovalRequests::ApproverId)
                    .col(ApprovalRequests::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalHistory::ExpenseId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalHistory::Actor).string_len(64).not_null())
                    .col(ColumnDef::new(ApprovalHistory::Action).string_len(32).not_null())
                    .col(ColumnDef::new(ApprovalHistory::Comments).text().null())
                    .col(ColumnDef::new(ApprovalHistory::Metadata).json().not_null())
                    .col(timestamp(ApprovalHistory::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_approval_history_expense")
                            .from(ApprovalHistory::Table, ApprovalHistory::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_history_expense")
                    .table(ApprovalHistory::Table)
                    .col(ApprovalHistory::ExpenseId)
                    .col(ApprovalHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExchangeRates::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ExchangeRates::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ExchangeRates::FromCurrency).string_len(3).not_null())
                    .col(ColumnDef::new(ExchangeRates::ToCurrency).string_len(3).not_null())
                    .col(ColumnDef::new(ExchangeRates::Rate).decimal_len(16, 8).not_null())
                    .col(ColumnDef::new(ExchangeRates::EffectiveDate).date().not_null())
                    .col(timestamp(ExchangeRates::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_exchange_rates_company")
                            .from(ExchangeRates::Table, ExchangeRates::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_exchange_rates_pair_date")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::CompanyId)
                    .col(ExchangeRates::FromCurrency)
                    .col(ExchangeRates::ToCurrency)
                    .col(ExchangeRates::EffectiveDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalRuleApprovers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Companies::Table).to_owned())
            .await
    }
}

fn timestamp<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
    Name,
    Currency,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    CompanyId,
    Email,
    FullName,
    Role,
    ManagerId,
    IsManagerApprover,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApprovalRules {
    Table,
    Id,
    CompanyId,
    Name,
    Description,
    RuleType,
    PercentageThreshold,
    SpecificApproverId,
    IsHybrid,
    Priority,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApprovalRuleApprovers {
    Table,
    Id,
    RuleId,
    ApproverId,
    Sequence,
    IsRequired,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Expenses {
    Table,
    Id,
    CompanyId,
    SubmitterId,
    Description,
    Category,
    ExpenseDate,
    Amount,
    Currency,
    ConvertedAmount,
    ConvertedCurrency,
    Status,
    ApprovalRuleId,
    SubmittedAt,
    ResolvedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ApprovalRequests {
    Table,
    Id,
    ExpenseId,
    ApproverId,
    Sequence,
    IsRequired,
    InPool,
    Status,
    Comments,
    RespondedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ApprovalHistory {
    Table,
    Id,
    ExpenseId,
    Actor,
    Action,
    Comments,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ExchangeRates {
    Table,
    Id,
    CompanyId,
    FromCurrency,
    ToCurrency,
    Rate,
    EffectiveDate,
    CreatedAt,
}
