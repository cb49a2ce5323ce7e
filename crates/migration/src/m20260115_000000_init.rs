//! Initial schema migration - creates all tables from scratch.
//!
//! The complete schema for the approval engine:
//!
//! - `companies`: tenant records
//! - `users`: employees, approvers, managers
//! - `expenses`: submitted amounts moving through the workflow
//! - `approval_rules`: per-employee approval configuration
//! - `approval_steps`: ordered approver slots of a rule
//! - `approval_tasks`: per-expense materialization of a rule

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Companies {
    Table,
    Id,
    Name,
    Country,
    CurrencyCode,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    CompanyId,
    Name,
    Email,
    Role,
    ManagerId,
    CreatedAt,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    SubmittedBy,
    CompanyId,
    AmountMinor,
    CurrencyCode,
    Category,
    Description,
    ExpenseDate,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ApprovalRules {
    Table,
    Id,
    SubjectId,
    Description,
    ManagerId,
    ManagerGate,
    SequenceMode,
    MinApprovalPercentage,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ApprovalSteps {
    Table,
    Id,
    RuleId,
    ApproverId,
    SequenceOrder,
    Required,
}

#[derive(Iden)]
enum ApprovalTasks {
    Table,
    Id,
    ExpenseId,
    ApproverId,
    StepId,
    SequenceOrder,
    IsManagerTask,
    Status,
    Comments,
    DecidedAt,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Companies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Companies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Companies::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Companies::Name).string().not_null())
                    .col(ColumnDef::new(Companies::Country).string().not_null())
                    .col(ColumnDef::new(Companies::CurrencyCode).string().not_null())
                    .col(
                        ColumnDef::new(Companies::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(ColumnDef::new(Users::ManagerId).uuid())
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-users-company_id")
                            .from(Users::Table, Users::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-users-manager_id")
                            .from(Users::Table, Users::ManagerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-email-unique")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-company_id")
                    .table(Users::Table)
                    .col(Users::CompanyId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::SubmittedBy).uuid().not_null())
                    .col(ColumnDef::new(Expenses::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(Expenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::CurrencyCode).string().not_null())
                    .col(ColumnDef::new(Expenses::Category).string().not_null())
                    .col(ColumnDef::new(Expenses::Description).string())
                    .col(ColumnDef::new(Expenses::ExpenseDate).date().not_null())
                    .col(ColumnDef::new(Expenses::Status).string().not_null())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::UpdatedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-submitted_by")
                            .from(Expenses::Table, Expenses::SubmittedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-company_id")
                            .from(Expenses::Table, Expenses::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-submitted_by-status")
                    .table(Expenses::Table)
                    .col(Expenses::SubmittedBy)
                    .col(Expenses::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Approval Rules
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ApprovalRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalRules::SubjectId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRules::Description).string())
                    .col(ColumnDef::new(ApprovalRules::ManagerId).uuid())
                    .col(
                        ColumnDef::new(ApprovalRules::ManagerGate)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalRules::SequenceMode)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalRules::MinApprovalPercentage)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalRules::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalRules::UpdatedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_rules-subject_id")
                            .from(ApprovalRules::Table, ApprovalRules::SubjectId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_rules-manager_id")
                            .from(ApprovalRules::Table, ApprovalRules::ManagerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One rule per subject employee.
        manager
            .create_index(
                Index::create()
                    .name("idx-approval_rules-subject_id-unique")
                    .table(ApprovalRules::Table)
                    .col(ApprovalRules::SubjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Approval Steps
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ApprovalSteps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalSteps::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalSteps::RuleId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalSteps::ApproverId).uuid().not_null())
                    .col(
                        ColumnDef::new(ApprovalSteps::SequenceOrder)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalSteps::Required).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_steps-rule_id")
                            .from(ApprovalSteps::Table, ApprovalSteps::RuleId)
                            .to(ApprovalRules::Table, ApprovalRules::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_steps-approver_id")
                            .from(ApprovalSteps::Table, ApprovalSteps::ApproverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-approval_steps-rule_id-sequence_order-unique")
                    .table(ApprovalSteps::Table)
                    .col(ApprovalSteps::RuleId)
                    .col(ApprovalSteps::SequenceOrder)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Approval Tasks
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ApprovalTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalTasks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalTasks::ExpenseId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalTasks::ApproverId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalTasks::StepId).uuid())
                    .col(
                        ColumnDef::new(ApprovalTasks::SequenceOrder)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalTasks::IsManagerTask)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalTasks::Status).string().not_null())
                    .col(ColumnDef::new(ApprovalTasks::Comments).string())
                    .col(ColumnDef::new(ApprovalTasks::DecidedAt).timestamp())
                    .col(
                        ColumnDef::new(ApprovalTasks::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_tasks-expense_id")
                            .from(ApprovalTasks::Table, ApprovalTasks::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_tasks-approver_id")
                            .from(ApprovalTasks::Table, ApprovalTasks::ApproverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-approval_tasks-expense_id")
                    .table(ApprovalTasks::Table)
                    .col(ApprovalTasks::ExpenseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-approval_tasks-approver_id-status")
                    .table(ApprovalTasks::Table)
                    .col(ApprovalTasks::ApproverId)
                    .col(ApprovalTasks::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(ApprovalTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalSteps::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Companies::Table).to_owned())
            .await?;
        Ok(())
    }
}
