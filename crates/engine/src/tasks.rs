//! Approval task primitives.
//!
//! Tasks are the per-expense materialization of a rule: one row per approver
//! obligation, created in bulk when approval is initiated. A task moves from
//! `Pending` to exactly one terminal status and is never deleted except by
//! re-initiation.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// `sequence_order` reserved for the manager task; `is_manager_task` is the
/// authoritative tag, the order value only keeps the gate sorted first.
pub const MANAGER_SEQUENCE_ORDER: i32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    AutoApproved,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AutoApproved => "auto_approved",
        }
    }

    /// Approved either by a person or by the threshold sweep.
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved | Self::AutoApproved)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "auto_approved" => Ok(Self::AutoApproved),
            other => Err(EngineError::Validation(format!(
                "invalid task status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTask {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    /// Back-reference to the originating step; `None` for the manager task.
    pub step_id: Option<Uuid>,
    pub sequence_order: i32,
    pub is_manager_task: bool,
    pub status: TaskStatus,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalTask {
    /// Materializes the manager-gate task for an expense.
    pub fn manager(expense_id: Uuid, manager_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            approver_id: manager_id,
            step_id: None,
            sequence_order: MANAGER_SEQUENCE_ORDER,
            is_manager_task: true,
            status: TaskStatus::Pending,
            comments: None,
            decided_at: None,
            created_at,
        }
    }

    /// Materializes the task for one rule step.
    pub fn from_step(
        expense_id: Uuid,
        step: &crate::steps::ApprovalStep,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            approver_id: step.approver_id,
            step_id: Some(step.id),
            sequence_order: step.sequence_order,
            is_manager_task: false,
            status: TaskStatus::Pending,
            comments: None,
            decided_at: None,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "approval_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    pub step_id: Option<Uuid>,
    pub sequence_order: i32,
    pub is_manager_task: bool,
    pub status: String,
    pub comments: Option<String>,
    pub decided_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expense,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ApproverId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Approver,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expense.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approver.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ApprovalTask> for ActiveModel {
    fn from(task: &ApprovalTask) -> Self {
        Self {
            id: ActiveValue::Set(task.id),
            expense_id: ActiveValue::Set(task.expense_id),
            approver_id: ActiveValue::Set(task.approver_id),
            step_id: ActiveValue::Set(task.step_id),
            sequence_order: ActiveValue::Set(task.sequence_order),
            is_manager_task: ActiveValue::Set(task.is_manager_task),
            status: ActiveValue::Set(task.status.as_str().to_string()),
            comments: ActiveValue::Set(task.comments.clone()),
            decided_at: ActiveValue::Set(task.decided_at),
            created_at: ActiveValue::Set(task.created_at),
        }
    }
}

impl TryFrom<Model> for ApprovalTask {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            expense_id: model.expense_id,
            approver_id: model.approver_id,
            step_id: model.step_id,
            sequence_order: model.sequence_order,
            is_manager_task: model.is_manager_task,
            status: TaskStatus::try_from(model.status.as_str())?,
            comments: model.comments,
            decided_at: model.decided_at,
            created_at: model.created_at,
        })
    }
}
