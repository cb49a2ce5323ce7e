//! Approval step primitives.
//!
//! A step is one approver slot inside a rule. `sequence_order` values of a
//! rule's steps form a contiguous 1-based range with no duplicates; the
//! ordering only matters in sequential mode.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub approver_id: Uuid,
    pub sequence_order: i32,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "approval_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub rule_id: Uuid,
    pub approver_id: Uuid,
    pub sequence_order: i32,
    pub required: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rules::Entity",
        from = "Column::RuleId",
        to = "super::rules::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Rule,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ApproverId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Approver,
}

impl Related<super::rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rule.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approver.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ApprovalStep> for ActiveModel {
    fn from(step: &ApprovalStep) -> Self {
        Self {
            id: ActiveValue::Set(step.id),
            rule_id: ActiveValue::Set(step.rule_id),
            approver_id: ActiveValue::Set(step.approver_id),
            sequence_order: ActiveValue::Set(step.sequence_order),
            required: ActiveValue::Set(step.required),
        }
    }
}

impl From<Model> for ApprovalStep {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            rule_id: model.rule_id,
            approver_id: model.approver_id,
            sequence_order: model.sequence_order,
            required: model.required,
        }
    }
}
