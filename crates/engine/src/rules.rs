//! Approval rule primitives.
//!
//! An `ApprovalRule` is the per-employee configuration describing who must
//! approve that employee's expenses: an ordered or parallel set of steps, an
//! optional manager gate and a minimum approval percentage. The engine reads
//! rules but never mutates them; changing a rule affects only future
//! initiations.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, steps::ApprovalStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    Sequential,
    Parallel,
}

impl SequenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl TryFrom<&str> for SequenceMode {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(EngineError::Validation(format!(
                "invalid sequence mode: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub manager_gate: bool,
    pub sequence_mode: SequenceMode,
    pub min_approval_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Steps in ascending `sequence_order`.
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalRule {
    /// True when the rule puts a manager task in front of the steps.
    ///
    /// The gate only exists when both the flag and the manager reference are
    /// set; a dangling flag without a manager is treated as no gate.
    pub fn has_manager_gate(&self) -> bool {
        self.manager_gate && self.manager_id.is_some()
    }

    /// A rule with no steps and no gate approves expenses immediately.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && !self.has_manager_gate()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "approval_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subject_id: Uuid,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub manager_gate: bool,
    pub sequence_mode: String,
    pub min_approval_percentage: f64,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SubjectId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Subject,
    #[sea_orm(has_many = "super::steps::Entity")]
    Steps,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl Related<super::steps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Steps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ApprovalRule> for ActiveModel {
    fn from(rule: &ApprovalRule) -> Self {
        Self {
            id: ActiveValue::Set(rule.id),
            subject_id: ActiveValue::Set(rule.subject_id),
            description: ActiveValue::Set(rule.description.clone()),
            manager_id: ActiveValue::Set(rule.manager_id),
            manager_gate: ActiveValue::Set(rule.manager_gate),
            sequence_mode: ActiveValue::Set(rule.sequence_mode.as_str().to_string()),
            min_approval_percentage: ActiveValue::Set(rule.min_approval_percentage),
            created_at: ActiveValue::Set(rule.created_at),
            updated_at: ActiveValue::Set(rule.updated_at),
        }
    }
}

impl TryFrom<Model> for ApprovalRule {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            subject_id: model.subject_id,
            description: model.description,
            manager_id: model.manager_id,
            manager_gate: model.manager_gate,
            sequence_mode: SequenceMode::try_from(model.sequence_mode.as_str())?,
            min_approval_percentage: model.min_approval_percentage,
            created_at: model.created_at,
            updated_at: model.updated_at,
            steps: Vec::new(),
        })
    }
}
