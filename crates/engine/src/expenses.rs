//! Expense primitives.
//!
//! An `Expense` is the unit of money an employee asks the company to cover.
//! Once approval has been initiated the engine is the sole writer of its
//! `status` field.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected are terminal; the engine never leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl TryFrom<&str> for ExpenseStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::Validation(format!(
                "invalid expense status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub submitted_by: Uuid,
    pub company_id: Uuid,
    pub amount_minor: i64,
    pub currency_code: String,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub status: ExpenseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Expense {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        submitted_by: Uuid,
        company_id: Uuid,
        amount_minor: i64,
        currency_code: String,
        category: String,
        description: Option<String>,
        expense_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            submitted_by,
            company_id,
            amount_minor,
            currency_code,
            category,
            description,
            expense_date,
            status: ExpenseStatus::Pending,
            created_at,
            updated_at: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub submitted_by: Uuid,
    pub company_id: Uuid,
    pub amount_minor: i64,
    pub currency_code: String,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: Date,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SubmittedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SubmittedBy,
    #[sea_orm(has_many = "super::tasks::Entity")]
    Tasks,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubmittedBy.def()
    }
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id),
            submitted_by: ActiveValue::Set(expense.submitted_by),
            company_id: ActiveValue::Set(expense.company_id),
            amount_minor: ActiveValue::Set(expense.amount_minor),
            currency_code: ActiveValue::Set(expense.currency_code.clone()),
            category: ActiveValue::Set(expense.category.clone()),
            description: ActiveValue::Set(expense.description.clone()),
            expense_date: ActiveValue::Set(expense.expense_date),
            status: ActiveValue::Set(expense.status.as_str().to_string()),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            submitted_by: model.submitted_by,
            company_id: model.company_id,
            amount_minor: model.amount_minor,
            currency_code: model.currency_code,
            category: model.category,
            description: model.description,
            expense_date: model.expense_date,
            status: ExpenseStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
