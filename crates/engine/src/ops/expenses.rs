use chrono::{NaiveDate, Utc};
use sea_orm::{TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Expense, ResultEngine, expenses};

use super::{Engine, normalize_optional_text, normalize_required_text, with_tx};

/// Input for registering an expense with the approval core.
///
/// This is deliberately the minimal surface the engine needs; full expense
/// CRUD (receipts, payment tracking, search) lives outside the core.
#[derive(Clone, Debug, PartialEq)]
pub struct NewExpense {
    pub submitted_by: Uuid,
    pub amount_minor: i64,
    pub currency_code: String,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
}

impl Engine {
    /// Registers a new expense in `Pending` status.
    pub async fn submit_expense(&self, new: NewExpense) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let submitter = self.require_user(&db_tx, new.submitted_by, "user").await?;

            let expense = Expense::new(
                new.submitted_by,
                submitter.company_id,
                new.amount_minor,
                normalize_required_text(&new.currency_code, "currency_code")?,
                normalize_required_text(&new.category, "category")?,
                normalize_optional_text(new.description.as_deref()),
                new.expense_date,
                Utc::now(),
            )?;

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            Ok(expense.id)
        })
    }

    /// Returns one expense by id.
    pub async fn expense(&self, expense_id: Uuid) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_expense(&db_tx, expense_id).await
        })
    }
}
