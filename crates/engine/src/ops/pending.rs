//! Pending-work views: what a submitter is waiting on, and what sits in an
//! approver's (or the admin's) review queue.
//!
//! Every view settles each expense before reporting it, so a queue never
//! shows work that the threshold sweep or a rejection has already closed.
//! Candidates are listed first and then settled one expense per transaction;
//! a failure on one expense is logged and skipped instead of failing the
//! whole batch.

use chrono::{Duration, Utc};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ExpenseStatus, ResultEngine, TaskStatus,
    evaluation::can_act_now,
    expenses,
    status::{EmployeePending, PendingExpense, PendingReview, ReviewQueue},
    tasks,
};

use super::{Engine, with_tx};

/// An expense waiting longer than this is flagged urgent in review queues.
const URGENT_AFTER_DAYS: i64 = 3;

impl Engine {
    /// The submitter-side view: this employee's own expenses still in the
    /// approval pipeline, with per-expense progress.
    ///
    /// An expense that gets settled to a terminal status by this very call
    /// stays in the response; it was pending when the view was requested.
    pub async fn pending_for_employee(&self, employee_id: Uuid) -> ResultEngine<EmployeePending> {
        let candidates: Vec<Uuid> = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, employee_id, "user").await?;
            let models = expenses::Entity::find()
                .filter(expenses::Column::SubmittedBy.eq(employee_id))
                .filter(expenses::Column::Status.is_in([
                    ExpenseStatus::Pending.as_str(),
                    ExpenseStatus::InProgress.as_str(),
                ]))
                .order_by_asc(expenses::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            Ok::<_, EngineError>(models.into_iter().map(|m| m.id).collect::<Vec<_>>())
        })?;

        let mut pending_requests: Vec<PendingExpense> = Vec::new();
        for expense_id in candidates {
            let item: ResultEngine<PendingExpense> = with_tx!(self, |db_tx| {
                let snapshot = self.status_in_tx(&db_tx, expense_id).await?;
                let expense = self.require_expense(&db_tx, expense_id).await?;
                Ok(PendingExpense {
                    expense_id,
                    amount_minor: expense.amount_minor,
                    currency_code: expense.currency_code,
                    category: expense.category,
                    description: expense.description,
                    expense_date: expense.expense_date,
                    submitted_at: expense.created_at,
                    current_status: snapshot.current_status,
                    approval_percentage: snapshot.approval_percentage,
                    required_percentage: snapshot.required_percentage,
                    pending_tasks_count: snapshot.pending_tasks.len(),
                    total_tasks_count: snapshot.pending_tasks.len()
                        + snapshot.completed_tasks.len(),
                    next_approver: snapshot.next_approver,
                })
            });
            match item {
                Ok(item) => pending_requests.push(item),
                Err(err) => {
                    tracing::warn!(
                        expense_id = %expense_id,
                        error = %err,
                        "skipping expense in pending view"
                    );
                }
            }
        }

        let pending_amount_minor = pending_requests.iter().map(|p| p.amount_minor).sum();
        Ok(EmployeePending {
            total_count: pending_requests.len(),
            pending_amount_minor,
            pending_requests,
        })
    }

    /// The review queue for one approver: expenses they can act on right now.
    ///
    /// Each candidate expense is settled first, then the task is re-checked
    /// against the same eligibility function the decision path uses. Tasks
    /// that are blocked (manager gate, earlier sequential steps) or that the
    /// settlement just closed are left out.
    pub async fn pending_for_approver(&self, approver_id: Uuid) -> ResultEngine<ReviewQueue> {
        let task_refs: Vec<(Uuid, Uuid)> = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, approver_id, "approver").await?;
            let models = tasks::Entity::find()
                .filter(tasks::Column::ApproverId.eq(approver_id))
                .filter(tasks::Column::Status.eq(TaskStatus::Pending.as_str()))
                .all(&db_tx)
                .await?;
            Ok::<_, EngineError>(
                models
                    .into_iter()
                    .map(|m| (m.id, m.expense_id))
                    .collect::<Vec<_>>(),
            )
        })?;

        self.collect_reviews(task_refs, true).await
    }

    /// The company-wide review queue: every pending task, after settlement,
    /// without per-approver eligibility filtering.
    pub async fn pending_for_admin(&self) -> ResultEngine<ReviewQueue> {
        let task_refs: Vec<(Uuid, Uuid)> = with_tx!(self, |db_tx| {
            let models = tasks::Entity::find()
                .filter(tasks::Column::Status.eq(TaskStatus::Pending.as_str()))
                .all(&db_tx)
                .await?;
            Ok::<_, EngineError>(
                models
                    .into_iter()
                    .map(|m| (m.id, m.expense_id))
                    .collect::<Vec<_>>(),
            )
        })?;

        self.collect_reviews(task_refs, false).await
    }

    async fn collect_reviews(
        &self,
        task_refs: Vec<(Uuid, Uuid)>,
        check_eligibility: bool,
    ) -> ResultEngine<ReviewQueue> {
        let mut pending_reviews: Vec<PendingReview> = Vec::new();
        for (task_id, expense_id) in task_refs {
            match self.review_item(task_id, expense_id, check_eligibility).await {
                Ok(Some(item)) => pending_reviews.push(item),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        expense_id = %expense_id,
                        error = %err,
                        "skipping expense in review queue"
                    );
                }
            }
        }

        let total_amount_minor = pending_reviews.iter().map(|r| r.amount_minor).sum();
        let urgent_count = pending_reviews.iter().filter(|r| r.urgent).count();
        Ok(ReviewQueue {
            total_count: pending_reviews.len(),
            total_amount_minor,
            urgent_count,
            pending_reviews,
        })
    }

    async fn review_item(
        &self,
        task_id: Uuid,
        expense_id: Uuid,
        check_eligibility: bool,
    ) -> ResultEngine<Option<PendingReview>> {
        with_tx!(self, |db_tx| {
            self.review_item_in_tx(&db_tx, task_id, expense_id, check_eligibility)
                .await
        })
    }

    async fn review_item_in_tx(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        task_id: Uuid,
        expense_id: Uuid,
        check_eligibility: bool,
    ) -> ResultEngine<Option<PendingReview>> {
        // Settle first so threshold-satisfied or rejected expenses drop out.
        self.status_in_tx(db_tx, expense_id).await?;

        let expense = self.require_expense(db_tx, expense_id).await?;
        if expense.status.is_terminal() {
            return Ok(None);
        }

        let task_set = self.tasks_for_expense(db_tx, expense_id).await?;
        let Some(task) = task_set.iter().find(|t| t.id == task_id) else {
            return Ok(None);
        };
        if task.status != TaskStatus::Pending {
            return Ok(None);
        }

        if check_eligibility {
            let Some(rule) = self.rule_for_subject(db_tx, expense.submitted_by).await? else {
                return Ok(None);
            };
            if !can_act_now(task, &rule, &task_set) {
                return Ok(None);
            }
        }

        let submitter = self.require_user(db_tx, expense.submitted_by, "user").await?;
        let urgent = Utc::now() - expense.created_at > Duration::days(URGENT_AFTER_DAYS);

        Ok(Some(PendingReview {
            expense_id,
            submitted_by: expense.submitted_by,
            submitted_by_name: submitter.name,
            submitted_by_email: submitter.email,
            amount_minor: expense.amount_minor,
            currency_code: expense.currency_code,
            category: expense.category,
            description: expense.description,
            expense_date: expense.expense_date,
            submitted_at: expense.created_at,
            sequence_order: task.sequence_order,
            is_manager_task: task.is_manager_task,
            urgent,
        }))
    }
}
