//! The approval workflow itself: task materialization, decisions, and the
//! status snapshot every mutation hands back.
//!
//! All writes to `Expense::status` after submission happen here, inside the
//! transaction that observed the triggering state. `evaluation` decides what
//! the transition should be; this module persists it.

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ApprovalRule, ApprovalTask, EngineError, Expense, ExpenseStatus, ResultEngine, SequenceMode,
    TaskStatus,
    evaluation::{Evaluation, NextApprover, can_act_now, evaluate},
    expenses,
    status::{ApprovalStatus, BulkApprovalStatus, TaskView},
    tasks,
};

use super::{Engine, normalize_optional_text, with_tx};

/// Comment written on tasks closed by the threshold sweep.
const AUTO_APPROVE_COMMENT: &str = "auto-approved: approval threshold met";

/// A single approver's verdict on one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Engine {
    /// Starts (or restarts) the approval workflow for an expense.
    ///
    /// Materializes one task per rule step, plus the manager-gate task when
    /// the rule requires one, and moves the expense to `InProgress`. Calling
    /// this again on an in-flight expense discards the previous task set and
    /// starts over; a finalized expense cannot be re-initiated.
    ///
    /// With no rule configured for the submitter, or a rule with no approvers
    /// at all, the expense is approved on the spot.
    pub async fn initiate_approval(&self, expense_id: Uuid) -> ResultEngine<ApprovalStatus> {
        with_tx!(self, |db_tx| {
            self.initiate_in_tx(&db_tx, expense_id).await
        })
    }

    async fn initiate_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<ApprovalStatus> {
        let mut expense = self.require_expense(db_tx, expense_id).await?;
        if expense.status.is_terminal() {
            return Err(EngineError::Validation(
                "approval already finalized".to_string(),
            ));
        }

        let Some(rule) = self.rule_for_subject(db_tx, expense.submitted_by).await? else {
            self.set_expense_status(db_tx, &mut expense, ExpenseStatus::Approved)
                .await?;
            tracing::info!(
                expense_id = %expense.id,
                "no approval rule configured, auto-approving"
            );
            return Ok(no_rule_status(&expense));
        };

        // Re-initiation discards any previously materialized tasks.
        tasks::Entity::delete_many()
            .filter(tasks::Column::ExpenseId.eq(expense_id))
            .exec(db_tx)
            .await?;

        let now = Utc::now();
        let mut created: Vec<ApprovalTask> = Vec::new();
        if rule.has_manager_gate() {
            if let Some(manager_id) = rule.manager_id {
                created.push(ApprovalTask::manager(expense_id, manager_id, now));
            }
        }
        for step in &rule.steps {
            created.push(ApprovalTask::from_step(expense_id, step, now));
        }

        if created.is_empty() {
            self.set_expense_status(db_tx, &mut expense, ExpenseStatus::Approved)
                .await?;
            tracing::info!(
                expense_id = %expense.id,
                "approval rule has no approvers, auto-approving"
            );
            let eval = evaluate(&rule, &[]);
            return self.build_status(db_tx, &expense, &rule, &[], &eval).await;
        }

        for task in &created {
            tasks::ActiveModel::from(task).insert(db_tx).await?;
        }
        self.set_expense_status(db_tx, &mut expense, ExpenseStatus::InProgress)
            .await?;
        tracing::info!(
            expense_id = %expense.id,
            task_count = created.len(),
            "approval initiated"
        );

        // A zero threshold (or similar degenerate rule) can already be
        // satisfied at this point.
        let eval = self.settle(db_tx, &mut expense, &rule, &mut created).await?;
        self.build_status(db_tx, &expense, &rule, &created, &eval)
            .await
    }

    /// Current approval picture of one expense.
    ///
    /// This is a read with consequences: if the task set already satisfies
    /// the rule the expense is approved here and remaining pending tasks are
    /// swept to `AutoApproved`; a recorded rejection likewise settles the
    /// expense as `Rejected`. Terminal expenses are reported as-is.
    pub async fn approval_status(&self, expense_id: Uuid) -> ResultEngine<ApprovalStatus> {
        with_tx!(self, |db_tx| {
            self.status_in_tx(&db_tx, expense_id).await
        })
    }

    /// Records one approver's decision on their pending task.
    ///
    /// The eligibility check is the same one the pending views use, so an
    /// approver is never offered a task here that the views would hide. A
    /// rejection requires a comment and finalizes the expense immediately.
    pub async fn record_decision(
        &self,
        expense_id: Uuid,
        approver_id: Uuid,
        decision: Decision,
        comments: Option<String>,
    ) -> ResultEngine<ApprovalStatus> {
        with_tx!(self, |db_tx| {
            let mut expense = self.require_expense(&db_tx, expense_id).await?;
            let rule = self
                .rule_for_subject(&db_tx, expense.submitted_by)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("approval rule not exists".to_string()))?;
            let mut task_set = self.tasks_for_expense(&db_tx, expense_id).await?;

            let position = task_set
                .iter()
                .position(|t| t.approver_id == approver_id && t.status == TaskStatus::Pending)
                .ok_or_else(|| {
                    EngineError::KeyNotFound("pending approval task not exists".to_string())
                })?;

            if !can_act_now(&task_set[position], &rule, &task_set) {
                return Err(EngineError::Validation(
                    "cannot act on this expense yet: earlier approvals are still pending"
                        .to_string(),
                ));
            }

            let comments = normalize_optional_text(comments.as_deref());
            let status = match decision {
                Decision::Approve => TaskStatus::Approved,
                Decision::Reject => {
                    if comments.is_none() {
                        return Err(EngineError::Validation(
                            "a rejection requires a comment".to_string(),
                        ));
                    }
                    TaskStatus::Rejected
                }
            };

            let now = Utc::now();
            let active = tasks::ActiveModel {
                id: ActiveValue::Set(task_set[position].id),
                status: ActiveValue::Set(status.as_str().to_string()),
                comments: ActiveValue::Set(comments.clone()),
                decided_at: ActiveValue::Set(Some(now)),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            {
                let task = &mut task_set[position];
                task.status = status;
                task.comments = comments;
                task.decided_at = Some(now);
            }
            tracing::info!(
                expense_id = %expense_id,
                approver_id = %approver_id,
                decision = ?decision,
                "approval decision recorded"
            );

            let eval = self.settle(&db_tx, &mut expense, &rule, &mut task_set).await?;
            self.build_status(&db_tx, &expense, &rule, &task_set, &eval)
                .await
        })
    }

    /// Status snapshots for a batch of expenses, plus summary counts.
    ///
    /// Unknown ids are skipped rather than failing the whole batch. Each
    /// expense is settled in its own transaction.
    pub async fn bulk_approval_status(
        &self,
        expense_ids: &[Uuid],
    ) -> ResultEngine<BulkApprovalStatus> {
        let mut snapshots = Vec::with_capacity(expense_ids.len());
        for &expense_id in expense_ids {
            match self.approval_status(expense_id).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(EngineError::KeyNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        let count = |status: ExpenseStatus| {
            snapshots
                .iter()
                .filter(|s| s.current_status == status)
                .count()
        };
        let approved = count(ExpenseStatus::Approved);
        let in_progress = count(ExpenseStatus::InProgress);
        let rejected = count(ExpenseStatus::Rejected);

        Ok(BulkApprovalStatus {
            expenses: snapshots,
            approved,
            in_progress,
            rejected,
        })
    }

    /// Settles and snapshots one expense inside an existing transaction.
    pub(super) async fn status_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<ApprovalStatus> {
        let mut expense = self.require_expense(db_tx, expense_id).await?;

        let Some(rule) = self.rule_for_subject(db_tx, expense.submitted_by).await? else {
            if expense.status == ExpenseStatus::Pending {
                self.set_expense_status(db_tx, &mut expense, ExpenseStatus::Approved)
                    .await?;
                tracing::info!(
                    expense_id = %expense.id,
                    "no approval rule configured, auto-approving"
                );
            }
            return Ok(no_rule_status(&expense));
        };

        let mut task_set = self.tasks_for_expense(db_tx, expense_id).await?;
        let eval = self.settle(db_tx, &mut expense, &rule, &mut task_set).await?;
        self.build_status(db_tx, &expense, &rule, &task_set, &eval)
            .await
    }

    /// Applies the state transition `evaluate` calls for, if any.
    ///
    /// Only an `InProgress` expense is ever touched: initiation owns the
    /// transitions out of `Pending`, and terminal statuses are never left.
    /// Returns the evaluation the snapshot should be built from.
    async fn settle(
        &self,
        db_tx: &DatabaseTransaction,
        expense: &mut Expense,
        rule: &ApprovalRule,
        task_set: &mut [ApprovalTask],
    ) -> ResultEngine<Evaluation> {
        let eval = evaluate(rule, task_set);
        if expense.status != ExpenseStatus::InProgress {
            return Ok(eval);
        }

        if eval.any_rejected {
            self.set_expense_status(db_tx, expense, ExpenseStatus::Rejected)
                .await?;
            tracing::info!(expense_id = %expense.id, "expense rejected");
            return Ok(eval);
        }

        if eval.is_fully_approved {
            let now = Utc::now();
            for task in task_set
                .iter_mut()
                .filter(|t| t.status == TaskStatus::Pending)
            {
                let active = tasks::ActiveModel {
                    id: ActiveValue::Set(task.id),
                    status: ActiveValue::Set(TaskStatus::AutoApproved.as_str().to_string()),
                    comments: ActiveValue::Set(Some(AUTO_APPROVE_COMMENT.to_string())),
                    decided_at: ActiveValue::Set(Some(now)),
                    ..Default::default()
                };
                active.update(db_tx).await?;
                task.status = TaskStatus::AutoApproved;
                task.comments = Some(AUTO_APPROVE_COMMENT.to_string());
                task.decided_at = Some(now);
            }
            self.set_expense_status(db_tx, expense, ExpenseStatus::Approved)
                .await?;
            tracing::info!(
                expense_id = %expense.id,
                approval_percentage = eval.approval_percentage,
                "approval threshold met, auto-approving remaining tasks"
            );
            // Snapshot reflects the swept task set.
            return Ok(evaluate(rule, task_set));
        }

        Ok(eval)
    }

    async fn set_expense_status(
        &self,
        db_tx: &DatabaseTransaction,
        expense: &mut Expense,
        status: ExpenseStatus,
    ) -> ResultEngine<()> {
        let now = Utc::now();
        let active = expenses::ActiveModel {
            id: ActiveValue::Set(expense.id),
            status: ActiveValue::Set(status.as_str().to_string()),
            updated_at: ActiveValue::Set(Some(now)),
            ..Default::default()
        };
        active.update(db_tx).await?;
        expense.status = status;
        expense.updated_at = Some(now);
        Ok(())
    }

    async fn build_status(
        &self,
        db_tx: &DatabaseTransaction,
        expense: &Expense,
        rule: &ApprovalRule,
        task_set: &[ApprovalTask],
        eval: &Evaluation,
    ) -> ResultEngine<ApprovalStatus> {
        let names = self
            .user_names(db_tx, task_set.iter().map(|t| t.approver_id))
            .await?;
        let view = |task: &ApprovalTask| TaskView {
            id: task.id,
            expense_id: task.expense_id,
            approver_id: task.approver_id,
            approver_name: names
                .get(&task.approver_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            status: task.status,
            sequence_order: task.sequence_order,
            is_manager_task: task.is_manager_task,
            comments: task.comments.clone(),
            decided_at: task.decided_at,
            created_at: task.created_at,
        };

        let pending_tasks = task_set
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(view)
            .collect();
        let completed_tasks = task_set
            .iter()
            .filter(|t| t.status != TaskStatus::Pending)
            .map(view)
            .collect();

        let next_approver = match &eval.next_approver {
            NextApprover::Nobody => None,
            NextApprover::Approver(id) => Some(
                names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            NextApprover::Any(count) => Some(format!("any of {count} approvers")),
        };

        Ok(ApprovalStatus {
            expense_id: expense.id,
            current_status: expense.status,
            is_fully_approved: eval.is_fully_approved,
            approval_percentage: eval.approval_percentage,
            required_percentage: rule.min_approval_percentage,
            next_approver,
            pending_tasks,
            completed_tasks,
            manager_approval_required: rule.has_manager_gate(),
            manager_approved: eval.manager_approved,
            sequential_approval: rule.sequence_mode == SequenceMode::Sequential,
            can_proceed_to_next_step: eval.can_proceed,
        })
    }
}

/// Snapshot for an expense whose submitter has no rule configured: nothing
/// is required, so the picture is trivially complete.
fn no_rule_status(expense: &Expense) -> ApprovalStatus {
    ApprovalStatus {
        expense_id: expense.id,
        current_status: expense.status,
        is_fully_approved: expense.status == ExpenseStatus::Approved,
        approval_percentage: 100.0,
        required_percentage: 0.0,
        next_approver: None,
        pending_tasks: Vec::new(),
        completed_tasks: Vec::new(),
        manager_approval_required: false,
        manager_approved: true,
        sequential_approval: false,
        can_proceed_to_next_step: true,
    }
}
