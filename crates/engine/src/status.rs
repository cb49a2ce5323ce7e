//! Approval status snapshots and pending-work view types.
//!
//! These are the shapes the engine hands back to whatever layer mounts it
//! (HTTP, CLI, tests). They are plain serde-serializable data; all the logic
//! that fills them lives in `evaluation` and `ops`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{expenses::ExpenseStatus, tasks::TaskStatus};

/// One task as shown to callers, with the approver's name resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    pub approver_name: String,
    pub status: TaskStatus,
    pub sequence_order: i32,
    pub is_manager_task: bool,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Full picture of one expense's approval, returned by every engine
/// operation that touches approvals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub expense_id: Uuid,
    pub current_status: ExpenseStatus,
    pub is_fully_approved: bool,
    pub approval_percentage: f64,
    pub required_percentage: f64,
    /// The next approver's name, or a count label in parallel mode.
    pub next_approver: Option<String>,
    pub pending_tasks: Vec<TaskView>,
    pub completed_tasks: Vec<TaskView>,
    pub manager_approval_required: bool,
    pub manager_approved: bool,
    pub sequential_approval: bool,
    pub can_proceed_to_next_step: bool,
}

/// One of the submitter's own expenses still waiting on approval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingExpense {
    pub expense_id: Uuid,
    pub amount_minor: i64,
    pub currency_code: String,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub current_status: ExpenseStatus,
    pub approval_percentage: f64,
    pub required_percentage: f64,
    pub next_approver: Option<String>,
    pub pending_tasks_count: usize,
    pub total_tasks_count: usize,
}

/// "What is waiting on me" for one employee (submitter side).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmployeePending {
    pub pending_requests: Vec<PendingExpense>,
    pub total_count: usize,
    pub pending_amount_minor: i64,
}

/// One expense waiting for a specific approver (or any, in the admin view).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    pub expense_id: Uuid,
    pub submitted_by: Uuid,
    pub submitted_by_name: String,
    pub submitted_by_email: String,
    pub amount_minor: i64,
    pub currency_code: String,
    pub category: String,
    pub description: Option<String>,
    pub expense_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub sequence_order: i32,
    pub is_manager_task: bool,
    /// Expense older than the urgency threshold (3 days).
    pub urgent: bool,
}

/// Review queue for an approver or for the admin view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewQueue {
    pub pending_reviews: Vec<PendingReview>,
    pub total_count: usize,
    pub total_amount_minor: i64,
    pub urgent_count: usize,
}

/// Per-expense snapshots plus a summary, for bulk status queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkApprovalStatus {
    pub expenses: Vec<ApprovalStatus>,
    pub approved: usize,
    pub in_progress: usize,
    pub rejected: usize,
}

/// Aggregate statistics over all configured approval rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleStats {
    pub total_rules: u64,
    pub sequential_rules: u64,
    pub parallel_rules: u64,
    pub rules_with_manager_gate: u64,
    pub average_steps_per_rule: f64,
}
