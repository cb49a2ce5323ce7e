//! Pure approval evaluation.
//!
//! Everything in this module is a function of `(rule, tasks)` with no I/O:
//! [`evaluate`] computes the overall picture of an expense's approval and
//! [`can_act_now`] decides whether one task is actionable. The same
//! eligibility function backs both the pending-work views and the mutating
//! decision path, so a read can never disagree with a write about who may
//! act.
//!
//! Persisting the outcome (auto-approval sweep, rejection) is the caller's
//! job; `evaluate` only reports what the state transition should be.

use uuid::Uuid;

use crate::{
    rules::{ApprovalRule, SequenceMode},
    tasks::{ApprovalTask, TaskStatus},
};

/// Who may act next, as derived from the task set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextApprover {
    /// Nobody is next: either everything is decided or the chain is dead.
    Nobody,
    /// A single approver (manager gate, or the earliest sequential step).
    Approver(Uuid),
    /// In parallel mode every pending approver is "next"; reported as a
    /// count rather than a single id.
    Any(usize),
}

/// Result of evaluating an expense's task set against its rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Approved tasks over tasks that are pending or approved, in percent.
    /// Rejected tasks are excluded from the denominator so a rejection does
    /// not silently lower the required bar. With no tasks to count, an
    /// empty rule is vacuously at 100 while a rule that expects approvers
    /// (tasks not materialized yet) sits at 0.
    pub approval_percentage: f64,
    pub manager_approved: bool,
    /// False only when a later sequential step is approved while an earlier
    /// one is still pending. Vacuously true in parallel mode.
    pub sequence_consistent: bool,
    pub any_rejected: bool,
    pub is_fully_approved: bool,
    pub can_proceed: bool,
    pub next_approver: NextApprover,
}

/// Evaluates the current task set against the rule.
pub fn evaluate(rule: &ApprovalRule, tasks: &[ApprovalTask]) -> Evaluation {
    let approved_count = tasks.iter().filter(|t| t.status.is_approved()).count();
    let undecided_or_approved = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending || t.status.is_approved())
        .count();
    let approval_percentage = if undecided_or_approved == 0 {
        // Nothing left to count: only a rule with no approvers at all is
        // vacuously satisfied. A rule with approvers whose tasks are not
        // materialized (or all rejected) has made no progress.
        if rule.is_empty() { 100.0 } else { 0.0 }
    } else {
        approved_count as f64 / undecided_or_approved as f64 * 100.0
    };

    let any_rejected = tasks.iter().any(|t| t.status == TaskStatus::Rejected);
    let manager_approved = manager_gate_satisfied(rule, tasks);
    let sequence_consistent = sequence_consistent(rule, tasks);

    let is_fully_approved = !any_rejected
        && approval_percentage >= rule.min_approval_percentage
        && manager_approved
        && sequence_consistent;

    let (can_proceed, next_approver) = progression(rule, tasks, manager_approved);

    Evaluation {
        approval_percentage,
        manager_approved,
        sequence_consistent,
        any_rejected,
        is_fully_approved,
        can_proceed,
        next_approver,
    }
}

/// The single authoritative eligibility check: may `task` be acted on right
/// now, given the whole task set?
///
/// Used to filter pending-work views and re-checked by the decision path
/// before any write, so views and mutations can never diverge.
pub fn can_act_now(task: &ApprovalTask, rule: &ApprovalRule, tasks: &[ApprovalTask]) -> bool {
    if task.status != TaskStatus::Pending {
        return false;
    }

    // A rejection anywhere makes the expense terminal; nobody may act.
    if tasks.iter().any(|t| t.status == TaskStatus::Rejected) {
        return false;
    }

    // The manager gate itself is always actionable while pending.
    if task.is_manager_task {
        return true;
    }

    // Everything else waits for the gate.
    if rule.has_manager_gate() && !manager_gate_satisfied(rule, tasks) {
        return false;
    }

    match rule.sequence_mode {
        SequenceMode::Parallel => true,
        SequenceMode::Sequential => tasks
            .iter()
            .filter(|t| !t.is_manager_task && t.sequence_order < task.sequence_order)
            .all(|t| t.status.is_approved()),
    }
}

/// True when the rule has no gate, or the gate's task is approved.
fn manager_gate_satisfied(rule: &ApprovalRule, tasks: &[ApprovalTask]) -> bool {
    if !rule.has_manager_gate() {
        return true;
    }
    tasks
        .iter()
        .find(|t| t.is_manager_task)
        .is_some_and(|t| t.status.is_approved())
}

fn sequence_consistent(rule: &ApprovalRule, tasks: &[ApprovalTask]) -> bool {
    if rule.sequence_mode == SequenceMode::Parallel {
        return true;
    }

    let mut steps: Vec<&ApprovalTask> = tasks.iter().filter(|t| !t.is_manager_task).collect();
    steps.sort_by_key(|t| t.sequence_order);

    for (i, task) in steps.iter().enumerate() {
        if task.status == TaskStatus::Rejected {
            return false;
        }
        if task.status == TaskStatus::Pending
            && steps[i + 1..].iter().any(|t| t.status.is_approved())
        {
            return false;
        }
    }
    true
}

fn progression(
    rule: &ApprovalRule,
    tasks: &[ApprovalTask],
    manager_approved: bool,
) -> (bool, NextApprover) {
    // A rejected task anywhere is terminal for the whole expense.
    if tasks.iter().any(|t| t.status == TaskStatus::Rejected) {
        return (false, NextApprover::Nobody);
    }

    // A pending manager gate blocks everything else; the manager is next.
    if rule.has_manager_gate() && !manager_approved {
        if let Some(gate) = tasks.iter().find(|t| t.is_manager_task) {
            if gate.status == TaskStatus::Pending {
                return (false, NextApprover::Approver(gate.approver_id));
            }
            // Gate decided but not approved: the chain is dead.
            return (false, NextApprover::Nobody);
        }
        return (false, NextApprover::Nobody);
    }

    match rule.sequence_mode {
        SequenceMode::Sequential => {
            let mut steps: Vec<&ApprovalTask> =
                tasks.iter().filter(|t| !t.is_manager_task).collect();
            steps.sort_by_key(|t| t.sequence_order);

            for task in steps {
                match task.status {
                    TaskStatus::Pending => {
                        return (true, NextApprover::Approver(task.approver_id));
                    }
                    TaskStatus::Rejected => return (false, NextApprover::Nobody),
                    _ => {}
                }
            }
            (true, NextApprover::Nobody)
        }
        SequenceMode::Parallel => {
            let pending = tasks
                .iter()
                .filter(|t| !t.is_manager_task && t.status == TaskStatus::Pending)
                .count();
            if pending > 0 {
                (true, NextApprover::Any(pending))
            } else {
                (true, NextApprover::Nobody)
            }
        }
    }
}
