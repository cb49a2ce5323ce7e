//! Expense approval engine.
//!
//! The engine owns the approval workflow for submitted expenses: per-employee
//! approval rules (sequential or parallel chains, optional manager gate, a
//! minimum approval percentage), the tasks materialized from those rules, and
//! the status transitions driven by approver decisions. Everything is backed
//! by the database through [`Engine`]; the decision logic itself lives in the
//! pure [`evaluation`] module.

pub use error::EngineError;
pub use evaluation::{Evaluation, NextApprover, can_act_now, evaluate};
pub use expenses::{Expense, ExpenseStatus};
pub use ops::{Decision, Engine, EngineBuilder, NewExpense, RuleSpec, StepSpec};
pub use rules::{ApprovalRule, SequenceMode};
pub use status::{
    ApprovalStatus, BulkApprovalStatus, EmployeePending, PendingExpense, PendingReview,
    ReviewQueue, RuleStats, TaskView,
};
pub use steps::ApprovalStep;
pub use tasks::{ApprovalTask, MANAGER_SEQUENCE_ORDER, TaskStatus};

mod companies;
mod error;
mod evaluation;
mod expenses;
mod ops;
mod rules;
mod status;
mod steps;
mod tasks;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
