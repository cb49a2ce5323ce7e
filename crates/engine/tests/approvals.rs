use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    Decision, Engine, EngineError, ExpenseStatus, NewExpense, RuleSpec, SequenceMode, StepSpec,
    TaskStatus,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();
    (engine, db)
}

async fn seed_company(db: &DatabaseConnection) -> Uuid {
    let id = Uuid::new_v4();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO companies (id, name, country, currency_code, created_at) \
         VALUES (?, ?, ?, ?, ?)",
        vec![
            id.into(),
            "Acme".into(),
            "US".into(),
            "USD".into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();
    id
}

async fn seed_user(db: &DatabaseConnection, company_id: Uuid, name: &str, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (id, company_id, name, email, role, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
        vec![
            id.into(),
            company_id.into(),
            name.into(),
            format!("{}@acme.test", name.to_lowercase()).into(),
            role.into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();
    id
}

fn new_expense(submitted_by: Uuid, amount_minor: i64) -> NewExpense {
    NewExpense {
        submitted_by,
        amount_minor,
        currency_code: "USD".to_string(),
        category: "travel".to_string(),
        description: Some("client visit".to_string()),
        expense_date: Utc::now().date_naive(),
    }
}

fn step(approver_id: Uuid, sequence_order: i32) -> StepSpec {
    StepSpec {
        approver_id,
        sequence_order,
        required: true,
    }
}

fn rule_spec(subject_id: Uuid, mode: SequenceMode, approvers: Vec<StepSpec>) -> RuleSpec {
    RuleSpec {
        subject_id,
        description: None,
        manager_id: None,
        manager_gate: false,
        sequence_mode: mode,
        min_approval_percentage: None,
        approvers,
    }
}

#[tokio::test]
async fn no_rule_approves_on_initiation() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;

    let expense_id = engine.submit_expense(new_expense(alice, 1000)).await.unwrap();
    let expense = engine.expense(expense_id).await.unwrap();
    assert_eq!(expense.status, ExpenseStatus::Pending);

    let status = engine.initiate_approval(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Approved);
    assert!(status.is_fully_approved);
    assert!(status.pending_tasks.is_empty());
    assert_eq!(status.next_approver, None);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;

    let err = engine.submit_expense(new_expense(alice, 0)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn rule_sequence_orders_must_be_contiguous() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    let gapped = rule_spec(
        alice,
        SequenceMode::Sequential,
        vec![step(bob, 1), step(carol, 3)],
    );
    let err = engine.create_approval_rule(gapped).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let duplicated = rule_spec(
        alice,
        SequenceMode::Sequential,
        vec![step(bob, 1), step(carol, 1)],
    );
    let err = engine.create_approval_rule(duplicated).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("duplicate sequence orders not allowed".to_string())
    );
}

#[tokio::test]
async fn one_rule_per_subject() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;

    engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]))
        .await
        .unwrap();
    let err = engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Parallel, vec![step(bob, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn empty_rule_approves_on_initiation() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;

    engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![]))
        .await
        .unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    let status = engine.initiate_approval(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Approved);
    assert!(status.is_fully_approved);
    assert!(status.pending_tasks.is_empty());
    assert!(status.completed_tasks.is_empty());
}

#[tokio::test]
async fn status_before_initiation_reports_no_progress() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;

    engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]))
        .await
        .unwrap();

    // Submitted but never initiated: no tasks exist yet, so the snapshot
    // must not claim the threshold is already met.
    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    let status = engine.approval_status(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Pending);
    assert!(!status.is_fully_approved);
    assert_eq!(status.approval_percentage, 0.0);

    let expense = engine.expense(expense_id).await.unwrap();
    assert_eq!(expense.status, ExpenseStatus::Pending);
}

#[tokio::test]
async fn sequential_chain_enforces_order() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    engine
        .create_approval_rule(rule_spec(
            alice,
            SequenceMode::Sequential,
            vec![step(bob, 1), step(carol, 2)],
        ))
        .await
        .unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    let status = engine.initiate_approval(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::InProgress);
    assert_eq!(status.next_approver.as_deref(), Some("Bob"));
    assert_eq!(status.pending_tasks.len(), 2);

    // Carol may not act before Bob.
    let err = engine
        .record_decision(expense_id, carol, Decision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let status = engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap();
    assert_eq!(status.current_status, ExpenseStatus::InProgress);
    assert_eq!(status.next_approver.as_deref(), Some("Carol"));
    assert_eq!(status.approval_percentage, 50.0);

    let status = engine
        .record_decision(expense_id, carol, Decision::Approve, None)
        .await
        .unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Approved);
    assert!(status.is_fully_approved);
    assert!(status.pending_tasks.is_empty());
    assert_eq!(status.completed_tasks.len(), 2);
}

#[tokio::test]
async fn parallel_threshold_sweeps_remaining_tasks() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    let mut spec = rule_spec(
        alice,
        SequenceMode::Parallel,
        vec![step(bob, 1), step(carol, 2)],
    );
    spec.min_approval_percentage = Some(50.0);
    engine.create_approval_rule(spec).await.unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    engine.initiate_approval(expense_id).await.unwrap();

    let status = engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Approved);
    assert!(status.is_fully_approved);
    assert!(status.pending_tasks.is_empty());

    // Carol's task was closed by the sweep, not by Carol.
    let swept = status
        .completed_tasks
        .iter()
        .find(|t| t.approver_id == carol)
        .unwrap();
    assert_eq!(swept.status, TaskStatus::AutoApproved);
    assert!(swept.comments.is_some());
}

#[tokio::test]
async fn manager_gate_blocks_steps_until_approved() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let dave = seed_user(&db, company, "Dave", "manager").await;

    let mut spec = rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]);
    spec.manager_id = Some(dave);
    spec.manager_gate = true;
    engine.create_approval_rule(spec).await.unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    let status = engine.initiate_approval(expense_id).await.unwrap();
    assert!(status.manager_approval_required);
    assert!(!status.manager_approved);
    assert!(!status.can_proceed_to_next_step);
    assert_eq!(status.next_approver.as_deref(), Some("Dave"));

    let err = engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let status = engine
        .record_decision(expense_id, dave, Decision::Approve, None)
        .await
        .unwrap();
    assert!(status.manager_approved);
    assert!(status.can_proceed_to_next_step);
    assert_eq!(status.next_approver.as_deref(), Some("Bob"));

    let status = engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn rejection_is_terminal_and_requires_comment() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    engine
        .create_approval_rule(rule_spec(
            alice,
            SequenceMode::Parallel,
            vec![step(bob, 1), step(carol, 2)],
        ))
        .await
        .unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    engine.initiate_approval(expense_id).await.unwrap();

    let err = engine
        .record_decision(expense_id, bob, Decision::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let status = engine
        .record_decision(expense_id, bob, Decision::Reject, Some("over budget".to_string()))
        .await
        .unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Rejected);
    assert!(!status.can_proceed_to_next_step);
    assert_eq!(status.next_approver, None);

    // The chain is dead: Carol's still-pending task cannot be acted on.
    let err = engine
        .record_decision(expense_id, carol, Decision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // And a rejected expense cannot be re-initiated.
    let err = engine.initiate_approval(expense_id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let status = engine.approval_status(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Rejected);
}

#[tokio::test]
async fn reinitiation_discards_previous_tasks() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    engine
        .create_approval_rule(rule_spec(
            alice,
            SequenceMode::Sequential,
            vec![step(bob, 1), step(carol, 2)],
        ))
        .await
        .unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    engine.initiate_approval(expense_id).await.unwrap();
    engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap();

    // Starting over resets Bob's approval and recreates a clean task set.
    let status = engine.initiate_approval(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::InProgress);
    assert_eq!(status.pending_tasks.len(), 2);
    assert!(status.completed_tasks.is_empty());
    assert_eq!(status.approval_percentage, 0.0);
    assert_eq!(status.next_approver.as_deref(), Some("Bob"));
}

#[tokio::test]
async fn employee_view_lists_in_flight_expenses() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;

    engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]))
        .await
        .unwrap();

    let first = engine.submit_expense(new_expense(alice, 700)).await.unwrap();
    let second = engine.submit_expense(new_expense(alice, 300)).await.unwrap();
    engine.initiate_approval(first).await.unwrap();
    engine.initiate_approval(second).await.unwrap();

    let view = engine.pending_for_employee(alice).await.unwrap();
    assert_eq!(view.total_count, 2);
    assert_eq!(view.pending_amount_minor, 1000);
    let entry = view
        .pending_requests
        .iter()
        .find(|p| p.expense_id == first)
        .unwrap();
    assert_eq!(entry.current_status, ExpenseStatus::InProgress);
    assert_eq!(entry.pending_tasks_count, 1);
    assert_eq!(entry.next_approver.as_deref(), Some("Bob"));
}

#[tokio::test]
async fn approver_queue_shows_only_actionable_tasks() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    engine
        .create_approval_rule(rule_spec(
            alice,
            SequenceMode::Sequential,
            vec![step(bob, 1), step(carol, 2)],
        ))
        .await
        .unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    engine.initiate_approval(expense_id).await.unwrap();

    // Bob is first in the chain; Carol is blocked behind him.
    let queue = engine.pending_for_approver(bob).await.unwrap();
    assert_eq!(queue.total_count, 1);
    assert_eq!(queue.pending_reviews[0].expense_id, expense_id);
    assert_eq!(queue.pending_reviews[0].submitted_by_name, "Alice");
    assert!(!queue.pending_reviews[0].urgent);

    let queue = engine.pending_for_approver(carol).await.unwrap();
    assert_eq!(queue.total_count, 0);

    // The admin view sees both pending tasks regardless of eligibility.
    let queue = engine.pending_for_admin().await.unwrap();
    assert_eq!(queue.total_count, 2);

    engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap();
    let queue = engine.pending_for_approver(carol).await.unwrap();
    assert_eq!(queue.total_count, 1);
}

#[tokio::test]
async fn approver_queue_drops_threshold_satisfied_expenses() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    let mut spec = rule_spec(
        alice,
        SequenceMode::Parallel,
        vec![step(bob, 1), step(carol, 2)],
    );
    spec.min_approval_percentage = Some(50.0);
    engine.create_approval_rule(spec).await.unwrap();

    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    engine.initiate_approval(expense_id).await.unwrap();
    engine
        .record_decision(expense_id, bob, Decision::Approve, None)
        .await
        .unwrap();

    // The threshold sweep already closed Carol's task.
    let queue = engine.pending_for_approver(carol).await.unwrap();
    assert_eq!(queue.total_count, 0);
}

#[tokio::test]
async fn bulk_status_skips_unknown_ids() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;

    engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]))
        .await
        .unwrap();

    let first = engine.submit_expense(new_expense(alice, 700)).await.unwrap();
    let second = engine.submit_expense(new_expense(alice, 300)).await.unwrap();
    engine.initiate_approval(first).await.unwrap();
    engine.initiate_approval(second).await.unwrap();
    engine
        .record_decision(first, bob, Decision::Approve, None)
        .await
        .unwrap();

    let bulk = engine
        .bulk_approval_status(&[first, second, Uuid::new_v4()])
        .await
        .unwrap();
    assert_eq!(bulk.expenses.len(), 2);
    assert_eq!(bulk.approved, 1);
    assert_eq!(bulk.in_progress, 1);
    assert_eq!(bulk.rejected, 0);
}

#[tokio::test]
async fn update_rule_replaces_steps_wholesale() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "manager").await;

    let rule = engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]))
        .await
        .unwrap();

    let updated = engine
        .update_approval_rule(
            rule.id,
            rule_spec(
                alice,
                SequenceMode::Parallel,
                vec![step(carol, 1), step(bob, 2)],
            ),
        )
        .await
        .unwrap();
    assert_eq!(updated.sequence_mode, SequenceMode::Parallel);
    assert_eq!(updated.steps.len(), 2);
    assert_eq!(updated.steps[0].approver_id, carol);

    engine.delete_approval_rule(rule.id).await.unwrap();
    let err = engine.approval_rule_for_subject(alice).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    // With the rule gone, new initiations approve immediately.
    let expense_id = engine.submit_expense(new_expense(alice, 500)).await.unwrap();
    let status = engine.initiate_approval(expense_id).await.unwrap();
    assert_eq!(status.current_status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn rule_stats_aggregate_configuration() {
    let (engine, db) = engine_with_db().await;
    let company = seed_company(&db).await;
    let alice = seed_user(&db, company, "Alice", "employee").await;
    let bob = seed_user(&db, company, "Bob", "manager").await;
    let carol = seed_user(&db, company, "Carol", "employee").await;
    let dave = seed_user(&db, company, "Dave", "manager").await;

    engine
        .create_approval_rule(rule_spec(alice, SequenceMode::Sequential, vec![step(bob, 1)]))
        .await
        .unwrap();
    let mut spec = rule_spec(
        carol,
        SequenceMode::Parallel,
        vec![step(bob, 1), step(dave, 2)],
    );
    spec.manager_id = Some(dave);
    spec.manager_gate = true;
    engine.create_approval_rule(spec).await.unwrap();

    let stats = engine.approval_rule_stats().await.unwrap();
    assert_eq!(stats.total_rules, 2);
    assert_eq!(stats.sequential_rules, 1);
    assert_eq!(stats.parallel_rules, 1);
    assert_eq!(stats.rules_with_manager_gate, 1);
    assert_eq!(stats.average_steps_per_rule, 1.5);
}
