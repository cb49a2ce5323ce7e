use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    ApprovalRule, ApprovalTask, EngineError, Expense, ResultEngine, expenses, rules, steps, tasks,
    users,
};

use super::Engine;

impl Engine {
    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        label: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("{label} not exists")))
    }

    pub(super) async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        Expense::try_from(model)
    }

    /// Loads the rule governing a subject, steps attached and sorted.
    pub(super) async fn rule_for_subject(
        &self,
        db: &DatabaseTransaction,
        subject_id: Uuid,
    ) -> ResultEngine<Option<ApprovalRule>> {
        let Some(model) = rules::Entity::find()
            .filter(rules::Column::SubjectId.eq(subject_id))
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(self.attach_steps(db, model).await?))
    }

    pub(super) async fn require_rule_by_id(
        &self,
        db: &DatabaseTransaction,
        rule_id: Uuid,
    ) -> ResultEngine<ApprovalRule> {
        let model = rules::Entity::find_by_id(rule_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("approval rule not exists".to_string()))?;
        self.attach_steps(db, model).await
    }

    async fn attach_steps(
        &self,
        db: &DatabaseTransaction,
        model: rules::Model,
    ) -> ResultEngine<ApprovalRule> {
        let step_models = steps::Entity::find()
            .filter(steps::Column::RuleId.eq(model.id))
            .order_by_asc(steps::Column::SequenceOrder)
            .all(db)
            .await?;

        let mut rule = ApprovalRule::try_from(model)?;
        rule.steps = step_models.into_iter().map(Into::into).collect();
        Ok(rule)
    }

    /// All tasks for an expense, manager gate first, then step order.
    pub(super) async fn tasks_for_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<Vec<ApprovalTask>> {
        let models = tasks::Entity::find()
            .filter(tasks::Column::ExpenseId.eq(expense_id))
            .order_by_asc(tasks::Column::SequenceOrder)
            .all(db)
            .await?;

        models.into_iter().map(ApprovalTask::try_from).collect()
    }

    /// Resolves user names for a set of ids in one query. Missing ids are
    /// simply absent from the map; display falls back to "Unknown".
    pub(super) async fn user_names(
        &self,
        db: &DatabaseTransaction,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> ResultEngine<HashMap<Uuid, String>> {
        let ids: Vec<Uuid> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let models = users::Entity::find()
            .filter(users::Column::Id.is_in(ids))
            .all(db)
            .await?;
        Ok(models.into_iter().map(|u| (u.id, u.name)).collect())
    }
}
