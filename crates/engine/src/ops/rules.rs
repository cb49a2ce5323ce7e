use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ActiveValue, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    ApprovalRule, EngineError, ResultEngine, RuleStats, SequenceMode, rules,
    steps::{self, ApprovalStep},
    users,
};

use super::{Engine, normalize_optional_text, with_tx};

/// One approver slot in a rule specification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepSpec {
    pub approver_id: Uuid,
    pub sequence_order: i32,
    pub required: bool,
}

/// Input for creating or replacing an approval rule.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSpec {
    pub subject_id: Uuid,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub manager_gate: bool,
    pub sequence_mode: SequenceMode,
    /// Defaults to 100 when `None`.
    pub min_approval_percentage: Option<f64>,
    pub approvers: Vec<StepSpec>,
}

/// Step sequence orders must be a permutation of `1..=N`.
fn validate_step_orders(approvers: &[StepSpec]) -> ResultEngine<()> {
    if approvers.is_empty() {
        return Ok(());
    }
    let orders: HashSet<i32> = approvers.iter().map(|s| s.sequence_order).collect();
    if orders.len() != approvers.len() {
        return Err(EngineError::Validation(
            "duplicate sequence orders not allowed".to_string(),
        ));
    }
    let min = approvers.iter().map(|s| s.sequence_order).min().unwrap_or(0);
    let max = approvers.iter().map(|s| s.sequence_order).max().unwrap_or(0);
    if min != 1 || max != approvers.len() as i32 {
        return Err(EngineError::Validation(
            "sequence orders must start from 1 and be consecutive".to_string(),
        ));
    }
    Ok(())
}

fn validate_min_percentage(value: f64) -> ResultEngine<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::Validation(
            "min_approval_percentage must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    async fn validate_rule_spec(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        spec: &RuleSpec,
    ) -> ResultEngine<()> {
        self.require_user(db_tx, spec.subject_id, "user").await?;
        if let Some(manager_id) = spec.manager_id {
            self.require_user(db_tx, manager_id, "manager").await?;
        }

        validate_step_orders(&spec.approvers)?;
        validate_min_percentage(spec.min_approval_percentage.unwrap_or(100.0))?;

        let approver_ids: Vec<Uuid> = spec.approvers.iter().map(|s| s.approver_id).collect();
        if !approver_ids.is_empty() {
            let found = users::Entity::find()
                .filter(users::Column::Id.is_in(approver_ids.clone()))
                .all(db_tx)
                .await?;
            let found_ids: HashSet<Uuid> = found.iter().map(|u| u.id).collect();
            if let Some(missing) = approver_ids.iter().find(|id| !found_ids.contains(id)) {
                return Err(EngineError::KeyNotFound(format!(
                    "approver {missing} not exists"
                )));
            }
        }
        Ok(())
    }

    /// Creates the approval rule governing one subject employee.
    ///
    /// Each subject has at most one rule; a second creation fails with
    /// [`EngineError::ExistingKey`].
    pub async fn create_approval_rule(&self, spec: RuleSpec) -> ResultEngine<ApprovalRule> {
        with_tx!(self, |db_tx| {
            let existing = rules::Entity::find()
                .filter(rules::Column::SubjectId.eq(spec.subject_id))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "approval rule for user {}",
                    spec.subject_id
                )));
            }

            self.validate_rule_spec(&db_tx, &spec).await?;

            let rule_id = Uuid::new_v4();
            let now = Utc::now();
            let rule = ApprovalRule {
                id: rule_id,
                subject_id: spec.subject_id,
                description: normalize_optional_text(spec.description.as_deref()),
                manager_id: spec.manager_id,
                manager_gate: spec.manager_gate,
                sequence_mode: spec.sequence_mode,
                min_approval_percentage: spec.min_approval_percentage.unwrap_or(100.0),
                created_at: now,
                updated_at: None,
                steps: spec
                    .approvers
                    .iter()
                    .map(|s| ApprovalStep {
                        id: Uuid::new_v4(),
                        rule_id,
                        approver_id: s.approver_id,
                        sequence_order: s.sequence_order,
                        required: s.required,
                    })
                    .collect(),
            };

            rules::ActiveModel::from(&rule).insert(&db_tx).await?;
            for step in &rule.steps {
                steps::ActiveModel::from(step).insert(&db_tx).await?;
            }

            let mut rule = rule;
            rule.steps.sort_by_key(|s| s.sequence_order);
            Ok(rule)
        })
    }

    /// Replaces an existing rule's configuration and step set wholesale.
    ///
    /// Tasks already materialized for in-flight expenses are untouched; the
    /// new configuration applies to future initiations only.
    pub async fn update_approval_rule(
        &self,
        rule_id: Uuid,
        spec: RuleSpec,
    ) -> ResultEngine<ApprovalRule> {
        with_tx!(self, |db_tx| {
            let current = self.require_rule_by_id(&db_tx, rule_id).await?;
            if current.subject_id != spec.subject_id {
                return Err(EngineError::Validation(
                    "an approval rule cannot change subject".to_string(),
                ));
            }

            self.validate_rule_spec(&db_tx, &spec).await?;

            let now = Utc::now();
            let active = rules::ActiveModel {
                id: ActiveValue::Set(rule_id),
                description: ActiveValue::Set(normalize_optional_text(spec.description.as_deref())),
                manager_id: ActiveValue::Set(spec.manager_id),
                manager_gate: ActiveValue::Set(spec.manager_gate),
                sequence_mode: ActiveValue::Set(spec.sequence_mode.as_str().to_string()),
                min_approval_percentage: ActiveValue::Set(
                    spec.min_approval_percentage.unwrap_or(100.0),
                ),
                updated_at: ActiveValue::Set(Some(now)),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            steps::Entity::delete_many()
                .filter(steps::Column::RuleId.eq(rule_id))
                .exec(&db_tx)
                .await?;
            for s in &spec.approvers {
                let step = ApprovalStep {
                    id: Uuid::new_v4(),
                    rule_id,
                    approver_id: s.approver_id,
                    sequence_order: s.sequence_order,
                    required: s.required,
                };
                steps::ActiveModel::from(&step).insert(&db_tx).await?;
            }

            self.require_rule_by_id(&db_tx, rule_id).await
        })
    }

    /// Deletes a rule and its steps. Future initiations for the subject
    /// auto-approve until a new rule is configured.
    pub async fn delete_approval_rule(&self, rule_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_rule_by_id(&db_tx, rule_id).await?;
            steps::Entity::delete_many()
                .filter(steps::Column::RuleId.eq(rule_id))
                .exec(&db_tx)
                .await?;
            rules::Entity::delete_by_id(rule_id).exec(&db_tx).await?;
            Ok(())
        })
    }

    /// Returns the rule governing a subject, steps attached.
    pub async fn approval_rule_for_subject(&self, subject_id: Uuid) -> ResultEngine<ApprovalRule> {
        with_tx!(self, |db_tx| {
            self.rule_for_subject(&db_tx, subject_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("approval rule not exists".to_string()))
        })
    }

    /// Aggregate statistics over the configured rules.
    pub async fn approval_rule_stats(&self) -> ResultEngine<RuleStats> {
        with_tx!(self, |db_tx| {
            let total_rules = rules::Entity::find().count(&db_tx).await?;
            let sequential_rules = rules::Entity::find()
                .filter(rules::Column::SequenceMode.eq(SequenceMode::Sequential.as_str()))
                .count(&db_tx)
                .await?;
            let parallel_rules = total_rules.saturating_sub(sequential_rules);
            let rules_with_manager_gate = rules::Entity::find()
                .filter(rules::Column::ManagerGate.eq(true))
                .filter(rules::Column::ManagerId.is_not_null())
                .count(&db_tx)
                .await?;
            let total_steps = steps::Entity::find().count(&db_tx).await?;
            let average_steps_per_rule = if total_rules > 0 {
                total_steps as f64 / total_rules as f64
            } else {
                0.0
            };

            Ok(RuleStats {
                total_rules,
                sequential_rules,
                parallel_rules,
                rules_with_manager_gate,
                average_steps_per_rule,
            })
        })
    }
}
