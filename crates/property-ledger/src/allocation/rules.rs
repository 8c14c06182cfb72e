use std::collections::HashMap;

use tracing::{error, info};

use super::domain::{
    AllocationRule, AllocationRuleUpdate, NewAllocationRule, PropertyId, RuleDraft, RuleId, UserId,
};
use super::repository::{ExpenseTypeLookup, OwnershipCheck, RuleRepository, TransactionRepository};
use super::service::{AllocationError, AllocationService};
use super::validation::{
    validate_conditions, validate_name, validate_reorder, validate_target, RuleValidationError,
};

impl<O, R, T, E> AllocationService<O, R, T, E>
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    /// Validate and store a new rule. Without an explicit priority it goes last.
    pub fn create_rule(
        &self,
        user: &UserId,
        property_id: PropertyId,
        input: NewAllocationRule,
    ) -> Result<AllocationRule, AllocationError> {
        self.authorize(user, property_id)?;

        let name = validate_name(&input.name)?;
        let conditions = validate_conditions(input.conditions)?;
        validate_target(
            input.transaction_type,
            input.expense_type_id,
            input.income_type_id,
        )?;

        let priority = match input.priority {
            Some(priority) => priority,
            None => match self.rules.max_priority(property_id)? {
                Some(max) => max
                    .checked_add(1)
                    .ok_or(RuleValidationError::PriorityExhausted)?,
                None => 0,
            },
        };

        let rule = self.rules.insert(RuleDraft {
            property_id,
            name,
            priority,
            transaction_type: input.transaction_type,
            expense_type_id: input.expense_type_id,
            income_type_id: input.income_type_id,
            conditions,
            is_active: input.is_active.unwrap_or(true),
        })?;

        info!(rule_id = %rule.id, %property_id, priority, "allocation rule created");
        Ok(rule)
    }

    pub fn update_rule(
        &self,
        user: &UserId,
        rule_id: RuleId,
        update: AllocationRuleUpdate,
    ) -> Result<AllocationRule, AllocationError> {
        let mut rule = self.find_rule(user, rule_id)?;

        if let Some(name) = update.name {
            rule.name = validate_name(&name)?;
        }
        if let Some(conditions) = update.conditions {
            rule.conditions = validate_conditions(conditions)?;
        }
        match update.transaction_type {
            Some(transaction_type) => {
                rule.transaction_type = transaction_type;
                rule.expense_type_id = update.expense_type_id;
                rule.income_type_id = update.income_type_id;
            }
            None => {
                if update.expense_type_id.is_some() {
                    rule.expense_type_id = update.expense_type_id;
                }
                if update.income_type_id.is_some() {
                    rule.income_type_id = update.income_type_id;
                }
            }
        }
        validate_target(
            rule.transaction_type,
            rule.expense_type_id,
            rule.income_type_id,
        )?;
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }
        if let Some(is_active) = update.is_active {
            rule.is_active = is_active;
        }

        let saved = self.rules.save(rule)?;
        info!(rule_id = %saved.id, property_id = %saved.property_id, "allocation rule updated");
        Ok(saved)
    }

    pub fn delete_rule(&self, user: &UserId, rule_id: RuleId) -> Result<(), AllocationError> {
        let rule = self.find_rule(user, rule_id)?;
        self.rules.remove(rule.id)?;
        info!(%rule_id, property_id = %rule.property_id, "allocation rule deleted");
        Ok(())
    }

    pub fn find_rule(
        &self,
        user: &UserId,
        rule_id: RuleId,
    ) -> Result<AllocationRule, AllocationError> {
        let rule = self
            .rules
            .find_one(rule_id)?
            .ok_or(AllocationError::RuleNotFound(rule_id))?;
        self.authorize(user, rule.property_id)?;
        Ok(rule)
    }

    pub fn find_rules_by_property(
        &self,
        user: &UserId,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, AllocationError> {
        self.authorize(user, property_id)?;
        Ok(self.rules.find_by_property(property_id)?)
    }

    /// Reassign priorities so that `ordered` position `n` gets priority `n`.
    pub fn reorder_rules(
        &self,
        user: &UserId,
        property_id: PropertyId,
        ordered: &[RuleId],
    ) -> Result<Vec<AllocationRule>, AllocationError> {
        self.authorize(user, property_id)?;

        let existing = self.rules.find_by_property(property_id)?;
        let existing_ids: Vec<RuleId> = existing.iter().map(|rule| rule.id).collect();
        validate_reorder(ordered, &existing_ids)?;

        let mut by_id: HashMap<RuleId, AllocationRule> =
            existing.into_iter().map(|rule| (rule.id, rule)).collect();

        let mut pending = Vec::with_capacity(ordered.len());
        for (position, id) in ordered.iter().enumerate() {
            let mut rule = by_id
                .remove(id)
                .ok_or(AllocationError::RuleNotFound(*id))?;
            rule.priority =
                i32::try_from(position).map_err(|_| RuleValidationError::PriorityExhausted)?;
            pending.push(rule);
        }

        let mut reordered = Vec::with_capacity(pending.len());
        for rule in pending {
            let rule_id = rule.id;
            let position = rule.priority;
            match self.rules.save(rule) {
                Ok(saved) => reordered.push(saved),
                Err(err) => {
                    error!(
                        %property_id,
                        %rule_id,
                        position,
                        written = reordered.len(),
                        error = %err,
                        "reorder stopped before all priorities were written"
                    );
                    return Err(err.into());
                }
            }
        }

        info!(%property_id, rules = reordered.len(), "allocation rules reordered");
        Ok(reordered)
    }
}
