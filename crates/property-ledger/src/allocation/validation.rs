use std::collections::BTreeSet;

use super::condition::{AllocationCondition, ConditionSpec};
use super::domain::{ExpenseTypeId, IncomeTypeId, RuleId, TransactionType};

/// Reasons a rule is rejected before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule name must not be blank")]
    BlankName,
    #[error("rule must have at least one condition")]
    NoConditions,
    #[error("unknown condition field '{0}'")]
    UnknownField(String),
    #[error("operator '{operator}' is not valid for field '{field}'")]
    InvalidOperator { field: String, operator: String },
    #[error("expense type can only be set on expense rules (rule type is {0:?})")]
    ExpenseTypeOnNonExpense(TransactionType),
    #[error("income type can only be set on income rules (rule type is {0:?})")]
    IncomeTypeOnNonIncome(TransactionType),
    #[error("rule cannot carry both an expense type and an income type")]
    BothTargetTypes,
    #[error("reorder ids do not match the property's rules")]
    ReorderMismatch,
    #[error("no priority is left after the property's last rule")]
    PriorityExhausted,
}

/// Convert stored conditions into typed ones, requiring at least one.
pub fn validate_conditions(
    specs: Vec<ConditionSpec>,
) -> Result<Vec<AllocationCondition>, RuleValidationError> {
    if specs.is_empty() {
        return Err(RuleValidationError::NoConditions);
    }
    specs.into_iter().map(AllocationCondition::try_from).collect()
}

pub fn validate_name(name: &str) -> Result<String, RuleValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RuleValidationError::BlankName);
    }
    Ok(trimmed.to_string())
}

/// Enforce that the target type ids agree with the rule's transaction type.
pub fn validate_target(
    transaction_type: TransactionType,
    expense_type_id: Option<ExpenseTypeId>,
    income_type_id: Option<IncomeTypeId>,
) -> Result<(), RuleValidationError> {
    if expense_type_id.is_some() && income_type_id.is_some() {
        return Err(RuleValidationError::BothTargetTypes);
    }
    if expense_type_id.is_some() && transaction_type != TransactionType::Expense {
        return Err(RuleValidationError::ExpenseTypeOnNonExpense(transaction_type));
    }
    if income_type_id.is_some() && transaction_type != TransactionType::Income {
        return Err(RuleValidationError::IncomeTypeOnNonIncome(transaction_type));
    }
    Ok(())
}

/// The requested order must name every existing rule exactly once.
pub fn validate_reorder(requested: &[RuleId], existing: &[RuleId]) -> Result<(), RuleValidationError> {
    let requested_set: BTreeSet<_> = requested.iter().copied().collect();
    let existing_set: BTreeSet<_> = existing.iter().copied().collect();
    if requested_set.len() != requested.len() || requested_set != existing_set {
        return Err(RuleValidationError::ReorderMismatch);
    }
    Ok(())
}
