use super::domain::{AllocationRule, LineItem, Transaction, TransactionType};

/// The full set of line items a transaction should carry after a rule assigns `type_id`.
///
/// Existing items are kept and retagged. A transaction without items gets one
/// item mirroring it, booked at the absolute amount.
pub fn resolve_line_items<K: Copy>(
    existing: &[LineItem<K>],
    type_id: K,
    transaction: &Transaction,
) -> Vec<LineItem<K>> {
    if !existing.is_empty() {
        return existing
            .iter()
            .map(|item| LineItem {
                type_id,
                ..item.clone()
            })
            .collect();
    }

    let amount = transaction.amount.abs();
    vec![LineItem {
        id: None,
        type_id,
        property_id: transaction.property_id,
        transaction_id: transaction.id,
        description: transaction.description.clone().unwrap_or_default(),
        amount,
        quantity: 1,
        total_amount: amount,
        accounting_date: transaction.accounting_date,
    }]
}

/// Standard assignment: set the rule's transaction type and retag or synthesize its line items.
pub fn assign_rule(transaction: &Transaction, rule: &AllocationRule) -> Transaction {
    let mut updated = transaction.clone();
    updated.transaction_type = rule.transaction_type;

    match (rule.transaction_type, rule.expense_type_id, rule.income_type_id) {
        (TransactionType::Expense, Some(expense_type_id), _) => {
            updated.expenses = resolve_line_items(&transaction.expenses, expense_type_id, transaction);
        }
        (TransactionType::Income, _, Some(income_type_id)) => {
            updated.incomes = resolve_line_items(&transaction.incomes, income_type_id, transaction);
        }
        _ => {}
    }

    updated
}
