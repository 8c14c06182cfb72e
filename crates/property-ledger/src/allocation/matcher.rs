use super::condition::matches_all;
use super::domain::{AllocationRule, Transaction};

/// How many rules claimed a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<'a> {
    NoMatch,
    Single(&'a AllocationRule),
    Conflict(Vec<&'a AllocationRule>),
}

/// Every rule whose full condition set matches, in input order.
///
/// There is no priority short-circuit: all rules are evaluated.
pub fn find_matches<'a>(
    transaction: &Transaction,
    rules: &'a [AllocationRule],
) -> Vec<&'a AllocationRule> {
    rules
        .iter()
        .filter(|rule| matches_all(transaction, &rule.conditions))
        .collect()
}

pub fn classify<'a>(transaction: &Transaction, rules: &'a [AllocationRule]) -> MatchOutcome<'a> {
    let mut matching = find_matches(transaction, rules);
    match matching.len() {
        0 => MatchOutcome::NoMatch,
        1 => MatchOutcome::Single(matching.remove(0)),
        _ => MatchOutcome::Conflict(matching),
    }
}
