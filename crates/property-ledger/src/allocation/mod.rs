//! Rule-based allocation of imported bank transactions.
//!
//! Active rules of a property are evaluated against each pending, untyped
//! transaction. A single match assigns the rule's type (or, for the loan
//! payment type, splits the amount into principal, interest and fees); zero
//! matches and conflicting matches are reported back without changes.

pub mod condition;
pub mod domain;
pub mod line_items;
pub mod loan;
pub mod matcher;
pub mod report;
pub mod repository;
pub mod router;
mod rules;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use condition::{
    matches, matches_all, matches_spec, parse_condition_amount, AllocationCondition,
    AmountOperator, ConditionSpec, TextField, TextOperator,
};
pub use domain::{
    AllocationRule, AllocationRuleUpdate, Expense, ExpenseTypeId, Income, IncomeTypeId, LineItem,
    LineItemId, NewAllocationRule, PropertyId, RuleDraft, RuleId, Transaction, TransactionId,
    TransactionStatus, TransactionType, UserId,
};
pub use line_items::{assign_rule, resolve_line_items};
pub use loan::{
    is_loan_payment_message, parse_loan_payment_details, parse_loan_payment_message,
    plan_loan_split, LoanExpenseTypes, LoanPaymentComponents, LoanPaymentMessage, LoanSplitError,
};
pub use matcher::{classify, find_matches, MatchOutcome};
pub use report::{
    AllocatedEntry, AllocationAction, AllocationResult, AllocationSummary, ConflictEntry, RuleRef,
    SkipReason, SkippedEntry,
};
pub use repository::{
    ExpenseTypeLookup, ExpenseTypeRecord, OwnershipCheck, RepositoryError, RuleRepository,
    TransactionRepository,
};
pub use router::{allocation_router, ApplyRequest, ReorderRequest, USER_HEADER};
pub use service::{AllocationError, AllocationService, LoanPaymentSplitError};
pub use validation::RuleValidationError;
