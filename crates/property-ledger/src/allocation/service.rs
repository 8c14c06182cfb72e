use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, error, info, warn};

use super::domain::{
    AllocationRule, PropertyId, RuleId, Transaction, TransactionId, TransactionType, UserId,
};
use super::line_items::assign_rule;
use super::loan::{plan_loan_split, LoanExpenseTypes, LoanSplitError};
use super::matcher::{classify, MatchOutcome};
use super::report::{AllocationAction, AllocationResult, SkipReason};
use super::repository::{
    ExpenseTypeLookup, OwnershipCheck, RepositoryError, RuleRepository, TransactionRepository,
};
use super::validation::RuleValidationError;
use crate::config::AllocationConfig;

/// Service composing ownership checks, rule and transaction storage, and the
/// expense-type lookup into batch allocation and rule management.
pub struct AllocationService<O, R, T, E> {
    pub(super) ownership: Arc<O>,
    pub(super) rules: Arc<R>,
    transactions: Arc<T>,
    expense_types: Arc<E>,
    config: AllocationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commit {
    Persist,
    DryRun,
}

impl<O, R, T, E> AllocationService<O, R, T, E>
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    pub fn new(
        ownership: Arc<O>,
        rules: Arc<R>,
        transactions: Arc<T>,
        expense_types: Arc<E>,
        config: AllocationConfig,
    ) -> Self {
        Self {
            ownership,
            rules,
            transactions,
            expense_types,
            config,
        }
    }

    pub(super) fn authorize(
        &self,
        user: &UserId,
        property_id: PropertyId,
    ) -> Result<(), AllocationError> {
        if self.ownership.has_ownership(user, property_id)? {
            Ok(())
        } else {
            Err(AllocationError::Forbidden { property_id })
        }
    }

    /// Allocate the given transactions of a property against its active rules.
    pub fn apply(
        &self,
        user: &UserId,
        property_id: PropertyId,
        transaction_ids: &[TransactionId],
    ) -> Result<AllocationResult, AllocationError> {
        self.run(user, property_id, transaction_ids, Commit::Persist)
    }

    /// Same classification as [`apply`](Self::apply) without persisting anything.
    pub fn preview(
        &self,
        user: &UserId,
        property_id: PropertyId,
        transaction_ids: &[TransactionId],
    ) -> Result<AllocationResult, AllocationError> {
        self.run(user, property_id, transaction_ids, Commit::DryRun)
    }

    /// Split a loan payment into expense rows and persist it.
    ///
    /// On a split error the transaction is left untouched and nothing is saved.
    pub fn handle_loan_payment_split(
        &self,
        transaction: &Transaction,
        types: &LoanExpenseTypes,
    ) -> Result<Transaction, LoanPaymentSplitError> {
        self.split_loan_payment(transaction, types, Commit::Persist)
    }

    fn split_loan_payment(
        &self,
        transaction: &Transaction,
        types: &LoanExpenseTypes,
        commit: Commit,
    ) -> Result<Transaction, LoanPaymentSplitError> {
        let expenses = plan_loan_split(transaction, types)?;

        let mut updated = transaction.clone();
        updated.transaction_type = TransactionType::Expense;
        updated.expenses = expenses;

        Ok(self.commit(updated, commit)?)
    }

    fn commit(&self, transaction: Transaction, commit: Commit) -> Result<Transaction, RepositoryError> {
        match commit {
            Commit::Persist => self.transactions.save(transaction),
            Commit::DryRun => Ok(transaction),
        }
    }

    fn run(
        &self,
        user: &UserId,
        property_id: PropertyId,
        transaction_ids: &[TransactionId],
        commit: Commit,
    ) -> Result<AllocationResult, AllocationError> {
        self.authorize(user, property_id)?;

        if transaction_ids.is_empty() {
            return Ok(AllocationResult::default());
        }

        let rules = self.rules.find_active_by_property(property_id)?;
        let loaded =
            self.transactions
                .find_by_ids_and_property(transaction_ids, property_id, true)?;
        let loan_types = LoanExpenseTypes::resolve(self.expense_types.as_ref())?;

        let mut by_id: HashMap<TransactionId, Transaction> = loaded
            .into_iter()
            .map(|transaction| (transaction.id, transaction))
            .collect();

        let mut result = AllocationResult::default();
        for id in transaction_ids {
            let Some(transaction) = by_id.remove(id) else {
                debug!(transaction_id = %id, %property_id, "transaction not loaded, ignoring");
                continue;
            };
            self.allocate_one(&transaction, &rules, &loan_types, commit, &mut result)?;
        }

        let summary = result.summary();
        info!(
            %property_id,
            dry_run = (commit == Commit::DryRun),
            rules = rules.len(),
            allocated = summary.allocated,
            skipped = summary.skipped,
            conflicting = summary.conflicting,
            "allocation batch finished"
        );

        Ok(result)
    }

    fn allocate_one(
        &self,
        transaction: &Transaction,
        rules: &[AllocationRule],
        loan_types: &LoanExpenseTypes,
        commit: Commit,
        result: &mut AllocationResult,
    ) -> Result<(), AllocationError> {
        let transaction_id = transaction.id;

        if !transaction.is_allocation_candidate() {
            result.record_skipped(transaction_id, SkipReason::AlreadyAllocated);
            return Ok(());
        }

        match classify(transaction, rules) {
            MatchOutcome::NoMatch => {
                result.record_skipped(transaction_id, SkipReason::NoMatch);
            }
            MatchOutcome::Conflict(matching) => {
                debug!(
                    %transaction_id,
                    rules = matching.len(),
                    "multiple rules match, leaving transaction unallocated"
                );
                result.record_conflict(transaction_id, &matching);
            }
            MatchOutcome::Single(rule) if loan_types.is_loan_payment_type(rule.expense_type_id) => {
                match self.split_loan_payment(transaction, loan_types, commit) {
                    Ok(_) => {
                        debug!(%transaction_id, rule_id = %rule.id, "loan payment split");
                        result.record_allocated(transaction_id, rule, AllocationAction::LoanSplit);
                    }
                    Err(LoanPaymentSplitError::Split(reason)) => {
                        warn!(%transaction_id, rule_id = %rule.id, %reason, "loan payment split failed");
                        result.record_skipped(transaction_id, SkipReason::LoanSplitFailed);
                    }
                    Err(LoanPaymentSplitError::Save(err)) => {
                        self.save_failed(transaction_id, err, result)?;
                    }
                }
            }
            MatchOutcome::Single(rule) => {
                let updated = assign_rule(transaction, rule);
                match self.commit(updated, commit) {
                    Ok(_) => {
                        debug!(
                            %transaction_id,
                            rule_id = %rule.id,
                            transaction_type = rule.transaction_type.label(),
                            "transaction type set"
                        );
                        result.record_allocated(transaction_id, rule, AllocationAction::TypeSet);
                    }
                    Err(err) => self.save_failed(transaction_id, err, result)?,
                }
            }
        }

        Ok(())
    }

    fn save_failed(
        &self,
        transaction_id: TransactionId,
        err: RepositoryError,
        result: &mut AllocationResult,
    ) -> Result<(), AllocationError> {
        if !self.config.isolate_save_failures {
            return Err(err.into());
        }
        error!(%transaction_id, error = %err, "saving allocated transaction failed");
        result.record_skipped(transaction_id, SkipReason::SaveFailed);
        Ok(())
    }
}

/// Error raised by the allocation service.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("caller does not own property {property_id}")]
    Forbidden { property_id: PropertyId },
    #[error("allocation rule {0} not found")]
    RuleNotFound(RuleId),
    #[error(transparent)]
    Validation(#[from] RuleValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AllocationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AllocationError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AllocationError::RuleNotFound(_)
            | AllocationError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            AllocationError::Validation(_) => StatusCode::BAD_REQUEST,
            AllocationError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            AllocationError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Failure of [`AllocationService::handle_loan_payment_split`].
#[derive(Debug, thiserror::Error)]
pub enum LoanPaymentSplitError {
    #[error(transparent)]
    Split(#[from] LoanSplitError),
    #[error(transparent)]
    Save(#[from] RepositoryError),
}
