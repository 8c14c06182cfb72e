use serde::{Deserialize, Serialize};

use super::domain::{
    AllocationRule, ExpenseTypeId, PropertyId, RuleDraft, RuleId, Transaction, TransactionId,
    UserId,
};

/// Ownership check guarding every property-scoped operation.
pub trait OwnershipCheck: Send + Sync {
    fn has_ownership(&self, user: &UserId, property_id: PropertyId)
        -> Result<bool, RepositoryError>;
}

/// Rule storage. Listings are ordered by ascending priority.
pub trait RuleRepository: Send + Sync {
    fn find_active_by_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, RepositoryError>;
    fn find_by_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, RepositoryError>;
    fn find_one(&self, id: RuleId) -> Result<Option<AllocationRule>, RepositoryError>;
    fn max_priority(&self, property_id: PropertyId) -> Result<Option<i32>, RepositoryError>;
    fn insert(&self, draft: RuleDraft) -> Result<AllocationRule, RepositoryError>;
    fn save(&self, rule: AllocationRule) -> Result<AllocationRule, RepositoryError>;
    fn remove(&self, id: RuleId) -> Result<(), RepositoryError>;
}

/// Transaction storage consumed by the allocation batch.
pub trait TransactionRepository: Send + Sync {
    fn find_by_ids_and_property(
        &self,
        ids: &[TransactionId],
        property_id: PropertyId,
        with_line_items: bool,
    ) -> Result<Vec<Transaction>, RepositoryError>;
    fn save(&self, transaction: Transaction) -> Result<Transaction, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseTypeRecord {
    pub id: ExpenseTypeId,
    pub key: String,
}

/// Lookup of globally defined expense types by well-known key.
pub trait ExpenseTypeLookup: Send + Sync {
    fn find_by_key(&self, key: &str) -> Result<Option<ExpenseTypeRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
