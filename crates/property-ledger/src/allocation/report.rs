use serde::{Deserialize, Serialize};

use super::domain::{AllocationRule, RuleId, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationAction {
    TypeSet,
    LoanSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoMatch,
    AlreadyAllocated,
    LoanSplitFailed,
    /// The transaction was classified but persisting it failed.
    SaveFailed,
}

impl SkipReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::AlreadyAllocated => "already_allocated",
            Self::LoanSplitFailed => "loan_split_failed",
            Self::SaveFailed => "save_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: RuleId,
    pub name: String,
}

impl From<&AllocationRule> for RuleRef {
    fn from(rule: &AllocationRule) -> Self {
        Self {
            id: rule.id,
            name: rule.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedEntry {
    pub transaction_id: TransactionId,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub action: AllocationAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub transaction_id: TransactionId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub transaction_id: TransactionId,
    pub rules: Vec<RuleRef>,
}

/// Categorized outcome of one allocation batch, each list in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocated: Vec<AllocatedEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub conflicting: Vec<ConflictEntry>,
}

/// Counts for log lines and CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocationSummary {
    pub allocated: usize,
    pub skipped: usize,
    pub conflicting: usize,
}

impl AllocationResult {
    pub fn is_empty(&self) -> bool {
        self.allocated.is_empty() && self.skipped.is_empty() && self.conflicting.is_empty()
    }

    pub fn summary(&self) -> AllocationSummary {
        AllocationSummary {
            allocated: self.allocated.len(),
            skipped: self.skipped.len(),
            conflicting: self.conflicting.len(),
        }
    }

    pub(crate) fn record_allocated(
        &mut self,
        transaction_id: TransactionId,
        rule: &AllocationRule,
        action: AllocationAction,
    ) {
        self.allocated.push(AllocatedEntry {
            transaction_id,
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            action,
        });
    }

    pub(crate) fn record_skipped(&mut self, transaction_id: TransactionId, reason: SkipReason) {
        self.skipped.push(SkippedEntry {
            transaction_id,
            reason,
        });
    }

    pub(crate) fn record_conflict(
        &mut self,
        transaction_id: TransactionId,
        rules: &[&AllocationRule],
    ) {
        self.conflicting.push(ConflictEntry {
            transaction_id,
            rules: rules.iter().map(|rule| RuleRef::from(*rule)).collect(),
        });
    }
}
