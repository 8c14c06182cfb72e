use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::condition::{AllocationCondition, ConditionSpec};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Property (real-estate unit) that owns rules and transactions.
    PropertyId
);
id_type!(RuleId);
id_type!(TransactionId);
id_type!(ExpenseTypeId);
id_type!(IncomeTypeId);
id_type!(LineItemId);
id_type!(
    /// Authenticated caller, checked against property ownership.
    UserId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Unknown,
    Income,
    Expense,
    Deposit,
    Withdraw,
}

impl TransactionType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }
}

/// Expense or income row attached to a transaction, keyed by its type id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem<K> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LineItemId>,
    pub type_id: K,
    pub property_id: PropertyId,
    pub transaction_id: TransactionId,
    pub description: String,
    pub amount: Decimal,
    pub quantity: u32,
    pub total_amount: Decimal,
    pub accounting_date: NaiveDate,
}

pub type Expense = LineItem<ExpenseTypeId>;
pub type Income = LineItem<IncomeTypeId>;

/// Imported bank transaction. Expenses are conventionally negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub property_id: PropertyId,
    pub status: TransactionStatus,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Decimal,
    pub accounting_date: NaiveDate,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub incomes: Vec<Income>,
}

impl Transaction {
    /// Only pending, untyped transactions take part in allocation.
    pub fn is_allocation_candidate(&self) -> bool {
        self.status != TransactionStatus::Accepted
            && self.transaction_type == TransactionType::Unknown
    }
}

/// Stored allocation rule. Conditions are combined with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRule {
    pub id: RuleId,
    pub property_id: PropertyId,
    pub name: String,
    pub priority: i32,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub expense_type_id: Option<ExpenseTypeId>,
    #[serde(default)]
    pub income_type_id: Option<IncomeTypeId>,
    pub conditions: Vec<AllocationCondition>,
    pub is_active: bool,
}

/// Request body for creating a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAllocationRule {
    pub name: String,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub expense_type_id: Option<ExpenseTypeId>,
    #[serde(default)]
    pub income_type_id: Option<IncomeTypeId>,
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Partial update. When `transaction_type` is given, the type ids are replaced as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub transaction_type: Option<TransactionType>,
    #[serde(default)]
    pub expense_type_id: Option<ExpenseTypeId>,
    #[serde(default)]
    pub income_type_id: Option<IncomeTypeId>,
    #[serde(default)]
    pub conditions: Option<Vec<ConditionSpec>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Validated rule that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub property_id: PropertyId,
    pub name: String,
    pub priority: i32,
    pub transaction_type: TransactionType,
    pub expense_type_id: Option<ExpenseTypeId>,
    pub income_type_id: Option<IncomeTypeId>,
    pub conditions: Vec<AllocationCondition>,
    pub is_active: bool,
}

impl RuleDraft {
    pub fn into_rule(self, id: RuleId) -> AllocationRule {
        AllocationRule {
            id,
            property_id: self.property_id,
            name: self.name,
            priority: self.priority,
            transaction_type: self.transaction_type,
            expense_type_id: self.expense_type_id,
            income_type_id: self.income_type_id,
            conditions: self.conditions,
            is_active: self.is_active,
        }
    }
}
