use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::allocation::condition::{AllocationCondition, AmountOperator, TextField, TextOperator};
use crate::allocation::domain::{
    AllocationRule, ExpenseTypeId, IncomeTypeId, PropertyId, RuleDraft, RuleId, Transaction,
    TransactionId, TransactionStatus, TransactionType, UserId,
};
use crate::allocation::loan::{
    LOAN_HANDLING_FEE_KEY, LOAN_INTEREST_KEY, LOAN_PAYMENT_KEY, LOAN_PRINCIPAL_KEY,
};
use crate::allocation::repository::{
    ExpenseTypeLookup, ExpenseTypeRecord, OwnershipCheck, RepositoryError, RuleRepository,
    TransactionRepository,
};
use crate::allocation::service::AllocationService;
use crate::config::AllocationConfig;

pub(super) const OWNER: UserId = UserId(1);
pub(super) const STRANGER: UserId = UserId(2);
pub(super) const PROPERTY: PropertyId = PropertyId(1);
pub(super) const OTHER_PROPERTY: PropertyId = PropertyId(2);

pub(super) const MAINTENANCE_TYPE: ExpenseTypeId = ExpenseTypeId(10);
pub(super) const LOAN_PAYMENT_TYPE: ExpenseTypeId = ExpenseTypeId(20);
pub(super) const PRINCIPAL_TYPE: ExpenseTypeId = ExpenseTypeId(21);
pub(super) const INTEREST_TYPE: ExpenseTypeId = ExpenseTypeId(22);
pub(super) const HANDLING_FEE_TYPE: ExpenseTypeId = ExpenseTypeId(23);
pub(super) const RENT_INCOME_TYPE: IncomeTypeId = IncomeTypeId(30);

pub(super) const LOAN_MESSAGE: &str =
    "Lyhennys 244,25 euroa Korko 166,37 euroa Kulut 2,50 euroa Jäljellä 65 851,63 euroa";

pub(super) fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).expect("valid decimal literal")
}

pub(super) fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
}

pub(super) fn pending(id: i64, description: &str, amount: &str) -> Transaction {
    Transaction {
        id: TransactionId(id),
        property_id: PROPERTY,
        status: TransactionStatus::Pending,
        transaction_type: TransactionType::Unknown,
        sender: Some("Matti Meikäläinen".to_string()),
        receiver: Some("Asunto Oy Koivikko".to_string()),
        description: Some(description.to_string()),
        amount: dec(amount),
        accounting_date: booking_date(),
        expenses: Vec::new(),
        incomes: Vec::new(),
    }
}

pub(super) fn contains(field: TextField, value: &str) -> AllocationCondition {
    AllocationCondition::text(field, TextOperator::Contains, value)
}

pub(super) fn equals(field: TextField, value: &str) -> AllocationCondition {
    AllocationCondition::text(field, TextOperator::Equals, value)
}

pub(super) fn amount(operator: AmountOperator, value: &str) -> AllocationCondition {
    AllocationCondition::amount(operator, value)
}

pub(super) fn expense_rule(
    id: i64,
    name: &str,
    conditions: Vec<AllocationCondition>,
) -> AllocationRule {
    AllocationRule {
        id: RuleId(id),
        property_id: PROPERTY,
        name: name.to_string(),
        priority: id as i32,
        transaction_type: TransactionType::Expense,
        expense_type_id: Some(MAINTENANCE_TYPE),
        income_type_id: None,
        conditions,
        is_active: true,
    }
}

pub(super) fn income_rule(
    id: i64,
    name: &str,
    conditions: Vec<AllocationCondition>,
) -> AllocationRule {
    AllocationRule {
        transaction_type: TransactionType::Income,
        expense_type_id: None,
        income_type_id: Some(RENT_INCOME_TYPE),
        ..expense_rule(id, name, conditions)
    }
}

pub(super) fn loan_rule(id: i64) -> AllocationRule {
    AllocationRule {
        expense_type_id: Some(LOAN_PAYMENT_TYPE),
        ..expense_rule(
            id,
            "Lainanhoito",
            vec![contains(TextField::Receiver, "pankki")],
        )
    }
}

pub(super) fn loan_transaction(id: i64, description: &str) -> Transaction {
    Transaction {
        receiver: Some("Osuuspankki".to_string()),
        ..pending(id, description, "-413.12")
    }
}

pub(super) fn loan_type_keys() -> Vec<(&'static str, ExpenseTypeId)> {
    vec![
        (LOAN_PRINCIPAL_KEY, PRINCIPAL_TYPE),
        (LOAN_INTEREST_KEY, INTEREST_TYPE),
        (LOAN_HANDLING_FEE_KEY, HANDLING_FEE_TYPE),
        (LOAN_PAYMENT_KEY, LOAN_PAYMENT_TYPE),
    ]
}

pub(super) type TestService =
    AllocationService<MemoryOwnership, MemoryRules, MemoryTransactions, MemoryExpenseTypes>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) rules: Arc<MemoryRules>,
    pub(super) transactions: Arc<MemoryTransactions>,
    pub(super) expense_types: Arc<MemoryExpenseTypes>,
}

impl Harness {
    pub(super) fn repository_calls(&self) -> usize {
        self.rules.calls() + self.transactions.calls() + self.expense_types.calls()
    }
}

pub(super) fn harness(rules: Vec<AllocationRule>, transactions: Vec<Transaction>) -> Harness {
    harness_with(
        rules,
        transactions,
        MemoryExpenseTypes::new(loan_type_keys()),
        AllocationConfig::default(),
    )
}

pub(super) fn harness_with(
    rules: Vec<AllocationRule>,
    transactions: Vec<Transaction>,
    expense_types: MemoryExpenseTypes,
    config: AllocationConfig,
) -> Harness {
    let ownership = Arc::new(MemoryOwnership::new(&[
        (OWNER, PROPERTY),
        (STRANGER, OTHER_PROPERTY),
    ]));
    let rules = Arc::new(MemoryRules::new(rules));
    let transactions = Arc::new(MemoryTransactions::new(transactions));
    let expense_types = Arc::new(expense_types);
    let service = Arc::new(AllocationService::new(
        ownership,
        rules.clone(),
        transactions.clone(),
        expense_types.clone(),
        config,
    ));

    Harness {
        service,
        rules,
        transactions,
        expense_types,
    }
}

pub(super) struct MemoryOwnership {
    grants: HashSet<(UserId, PropertyId)>,
}

impl MemoryOwnership {
    pub(super) fn new(grants: &[(UserId, PropertyId)]) -> Self {
        Self {
            grants: grants.iter().copied().collect(),
        }
    }
}

impl OwnershipCheck for MemoryOwnership {
    fn has_ownership(
        &self,
        user: &UserId,
        property_id: PropertyId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.grants.contains(&(*user, property_id)))
    }
}

#[derive(Default)]
pub(super) struct MemoryRules {
    rules: Mutex<Vec<AllocationRule>>,
    failing: Mutex<HashSet<RuleId>>,
    calls: AtomicUsize,
}

impl MemoryRules {
    pub(super) fn new(rules: Vec<AllocationRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    pub(super) fn fail_saves_for(&self, id: RuleId) {
        self.failing
            .lock()
            .expect("failing mutex poisoned")
            .insert(id);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn snapshot(&self) -> Vec<AllocationRule> {
        self.rules.lock().expect("rules mutex poisoned").clone()
    }

    fn by_property(&self, property_id: PropertyId, active_only: bool) -> Vec<AllocationRule> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rules: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|rule| rule.property_id == property_id && (rule.is_active || !active_only))
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        rules
    }
}

impl RuleRepository for MemoryRules {
    fn find_active_by_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, RepositoryError> {
        Ok(self.by_property(property_id, true))
    }

    fn find_by_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, RepositoryError> {
        Ok(self.by_property(property_id, false))
    }

    fn find_one(&self, id: RuleId) -> Result<Option<AllocationRule>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot().into_iter().find(|rule| rule.id == id))
    }

    fn max_priority(&self, property_id: PropertyId) -> Result<Option<i32>, RepositoryError> {
        Ok(self
            .by_property(property_id, false)
            .iter()
            .map(|rule| rule.priority)
            .max())
    }

    fn insert(&self, draft: RuleDraft) -> Result<AllocationRule, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        let next_id = guard.iter().map(|rule| rule.id.0).max().unwrap_or(0) + 1;
        let rule = draft.into_rule(RuleId(next_id));
        guard.push(rule.clone());
        Ok(rule)
    }

    fn save(&self, rule: AllocationRule) -> Result<AllocationRule, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing
            .lock()
            .expect("failing mutex poisoned")
            .contains(&rule.id)
        {
            return Err(RepositoryError::Unavailable("write timeout".to_string()));
        }
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|stored| stored.id == rule.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = rule.clone();
        Ok(rule)
    }

    fn remove(&self, id: RuleId) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.rules.lock().expect("rules mutex poisoned");
        let before = guard.len();
        guard.retain(|rule| rule.id != id);
        if guard.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryTransactions {
    records: Mutex<HashMap<TransactionId, Transaction>>,
    saved: Mutex<Vec<Transaction>>,
    failing: Mutex<HashSet<TransactionId>>,
    calls: AtomicUsize,
}

impl MemoryTransactions {
    pub(super) fn new(transactions: Vec<Transaction>) -> Self {
        let records = transactions
            .into_iter()
            .map(|transaction| (transaction.id, transaction))
            .collect();
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn fail_saves_for(&self, id: TransactionId) {
        self.failing
            .lock()
            .expect("failing mutex poisoned")
            .insert(id);
    }

    pub(super) fn saved(&self) -> Vec<Transaction> {
        self.saved.lock().expect("saved mutex poisoned").clone()
    }

    pub(super) fn get(&self, id: TransactionId) -> Transaction {
        self.records
            .lock()
            .expect("records mutex poisoned")
            .get(&id)
            .cloned()
            .expect("transaction present")
    }
}

impl TransactionRepository for MemoryTransactions {
    fn find_by_ids_and_property(
        &self,
        ids: &[TransactionId],
        property_id: PropertyId,
        with_line_items: bool,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.records.lock().expect("records mutex poisoned");
        let mut found: Vec<Transaction> = guard
            .values()
            .filter(|transaction| {
                transaction.property_id == property_id && ids.contains(&transaction.id)
            })
            .cloned()
            .map(|mut transaction| {
                if !with_line_items {
                    transaction.expenses.clear();
                    transaction.incomes.clear();
                }
                transaction
            })
            .collect();
        // Reverse id order, unlike the request.
        found.sort_by_key(|transaction| std::cmp::Reverse(transaction.id));
        Ok(found)
    }

    fn save(&self, transaction: Transaction) -> Result<Transaction, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing
            .lock()
            .expect("failing mutex poisoned")
            .contains(&transaction.id)
        {
            return Err(RepositoryError::Unavailable("write timeout".to_string()));
        }
        self.records
            .lock()
            .expect("records mutex poisoned")
            .insert(transaction.id, transaction.clone());
        self.saved
            .lock()
            .expect("saved mutex poisoned")
            .push(transaction.clone());
        Ok(transaction)
    }
}

pub(super) struct MemoryExpenseTypes {
    types: HashMap<String, ExpenseTypeId>,
    calls: AtomicUsize,
}

impl MemoryExpenseTypes {
    pub(super) fn new(keys: Vec<(&'static str, ExpenseTypeId)>) -> Self {
        Self {
            types: keys
                .into_iter()
                .map(|(key, id)| (key.to_string(), id))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExpenseTypeLookup for MemoryExpenseTypes {
    fn find_by_key(&self, key: &str) -> Result<Option<ExpenseTypeRecord>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.types.get(key).map(|id| ExpenseTypeRecord {
            id: *id,
            key: key.to_string(),
        }))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
