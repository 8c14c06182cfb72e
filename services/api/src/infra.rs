use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use property_ledger::allocation::{
    AllocationCondition, AllocationRule, AllocationService, AmountOperator, ExpenseTypeId,
    ExpenseTypeLookup, ExpenseTypeRecord, IncomeTypeId, OwnershipCheck, PropertyId,
    RepositoryError, RuleDraft, RuleId, RuleRepository, TextField, TextOperator, Transaction,
    TransactionId, TransactionRepository, TransactionStatus, TransactionType, UserId,
};
use property_ledger::config::AllocationConfig;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type LedgerService = AllocationService<
    InMemoryOwnership,
    InMemoryRuleRepository,
    InMemoryTransactionRepository,
    InMemoryExpenseTypes,
>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryOwnership {
    grants: Arc<Mutex<HashSet<(UserId, PropertyId)>>>,
}

impl InMemoryOwnership {
    pub(crate) fn grant(&self, user: UserId, property_id: PropertyId) -> Result<(), RepositoryError> {
        lock(&self.grants)?.insert((user, property_id));
        Ok(())
    }
}

impl OwnershipCheck for InMemoryOwnership {
    fn has_ownership(&self, user: &UserId, property_id: PropertyId) -> Result<bool, RepositoryError> {
        Ok(lock(&self.grants)?.contains(&(*user, property_id)))
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRuleRepository {
    rules: Arc<Mutex<HashMap<RuleId, AllocationRule>>>,
}

impl InMemoryRuleRepository {
    fn for_property(
        &self,
        property_id: PropertyId,
        active_only: bool,
    ) -> Result<Vec<AllocationRule>, RepositoryError> {
        let mut rules: Vec<_> = lock(&self.rules)?
            .values()
            .filter(|rule| rule.property_id == property_id && (rule.is_active || !active_only))
            .cloned()
            .collect();
        rules.sort_by_key(|rule| (rule.priority, rule.id));
        Ok(rules)
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn find_active_by_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, RepositoryError> {
        self.for_property(property_id, true)
    }

    fn find_by_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<AllocationRule>, RepositoryError> {
        self.for_property(property_id, false)
    }

    fn find_one(&self, id: RuleId) -> Result<Option<AllocationRule>, RepositoryError> {
        Ok(lock(&self.rules)?.get(&id).cloned())
    }

    fn max_priority(&self, property_id: PropertyId) -> Result<Option<i32>, RepositoryError> {
        Ok(lock(&self.rules)?
            .values()
            .filter(|rule| rule.property_id == property_id)
            .map(|rule| rule.priority)
            .max())
    }

    fn insert(&self, draft: RuleDraft) -> Result<AllocationRule, RepositoryError> {
        let mut guard = lock(&self.rules)?;
        let next_id = guard.keys().map(|id| id.0).max().unwrap_or(0) + 1;
        let rule = draft.into_rule(RuleId(next_id));
        guard.insert(rule.id, rule.clone());
        Ok(rule)
    }

    fn save(&self, rule: AllocationRule) -> Result<AllocationRule, RepositoryError> {
        let mut guard = lock(&self.rules)?;
        if !guard.contains_key(&rule.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(rule.id, rule.clone());
        Ok(rule)
    }

    fn remove(&self, id: RuleId) -> Result<(), RepositoryError> {
        lock(&self.rules)?
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryTransactionRepository {
    records: Arc<Mutex<HashMap<TransactionId, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub(crate) fn insert(&self, transaction: Transaction) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&transaction.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(transaction.id, transaction);
        Ok(())
    }

    pub(crate) fn fetch(&self, id: TransactionId) -> Result<Option<Transaction>, RepositoryError> {
        Ok(lock(&self.records)?.get(&id).cloned())
    }
}

impl TransactionRepository for InMemoryTransactionRepository {
    fn find_by_ids_and_property(
        &self,
        ids: &[TransactionId],
        property_id: PropertyId,
        with_line_items: bool,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(id))
            .filter(|transaction| transaction.property_id == property_id)
            .map(|transaction| {
                let mut transaction = transaction.clone();
                if !with_line_items {
                    transaction.expenses.clear();
                    transaction.incomes.clear();
                }
                transaction
            })
            .collect())
    }

    fn save(&self, transaction: Transaction) -> Result<Transaction, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if !guard.contains_key(&transaction.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryExpenseTypes {
    types: Arc<Mutex<HashMap<String, ExpenseTypeId>>>,
}

impl InMemoryExpenseTypes {
    pub(crate) fn register(&self, key: &str, id: ExpenseTypeId) -> Result<(), RepositoryError> {
        lock(&self.types)?.insert(key.to_string(), id);
        Ok(())
    }
}

impl ExpenseTypeLookup for InMemoryExpenseTypes {
    fn find_by_key(&self, key: &str) -> Result<Option<ExpenseTypeRecord>, RepositoryError> {
        Ok(lock(&self.types)?.get(key).map(|id| ExpenseTypeRecord {
            id: *id,
            key: key.to_string(),
        }))
    }
}

pub(crate) const SEEDED_OWNER: UserId = UserId(1);
pub(crate) const SEEDED_PROPERTY: PropertyId = PropertyId(1);

const MAINTENANCE_CHARGE: ExpenseTypeId = ExpenseTypeId(10);
const WATER: ExpenseTypeId = ExpenseTypeId(11);
const RENT: IncomeTypeId = IncomeTypeId(30);

/// Handles onto a seeded in-memory ledger.
pub(crate) struct SeededLedger {
    pub(crate) service: Arc<LedgerService>,
    pub(crate) transactions: InMemoryTransactionRepository,
    pub(crate) transaction_ids: Vec<TransactionId>,
}

/// One demo property with its expense types, a handful of rules and a month of bank rows.
pub(crate) fn seed_ledger(config: AllocationConfig) -> Result<SeededLedger, RepositoryError> {
    let ownership = InMemoryOwnership::default();
    ownership.grant(SEEDED_OWNER, SEEDED_PROPERTY)?;

    let expense_types = InMemoryExpenseTypes::default();
    for (key, id) in [
        ("maintenance-charge", MAINTENANCE_CHARGE),
        ("water", WATER),
        ("loan-payment", ExpenseTypeId(20)),
        ("loan-principal", ExpenseTypeId(21)),
        ("loan-interest", ExpenseTypeId(22)),
        ("loan-handling-fee", ExpenseTypeId(23)),
    ] {
        expense_types.register(key, id)?;
    }

    let rules = InMemoryRuleRepository::default();
    for draft in seed_rules() {
        rules.insert(draft)?;
    }

    let transactions = InMemoryTransactionRepository::default();
    let seeded = seed_transactions();
    let transaction_ids = seeded.iter().map(|transaction| transaction.id).collect();
    for transaction in seeded {
        transactions.insert(transaction)?;
    }

    let service = Arc::new(AllocationService::new(
        Arc::new(ownership),
        Arc::new(rules),
        Arc::new(transactions.clone()),
        Arc::new(expense_types),
        config,
    ));

    Ok(SeededLedger {
        service,
        transactions,
        transaction_ids,
    })
}

fn expense_draft(
    name: &str,
    priority: i32,
    expense_type_id: ExpenseTypeId,
    conditions: Vec<AllocationCondition>,
) -> RuleDraft {
    RuleDraft {
        property_id: SEEDED_PROPERTY,
        name: name.to_string(),
        priority,
        transaction_type: TransactionType::Expense,
        expense_type_id: Some(expense_type_id),
        income_type_id: None,
        conditions,
        is_active: true,
    }
}

fn seed_rules() -> Vec<RuleDraft> {
    vec![
        expense_draft(
            "Hoitovastike",
            0,
            MAINTENANCE_CHARGE,
            vec![AllocationCondition::amount(AmountOperator::Equals, "238,40")],
        ),
        expense_draft(
            "Lainanhoito",
            1,
            ExpenseTypeId(20),
            vec![AllocationCondition::text(
                TextField::Receiver,
                TextOperator::Contains,
                "pankki",
            )],
        ),
        expense_draft(
            "Vesimaksu",
            2,
            WATER,
            vec![AllocationCondition::text(
                TextField::Description,
                TextOperator::Contains,
                "vesi",
            )],
        ),
        expense_draft(
            "Suuret laskut",
            3,
            MAINTENANCE_CHARGE,
            vec![AllocationCondition::amount(
                AmountOperator::GreaterThan,
                "1000",
            )],
        ),
        RuleDraft {
            transaction_type: TransactionType::Income,
            expense_type_id: None,
            income_type_id: Some(RENT),
            ..expense_draft(
                "Vuokratulo",
                4,
                MAINTENANCE_CHARGE,
                vec![AllocationCondition::text(
                    TextField::Description,
                    TextOperator::Contains,
                    "vuokra",
                )],
            )
        },
    ]
}

fn bank_row(
    id: i64,
    day: u32,
    sender: &str,
    receiver: &str,
    description: &str,
    cents: i64,
) -> Transaction {
    Transaction {
        id: TransactionId(id),
        property_id: SEEDED_PROPERTY,
        status: TransactionStatus::Pending,
        transaction_type: TransactionType::Unknown,
        sender: Some(sender.to_string()),
        receiver: Some(receiver.to_string()),
        description: Some(description.to_string()),
        amount: Decimal::new(cents, 2),
        accounting_date: NaiveDate::from_ymd_opt(2025, 4, day).unwrap_or_default(),
        expenses: Vec::new(),
        incomes: Vec::new(),
    }
}

fn seed_transactions() -> Vec<Transaction> {
    let mut accepted = bank_row(
        6,
        28,
        "Omistaja",
        "Asunto Oy Koivikko",
        "Hoitovastike 3/2025",
        -23840,
    );
    accepted.status = TransactionStatus::Accepted;

    vec![
        bank_row(
            1,
            2,
            "Omistaja",
            "Asunto Oy Koivikko",
            "Hoitovastike 4/2025",
            -23840,
        ),
        bank_row(
            2,
            5,
            "Omistaja",
            "Osuuspankki",
            "Lyhennys 244,25 euroa Korko 166,37 euroa Kulut 2,50 euroa Jäljellä 65 851,63 euroa",
            -41312,
        ),
        bank_row(3, 7, "Vuokralainen", "Omistaja", "Vuokra huhtikuu", 85000),
        bank_row(
            4,
            12,
            "Omistaja",
            "Helsingin Vesi",
            "Vesi- ja jätevesimaksu korjaus",
            -124000,
        ),
        bank_row(5, 20, "Omistaja", "Helen Oy", "Sähkö 3/2025", -6410),
        accepted,
    ]
}
