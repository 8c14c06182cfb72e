use super::common::{
    contains, expense_rule, harness, income_rule, MAINTENANCE_TYPE, OTHER_PROPERTY, OWNER,
    PROPERTY, RENT_INCOME_TYPE, STRANGER,
};
use crate::allocation::condition::{AllocationCondition, ConditionSpec, TextField, TextOperator};
use crate::allocation::domain::{
    AllocationRule, AllocationRuleUpdate, ExpenseTypeId, NewAllocationRule, RuleId,
    TransactionType,
};
use crate::allocation::repository::RepositoryError;
use crate::allocation::service::AllocationError;
use crate::allocation::validation::RuleValidationError;

fn new_rule(name: &str) -> NewAllocationRule {
    NewAllocationRule {
        name: name.to_string(),
        transaction_type: TransactionType::Expense,
        expense_type_id: Some(MAINTENANCE_TYPE),
        income_type_id: None,
        conditions: vec![ConditionSpec::new("description", "contains", "vuokra")],
        priority: None,
        is_active: None,
    }
}

fn foreign_rule(id: i64) -> AllocationRule {
    AllocationRule {
        property_id: OTHER_PROPERTY,
        ..expense_rule(id, "Naapurin sääntö", vec![contains(TextField::Description, "x")])
    }
}

#[test]
fn first_rule_gets_priority_zero_and_later_rules_go_last() {
    let harness = harness(Vec::new(), Vec::new());

    let first = harness
        .service
        .create_rule(&OWNER, PROPERTY, new_rule("Vuokra"))
        .expect("create succeeds");
    let second = harness
        .service
        .create_rule(&OWNER, PROPERTY, new_rule("Vesi"))
        .expect("create succeeds");

    assert_eq!(first.priority, 0);
    assert_eq!(second.priority, 1);
    assert!(first.is_active);
    assert_eq!(
        first.conditions,
        vec![AllocationCondition::text(
            TextField::Description,
            TextOperator::Contains,
            "vuokra"
        )]
    );
}

#[test]
fn explicit_priority_and_trimmed_name_are_kept() {
    let harness = harness(vec![expense_rule(1, "Vanha", Vec::new())], Vec::new());

    let rule = harness
        .service
        .create_rule(
            &OWNER,
            PROPERTY,
            NewAllocationRule {
                priority: Some(-5),
                is_active: Some(false),
                ..new_rule("  Sähkö  ")
            },
        )
        .expect("create succeeds");

    assert_eq!(rule.name, "Sähkö");
    assert_eq!(rule.priority, -5);
    assert!(!rule.is_active);
}

#[test]
fn invalid_rules_are_rejected_and_not_stored() {
    let harness = harness(Vec::new(), Vec::new());
    let cases = [
        (
            NewAllocationRule {
                conditions: Vec::new(),
                ..new_rule("Tyhjä")
            },
            RuleValidationError::NoConditions,
        ),
        (
            NewAllocationRule {
                conditions: vec![ConditionSpec::new("amount", "contains", "10")],
                ..new_rule("Väärä operaattori")
            },
            RuleValidationError::InvalidOperator {
                field: "amount".to_string(),
                operator: "contains".to_string(),
            },
        ),
        (
            NewAllocationRule {
                transaction_type: TransactionType::Income,
                ..new_rule("Ristiin")
            },
            RuleValidationError::ExpenseTypeOnNonExpense(TransactionType::Income),
        ),
        (
            NewAllocationRule {
                income_type_id: Some(RENT_INCOME_TYPE),
                ..new_rule("Molemmat")
            },
            RuleValidationError::BothTargetTypes,
        ),
        (new_rule("   "), RuleValidationError::BlankName),
    ];

    for (input, expected) in cases {
        let err = harness
            .service
            .create_rule(&OWNER, PROPERTY, input)
            .expect_err("invalid rule rejected");
        assert!(
            matches!(&err, AllocationError::Validation(actual) if *actual == expected),
            "unexpected error {err:?}"
        );
    }
    assert!(harness.rules.snapshot().is_empty());
}

#[test]
fn creating_on_foreign_property_is_forbidden() {
    let harness = harness(Vec::new(), Vec::new());

    let err = harness
        .service
        .create_rule(&STRANGER, PROPERTY, new_rule("Vuokra"))
        .expect_err("stranger rejected");

    assert!(matches!(err, AllocationError::Forbidden { .. }));
    assert!(harness.rules.snapshot().is_empty());
}

#[test]
fn update_merges_fields_and_revalidates() {
    let harness = harness(
        vec![expense_rule(1, "Vuokra", vec![contains(TextField::Description, "vuokra")])],
        Vec::new(),
    );

    let updated = harness
        .service
        .update_rule(
            &OWNER,
            RuleId(1),
            AllocationRuleUpdate {
                name: Some("Vuokra ja vesi".to_string()),
                is_active: Some(false),
                ..AllocationRuleUpdate::default()
            },
        )
        .expect("update succeeds");

    assert_eq!(updated.name, "Vuokra ja vesi");
    assert!(!updated.is_active);
    assert_eq!(updated.expense_type_id, Some(MAINTENANCE_TYPE));
    assert_eq!(harness.rules.snapshot()[0], updated);

    let err = harness
        .service
        .update_rule(
            &OWNER,
            RuleId(1),
            AllocationRuleUpdate {
                conditions: Some(vec![ConditionSpec::new("sender", "lessThan", "5")]),
                ..AllocationRuleUpdate::default()
            },
        )
        .expect_err("invalid condition rejected");
    assert!(matches!(err, AllocationError::Validation(_)));
    assert_eq!(harness.rules.snapshot()[0], updated);
}

#[test]
fn changing_type_replaces_target_ids_together() {
    let harness = harness(
        vec![expense_rule(1, "Vuokra", vec![contains(TextField::Description, "vuokra")])],
        Vec::new(),
    );

    let income = harness
        .service
        .update_rule(
            &OWNER,
            RuleId(1),
            AllocationRuleUpdate {
                transaction_type: Some(TransactionType::Income),
                income_type_id: Some(RENT_INCOME_TYPE),
                ..AllocationRuleUpdate::default()
            },
        )
        .expect("type change succeeds");
    assert_eq!(income.transaction_type, TransactionType::Income);
    assert_eq!(income.expense_type_id, None);
    assert_eq!(income.income_type_id, Some(RENT_INCOME_TYPE));

    let err = harness
        .service
        .update_rule(
            &OWNER,
            RuleId(1),
            AllocationRuleUpdate {
                expense_type_id: Some(ExpenseTypeId(10)),
                ..AllocationRuleUpdate::default()
            },
        )
        .expect_err("expense type on income rule rejected");
    assert!(matches!(
        err,
        AllocationError::Validation(RuleValidationError::BothTargetTypes)
    ));
}

#[test]
fn missing_rule_is_not_found() {
    let harness = harness(Vec::new(), Vec::new());

    let err = harness
        .service
        .delete_rule(&OWNER, RuleId(42))
        .expect_err("missing rule");

    assert!(matches!(err, AllocationError::RuleNotFound(RuleId(42))));
    assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
}

#[test]
fn rules_of_other_properties_are_forbidden() {
    let harness = harness(vec![foreign_rule(5)], Vec::new());

    for outcome in [
        harness.service.find_rule(&OWNER, RuleId(5)).map(|_| ()),
        harness.service.delete_rule(&OWNER, RuleId(5)),
        harness
            .service
            .update_rule(&OWNER, RuleId(5), AllocationRuleUpdate::default())
            .map(|_| ()),
    ] {
        assert!(matches!(outcome, Err(AllocationError::Forbidden { .. })));
    }
    assert_eq!(harness.rules.snapshot().len(), 1);
}

#[test]
fn delete_removes_rule() {
    let harness = harness(
        vec![
            expense_rule(1, "Vuokra", vec![contains(TextField::Description, "vuokra")]),
            income_rule(2, "Tulo", vec![contains(TextField::Sender, "matti")]),
        ],
        Vec::new(),
    );

    harness
        .service
        .delete_rule(&OWNER, RuleId(1))
        .expect("delete succeeds");

    let remaining: Vec<_> = harness
        .service
        .find_rules_by_property(&OWNER, PROPERTY)
        .expect("list succeeds")
        .into_iter()
        .map(|rule| rule.id)
        .collect();
    assert_eq!(remaining, vec![RuleId(2)]);
}

#[test]
fn listing_includes_inactive_rules_in_priority_order() {
    let mut inactive = expense_rule(1, "Vanha", vec![contains(TextField::Description, "x")]);
    inactive.is_active = false;
    inactive.priority = 9;
    let harness = harness(
        vec![
            inactive,
            expense_rule(2, "Uusi", vec![contains(TextField::Description, "y")]),
            foreign_rule(3),
        ],
        Vec::new(),
    );

    let listed: Vec<_> = harness
        .service
        .find_rules_by_property(&OWNER, PROPERTY)
        .expect("list succeeds")
        .into_iter()
        .map(|rule| rule.id)
        .collect();

    assert_eq!(listed, vec![RuleId(2), RuleId(1)]);
}

#[test]
fn reorder_assigns_positions_as_priorities() {
    let harness = harness(
        vec![
            expense_rule(1, "A", vec![contains(TextField::Description, "a")]),
            expense_rule(2, "B", vec![contains(TextField::Description, "b")]),
            expense_rule(3, "C", vec![contains(TextField::Description, "c")]),
        ],
        Vec::new(),
    );

    let reordered = harness
        .service
        .reorder_rules(&OWNER, PROPERTY, &[RuleId(3), RuleId(1), RuleId(2)])
        .expect("reorder succeeds");

    let order: Vec<_> = reordered
        .iter()
        .map(|rule| (rule.id, rule.priority))
        .collect();
    assert_eq!(order, vec![(RuleId(3), 0), (RuleId(1), 1), (RuleId(2), 2)]);

    let listed: Vec<_> = harness
        .service
        .find_rules_by_property(&OWNER, PROPERTY)
        .expect("list succeeds")
        .into_iter()
        .map(|rule| rule.id)
        .collect();
    assert_eq!(listed, vec![RuleId(3), RuleId(1), RuleId(2)]);
}

#[test]
fn default_priority_cannot_pass_the_largest_value() {
    let harness = harness(Vec::new(), Vec::new());
    harness
        .service
        .create_rule(
            &OWNER,
            PROPERTY,
            NewAllocationRule {
                priority: Some(i32::MAX),
                ..new_rule("Viimeinen")
            },
        )
        .expect("explicit maximum priority is accepted");

    let err = harness
        .service
        .create_rule(&OWNER, PROPERTY, new_rule("Seuraava"))
        .expect_err("no priority after the maximum");

    assert!(matches!(
        err,
        AllocationError::Validation(RuleValidationError::PriorityExhausted)
    ));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(harness.rules.snapshot().len(), 1);
}

#[test]
fn reorder_stops_at_the_first_failed_save() {
    let harness = harness(
        vec![
            expense_rule(1, "A", vec![contains(TextField::Description, "a")]),
            expense_rule(2, "B", vec![contains(TextField::Description, "b")]),
            expense_rule(3, "C", vec![contains(TextField::Description, "c")]),
        ],
        Vec::new(),
    );
    harness.rules.fail_saves_for(RuleId(1));

    let err = harness
        .service
        .reorder_rules(&OWNER, PROPERTY, &[RuleId(3), RuleId(1), RuleId(2)])
        .expect_err("failed save aborts the reorder");

    assert!(matches!(
        err,
        AllocationError::Repository(RepositoryError::Unavailable(_))
    ));
    let priorities: Vec<_> = harness
        .rules
        .snapshot()
        .iter()
        .map(|rule| (rule.id, rule.priority))
        .collect();
    assert_eq!(
        priorities,
        vec![(RuleId(1), 1), (RuleId(2), 2), (RuleId(3), 0)]
    );
}

#[test]
fn reorder_must_name_each_rule_once() {
    let harness = harness(
        vec![
            expense_rule(1, "A", vec![contains(TextField::Description, "a")]),
            expense_rule(2, "B", vec![contains(TextField::Description, "b")]),
        ],
        Vec::new(),
    );

    for requested in [
        vec![RuleId(1)],
        vec![RuleId(1), RuleId(1), RuleId(2)],
        vec![RuleId(1), RuleId(2), RuleId(7)],
    ] {
        let err = harness
            .service
            .reorder_rules(&OWNER, PROPERTY, &requested)
            .expect_err("mismatched order rejected");
        assert!(matches!(
            err,
            AllocationError::Validation(RuleValidationError::ReorderMismatch)
        ));
    }
    let priorities: Vec<_> = harness
        .rules
        .snapshot()
        .iter()
        .map(|rule| rule.priority)
        .collect();
    assert_eq!(priorities, vec![1, 2]);
}
