use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::domain::Transaction;
use super::validation::RuleValidationError;

/// Stored shape of a condition. This is what round-trips through persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl ConditionSpec {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Sender,
    Receiver,
    Description,
}

impl TextField {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
            Self::Description => "description",
        }
    }

    fn value_of(self, transaction: &Transaction) -> &str {
        let value = match self {
            Self::Sender => transaction.sender.as_deref(),
            Self::Receiver => transaction.receiver.as_deref(),
            Self::Description => transaction.description.as_deref(),
        };
        value.unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextOperator {
    Equals,
    Contains,
}

impl TextOperator {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmountOperator {
    Equals,
    GreaterThan,
    LessThan,
}

impl AmountOperator {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
        }
    }
}

pub const AMOUNT_FIELD: &str = "amount";

/// A condition whose operator is always legal for its field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ConditionSpec", into = "ConditionSpec")]
pub enum AllocationCondition {
    Amount {
        operator: AmountOperator,
        value: String,
    },
    Text {
        field: TextField,
        operator: TextOperator,
        value: String,
    },
}

impl AllocationCondition {
    pub fn amount(operator: AmountOperator, value: impl Into<String>) -> Self {
        Self::Amount {
            operator,
            value: value.into(),
        }
    }

    pub fn text(field: TextField, operator: TextOperator, value: impl Into<String>) -> Self {
        Self::Text {
            field,
            operator,
            value: value.into(),
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        matches(transaction, self)
    }
}

impl TryFrom<ConditionSpec> for AllocationCondition {
    type Error = RuleValidationError;

    fn try_from(spec: ConditionSpec) -> Result<Self, Self::Error> {
        let ConditionSpec {
            field,
            operator,
            value,
        } = spec;

        let text_field = match field.as_str() {
            AMOUNT_FIELD => {
                let operator = match operator.as_str() {
                    "equals" => AmountOperator::Equals,
                    "greaterThan" => AmountOperator::GreaterThan,
                    "lessThan" => AmountOperator::LessThan,
                    _ => return Err(RuleValidationError::InvalidOperator { field, operator }),
                };
                return Ok(Self::Amount { operator, value });
            }
            "sender" => TextField::Sender,
            "receiver" => TextField::Receiver,
            "description" => TextField::Description,
            _ => return Err(RuleValidationError::UnknownField(field)),
        };

        let operator = match operator.as_str() {
            "equals" => TextOperator::Equals,
            "contains" => TextOperator::Contains,
            _ => return Err(RuleValidationError::InvalidOperator { field, operator }),
        };

        Ok(Self::Text {
            field: text_field,
            operator,
            value,
        })
    }
}

impl From<AllocationCondition> for ConditionSpec {
    fn from(condition: AllocationCondition) -> Self {
        match condition {
            AllocationCondition::Amount { operator, value } => {
                ConditionSpec::new(AMOUNT_FIELD, operator.key(), value)
            }
            AllocationCondition::Text {
                field,
                operator,
                value,
            } => ConditionSpec::new(field.key(), operator.key(), value),
        }
    }
}

/// Parse a condition amount, accepting a comma as the decimal separator.
///
/// The comma is substituted with a dot and the longest numeric prefix is read,
/// so `"238,40"` is `238.4` and `"12 e"` is `12`. Thousands separators are not
/// understood: `"1.234,56"` becomes `"1.234.56"` and parses as `1.234`.
/// Input without a numeric prefix, including the empty string, yields NaN.
pub fn parse_condition_amount(raw: &str) -> f64 {
    let normalized = raw.trim().replace(',', ".");
    let prefix = numeric_prefix(&normalized);
    if prefix.is_empty() {
        return f64::NAN;
    }
    prefix.parse::<f64>().unwrap_or(f64::NAN)
}

fn numeric_prefix(input: &str) -> &str {
    let bytes = input.as_bytes();
    let digits_until = |mut at: usize| {
        while at < bytes.len() && bytes[at].is_ascii_digit() {
            at += 1;
        }
        at
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let integer_start = end;
    end = digits_until(end);
    let mut significant = end - integer_start;

    if bytes.get(end) == Some(&b'.') {
        let fraction_end = digits_until(end + 1);
        let fraction = fraction_end - (end + 1);
        if significant + fraction > 0 {
            significant += fraction;
            end = fraction_end;
        }
    }

    if significant == 0 {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_end = digits_until(exponent);
        if exponent_end > exponent {
            end = exponent_end;
        }
    }

    &input[..end]
}

/// Decide whether one condition matches one transaction.
///
/// Amounts compare on absolute values; text compares case-insensitively.
/// A NaN on either side never matches.
pub fn matches(transaction: &Transaction, condition: &AllocationCondition) -> bool {
    match condition {
        AllocationCondition::Amount { operator, value } => {
            let actual = transaction.amount.abs().to_f64().unwrap_or(f64::NAN);
            let expected = parse_condition_amount(value).abs();
            match operator {
                AmountOperator::Equals => actual == expected,
                AmountOperator::GreaterThan => actual > expected,
                AmountOperator::LessThan => actual < expected,
            }
        }
        AllocationCondition::Text {
            field,
            operator,
            value,
        } => {
            let actual = field.value_of(transaction).to_lowercase();
            let expected = value.to_lowercase();
            match operator {
                TextOperator::Equals => actual == expected,
                TextOperator::Contains => actual.contains(&expected),
            }
        }
    }
}

/// AND across all conditions. An empty list is vacuously true.
pub fn matches_all(transaction: &Transaction, conditions: &[AllocationCondition]) -> bool {
    conditions
        .iter()
        .all(|condition| condition.matches(transaction))
}

/// Evaluate an unvalidated stored condition; unknown fields or operators never match.
pub fn matches_spec(transaction: &Transaction, spec: &ConditionSpec) -> bool {
    AllocationCondition::try_from(spec.clone())
        .map(|condition| matches(transaction, &condition))
        .unwrap_or(false)
}
