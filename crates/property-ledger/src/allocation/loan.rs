//! Loan payment notifications from the bank, e.g.
//! `Lyhennys 244,25 euroa Korko 166,37 euroa Kulut 2,50 euroa Jäljellä 65 851,63 euroa`,
//! and their decomposition into principal, interest and handling-fee expenses.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Expense, ExpenseTypeId, LineItem, Transaction};
use super::repository::{ExpenseTypeLookup, RepositoryError};

pub const LOAN_PRINCIPAL_KEY: &str = "loan-principal";
pub const LOAN_INTEREST_KEY: &str = "loan-interest";
pub const LOAN_HANDLING_FEE_KEY: &str = "loan-handling-fee";
pub const LOAN_PAYMENT_KEY: &str = "loan-payment";

pub const PRINCIPAL_LABEL: &str = "Lainan lyhennys";
pub const INTEREST_LABEL: &str = "Lainan korko";
pub const HANDLING_FEE_LABEL: &str = "Lainakulut";

const AMOUNT: &str = r"(\d{1,3}(?:[ \x{00A0}]\d{3})+|\d+),(\d{2})";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Principal,
    Interest,
    HandlingFee,
    Remaining,
}

impl Segment {
    const ALL: [Self; 4] = [
        Self::Principal,
        Self::Interest,
        Self::HandlingFee,
        Self::Remaining,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::Principal => "Lyhennys",
            Self::Interest => "Korko",
            Self::HandlingFee => "Kulut",
            Self::Remaining => "Jäljellä",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

struct SegmentPatterns {
    label: Regex,
    amount: Regex,
}

/// Compiled once; `None` only if a pattern failed to compile, which rejects every message.
fn patterns() -> Option<&'static [SegmentPatterns]> {
    static PATTERNS: OnceLock<Option<Vec<SegmentPatterns>>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Segment::ALL
                .iter()
                .map(|segment| {
                    let label = segment.label();
                    Some(SegmentPatterns {
                        label: Regex::new(&format!(r"(?i)\b{label}\b")).ok()?,
                        amount: Regex::new(&format!(r"(?i)\b{label}\s+{AMOUNT}\s+euroa\b"))
                            .ok()?,
                    })
                })
                .collect()
        })
        .as_deref()
}

fn segment_patterns(segment: Segment) -> Option<&'static SegmentPatterns> {
    patterns()?.get(segment.index())
}

/// Amounts extracted from a loan payment message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPaymentComponents {
    pub principal: Decimal,
    pub interest: Decimal,
    pub handling_fee: Decimal,
}

/// Parsed message including the remaining loan balance when the bank sends one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPaymentMessage {
    pub components: LoanPaymentComponents,
    pub remaining_balance: Option<Decimal>,
}

fn label_count(description: &str, segment: Segment) -> Option<usize> {
    Some(segment_patterns(segment)?.label.find_iter(description).count())
}

fn segment_amount(description: &str, segment: Segment) -> Option<Decimal> {
    let captures = segment_patterns(segment)?.amount.captures(description)?;
    let integer: String = captures
        .get(1)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let fraction = captures.get(2)?.as_str();
    Decimal::from_str(&format!("{integer}.{fraction}")).ok()
}

/// Structural gate: both the `Lyhennys` and `Korko` segments carry a comma-decimal amount.
pub fn is_loan_payment_message(description: &str) -> bool {
    [Segment::Principal, Segment::Interest]
        .iter()
        .all(|segment| {
            segment_patterns(*segment)
                .map(|patterns| patterns.amount.is_match(description))
                .unwrap_or(false)
        })
}

/// Full parse. Fails closed: a repeated label, or a present label whose amount
/// does not parse, rejects the whole message.
pub fn parse_loan_payment_details(description: &str) -> Option<LoanPaymentMessage> {
    let mut amounts = [None; 4];
    for segment in Segment::ALL {
        let occurrences = label_count(description, segment)?;
        if occurrences > 1 {
            return None;
        }
        if occurrences == 1 {
            amounts[segment.index()] = Some(segment_amount(description, segment)?);
        }
    }

    let principal = amounts[Segment::Principal.index()]?;
    let interest = amounts[Segment::Interest.index()]?;
    let handling_fee = amounts[Segment::HandlingFee.index()].unwrap_or(Decimal::ZERO);

    Some(LoanPaymentMessage {
        components: LoanPaymentComponents {
            principal,
            interest,
            handling_fee,
        },
        remaining_balance: amounts[Segment::Remaining.index()],
    })
}

pub fn parse_loan_payment_message(description: &str) -> Option<LoanPaymentComponents> {
    parse_loan_payment_details(description).map(|message| message.components)
}

/// Expense type ids for the loan keys, resolved once per batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanExpenseTypes {
    pub principal: Option<ExpenseTypeId>,
    pub interest: Option<ExpenseTypeId>,
    pub handling_fee: Option<ExpenseTypeId>,
    pub loan_payment: Option<ExpenseTypeId>,
}

impl LoanExpenseTypes {
    pub fn resolve<E>(lookup: &E) -> Result<Self, RepositoryError>
    where
        E: ExpenseTypeLookup + ?Sized,
    {
        let id_for = |key: &str| -> Result<Option<ExpenseTypeId>, RepositoryError> {
            Ok(lookup.find_by_key(key)?.map(|record| record.id))
        };

        Ok(Self {
            principal: id_for(LOAN_PRINCIPAL_KEY)?,
            interest: id_for(LOAN_INTEREST_KEY)?,
            handling_fee: id_for(LOAN_HANDLING_FEE_KEY)?,
            loan_payment: id_for(LOAN_PAYMENT_KEY)?,
        })
    }

    pub fn is_loan_payment_type(&self, expense_type_id: Option<ExpenseTypeId>) -> bool {
        match (self.loan_payment, expense_type_id) {
            (Some(marker), Some(candidate)) => marker == candidate,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoanSplitError {
    #[error("description is not a loan payment message")]
    NotLoanPaymentMessage,
    #[error("expense type '{0}' is not configured")]
    MissingExpenseType(&'static str),
    #[error("loan payment message could not be parsed")]
    UnparseableMessage,
}

/// Build the expense rows for a loan payment without touching the transaction.
pub fn plan_loan_split(
    transaction: &Transaction,
    types: &LoanExpenseTypes,
) -> Result<Vec<Expense>, LoanSplitError> {
    let description = transaction.description.as_deref().unwrap_or("");
    if !is_loan_payment_message(description) {
        return Err(LoanSplitError::NotLoanPaymentMessage);
    }

    let principal_type = types
        .principal
        .ok_or(LoanSplitError::MissingExpenseType(LOAN_PRINCIPAL_KEY))?;
    let interest_type = types
        .interest
        .ok_or(LoanSplitError::MissingExpenseType(LOAN_INTEREST_KEY))?;

    let components =
        parse_loan_payment_message(description).ok_or(LoanSplitError::UnparseableMessage)?;

    let mut planned = vec![
        (principal_type, PRINCIPAL_LABEL, components.principal),
        (interest_type, INTEREST_LABEL, components.interest),
    ];
    if let Some(fee_type) = types.handling_fee {
        planned.push((fee_type, HANDLING_FEE_LABEL, components.handling_fee));
    }

    Ok(planned
        .into_iter()
        .filter(|(_, _, amount)| *amount > Decimal::ZERO)
        .map(|(type_id, label, amount)| LineItem {
            id: None,
            type_id,
            property_id: transaction.property_id,
            transaction_id: transaction.id,
            description: label.to_string(),
            amount,
            quantity: 1,
            total_amount: amount,
            accounting_date: transaction.accounting_date,
        })
        .collect())
}
