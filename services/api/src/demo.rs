use crate::infra::{seed_ledger, SEEDED_OWNER, SEEDED_PROPERTY};
use clap::Args;
use property_ledger::allocation::{
    is_loan_payment_message, parse_loan_payment_details, AllocationAction, AllocationResult,
    LoanPaymentMessage, PropertyId, UserId,
};
use property_ledger::config::AppConfig;
use property_ledger::error::AppError;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Caller id used for the ownership check (the seeded owner is 1).
    #[arg(long)]
    pub(crate) user: Option<i64>,
    /// Classify without saving anything.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Print the allocation result as JSON instead of text.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ParseMessageArgs {
    /// Bank message, e.g. "Lyhennys 244,25 euroa Korko 166,37 euroa"
    pub(crate) message: String,
    /// Print the decomposition as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        user,
        dry_run,
        json,
    } = args;

    let config = AppConfig::load()?;
    let ledger = seed_ledger(config.allocation)?;
    let user = user.map(UserId).unwrap_or(SEEDED_OWNER);
    let property_id = SEEDED_PROPERTY;

    let result = if dry_run {
        ledger
            .service
            .preview(&user, property_id, &ledger.transaction_ids)?
    } else {
        ledger
            .service
            .apply(&user, property_id, &ledger.transaction_ids)?
    };

    if json {
        println!("{}", to_pretty_json(&result)?);
        return Ok(());
    }

    render_result(property_id, &result, dry_run);

    for entry in &result.allocated {
        if entry.action != AllocationAction::LoanSplit || dry_run {
            continue;
        }
        if let Some(transaction) = ledger.transactions.fetch(entry.transaction_id)? {
            println!("\nLoan split for transaction {}", transaction.id);
            for expense in &transaction.expenses {
                println!(
                    "  {:<18} {:>10}  (expense type {})",
                    expense.description, expense.amount, expense.type_id
                );
            }
        }
    }

    Ok(())
}

fn render_result(property_id: PropertyId, result: &AllocationResult, dry_run: bool) {
    let summary = result.summary();
    let mode = if dry_run { " (dry run)" } else { "" };
    println!("Allocation report for property {property_id}{mode}");
    println!(
        "  allocated: {}  skipped: {}  conflicting: {}",
        summary.allocated, summary.skipped, summary.conflicting
    );

    if !result.allocated.is_empty() {
        println!("\nAllocated");
        for entry in &result.allocated {
            let action = match entry.action {
                AllocationAction::TypeSet => "type set",
                AllocationAction::LoanSplit => "loan split",
            };
            println!(
                "  #{:<4} {:<20} {}",
                entry.transaction_id, entry.rule_name, action
            );
        }
    }

    if !result.skipped.is_empty() {
        println!("\nSkipped");
        for entry in &result.skipped {
            println!("  #{:<4} {}", entry.transaction_id, entry.reason.label());
        }
    }

    if !result.conflicting.is_empty() {
        println!("\nConflicting");
        for entry in &result.conflicting {
            let names: Vec<_> = entry.rules.iter().map(|rule| rule.name.as_str()).collect();
            println!("  #{:<4} {}", entry.transaction_id, names.join(", "));
        }
    }
}

#[derive(Debug, Serialize)]
struct ParsedMessageView {
    loan_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interest: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    handling_fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_balance: Option<Decimal>,
}

impl ParsedMessageView {
    fn from_message(message: &str) -> Self {
        let parsed = is_loan_payment_message(message)
            .then(|| parse_loan_payment_details(message))
            .flatten();
        match parsed {
            Some(LoanPaymentMessage {
                components,
                remaining_balance,
            }) => Self {
                loan_payment: true,
                principal: Some(components.principal),
                interest: Some(components.interest),
                handling_fee: Some(components.handling_fee),
                remaining_balance,
            },
            None => Self {
                loan_payment: false,
                principal: None,
                interest: None,
                handling_fee: None,
                remaining_balance: None,
            },
        }
    }
}

pub(crate) fn run_parse_message(args: ParseMessageArgs) -> Result<(), AppError> {
    let view = ParsedMessageView::from_message(&args.message);

    if args.json {
        println!("{}", to_pretty_json(&view)?);
        return Ok(());
    }

    if !view.loan_payment {
        println!("Not a loan payment message");
        return Ok(());
    }

    let amount = |value: Option<Decimal>| value.unwrap_or(Decimal::ZERO);
    println!("Principal     {:>12}", amount(view.principal));
    println!("Interest      {:>12}", amount(view.interest));
    println!("Handling fee  {:>12}", amount(view.handling_fee));
    if let Some(balance) = view.remaining_balance {
        println!("Remaining     {balance:>12}");
    }
    Ok(())
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))
}
