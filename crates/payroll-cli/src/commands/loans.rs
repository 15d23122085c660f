use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use payroll_core::loans::amortization::{self, AmortizationInput};
use payroll_core::loans::policy::{self, LoanPolicyInput};

use crate::input;

/// Arguments for amortization schedule generation
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan identifier stamped on each installment
    #[arg(long, default_value = "")]
    pub loan_id: String,

    /// Principal amount
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Flat monthly payment
    #[arg(long)]
    pub payment: Option<Decimal>,

    /// Annual interest rate in percent (e.g. 12 for 12%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// First due date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Hard end date; the last installment before it becomes a balloon
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: AmortizationInput = if args.input.is_some() || args.principal.is_none() {
        input::read_input(args.input.as_deref(), "amortization")?
    } else {
        AmortizationInput {
            loan_id: args.loan_id,
            principal: args.principal.ok_or("--principal is required (or provide --input)")?,
            monthly_payment: args.payment.ok_or("--payment is required (or provide --input)")?,
            annual_rate: args.rate,
            start_date: args.start.ok_or("--start is required (or provide --input)")?,
            end_date: args.end,
        }
    };

    let result = amortization::generate_schedule(&schedule_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for loan policy validation
#[derive(Args)]
pub struct LoanPolicyArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Require approved stages and supporting documents
    #[arg(long)]
    pub strict: bool,
}

pub fn run_loan_policy(args: LoanPolicyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut policy_input: LoanPolicyInput = input::read_input(args.input.as_deref(), "loan policy")?;
    policy_input.strict |= args.strict;

    let result = policy::validate_loan_policy(&policy_input)?;
    Ok(serde_json::to_value(result)?)
}
