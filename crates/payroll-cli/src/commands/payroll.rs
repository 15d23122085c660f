use clap::Args;
use serde_json::{json, Value};

use payroll_core::payroll::calculator::{self, EmployeePayroll, EmployeePayrollInput};
use payroll_core::payroll::scenarios::{self, ScenarioPreviewInput};
use payroll_core::payroll::totals;
use payroll_core::settings::PayrollSettings;

use crate::input;

/// Arguments for a single employee's payroll
#[derive(Args)]
pub struct CalculateArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Statutory deductions missing from the input fall back to `--config`.
pub fn run_calculate(
    args: CalculateArgs,
    settings: &PayrollSettings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut payroll_input: EmployeePayrollInput =
        input::read_input(args.input.as_deref(), "payroll calculation")?;
    if payroll_input.deductions.is_none() {
        payroll_input.deductions = Some(settings.deductions.clone());
    }

    let entry = calculator::calculate_employee_payroll(&payroll_input)?;
    let notices = entry.notices();
    Ok(json!({
        "result": entry,
        "notices": notices,
    }))
}

/// Arguments for what-if scenario previews
#[derive(Args)]
pub struct PreviewArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

/// `--config` replaces whatever settings the input document carries.
pub fn run_preview(
    args: PreviewArgs,
    settings: Option<&PayrollSettings>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut preview_input: ScenarioPreviewInput =
        input::read_input(args.input.as_deref(), "scenario preview")?;
    if let Some(settings) = settings {
        preview_input.settings = settings.clone();
    }

    let result = scenarios::preview_scenarios(&preview_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for run totals
#[derive(Args)]
pub struct TotalsArgs {
    /// Path to a JSON/YAML array of payroll entries
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_totals(args: TotalsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let entries: Vec<EmployeePayroll> = input::read_input(args.input.as_deref(), "totals")?;
    let result = totals::calculate_totals(&entries)?;
    Ok(serde_json::to_value(result)?)
}
