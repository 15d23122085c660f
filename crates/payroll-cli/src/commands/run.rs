use chrono::NaiveDate;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use payroll_core::ledger::{ExportFormat, GenerateRunRequest, PayrollLedger};
use payroll_core::payroll::scenarios::ScenarioRequest;
use payroll_core::payroll::snapshot::PayrollSnapshot;
use payroll_core::records::Loan;
use payroll_core::settings::PayrollSettings;

use crate::input;

/// Arguments for generating a payroll run
#[derive(Args)]
pub struct RunArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Lock the run once generated
    #[arg(long)]
    pub complete: bool,
}

/// Everything a run needs: the period snapshot, the loan book it draws
/// against, and how it should be generated.
#[derive(Debug, Deserialize)]
struct RunInput {
    snapshot: PayrollSnapshot,
    #[serde(default)]
    loans: Vec<Loan>,
    #[serde(default)]
    calendar_id: Option<String>,
    #[serde(default)]
    scenario: ScenarioRequest,
    #[serde(default)]
    applied_date: Option<NaiveDate>,
    #[serde(default)]
    export_formats: Vec<ExportFormat>,
}

pub fn run_payroll(
    args: RunArgs,
    settings: PayrollSettings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let run_input: RunInput = input::read_input(args.input.as_deref(), "payroll run")?;

    let mut ledger = PayrollLedger::new(settings).with_loans(run_input.loans);
    let request = GenerateRunRequest {
        period: run_input.snapshot.period,
        calendar_id: run_input.calendar_id,
        scenario: run_input.scenario,
        applied_date: run_input.applied_date,
        export_formats: run_input.export_formats,
    };
    let mut receipt = ledger.generate_run(request, &run_input.snapshot)?;

    if args.complete {
        let run_id = receipt.run.id.clone();
        receipt.run = ledger.complete_run(&run_id)?.clone();
        info!(run_id = %receipt.run.id, "payroll run completed");
    }

    Ok(serde_json::json!({
        "result": receipt,
        "loans": ledger.loans(),
    }))
}
