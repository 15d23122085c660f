use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::{Deserialize, Serialize};

use payroll_core::ledger::{ExportFormat, GenerateRunRequest, PayrollLedger, RunReceipt};
use payroll_core::loans::undo::UndoSummary;
use payroll_core::payroll::scenarios::ScenarioRequest;
use payroll_core::payroll::snapshot::PayrollSnapshot;
use payroll_core::records::{Loan, LoanPayment};
use payroll_core::settings::PayrollSettings;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: payroll_core::loans::amortization::AmortizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = payroll_core::loans::amortization::generate_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn validate_loan_policy(input_json: String) -> NapiResult<String> {
    let input: payroll_core::loans::policy::LoanPolicyInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        payroll_core::loans::policy::validate_loan_policy(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct UndoInput {
    run_id: String,
    payments: Vec<LoanPayment>,
    loans: Vec<Loan>,
}

#[derive(Serialize)]
struct UndoOutput {
    summary: UndoSummary,
    payments: Vec<LoanPayment>,
    loans: Vec<Loan>,
}

/// Returns the summary with the loans and payment rows as they stand after
/// the reversal; the caller persists both.
#[napi]
pub fn undo_loan_deductions(input_json: String) -> NapiResult<String> {
    let mut input: UndoInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let summary = payroll_core::loans::undo::undo_loan_deductions(
        &input.run_id,
        &mut input.payments,
        &mut input.loans,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&UndoOutput {
        summary,
        payments: input.payments,
        loans: input.loans,
    })
    .map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Payroll
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_employee_payroll(input_json: String) -> NapiResult<String> {
    let input: payroll_core::payroll::calculator::EmployeePayrollInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = payroll_core::payroll::calculator::calculate_employee_payroll(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn preview_payroll_scenarios(input_json: String) -> NapiResult<String> {
    let input: payroll_core::payroll::scenarios::ScenarioPreviewInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        payroll_core::payroll::scenarios::preview_scenarios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_payroll_totals(entries_json: String) -> NapiResult<String> {
    let entries: Vec<payroll_core::payroll::calculator::EmployeePayroll> =
        serde_json::from_str(&entries_json).map_err(to_napi_error)?;
    let output =
        payroll_core::payroll::totals::calculate_totals(&entries).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn normalize_allowance_key(title: String) -> String {
    payroll_core::payroll::calculator::normalize_allowance_key(&title)
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RunInput {
    snapshot: PayrollSnapshot,
    #[serde(default)]
    loans: Vec<Loan>,
    #[serde(default)]
    settings: PayrollSettings,
    #[serde(default)]
    calendar_id: Option<String>,
    #[serde(default)]
    scenario: ScenarioRequest,
    #[serde(default)]
    applied_date: Option<NaiveDate>,
    #[serde(default)]
    export_formats: Vec<ExportFormat>,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    receipt: RunReceipt,
    loans: &'a [Loan],
}

/// Generate a draft run against the supplied loan book. The updated loans
/// come back next to the receipt.
#[napi]
pub fn generate_payroll_run(input_json: String) -> NapiResult<String> {
    let input: RunInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut ledger = PayrollLedger::new(input.settings).with_loans(input.loans);
    let request = GenerateRunRequest {
        period: input.snapshot.period,
        calendar_id: input.calendar_id,
        scenario: input.scenario,
        applied_date: input.applied_date,
        export_formats: input.export_formats,
    };
    let receipt = ledger
        .generate_run(request, &input.snapshot)
        .map_err(to_napi_error)?;
    serde_json::to_string(&RunOutput {
        receipt,
        loans: ledger.loans(),
    })
    .map_err(to_napi_error)
}
