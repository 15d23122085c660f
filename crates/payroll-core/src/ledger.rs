//! In-memory run ledger.
//!
//! Orchestrates the pure engine the way the persistence layer does: every
//! run mutation (entries, totals, loan balances, installment statuses, loan
//! payments) is applied to a working copy of the state and committed only
//! if every step succeeds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::PayrollError;
use crate::loans::allocation::{allocate_loan_deduction, AllocationContext};
use crate::loans::undo::{undo_loan_deductions, UndoSummary};
use crate::payroll::calculator::{EmployeePayroll, PayrollNotice};
use crate::payroll::scenarios::{resolve_scenario, ScenarioRequest, ScenarioToggles};
use crate::payroll::snapshot::PayrollSnapshot;
use crate::payroll::totals::{calculate_totals, PayrollTotals};
use crate::records::{Loan, LoanPayment, SkipOverrides};
use crate::settings::PayrollSettings;
use crate::types::*;
use crate::PayrollResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Pdf,
    Excel,
    Csv,
}

/// Handed to the document-export collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub run_id: String,
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRunRequest {
    pub period: PayPeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub scenario: ScenarioRequest,
    /// Date stamped on loan payments; defaults to the period end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_date: Option<NaiveDate>,
    #[serde(default)]
    pub export_formats: Vec<ExportFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: String,
    pub label: String,
    pub period: PayPeriod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    pub status: RunStatus,
    pub scenario_key: String,
    pub toggles: ScenarioToggles,
    pub skip: SkipOverrides,
    pub totals: PayrollTotals,
    pub applied_date: NaiveDate,
    pub request: GenerateRunRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReceipt {
    pub run: PayrollRun,
    pub entries: Vec<EmployeePayroll>,
    pub payments: Vec<LoanPayment>,
    pub notices: Vec<PayrollNotice>,
    pub exports: Vec<ExportRequest>,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    loans: Vec<Loan>,
    runs: Vec<PayrollRun>,
    entries: BTreeMap<String, Vec<EmployeePayroll>>,
    payments: Vec<LoanPayment>,
}

/// Owns loans and runs; employees, vacations, events and attendance come
/// in with each snapshot.
#[derive(Debug, Clone, Default)]
pub struct PayrollLedger {
    state: LedgerState,
    settings: PayrollSettings,
    next_run: u32,
    /// Only runs on the same calendar conflict when set.
    scope_overlap_to_calendar: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl PayrollLedger {
    pub fn new(settings: PayrollSettings) -> Self {
        PayrollLedger {
            settings,
            next_run: 1,
            ..Default::default()
        }
    }

    pub fn with_loans(mut self, loans: Vec<Loan>) -> Self {
        self.state.loans = loans;
        self
    }

    pub fn scoped_to_calendar(mut self, scoped: bool) -> Self {
        self.scope_overlap_to_calendar = scoped;
        self
    }

    pub fn settings(&self) -> &PayrollSettings {
        &self.settings
    }

    /// Insert or replace a loan by id.
    pub fn upsert_loan(&mut self, loan: Loan) {
        match self.state.loans.iter_mut().find(|l| l.id == loan.id) {
            Some(existing) => *existing = loan,
            None => self.state.loans.push(loan),
        }
    }

    pub fn loans(&self) -> &[Loan] {
        &self.state.loans
    }

    pub fn loan(&self, id: &str) -> Option<&Loan> {
        self.state.loans.iter().find(|l| l.id == id)
    }

    pub fn runs(&self) -> &[PayrollRun] {
        &self.state.runs
    }

    pub fn run(&self, id: &str) -> Option<&PayrollRun> {
        self.state.runs.iter().find(|r| r.id == id)
    }

    pub fn entries(&self, run_id: &str) -> &[EmployeePayroll] {
        self.state
            .entries
            .get(run_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn payments(&self) -> &[LoanPayment] {
        &self.state.payments
    }

    pub fn payments_for_run(&self, run_id: &str) -> Vec<&LoanPayment> {
        self.state
            .payments
            .iter()
            .filter(|p| p.payroll_run_id == run_id)
            .collect()
    }

    /// Calculate and persist a new draft run.
    ///
    /// The snapshot's `loans` are ignored; the ledger's own loans are used
    /// and mutated. A period overlapping an existing run is rejected; the
    /// rejection is terminal, not a transient conflict.
    pub fn generate_run(
        &mut self,
        request: GenerateRunRequest,
        snapshot: &PayrollSnapshot,
    ) -> PayrollResult<RunReceipt> {
        request.period.validate()?;
        if snapshot.period != request.period {
            return Err(PayrollError::invalid(
                "snapshot.period",
                format!(
                    "snapshot covers {} but run requested {}",
                    snapshot.period.label(),
                    request.period.label()
                ),
            ));
        }

        // Application-level check-then-insert: concurrent generators for
        // overlapping periods can both pass it without a storage constraint.
        if let Some(existing) = self.state.runs.iter().find(|r| {
            r.period.overlaps(&request.period)
                && (!self.scope_overlap_to_calendar || r.calendar_id == request.calendar_id)
        }) {
            return Err(PayrollError::PeriodOverlap {
                existing_run_id: existing.id.clone(),
            });
        }

        let run_id = format!("run-{:04}", self.next_run);
        let settings = &self.settings;
        let receipt = transact(&mut self.state, |state| {
            materialize(state, settings, &run_id, request, snapshot)
        })?;
        self.next_run += 1;

        info!(
            run_id = %receipt.run.id,
            period = %receipt.run.label,
            employees = receipt.entries.len(),
            gross = %receipt.run.totals.gross_amount,
            net = %receipt.run.totals.net_amount,
            loan_payments = receipt.payments.len(),
            "payroll run generated"
        );
        Ok(receipt)
    }

    /// Replace a draft run's entries, totals and loan effects from a fresh
    /// snapshot. Recalculating against unchanged inputs reproduces the run.
    pub fn recalculate_run(
        &mut self,
        run_id: &str,
        snapshot: &PayrollSnapshot,
    ) -> PayrollResult<RunReceipt> {
        let run = self.run(run_id).ok_or_else(|| not_found(run_id))?;
        if run.status == RunStatus::Completed {
            return Err(PayrollError::invalid(
                "run",
                format!("run {run_id} is completed and can no longer be recalculated"),
            ));
        }
        let request = run.request.clone();
        if snapshot.period != request.period {
            return Err(PayrollError::invalid(
                "snapshot.period",
                format!("snapshot does not cover run {run_id}"),
            ));
        }

        let settings = &self.settings;
        let receipt = transact(&mut self.state, |state| {
            undo_loan_deductions(run_id, &mut state.payments, &mut state.loans)?;
            state.entries.remove(run_id);
            state.runs.retain(|r| r.id != run_id);
            materialize(state, settings, run_id, request, snapshot)
        })?;

        info!(run_id, gross = %receipt.run.totals.gross_amount, "payroll run recalculated");
        Ok(receipt)
    }

    pub fn complete_run(&mut self, run_id: &str) -> PayrollResult<&PayrollRun> {
        let run = self
            .state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| not_found(run_id))?;
        run.status = RunStatus::Completed;
        Ok(run)
    }

    /// Reverse the run's loan effects, keeping the run and its entries.
    pub fn undo_loan_deductions(&mut self, run_id: &str) -> PayrollResult<UndoSummary> {
        if self.run(run_id).is_none() {
            return Err(not_found(run_id));
        }
        let result = transact(&mut self.state, |state| {
            undo_loan_deductions(run_id, &mut state.payments, &mut state.loans)
        });
        match &result {
            Ok(summary) => debug!(
                run_id,
                restored = %summary.amount_restored,
                payments = summary.payments_reversed,
                "loan deductions undone"
            ),
            Err(e) => warn!(run_id, error = %e, "loan undo refused"),
        }
        result
    }

    /// Delete a run. Its loan effects are undone first; if that is refused
    /// the run stays.
    pub fn delete_run(&mut self, run_id: &str) -> PayrollResult<UndoSummary> {
        if self.run(run_id).is_none() {
            return Err(not_found(run_id));
        }
        let result = transact(&mut self.state, |state| {
            let summary = undo_loan_deductions(run_id, &mut state.payments, &mut state.loans)?;
            state.entries.remove(run_id);
            state.runs.retain(|r| r.id != run_id);
            Ok(summary)
        });
        match &result {
            Ok(_) => info!(run_id, "payroll run deleted"),
            Err(e) => warn!(run_id, error = %e, "payroll run deletion aborted"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Run `op` against a copy of the state; commit only on success.
fn transact<T>(
    state: &mut LedgerState,
    op: impl FnOnce(&mut LedgerState) -> PayrollResult<T>,
) -> PayrollResult<T> {
    let mut working = state.clone();
    let out = op(&mut working)?;
    *state = working;
    Ok(out)
}

fn materialize(
    state: &mut LedgerState,
    settings: &PayrollSettings,
    run_id: &str,
    request: GenerateRunRequest,
    snapshot: &PayrollSnapshot,
) -> PayrollResult<RunReceipt> {
    let period = request.period;
    let scenario_request = request.scenario.completed_for(
        request.calendar_id.as_deref(),
        &snapshot.employees,
        &settings.scenarios,
    )?;
    let scenario = resolve_scenario(&settings.scenarios, &scenario_request);

    let mut snap = snapshot.clone();
    snap.loans = state.loans.clone();

    let entries = snap.calculate(&scenario, &settings.deductions)?;
    let totals = calculate_totals(&entries)?;

    let ctx = AllocationContext {
        run_id: run_id.to_string(),
        period,
        applied_date: request.applied_date.unwrap_or(period.end),
    };
    let mut payments = Vec::new();
    for entry in &entries {
        let outcome = allocate_loan_deduction(
            &ctx,
            &entry.employee_id,
            entry.deductions.loans,
            &mut state.loans,
            &snap.vacations,
            &scenario.skip,
        )?;
        if outcome.unallocated > BALANCE_TOLERANCE {
            return Err(PayrollError::InvariantViolation(format!(
                "employee {}: {} of loan deduction {} could not be allocated",
                entry.employee_id, outcome.unallocated, entry.deductions.loans
            )));
        }
        payments.extend(outcome.payments);
    }

    let notices: Vec<PayrollNotice> = entries.iter().flat_map(|e| e.notices()).collect();
    let exports: Vec<ExportRequest> = request
        .export_formats
        .iter()
        .map(|format| ExportRequest {
            run_id: run_id.to_string(),
            format: *format,
        })
        .collect();

    let run = PayrollRun {
        id: run_id.to_string(),
        label: period.label(),
        period,
        calendar_id: request.calendar_id.clone(),
        status: RunStatus::Draft,
        scenario_key: scenario.key.clone(),
        toggles: scenario.toggles,
        skip: scenario.skip.clone(),
        totals,
        applied_date: ctx.applied_date,
        request,
    };

    state.runs.push(run.clone());
    state.entries.insert(run_id.to_string(), entries.clone());
    state.payments.extend(payments.iter().cloned());

    Ok(RunReceipt {
        run,
        entries,
        payments,
        notices,
        exports,
    })
}

fn not_found(run_id: &str) -> PayrollError {
    PayrollError::NotFound {
        entity: "payroll run".into(),
        id: run_id.to_string(),
    }
}

impl RunReceipt {
    pub fn loan_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum::<Decimal>()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
