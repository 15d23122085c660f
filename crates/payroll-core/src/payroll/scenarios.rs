//! Scenario toggles and what-if previews.
//!
//! Toggles resolve in four layers, later winning: built-in defaults (all
//! on), pay-frequency defaults, calendar overrides, request toggles.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::error::PayrollError;
use crate::records::{Employee, EventCategory, PayFrequency, SkipOverrides};
use crate::settings::PayrollSettings;
use crate::types::*;
use crate::PayrollResult;

use super::calculator::{DeductionConfig, EmployeePayrollInput};
use super::snapshot::PayrollSnapshot;
use super::totals::{calculate_totals, PayrollTotals};

// ---------------------------------------------------------------------------
// Toggles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioToggle {
    Attendance,
    Loans,
    Bonuses,
    Allowances,
    Statutory,
    Overtime,
}

impl ScenarioToggle {
    pub const ALL: [ScenarioToggle; 6] = [
        ScenarioToggle::Attendance,
        ScenarioToggle::Loans,
        ScenarioToggle::Bonuses,
        ScenarioToggle::Allowances,
        ScenarioToggle::Statutory,
        ScenarioToggle::Overtime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioToggle::Attendance => "attendance",
            ScenarioToggle::Loans => "loans",
            ScenarioToggle::Bonuses => "bonuses",
            ScenarioToggle::Allowances => "allowances",
            ScenarioToggle::Statutory => "statutory",
            ScenarioToggle::Overtime => "overtime",
        }
    }
}

/// A partial toggle map; absent toggles inherit from the layer below.
pub type ToggleOverrides = BTreeMap<ScenarioToggle, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioToggles {
    pub attendance: bool,
    pub loans: bool,
    pub bonuses: bool,
    pub allowances: bool,
    pub statutory: bool,
    pub overtime: bool,
}

impl Default for ScenarioToggles {
    fn default() -> Self {
        ScenarioToggles {
            attendance: true,
            loans: true,
            bonuses: true,
            allowances: true,
            statutory: true,
            overtime: true,
        }
    }
}

impl ScenarioToggles {
    pub fn get(&self, toggle: ScenarioToggle) -> bool {
        match toggle {
            ScenarioToggle::Attendance => self.attendance,
            ScenarioToggle::Loans => self.loans,
            ScenarioToggle::Bonuses => self.bonuses,
            ScenarioToggle::Allowances => self.allowances,
            ScenarioToggle::Statutory => self.statutory,
            ScenarioToggle::Overtime => self.overtime,
        }
    }

    pub fn set(&mut self, toggle: ScenarioToggle, on: bool) {
        let slot = match toggle {
            ScenarioToggle::Attendance => &mut self.attendance,
            ScenarioToggle::Loans => &mut self.loans,
            ScenarioToggle::Bonuses => &mut self.bonuses,
            ScenarioToggle::Allowances => &mut self.allowances,
            ScenarioToggle::Statutory => &mut self.statutory,
            ScenarioToggle::Overtime => &mut self.overtime,
        };
        *slot = on;
    }

    pub fn overlay(&mut self, overrides: &ToggleOverrides) {
        for (toggle, on) in overrides {
            self.set(*toggle, *on);
        }
    }

    /// "default" when everything is on, else e.g. "without_loans+without_statutory".
    pub fn key(&self) -> String {
        let off: Vec<String> = ScenarioToggle::ALL
            .iter()
            .filter(|t| !self.get(**t))
            .map(|t| format!("without_{}", t.as_str()))
            .collect();
        if off.is_empty() {
            "default".to_string()
        } else {
            off.join("+")
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Company-level scenario defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    pub frequency_defaults: BTreeMap<PayFrequency, ToggleOverrides>,
    pub calendar_overrides: BTreeMap<String, ToggleOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioRequest {
    pub scenario_key: Option<String>,
    pub frequency: Option<PayFrequency>,
    pub calendar_id: Option<String>,
    pub toggles: ToggleOverrides,
    pub skip: SkipOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedScenario {
    pub key: String,
    pub toggles: ScenarioToggles,
    pub skip: SkipOverrides,
}

impl ScenarioRequest {
    /// Fill the layer selectors a run leaves implicit: the run's calendar
    /// when the request names none, and the pay frequency shared by every
    /// employee when the request names none. Employees on different
    /// frequencies cannot pick a frequency layer, so that is rejected
    /// whenever one of their frequencies has defaults configured.
    pub fn completed_for(
        &self,
        calendar_id: Option<&str>,
        employees: &[Employee],
        settings: &ScenarioSettings,
    ) -> PayrollResult<ScenarioRequest> {
        let mut request = self.clone();

        match (request.calendar_id.as_deref(), calendar_id) {
            (Some(own), Some(run)) if own != run => {
                return Err(PayrollError::invalid(
                    "scenario.calendar_id",
                    format!("scenario calendar {own} does not match run calendar {run}"),
                ));
            }
            (None, Some(run)) => request.calendar_id = Some(run.to_string()),
            _ => {}
        }

        if request.frequency.is_none() {
            let frequencies: BTreeSet<PayFrequency> =
                employees.iter().map(|e| e.pay_frequency).collect();
            if frequencies.len() == 1 {
                request.frequency = frequencies.into_iter().next();
            } else if frequencies
                .iter()
                .any(|f| settings.frequency_defaults.contains_key(f))
            {
                return Err(PayrollError::invalid(
                    "scenario.frequency",
                    "employees span several pay frequencies; name one explicitly",
                ));
            }
        }

        Ok(request)
    }
}

pub fn resolve_scenario(settings: &ScenarioSettings, request: &ScenarioRequest) -> ResolvedScenario {
    let mut toggles = ScenarioToggles::default();
    if let Some(defaults) = request
        .frequency
        .and_then(|f| settings.frequency_defaults.get(&f))
    {
        toggles.overlay(defaults);
    }
    if let Some(overrides) = request
        .calendar_id
        .as_ref()
        .and_then(|c| settings.calendar_overrides.get(c))
    {
        toggles.overlay(overrides);
    }
    toggles.overlay(&request.toggles);

    ResolvedScenario {
        key: request.scenario_key.clone().unwrap_or_else(|| toggles.key()),
        toggles,
        skip: request.skip.clone(),
    }
}

/// Turn a full calculator input into the effective input for `toggles`.
pub fn apply_scenario(
    toggles: &ScenarioToggles,
    mut input: EmployeePayrollInput,
) -> EmployeePayrollInput {
    if !toggles.attendance {
        input.attendance_days = None;
    }
    if !toggles.loans {
        input.loans.clear();
    }
    if !toggles.statutory {
        input.deductions = Some(DeductionConfig::default());
    }
    input.events.retain(|e| match e.event_type.category() {
        Some(EventCategory::Allowance) => toggles.allowances,
        Some(EventCategory::Bonus) => toggles.bonuses,
        Some(EventCategory::Overtime) => toggles.overtime,
        Some(EventCategory::Deduction) | None => true,
    });
    input
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioVariant {
    pub name: String,
    #[serde(default)]
    pub toggles: ToggleOverrides,
    #[serde(default)]
    pub skip: SkipOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPreviewInput {
    pub snapshot: PayrollSnapshot,
    #[serde(default)]
    pub settings: PayrollSettings,
    #[serde(default)]
    pub request: ScenarioRequest,
    pub variants: Vec<ScenarioVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeImpact {
    pub employee_id: String,
    pub baseline_net: Money,
    pub scenario_net: Money,
    pub net_delta: Money,
    pub gross_pay: Money,
    pub total_deductions: Money,
    pub loan_deduction: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPreview {
    pub name: String,
    pub key: String,
    pub toggles: ScenarioToggles,
    pub totals: PayrollTotals,
    pub net_delta: Money,
    pub employees: Vec<EmployeeImpact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPreviewOutput {
    pub baseline_key: String,
    pub baseline_totals: PayrollTotals,
    pub scenarios: Vec<ScenarioPreview>,
}

/// Evaluate each variant against the same snapshot. Nothing is persisted
/// and no loan is touched.
pub fn preview_scenarios(
    input: &ScenarioPreviewInput,
) -> PayrollResult<ComputationOutput<ScenarioPreviewOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.variants.is_empty() {
        return Err(PayrollError::invalid(
            "variants",
            "At least one scenario variant is required",
        ));
    }
    if input.snapshot.employees.is_empty() {
        warnings.push("Snapshot has no employees; every scenario is empty".into());
    }

    let deductions = &input.settings.deductions;
    let request = input.request.completed_for(
        None,
        &input.snapshot.employees,
        &input.settings.scenarios,
    )?;
    let baseline = resolve_scenario(&input.settings.scenarios, &request);
    let baseline_entries = input.snapshot.calculate(&baseline, deductions)?;
    let baseline_totals = calculate_totals(&baseline_entries)?;
    let baseline_net: BTreeMap<&str, Money> = baseline_entries
        .iter()
        .map(|e| (e.employee_id.as_str(), e.net_pay))
        .collect();

    let mut scenarios = Vec::with_capacity(input.variants.len());
    for variant in &input.variants {
        let mut toggles = baseline.toggles;
        toggles.overlay(&variant.toggles);
        let resolved = ResolvedScenario {
            key: toggles.key(),
            toggles,
            skip: baseline.skip.merged(&variant.skip),
        };

        let entries = input.snapshot.calculate(&resolved, deductions)?;
        let totals = calculate_totals(&entries)?;
        let employees: Vec<EmployeeImpact> = entries
            .iter()
            .map(|e| {
                let base = baseline_net
                    .get(e.employee_id.as_str())
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                EmployeeImpact {
                    employee_id: e.employee_id.clone(),
                    baseline_net: base,
                    scenario_net: e.net_pay,
                    net_delta: e.net_pay - base,
                    gross_pay: e.gross_pay,
                    total_deductions: e.total_deductions,
                    loan_deduction: e.deductions.loans,
                }
            })
            .collect();

        scenarios.push(ScenarioPreview {
            name: variant.name.clone(),
            key: resolved.key,
            toggles,
            net_delta: totals.net_amount - baseline_totals.net_amount,
            totals,
            employees,
        });
    }

    let output = ScenarioPreviewOutput {
        baseline_key: baseline.key.clone(),
        baseline_totals,
        scenarios,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario what-if preview",
        &serde_json::json!({
            "period": input.snapshot.period.label(),
            "baseline": baseline.key,
            "variants": input.variants.len(),
            "employees": input.snapshot.employees.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
