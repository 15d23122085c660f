use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::PayrollError;
use crate::loans::amortization::attach_scheduled_amounts;
use crate::records::*;
use crate::types::*;
use crate::PayrollResult;

use super::calculator::{
    calculate_employee_payroll, DeductionConfig, EmployeePayroll, EmployeePayrollInput,
};
use super::scenarios::{apply_scenario, ResolvedScenario};

/// Everything loaded for one period, as handed over by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollSnapshot {
    pub period: PayPeriod,
    /// Overrides each employee's standard working days when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_days: Option<u32>,
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub vacations: Vec<VacationRequest>,
    #[serde(default)]
    pub events: Vec<EmployeeEvent>,
    /// Attended days per employee id.
    #[serde(default)]
    pub attendance: BTreeMap<String, Days>,
}

impl PayrollSnapshot {
    /// The full, unfiltered calculator input for one employee. Loans carry
    /// the amount their schedule claims for the snapshot period.
    pub fn employee_input(
        &self,
        employee: &Employee,
        deductions: &DeductionConfig,
        skip: &SkipOverrides,
    ) -> EmployeePayrollInput {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|l| l.employee_id == employee.id)
            .cloned()
            .collect();
        attach_scheduled_amounts(&mut loans, &self.period);

        EmployeePayrollInput {
            employee: employee.clone(),
            loans,
            vacations: self
                .vacations
                .iter()
                .filter(|v| v.employee_id == employee.id)
                .cloned()
                .collect(),
            events: self
                .events
                .iter()
                .filter(|e| e.employee_id == employee.id)
                .cloned()
                .collect(),
            period: self.period,
            working_days: self.working_days.unwrap_or(employee.standard_working_days),
            attendance_days: self.attendance.get(&employee.id).copied(),
            deductions: Some(deductions.clone()),
            skip: skip.clone(),
        }
    }

    /// Calculate every employee under `scenario`. Output follows snapshot order.
    pub fn calculate(
        &self,
        scenario: &ResolvedScenario,
        deductions: &DeductionConfig,
    ) -> PayrollResult<Vec<EmployeePayroll>> {
        self.period.validate()?;
        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(self.employees.len());
        for employee in &self.employees {
            if !seen.insert(employee.id.as_str()) {
                return Err(PayrollError::invalid(
                    "employees",
                    format!("duplicate employee id {}", employee.id),
                ));
            }
            let input = apply_scenario(
                &scenario.toggles,
                self.employee_input(employee, deductions, &scenario.skip),
            );
            entries.push(calculate_employee_payroll(&input)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::scenarios::ScenarioToggles;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn employee(id: &str, salary: Money) -> Employee {
        Employee {
            id: id.into(),
            name: String::new(),
            monthly_salary: salary,
            standard_working_days: 20,
            status: EmployeeStatus::Active,
            pay_frequency: PayFrequency::Monthly,
        }
    }

    fn snapshot() -> PayrollSnapshot {
        PayrollSnapshot {
            period: PayPeriod::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap(),
            working_days: None,
            employees: vec![employee("e1", dec!(2000)), employee("e2", dec!(4000))],
            loans: vec![],
            vacations: vec![],
            events: vec![],
            attendance: BTreeMap::from([("e2".to_string(), dec!(15))]),
        }
    }

    fn default_scenario() -> ResolvedScenario {
        ResolvedScenario {
            key: "default".into(),
            toggles: ScenarioToggles::default(),
            skip: SkipOverrides::default(),
        }
    }

    #[test]
    fn test_employee_standard_days_and_attendance() {
        let entries = snapshot()
            .calculate(&default_scenario(), &DeductionConfig::default())
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].base_salary, dec!(2000));
        assert_eq!(entries[1].base_salary, dec!(3000));
    }

    #[test]
    fn test_attendance_toggle_off_ignores_attendance() {
        let mut scenario = default_scenario();
        scenario.toggles.attendance = false;
        let entries = snapshot()
            .calculate(&scenario, &DeductionConfig::default())
            .unwrap();
        assert_eq!(entries[1].base_salary, dec!(4000));
    }

    #[test]
    fn test_snapshot_working_days_override() {
        let mut snap = snapshot();
        snap.working_days = Some(25);
        let input = snap.employee_input(
            &snap.employees[0],
            &DeductionConfig::default(),
            &SkipOverrides::default(),
        );
        assert_eq!(input.working_days, 25);
    }

    #[test]
    fn test_duplicate_employee_rejected() {
        let mut snap = snapshot();
        snap.employees.push(employee("e1", dec!(1)));
        assert!(snap
            .calculate(&default_scenario(), &DeductionConfig::default())
            .is_err());
    }
}
