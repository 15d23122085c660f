//! Single-employee pay calculation.
//!
//! `calculate_employee_payroll` is a pure function of its input. Preview,
//! generate and recalculate all go through it, so identical snapshots must
//! always produce identical entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PayrollError;
use crate::loans::amortization::scheduled_amount;
use crate::records::*;
use crate::types::*;
use crate::PayrollResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Flat statutory amounts supplied by company configuration. Nothing is
/// withheld unless configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeductionConfig {
    pub tax: Money,
    pub social_security: Money,
    pub health_insurance: Money,
}

impl DeductionConfig {
    pub fn total(&self) -> Money {
        self.tax + self.social_security + self.health_insurance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeePayrollInput {
    pub employee: Employee,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub vacations: Vec<VacationRequest>,
    #[serde(default)]
    pub events: Vec<EmployeeEvent>,
    pub period: PayPeriod,
    pub working_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_days: Option<Days>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deductions: Option<DeductionConfig>,
    #[serde(default)]
    pub skip: SkipOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeductionBreakdown {
    pub tax: Money,
    pub social_security: Money,
    pub health_insurance: Money,
    pub loans: Money,
    pub other: Money,
}

impl DeductionBreakdown {
    pub fn total(&self) -> Money {
        self.tax + self.social_security + self.health_insurance + self.loans + self.other
    }

    /// Drop `excess` from the breakdown: loans first (the balance simply
    /// stays outstanding), then other deductions, then statutory.
    fn absorb(&mut self, mut excess: Money) {
        for component in [
            &mut self.loans,
            &mut self.other,
            &mut self.health_insurance,
            &mut self.social_security,
            &mut self.tax,
        ] {
            if excess <= Decimal::ZERO {
                break;
            }
            let cut = excess.min(*component).max(Decimal::ZERO);
            *component -= cut;
            excess -= cut;
        }
    }
}

/// One employee's computed pay for the period; persisted as a payroll entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeePayroll {
    pub employee_id: String,
    pub period: PayPeriod,
    pub base_salary: Money,
    pub bonus_amount: Money,
    pub allowances: BTreeMap<String, Money>,
    pub gross_pay: Money,
    pub working_days: Days,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_days: Option<Days>,
    pub actual_working_days: Days,
    pub vacation_days: Days,
    /// Base pay lost to vacation days.
    pub vacation_deduction: Money,
    pub deductions: DeductionBreakdown,
    pub total_deductions: Money,
    /// Deductions that did not fit under gross pay and were not withheld.
    pub unrecovered_deductions: Money,
    pub net_pay: Money,
    pub adjustment_reason: Option<String>,
}

/// Notification requests produced for the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayrollNotice {
    VacationDeduction {
        employee_id: String,
        days: Days,
        amount: Money,
    },
    LoanDeduction {
        employee_id: String,
        amount: Money,
    },
    AttendanceVariance {
        employee_id: String,
        expected_days: Days,
        attended_days: Days,
    },
}

impl EmployeePayroll {
    pub fn notices(&self) -> Vec<PayrollNotice> {
        let mut notices = Vec::new();
        if self.vacation_days > Decimal::ZERO {
            notices.push(PayrollNotice::VacationDeduction {
                employee_id: self.employee_id.clone(),
                days: self.vacation_days,
                amount: self.vacation_deduction,
            });
        }
        if self.deductions.loans > Decimal::ZERO {
            notices.push(PayrollNotice::LoanDeduction {
                employee_id: self.employee_id.clone(),
                amount: self.deductions.loans,
            });
        }
        if let Some(attended) = self.attendance_days {
            if attended < self.working_days {
                notices.push(PayrollNotice::AttendanceVariance {
                    employee_id: self.employee_id.clone(),
                    expected_days: self.working_days,
                    attended_days: attended,
                });
            }
        }
        notices
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn calculate_employee_payroll(input: &EmployeePayrollInput) -> PayrollResult<EmployeePayroll> {
    input.period.validate()?;
    if input.working_days == 0 {
        return Err(PayrollError::invalid(
            "working_days",
            "Working days must be at least 1",
        ));
    }
    if let Some(attended) = input.attendance_days {
        if attended < Decimal::ZERO {
            return Err(PayrollError::invalid(
                "attendance_days",
                "Attendance cannot be negative",
            ));
        }
    }

    let employee = &input.employee;
    let period = &input.period;
    let skip = &input.skip;
    let mut reasons: Vec<String> = Vec::new();

    // 1. Vacation days
    let vacation_days = Decimal::from(
        input
            .vacations
            .iter()
            .filter(|v| {
                v.employee_id == employee.id
                    && v.is_approved()
                    && !skip.vacation_ids.contains(&v.id)
            })
            .map(|v| period.overlap_days(v.start_date, v.end_date))
            .sum::<u32>(),
    );

    // 2. Actual working days
    let working_days = Decimal::from(input.working_days);
    let available = input
        .attendance_days
        .map_or(working_days, |attended| attended.min(working_days));
    let actual_working_days = (available - vacation_days).max(Decimal::ZERO);

    // 3. Base salary (inactive employees draw nothing for the whole period)
    let pro_rata = |days: Days| -> Money {
        if employee.is_active() {
            round_money(employee.monthly_salary * days / working_days)
        } else {
            Decimal::ZERO
        }
    };
    let base_salary = pro_rata(actual_working_days);
    let vacation_deduction = pro_rata(available) - pro_rata(actual_working_days);

    // 4. Loan deduction
    let mut loan_deduction = Decimal::ZERO;
    let mut loan_notes: Vec<String> = Vec::new();
    for loan in input.loans.iter().filter(|l| {
        l.employee_id == employee.id && l.is_collectable() && !skip.loan_ids.contains(&l.id)
    }) {
        let scheduled = scheduled_amount(loan, &input.period);
        loan_deduction += loan.remaining_amount.min(scheduled.unwrap_or(loan.monthly_deduction));
        if let Some(scheduled) = scheduled {
            if (scheduled - loan.monthly_deduction).abs() > SCHEDULE_MATCH_TOLERANCE {
                loan_notes.push(format!(
                    "Loan {}: scheduled {:.2} differs from monthly deduction {:.2}",
                    loan.id, scheduled, loan.monthly_deduction
                ));
            }
        }
    }
    let loan_deduction = round_money(loan_deduction);

    // 5-7. Events
    let mut allowances: BTreeMap<String, Money> = BTreeMap::new();
    let mut earnings = Decimal::ZERO;
    let mut other_deductions = Decimal::ZERO;
    for event in input
        .events
        .iter()
        .filter(|e| e.employee_id == employee.id && !skip.event_ids.contains(&e.id))
    {
        let Some(category) = event.pay_category() else {
            continue;
        };
        let in_period = period.contains(event.event_date);
        match category {
            EventCategory::Allowance => {
                if in_period || event.recurs_into(period) {
                    *allowances
                        .entry(normalize_allowance_key(&event.title))
                        .or_insert(Decimal::ZERO) += event.amount;
                }
            }
            EventCategory::Bonus | EventCategory::Overtime => {
                if in_period {
                    earnings += event.amount;
                }
            }
            EventCategory::Deduction => {
                if in_period {
                    other_deductions += event.amount;
                }
            }
        }
    }
    let allowance_total: Money = allowances.values().copied().sum();
    let bonus_amount = round_money(earnings + allowance_total);

    // 8. Gross, deductions, net
    let gross_pay = base_salary + bonus_amount;
    let statutory = input.deductions.clone().unwrap_or_default();
    let mut deductions = DeductionBreakdown {
        tax: statutory.tax,
        social_security: statutory.social_security,
        health_insurance: statutory.health_insurance,
        loans: loan_deduction,
        other: round_money(other_deductions),
    };
    let requested = deductions.total();
    let unrecovered_deductions = (requested - gross_pay).max(Decimal::ZERO);
    if unrecovered_deductions > Decimal::ZERO {
        deductions.absorb(unrecovered_deductions);
    }
    let total_deductions = deductions.total();
    let net_pay = (gross_pay - total_deductions).max(Decimal::ZERO);

    // 9. Adjustment reason
    if vacation_days > Decimal::ZERO {
        reasons.push(format!(
            "Vacation: {vacation_days} day(s) deducted ({:.2})",
            vacation_deduction
        ));
    }
    if let Some(attended) = input.attendance_days {
        if attended < working_days {
            reasons.push(format!(
                "Attendance: {attended} of {working_days} working day(s)"
            ));
        }
    }
    if deductions.loans > Decimal::ZERO {
        reasons.push(format!("Loan deduction: {:.2}", deductions.loans));
    }
    reasons.extend(loan_notes);
    if unrecovered_deductions > Decimal::ZERO {
        reasons.push(format!(
            "Deductions exceeded gross pay by {:.2}; excess not withheld",
            unrecovered_deductions
        ));
    }

    Ok(EmployeePayroll {
        employee_id: employee.id.clone(),
        period: *period,
        base_salary,
        bonus_amount,
        allowances,
        gross_pay,
        working_days,
        attendance_days: input.attendance_days,
        actual_working_days,
        vacation_days,
        vacation_deduction,
        deductions,
        total_deductions,
        unrecovered_deductions,
        net_pay,
        adjustment_reason: if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        },
    })
}

/// "Housing Allowance" -> "housing", "Transport-Allowance (Monthly)" ->
/// "transport_monthly". Only the singular word is dropped, so "Travel
/// Allowances" keeps its plural. An empty key becomes "general".
pub fn normalize_allowance_key(title: &str) -> String {
    let lower = title.to_lowercase();
    let key = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty() && *word != "allowance")
        .collect::<Vec<_>>()
        .join("_");
    if key.is_empty() {
        "general".to_string()
    } else {
        key
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn employee() -> Employee {
        Employee {
            id: "e1".into(),
            name: "Test".into(),
            monthly_salary: dec!(3000),
            standard_working_days: 30,
            status: EmployeeStatus::Active,
            pay_frequency: PayFrequency::Monthly,
        }
    }

    fn base_input() -> EmployeePayrollInput {
        EmployeePayrollInput {
            employee: employee(),
            loans: vec![],
            vacations: vec![],
            events: vec![],
            period: PayPeriod::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap(),
            working_days: 30,
            attendance_days: None,
            deductions: None,
            skip: SkipOverrides::default(),
        }
    }

    fn event(
        id: &str,
        kind: EventType,
        title: &str,
        amount: Money,
        date: NaiveDate,
    ) -> EmployeeEvent {
        EmployeeEvent {
            id: id.into(),
            employee_id: "e1".into(),
            event_type: kind,
            title: title.into(),
            amount,
            event_date: date,
            recurrence: Recurrence::None,
            recurrence_end_date: None,
            affects_payroll: true,
            status: EventStatus::Active,
        }
    }

    fn loan(id: &str, remaining: Money, cap: Money) -> Loan {
        Loan {
            id: id.into(),
            employee_id: "e1".into(),
            amount: remaining,
            remaining_amount: remaining,
            monthly_deduction: cap,
            interest_rate: None,
            status: LoanStatus::Active,
            start_date: d(2024, 1, 1),
            end_date: None,
            created_at: None,
            scheduled_due_amount: None,
            installments: vec![],
        }
    }

    #[test]
    fn test_plain_salary() {
        let out = calculate_employee_payroll(&base_input()).unwrap();
        assert_eq!(out.base_salary, dec!(3000));
        assert_eq!(out.gross_pay, dec!(3000));
        assert_eq!(out.net_pay, dec!(3000));
        assert_eq!(out.adjustment_reason, None);
        assert!(out.notices().is_empty());
    }

    #[test]
    fn test_rejected_and_pending_vacations_ignored() {
        let mut input = base_input();
        input.vacations = vec![VacationRequest {
            id: "v1".into(),
            employee_id: "e1".into(),
            start_date: d(2024, 3, 4),
            end_date: d(2024, 3, 8),
            status: VacationStatus::Rejected,
            leave_type: "annual".into(),
            pause_loans: false,
        }];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.vacation_days, Decimal::ZERO);
        assert_eq!(out.base_salary, dec!(3000));
    }

    #[test]
    fn test_vacation_clipped_to_period() {
        let mut input = base_input();
        input.vacations = vec![VacationRequest {
            id: "v1".into(),
            employee_id: "e1".into(),
            start_date: d(2024, 2, 27),
            end_date: d(2024, 3, 2),
            status: VacationStatus::Approved,
            leave_type: "annual".into(),
            pause_loans: false,
        }];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.vacation_days, dec!(2));
        assert_eq!(out.vacation_deduction, dec!(200));
    }

    #[test]
    fn test_attendance_caps_days() {
        let mut input = base_input();
        input.attendance_days = Some(dec!(27));
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.actual_working_days, dec!(27));
        assert_eq!(out.base_salary, dec!(2700));
        assert!(out
            .adjustment_reason
            .as_deref()
            .unwrap()
            .contains("Attendance"));
        assert!(matches!(
            out.notices()[0],
            PayrollNotice::AttendanceVariance { .. }
        ));

        input.attendance_days = Some(dec!(31));
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.actual_working_days, dec!(30));
    }

    #[test]
    fn test_inactive_employee_gets_zero_base_for_whole_period() {
        let mut input = base_input();
        input.employee.status = EmployeeStatus::Inactive;
        input.events = vec![event("b1", EventType::Bonus, "Q1", dec!(100), d(2024, 3, 5))];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.base_salary, Decimal::ZERO);
        assert_eq!(out.gross_pay, dec!(100));

        input.employee.status = EmployeeStatus::Terminated;
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.base_salary, Decimal::ZERO);
    }

    #[test]
    fn test_loan_clamped_to_remaining() {
        let mut input = base_input();
        input.loans = vec![loan("l1", dec!(40), dec!(100))];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.deductions.loans, dec!(40));
    }

    #[test]
    fn test_installments_set_loan_amount_on_their_own() {
        let installment = |n: u32, due: NaiveDate, status: InstallmentStatus| Installment {
            loan_id: "l1".into(),
            installment_number: n,
            due_date: due,
            principal_amount: dec!(150),
            interest_amount: Decimal::ZERO,
            payment_amount: dec!(150),
            remaining_balance: dec!(600) - dec!(150) * Decimal::from(n),
            status,
            paid_run_id: None,
            paid_date: None,
        };
        let mut scheduled = loan("l1", dec!(450), dec!(300));
        scheduled.installments = vec![
            installment(1, d(2024, 2, 1), InstallmentStatus::Paid),
            installment(2, d(2024, 3, 1), InstallmentStatus::Pending),
            installment(3, d(2024, 4, 1), InstallmentStatus::Pending),
        ];
        let mut input = base_input();
        input.loans = vec![scheduled];

        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.deductions.loans, dec!(150));
        assert!(out
            .adjustment_reason
            .as_deref()
            .unwrap_or_default()
            .contains("scheduled 150.00 differs from monthly deduction 300.00"));

        // A stale attached value does not override the installments.
        input.loans[0].scheduled_due_amount = Some(dec!(999));
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.deductions.loans, dec!(150));
    }

    #[test]
    fn test_ineligible_loans_ignored() {
        let mut input = base_input();
        let mut pending = loan("l1", dec!(500), dec!(100));
        pending.status = LoanStatus::Pending;
        let mut done = loan("l2", dec!(0), dec!(100));
        done.status = LoanStatus::Active;
        let mut approved = loan("l3", dec!(500), dec!(50));
        approved.status = LoanStatus::Approved;
        input.loans = vec![pending, done, approved];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.deductions.loans, dec!(50));
    }

    #[test]
    fn test_bonus_overtime_and_deduction_events() {
        let mut input = base_input();
        input.events = vec![
            event("b1", EventType::Bonus, "Spot", dec!(200), d(2024, 3, 10)),
            event("c1", EventType::Commission, "Sales", dec!(50), d(2024, 3, 11)),
            event("o1", EventType::Overtime, "Weekend", dec!(80), d(2024, 3, 12)),
            event("p1", EventType::Penalty, "Late", dec!(30), d(2024, 3, 13)),
            event("x1", EventType::Deduction, "Uniform", dec!(20), d(2024, 3, 14)),
            event("b2", EventType::Bonus, "Old", dec!(999), d(2024, 2, 10)),
            event("w1", EventType::Warning, "Memo", dec!(999), d(2024, 3, 10)),
        ];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.bonus_amount, dec!(330));
        assert_eq!(out.deductions.other, dec!(50));
        assert_eq!(out.gross_pay, dec!(3330));
        assert_eq!(out.net_pay, dec!(3280));
    }

    #[test]
    fn test_event_not_affecting_payroll_ignored() {
        let mut input = base_input();
        let mut ev = event("b1", EventType::Bonus, "Spot", dec!(200), d(2024, 3, 10));
        ev.affects_payroll = false;
        input.events = vec![ev];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.bonus_amount, Decimal::ZERO);
    }

    #[test]
    fn test_statutory_deductions_only_when_configured() {
        let mut input = base_input();
        input.deductions = Some(DeductionConfig {
            tax: dec!(300),
            social_security: dec!(150),
            health_insurance: dec!(50),
        });
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.total_deductions, dec!(500));
        assert_eq!(out.net_pay, dec!(2500));
    }

    #[test]
    fn test_deductions_exceeding_gross_are_dropped() {
        let mut input = base_input();
        input.employee.monthly_salary = dec!(300);
        input.deductions = Some(DeductionConfig {
            tax: dec!(200),
            social_security: Decimal::ZERO,
            health_insurance: Decimal::ZERO,
        });
        input.loans = vec![loan("l1", dec!(500), dec!(150))];
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.net_pay, Decimal::ZERO);
        assert_eq!(out.unrecovered_deductions, dec!(50));
        assert_eq!(out.deductions.loans, dec!(100));
        assert_eq!(out.deductions.tax, dec!(200));
        assert_eq!(out.gross_pay - out.total_deductions, out.net_pay);
        assert!(out.adjustment_reason.unwrap().contains("excess not withheld"));
    }

    #[test]
    fn test_skip_overrides_exclude_records() {
        let mut input = base_input();
        input.loans = vec![loan("l1", dec!(500), dec!(100))];
        input.events = vec![event("b1", EventType::Bonus, "Spot", dec!(200), d(2024, 3, 10))];
        input.skip.loan_ids.insert("l1".into());
        input.skip.event_ids.insert("b1".into());
        let out = calculate_employee_payroll(&input).unwrap();
        assert_eq!(out.deductions.loans, Decimal::ZERO);
        assert_eq!(out.bonus_amount, Decimal::ZERO);
    }

    #[test]
    fn test_zero_working_days_rejected() {
        let mut input = base_input();
        input.working_days = 0;
        assert!(calculate_employee_payroll(&input).is_err());
    }

    #[test]
    fn test_identical_inputs_identical_output() {
        let mut input = base_input();
        input.loans = vec![loan("l1", dec!(500), dec!(100))];
        input.attendance_days = Some(dec!(28.5));
        let a = calculate_employee_payroll(&input).unwrap();
        let b = calculate_employee_payroll(&input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_allowance_key() {
        assert_eq!(normalize_allowance_key("Housing Allowance"), "housing");
        assert_eq!(
            normalize_allowance_key("Transport-Allowance (Monthly)"),
            "transport_monthly"
        );
        assert_eq!(normalize_allowance_key("  ALLOWANCE "), "general");
        assert_eq!(
            normalize_allowance_key("Travel Allowances"),
            "travel_allowances"
        );
    }
}
