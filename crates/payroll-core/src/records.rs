//! Snapshot records the engine is fed by the persistence layer.
//!
//! These are immutable inputs for one calculation pass, except for [`Loan`]
//! and its [`Installment`]s, which the allocator and undo paths mutate.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::*;

// ---------------------------------------------------------------------------
// Employees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayFrequency {
    #[default]
    Monthly,
    SemiMonthly,
    BiWeekly,
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub monthly_salary: Money,
    #[serde(default = "default_working_days")]
    pub standard_working_days: u32,
    #[serde(default)]
    pub status: EmployeeStatus,
    #[serde(default)]
    pub pay_frequency: PayFrequency,
}

fn default_working_days() -> u32 {
    30
}

impl Employee {
    /// Only employees marked active draw base pay.
    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[default]
    Pending,
    Approved,
    Active,
    Completed,
    Cancelled,
}

impl LoanStatus {
    /// Statuses payroll may deduct against.
    pub fn is_collectable(self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    #[default]
    Pending,
    Paid,
    Paused,
    Skipped,
}

/// One row of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub loan_id: String,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub payment_amount: Money,
    pub remaining_balance: Money,
    #[serde(default)]
    pub status: InstallmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub employee_id: String,
    pub amount: Money,
    pub remaining_amount: Money,
    /// Flat per-period deduction cap.
    pub monthly_deduction: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<RatePct>,
    #[serde(default)]
    pub status: LoanStatus,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    /// Amount the amortization schedule expects for the period being
    /// calculated. Takes precedence over `monthly_deduction` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_due_amount: Option<Money>,
    #[serde(default)]
    pub installments: Vec<Installment>,
}

impl Loan {
    pub fn is_collectable(&self) -> bool {
        self.status.is_collectable() && self.remaining_amount > Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    #[default]
    Payroll,
    Manual,
}

/// A deduction actually applied against a loan by a payroll run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayment {
    pub id: String,
    pub loan_id: String,
    pub payroll_run_id: String,
    pub employee_id: String,
    pub amount: Money,
    pub applied_date: NaiveDate,
    #[serde(default)]
    pub source: PaymentSource,
    /// Loan balance right after this payment. Undo refuses to refund when
    /// the live balance no longer matches.
    pub balance_after: Money,
    /// Loan status before this payment was applied.
    pub previous_status: LoanStatus,
}

// ---------------------------------------------------------------------------
// Vacations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacationStatus {
    Approved,
    #[default]
    Pending,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacationRequest {
    pub id: String,
    pub employee_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: VacationStatus,
    #[serde(default)]
    pub leave_type: String,
    /// Suspend loan installments while this leave overlaps a period.
    #[serde(default)]
    pub pause_loans: bool,
}

impl VacationRequest {
    pub fn is_approved(&self) -> bool {
        self.status == VacationStatus::Approved
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Bonus,
    Commission,
    Overtime,
    Allowance,
    Deduction,
    Penalty,
    Vacation,
    Promotion,
    SalaryAdjustment,
    Warning,
    Training,
    Termination,
}

/// How an event type participates in pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Bonus and commission.
    Bonus,
    Overtime,
    Allowance,
    /// Deduction and penalty.
    Deduction,
}

impl EventType {
    /// `None` for event types that carry no pay effect.
    pub fn category(self) -> Option<EventCategory> {
        match self {
            EventType::Bonus | EventType::Commission => Some(EventCategory::Bonus),
            EventType::Overtime => Some(EventCategory::Overtime),
            EventType::Allowance => Some(EventCategory::Allowance),
            EventType::Deduction | EventType::Penalty => Some(EventCategory::Deduction),
            EventType::Vacation
            | EventType::Promotion
            | EventType::SalaryAdjustment
            | EventType::Warning
            | EventType::Training
            | EventType::Termination => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    None,
    Monthly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Active,
    Cancelled,
    Processed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeEvent {
    pub id: String,
    pub employee_id: String,
    pub event_type: EventType,
    #[serde(default)]
    pub title: String,
    pub amount: Money,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
    #[serde(default = "default_affects_payroll")]
    pub affects_payroll: bool,
    #[serde(default)]
    pub status: EventStatus,
}

fn default_affects_payroll() -> bool {
    true
}

impl EmployeeEvent {
    /// Pay category when the event is live and payroll-affecting.
    pub fn pay_category(&self) -> Option<EventCategory> {
        if self.status != EventStatus::Active || !self.affects_payroll {
            return None;
        }
        self.event_type.category()
    }

    /// A monthly event whose recurrence window reaches into `period` from an
    /// event date outside of it.
    pub fn recurs_into(&self, period: &PayPeriod) -> bool {
        if self.recurrence != Recurrence::Monthly || period.contains(self.event_date) {
            return false;
        }
        if self.event_date > period.end {
            return false;
        }
        self.recurrence_end_date
            .map_or(true, |end| end >= period.start)
    }
}

// ---------------------------------------------------------------------------
// Skip overrides
// ---------------------------------------------------------------------------

/// Ad hoc per-record exclusions for what-if runs. Applied regardless of the
/// scenario toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipOverrides {
    #[serde(default)]
    pub vacation_ids: BTreeSet<String>,
    #[serde(default)]
    pub loan_ids: BTreeSet<String>,
    #[serde(default)]
    pub event_ids: BTreeSet<String>,
}

impl SkipOverrides {
    /// Union of two override sets.
    pub fn merged(&self, other: &SkipOverrides) -> SkipOverrides {
        SkipOverrides {
            vacation_ids: self.vacation_ids.union(&other.vacation_ids).cloned().collect(),
            loan_ids: self.loan_ids.union(&other.loan_ids).cloned().collect(),
            event_ids: self.event_ids.union(&other.event_ids).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn food_allowance(end: Option<NaiveDate>) -> EmployeeEvent {
        EmployeeEvent {
            id: "ev-1".into(),
            employee_id: "e1".into(),
            event_type: EventType::Allowance,
            title: "Food Allowance".into(),
            amount: dec!(50),
            event_date: d(2024, 1, 15),
            recurrence: Recurrence::Monthly,
            recurrence_end_date: end,
            affects_payroll: true,
            status: EventStatus::Active,
        }
    }

    #[test]
    fn test_event_categories() {
        assert_eq!(EventType::Commission.category(), Some(EventCategory::Bonus));
        assert_eq!(EventType::Penalty.category(), Some(EventCategory::Deduction));
        assert_eq!(EventType::Promotion.category(), None);
    }

    #[test]
    fn test_cancelled_event_has_no_pay_effect() {
        let mut ev = food_allowance(None);
        ev.status = EventStatus::Cancelled;
        assert_eq!(ev.pay_category(), None);
    }

    #[test]
    fn test_recurrence_window() {
        let march = PayPeriod::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
        assert!(food_allowance(None).recurs_into(&march));
        assert!(food_allowance(Some(d(2024, 3, 1))).recurs_into(&march));
        assert!(!food_allowance(Some(d(2024, 2, 29))).recurs_into(&march));

        let january = PayPeriod::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        // Dated inside the period: counted as a plain in-period event instead.
        assert!(!food_allowance(None).recurs_into(&january));
    }

    #[test]
    fn test_skip_overrides_merge() {
        let mut a = SkipOverrides::default();
        a.loan_ids.insert("l1".into());
        let mut b = SkipOverrides::default();
        b.loan_ids.insert("l2".into());
        b.event_ids.insert("ev".into());
        let merged = a.merged(&b);
        assert_eq!(
            merged.loan_ids.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["l1", "l2"]
        );
        assert_eq!(merged.event_ids.len(), 1);
        assert!(merged.vacation_ids.is_empty());
    }
}
