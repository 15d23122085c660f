//! Fixed-payment amortization schedules.
//!
//! A flat monthly payment is split into interest on the opening balance and
//! principal. Due dates step by calendar months from the start date, clamped
//! to month end. All money is rounded to cents per installment.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PayrollError;
use crate::records::{Installment, InstallmentStatus, Loan};
use crate::types::*;
use crate::PayrollResult;

/// 50 years of monthly installments.
pub const MAX_INSTALLMENTS: u32 = 600;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    #[serde(default)]
    pub loan_id: String,
    pub principal: Money,
    pub monthly_payment: Money,
    /// Annual rate in percent. `None` means interest free.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_rate: Option<RatePct>,
    pub start_date: NaiveDate,
    /// Hard end date. The installment before the first due date past it
    /// pays off the loan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub loan_id: String,
    pub installments: Vec<Installment>,
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_payments: Money,
    /// The final installment was forced by the end date.
    pub balloon: bool,
    /// Generation hit [`MAX_INSTALLMENTS`] with balance outstanding.
    pub truncated: bool,
    pub outstanding_balance: Money,
}

impl AmortizationSchedule {
    fn empty(loan_id: &str) -> Self {
        AmortizationSchedule {
            loan_id: loan_id.to_string(),
            installments: Vec::new(),
            total_principal: Decimal::ZERO,
            total_interest: Decimal::ZERO,
            total_payments: Decimal::ZERO,
            balloon: false,
            truncated: false,
            outstanding_balance: Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate an amortization schedule wrapped in the standard output envelope.
pub fn generate_schedule(
    input: &AmortizationInput,
) -> PayrollResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let schedule = build_schedule(input)?;

    if schedule.installments.is_empty() {
        warnings.push("Principal or payment is not positive; schedule is empty".into());
    }
    if schedule.balloon {
        if let Some(last) = schedule.installments.last() {
            warnings.push(format!(
                "Installment {} is a balloon payment of {} forced by end date",
                last.installment_number, last.payment_amount
            ));
        }
    }
    if schedule.truncated {
        warnings.push(format!(
            "Schedule truncated at {MAX_INSTALLMENTS} installments with {} outstanding",
            schedule.outstanding_balance
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fixed-payment monthly amortization",
        &serde_json::json!({
            "loan_id": input.loan_id,
            "principal": input.principal.to_string(),
            "monthly_payment": input.monthly_payment.to_string(),
            "monthly_rate": monthly_rate(input.annual_rate).to_string(),
            "end_date": input.end_date,
        }),
        warnings,
        elapsed,
        schedule,
    ))
}

/// Build the installment list without the envelope.
pub fn build_schedule(input: &AmortizationInput) -> PayrollResult<AmortizationSchedule> {
    if input.principal <= Decimal::ZERO || input.monthly_payment <= Decimal::ZERO {
        return Ok(AmortizationSchedule::empty(&input.loan_id));
    }
    if let Some(end) = input.end_date {
        if end < input.start_date {
            return Err(PayrollError::invalid(
                "end_date",
                format!("end {} precedes start {}", end, input.start_date),
            ));
        }
    }

    let rate = monthly_rate(input.annual_rate);
    let mut balance = round_money(input.principal);
    let mut installments = Vec::new();
    let mut balloon = false;

    for number in 1..=MAX_INSTALLMENTS {
        let due_date = due_date(input.start_date, number)?;
        let interest = round_money(balance * rate);

        let past_end = match input.end_date {
            Some(end) => self::due_date(input.start_date, number + 1)? > end,
            None => false,
        };

        let mut principal = if past_end {
            balloon = true;
            balance
        } else {
            let portion = input.monthly_payment - interest;
            if portion <= Decimal::ZERO {
                return Err(PayrollError::InsufficientPayment {
                    payment: input.monthly_payment,
                    interest,
                });
            }
            round_money(portion.min(balance))
        };

        balance = round_money(balance - principal);
        if balance <= BALANCE_TOLERANCE {
            // Fold the residual cent into this installment.
            principal += balance;
            balance = Decimal::ZERO;
        }

        installments.push(Installment {
            loan_id: input.loan_id.clone(),
            installment_number: number,
            due_date,
            principal_amount: principal,
            interest_amount: interest,
            payment_amount: round_money(principal + interest),
            remaining_balance: balance,
            status: InstallmentStatus::Pending,
            paid_run_id: None,
            paid_date: None,
        });

        if balance.is_zero() {
            break;
        }
    }

    let total_principal: Money = installments.iter().map(|i| i.principal_amount).sum();
    let total_interest: Money = installments.iter().map(|i| i.interest_amount).sum();
    let total_payments: Money = installments.iter().map(|i| i.payment_amount).sum();

    Ok(AmortizationSchedule {
        loan_id: input.loan_id.clone(),
        installments,
        total_principal,
        total_interest,
        total_payments,
        balloon,
        truncated: balance > Decimal::ZERO,
        outstanding_balance: balance,
    })
}

/// Annual percentage to monthly decimal rate.
pub fn monthly_rate(annual_rate: Option<RatePct>) -> Decimal {
    annual_rate.unwrap_or(Decimal::ZERO) / dec!(12) / dec!(100)
}

/// Sum of the open installments a loan's schedule expects inside `period`.
/// `None` when the schedule has nothing due in the period.
pub fn scheduled_due_for_period(loan: &Loan, period: &PayPeriod) -> Option<Money> {
    let mut due = installments_due_in(&loan.installments, period)
        .filter(|i| matches!(i.status, InstallmentStatus::Pending | InstallmentStatus::Paused))
        .peekable();
    due.peek()?;
    Some(due.map(|i| i.payment_amount).sum())
}

/// The schedule's claim on `loan` for `period`. A loan carrying installments
/// is charged what they leave open in the period; a loan without a schedule
/// keeps whatever `scheduled_due_amount` the caller set.
pub fn scheduled_amount(loan: &Loan, period: &PayPeriod) -> Option<Money> {
    if loan.installments.is_empty() {
        loan.scheduled_due_amount
    } else {
        scheduled_due_for_period(loan, period)
    }
}

/// What payroll should try to take this period, before the balance clamp:
/// the scheduled amount when there is one, else the flat monthly cap.
pub fn period_due(loan: &Loan, period: &PayPeriod) -> Money {
    scheduled_amount(loan, period).unwrap_or(loan.monthly_deduction)
}

/// Fill `scheduled_due_amount` on every loan that carries a schedule.
pub fn attach_scheduled_amounts(loans: &mut [Loan], period: &PayPeriod) {
    for loan in loans.iter_mut().filter(|l| !l.installments.is_empty()) {
        loan.scheduled_due_amount = scheduled_amount(loan, period);
    }
}

pub fn installments_due_in<'a>(
    installments: &'a [Installment],
    period: &'a PayPeriod,
) -> impl Iterator<Item = &'a Installment> + 'a {
    installments.iter().filter(move |i| period.contains(i.due_date))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Installment `number` falls `number - 1` months after the start. Offsets
/// are taken from the start date so a 31st never drifts to the 28th.
fn due_date(start: NaiveDate, number: u32) -> PayrollResult<NaiveDate> {
    start
        .checked_add_months(Months::new(number - 1))
        .ok_or_else(|| PayrollError::DateError(format!("{start} + {} months", number - 1)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn input(principal: Money, payment: Money, rate: Option<RatePct>) -> AmortizationInput {
        AmortizationInput {
            loan_id: "L1".into(),
            principal,
            monthly_payment: payment,
            annual_rate: rate,
            start_date: d(2024, 1, 1),
            end_date: None,
        }
    }

    #[test]
    fn test_interest_free_schedule() {
        let s = build_schedule(&input(dec!(1000), dec!(250), None)).unwrap();
        assert_eq!(s.installments.len(), 4);
        assert!(s.installments.iter().all(|i| i.principal_amount == dec!(250)));
        assert_eq!(s.installments[3].due_date, d(2024, 4, 1));
        assert_eq!(s.installments[3].remaining_balance, Decimal::ZERO);
        assert_eq!(s.total_interest, Decimal::ZERO);
    }

    #[test]
    fn test_interest_bearing_schedule_pays_off_principal() {
        let s = build_schedule(&input(dec!(1000), dec!(100), Some(dec!(12)))).unwrap();
        let first = &s.installments[0];
        assert_eq!(first.interest_amount, dec!(10));
        assert_eq!(first.principal_amount, dec!(90));
        assert_eq!(first.remaining_balance, dec!(910));

        assert_eq!(s.total_principal, dec!(1000));
        assert_eq!(s.installments.len(), 11);
        assert!(!s.truncated);
        let last = s.installments.last().unwrap();
        assert!(last.payment_amount <= dec!(100));
        assert_eq!(last.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_installment_numbers_are_sequential() {
        let s = build_schedule(&input(dec!(1000), dec!(100), Some(dec!(12)))).unwrap();
        for (idx, inst) in s.installments.iter().enumerate() {
            assert_eq!(inst.installment_number, idx as u32 + 1);
        }
    }

    #[test]
    fn test_payment_not_covering_interest_fails() {
        let err = build_schedule(&input(dec!(1000), dec!(10), Some(dec!(12)))).unwrap_err();
        assert!(matches!(err, PayrollError::InsufficientPayment { .. }));
    }

    #[test]
    fn test_month_end_clamping() {
        let mut inp = input(dec!(300), dec!(100), None);
        inp.start_date = d(2024, 1, 31);
        let s = build_schedule(&inp).unwrap();
        assert_eq!(s.installments[1].due_date, d(2024, 2, 29));
        assert_eq!(s.installments[2].due_date, d(2024, 3, 31));
    }

    #[test]
    fn test_end_date_forces_balloon() {
        let mut inp = input(dec!(1000), dec!(100), None);
        inp.end_date = Some(d(2024, 3, 15));
        let s = build_schedule(&inp).unwrap();
        assert_eq!(s.installments.len(), 3);
        assert!(s.balloon);
        let last = &s.installments[2];
        assert_eq!(last.principal_amount, dec!(800));
        assert_eq!(last.payment_amount, dec!(800));
        assert_eq!(s.total_principal, dec!(1000));
    }

    #[test]
    fn test_balloon_includes_interest() {
        let mut inp = input(dec!(1000), dec!(100), Some(dec!(12)));
        inp.end_date = Some(d(2024, 1, 20));
        let s = build_schedule(&inp).unwrap();
        assert_eq!(s.installments.len(), 1);
        assert_eq!(s.installments[0].payment_amount, dec!(1010));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut inp = input(dec!(1000), dec!(100), None);
        inp.end_date = Some(d(2023, 12, 1));
        assert!(build_schedule(&inp).is_err());
    }

    #[test]
    fn test_non_positive_inputs_give_empty_schedule() {
        assert!(build_schedule(&input(dec!(0), dec!(100), None))
            .unwrap()
            .installments
            .is_empty());
        assert!(build_schedule(&input(dec!(100), dec!(-5), None))
            .unwrap()
            .installments
            .is_empty());
    }

    #[test]
    fn test_cap_truncates_with_warning() {
        let out = generate_schedule(&input(dec!(1000000), dec!(1), None)).unwrap();
        assert_eq!(out.result.installments.len(), MAX_INSTALLMENTS as usize);
        assert!(out.result.truncated);
        assert_eq!(out.result.outstanding_balance, dec!(999400));
        assert!(out.warnings.iter().any(|w| w.contains("truncated")));
    }

    #[test]
    fn test_scheduled_due_for_period() {
        let s = build_schedule(&input(dec!(300), dec!(100), None)).unwrap();
        let mut loan = Loan {
            id: "L1".into(),
            employee_id: "e1".into(),
            amount: dec!(300),
            remaining_amount: dec!(300),
            monthly_deduction: dec!(120),
            interest_rate: None,
            status: crate::records::LoanStatus::Active,
            start_date: d(2024, 1, 1),
            end_date: None,
            created_at: None,
            scheduled_due_amount: None,
            installments: s.installments,
        };
        let feb = PayPeriod::new(d(2024, 2, 1), d(2024, 2, 29)).unwrap();
        assert_eq!(scheduled_due_for_period(&loan, &feb), Some(dec!(100)));

        loan.installments[1].status = InstallmentStatus::Paid;
        assert_eq!(scheduled_due_for_period(&loan, &feb), None);

        let may = PayPeriod::new(d(2024, 5, 1), d(2024, 5, 31)).unwrap();
        let mut loans = vec![loan];
        attach_scheduled_amounts(&mut loans, &may);
        assert_eq!(loans[0].scheduled_due_amount, None);
    }
}
