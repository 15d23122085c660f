//! Spreads one employee's computed loan deduction across that employee's
//! loans and applies the loan-side effects of a payroll run.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PayrollError;
use crate::loans::amortization::period_due;
use crate::records::{
    InstallmentStatus, Loan, LoanPayment, LoanStatus, PaymentSource, SkipOverrides,
    VacationRequest,
};
use crate::types::*;
use crate::PayrollResult;

/// Identifies the run the allocation belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationContext {
    pub run_id: String,
    pub period: PayPeriod,
    pub applied_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub payments: Vec<LoanPayment>,
    pub allocated: Money,
    /// Budget left over after every eligible loan was served.
    pub unallocated: Money,
    pub completed_loans: Vec<String>,
    pub paused_loans: Vec<String>,
    pub installments_paid: u32,
}

/// Allocate `total` across the employee's eligible loans in deterministic
/// order (start date, creation time, id), mutating balances, statuses and
/// installments in place.
pub fn allocate_loan_deduction(
    ctx: &AllocationContext,
    employee_id: &str,
    total: Money,
    loans: &mut [Loan],
    vacations: &[VacationRequest],
    skip: &SkipOverrides,
) -> PayrollResult<AllocationOutcome> {
    if total < Decimal::ZERO {
        return Err(PayrollError::invalid(
            "loan_deduction",
            format!("negative deduction {total} for employee {employee_id}"),
        ));
    }

    // Pause state follows the leave for every loan the employee holds,
    // whether or not this run deducts from it.
    let pause = loans_paused_by_leave(&ctx.period, employee_id, vacations, skip);
    let mut outcome = AllocationOutcome::default();
    for loan in loans.iter_mut().filter(|l| l.employee_id == employee_id) {
        if pause {
            if pause_period_installments(loan, &ctx.period) {
                outcome.paused_loans.push(loan.id.clone());
            }
        } else {
            resume_installments(loan);
        }
    }

    let mut order: Vec<usize> = loans
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            l.employee_id == employee_id && l.is_collectable() && !skip.loan_ids.contains(&l.id)
        })
        .map(|(idx, _)| idx)
        .collect();
    order.sort_by(|&a, &b| {
        let (la, lb) = (&loans[a], &loans[b]);
        la.start_date
            .cmp(&lb.start_date)
            .then(la.created_at.cmp(&lb.created_at))
            .then(la.id.cmp(&lb.id))
    });

    let mut budget = total;

    for idx in order {
        let loan = &mut loans[idx];

        if budget <= Decimal::ZERO {
            continue;
        }
        let applied = round_money(
            loan.remaining_amount
                .min(period_due(loan, &ctx.period))
                .min(budget),
        );
        if applied <= Decimal::ZERO {
            continue;
        }

        let previous_status = loan.status;
        loan.remaining_amount -= applied;
        budget -= applied;
        if loan.remaining_amount <= BALANCE_TOLERANCE {
            loan.status = LoanStatus::Completed;
            outcome.completed_loans.push(loan.id.clone());
        }

        if !pause {
            outcome.installments_paid += settle_installments(loan, ctx, applied);
        }

        outcome.allocated += applied;
        outcome.payments.push(LoanPayment {
            id: format!("{}-{}", ctx.run_id, loan.id),
            loan_id: loan.id.clone(),
            payroll_run_id: ctx.run_id.clone(),
            employee_id: employee_id.to_string(),
            amount: applied,
            applied_date: ctx.applied_date,
            source: PaymentSource::Payroll,
            balance_after: loan.remaining_amount,
            previous_status,
        });
    }

    outcome.unallocated = budget;
    Ok(outcome)
}

/// Whether an approved leave marked to pause loans overlaps the period.
pub fn loans_paused_by_leave(
    period: &PayPeriod,
    employee_id: &str,
    vacations: &[VacationRequest],
    skip: &SkipOverrides,
) -> bool {
    vacations.iter().any(|v| {
        v.employee_id == employee_id
            && v.is_approved()
            && v.pause_loans
            && !skip.vacation_ids.contains(&v.id)
            && period.overlap_days(v.start_date, v.end_date) > 0
    })
}

/// Flip the period's pending installments to paused. Returns whether any changed.
fn pause_period_installments(loan: &mut Loan, period: &PayPeriod) -> bool {
    let mut paused_any = false;
    for inst in loan
        .installments
        .iter_mut()
        .filter(|i| period.contains(i.due_date) && i.status == InstallmentStatus::Pending)
    {
        inst.status = InstallmentStatus::Paused;
        paused_any = true;
    }
    paused_any
}

fn resume_installments(loan: &mut Loan) {
    for inst in loan
        .installments
        .iter_mut()
        .filter(|i| i.status == InstallmentStatus::Paused)
    {
        inst.status = InstallmentStatus::Pending;
    }
}

/// Mark the period's pending installments paid when `applied` covers their
/// total. Partial payment leaves them pending.
fn settle_installments(loan: &mut Loan, ctx: &AllocationContext, applied: Money) -> u32 {
    let due: Money = loan
        .installments
        .iter()
        .filter(|i| ctx.period.contains(i.due_date) && i.status == InstallmentStatus::Pending)
        .map(|i| i.payment_amount)
        .sum();
    if due.is_zero() || (applied - due).abs() > SCHEDULE_MATCH_TOLERANCE {
        return 0;
    }

    let mut settled = 0;
    for inst in loan
        .installments
        .iter_mut()
        .filter(|i| ctx.period.contains(i.due_date) && i.status == InstallmentStatus::Pending)
    {
        inst.status = InstallmentStatus::Paid;
        inst.paid_run_id = Some(ctx.run_id.clone());
        inst.paid_date = Some(ctx.applied_date);
        settled += 1;
    }
    settled
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
