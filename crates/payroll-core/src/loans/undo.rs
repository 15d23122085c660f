use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PayrollError;
use crate::records::{InstallmentStatus, Loan, LoanPayment, LoanStatus};
use crate::types::*;
use crate::PayrollResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoSummary {
    pub run_id: String,
    pub payments_reversed: usize,
    pub amount_restored: Money,
    /// Loans this run had completed and that are open again.
    pub loans_reopened: Vec<String>,
    pub installments_reverted: u32,
}

struct Reversal {
    amount: Money,
    balance_after: Money,
    status_before_run: LoanStatus,
}

/// Reverse the loan-side effects of `run_id`: refund balances, reopen
/// loans the run completed, return the run's paid installments to pending
/// and drop its payment rows.
///
/// Every payment is checked before anything is touched, so a refusal leaves
/// loans and payments exactly as they were.
pub fn undo_loan_deductions(
    run_id: &str,
    payments: &mut Vec<LoanPayment>,
    loans: &mut [Loan],
) -> PayrollResult<UndoSummary> {
    let mut reversals: BTreeMap<&str, Reversal> = BTreeMap::new();
    for p in payments.iter().filter(|p| p.payroll_run_id == run_id) {
        reversals
            .entry(p.loan_id.as_str())
            .and_modify(|r| {
                r.amount += p.amount;
                r.balance_after = p.balance_after;
            })
            .or_insert(Reversal {
                amount: p.amount,
                balance_after: p.balance_after,
                status_before_run: p.previous_status,
            });
    }

    for (loan_id, reversal) in &reversals {
        let loan = loans.iter().find(|l| l.id == *loan_id).ok_or_else(|| {
            PayrollError::LoanPaymentUndo {
                loan_id: loan_id.to_string(),
                reason: "loan no longer exists".into(),
            }
        })?;
        if loan.remaining_amount != reversal.balance_after {
            return Err(PayrollError::LoanPaymentUndo {
                loan_id: loan_id.to_string(),
                reason: format!(
                    "remaining amount is {} but run {} left it at {}; it was modified afterwards",
                    loan.remaining_amount, run_id, reversal.balance_after
                ),
            });
        }
    }

    let mut summary = UndoSummary {
        run_id: run_id.to_string(),
        payments_reversed: 0,
        amount_restored: Decimal::ZERO,
        loans_reopened: Vec::new(),
        installments_reverted: 0,
    };

    for loan in loans.iter_mut() {
        let Some(reversal) = reversals.get(loan.id.as_str()) else {
            continue;
        };
        loan.remaining_amount += reversal.amount;
        summary.amount_restored += reversal.amount;

        if loan.status == LoanStatus::Completed && reversal.status_before_run != LoanStatus::Completed
        {
            loan.status = reversal.status_before_run;
            summary.loans_reopened.push(loan.id.clone());
        }

        for inst in loan
            .installments
            .iter_mut()
            .filter(|i| i.paid_run_id.as_deref() == Some(run_id))
        {
            inst.status = InstallmentStatus::Pending;
            inst.paid_run_id = None;
            inst.paid_date = None;
            summary.installments_reverted += 1;
        }
    }

    let before = payments.len();
    payments.retain(|p| p.payroll_run_id != run_id);
    summary.payments_reversed = before - payments.len();

    Ok(summary)
}
