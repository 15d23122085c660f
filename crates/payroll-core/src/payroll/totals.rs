use serde::{Deserialize, Serialize};

use crate::error::PayrollError;
use crate::types::*;
use crate::PayrollResult;

use super::calculator::EmployeePayroll;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayrollTotals {
    pub gross_amount: Money,
    pub total_deductions: Money,
    pub net_amount: Money,
    pub employee_count: usize,
}

/// Sum the entries of a run and check that gross, deductions and net
/// balance to the cent.
///
/// An imbalance means the calculator produced an inconsistent entry; the
/// error must abort whatever transaction is persisting the run.
pub fn calculate_totals(entries: &[EmployeePayroll]) -> PayrollResult<PayrollTotals> {
    let mut totals = PayrollTotals::default();
    for entry in entries {
        totals.gross_amount += entry.gross_pay;
        totals.total_deductions += entry.total_deductions;
        totals.net_amount += entry.net_pay;
    }
    totals.employee_count = entries.len();

    let drift = (totals.gross_amount - totals.total_deductions - totals.net_amount).abs();
    if drift > BALANCE_TOLERANCE {
        return Err(PayrollError::InvariantViolation(format!(
            "gross {} - deductions {} != net {} (off by {})",
            totals.gross_amount, totals.total_deductions, totals.net_amount, drift
        )));
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::calculator::DeductionBreakdown;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn entry(id: &str, gross: Money, deductions: Money, net: Money) -> EmployeePayroll {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        EmployeePayroll {
            employee_id: id.into(),
            period: PayPeriod {
                start: day,
                end: day,
            },
            base_salary: gross,
            bonus_amount: Decimal::ZERO,
            allowances: BTreeMap::new(),
            gross_pay: gross,
            working_days: dec!(30),
            attendance_days: None,
            actual_working_days: dec!(30),
            vacation_days: Decimal::ZERO,
            vacation_deduction: Decimal::ZERO,
            deductions: DeductionBreakdown {
                other: deductions,
                ..Default::default()
            },
            total_deductions: deductions,
            unrecovered_deductions: Decimal::ZERO,
            net_pay: net,
            adjustment_reason: None,
        }
    }

    #[test]
    fn test_totals_sum_entries() {
        let entries = vec![
            entry("a", dec!(3000), dec!(300), dec!(2700)),
            entry("b", dec!(1500.50), dec!(0.50), dec!(1500)),
        ];
        let t = calculate_totals(&entries).unwrap();
        assert_eq!(t.gross_amount, dec!(4500.50));
        assert_eq!(t.total_deductions, dec!(300.50));
        assert_eq!(t.net_amount, dec!(4200));
        assert_eq!(t.employee_count, 2);
    }

    #[test]
    fn test_imbalance_is_invariant_violation() {
        let entries = vec![entry("a", dec!(3000), dec!(300), dec!(2800))];
        let err = calculate_totals(&entries).unwrap_err();
        assert!(matches!(err, PayrollError::InvariantViolation(_)));
    }

    #[test]
    fn test_one_cent_drift_tolerated() {
        let entries = vec![entry("a", dec!(100), dec!(30), dec!(70.01))];
        assert!(calculate_totals(&entries).is_ok());
    }

    #[test]
    fn test_empty_run() {
        let t = calculate_totals(&[]).unwrap();
        assert_eq!(t.employee_count, 0);
        assert_eq!(t.gross_amount, Decimal::ZERO);
        assert_eq!(t.net_amount, Decimal::ZERO);
    }
}
