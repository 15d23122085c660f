use chrono::NaiveDate;
use payroll_core::loans::amortization::{generate_schedule, AmortizationInput};
use payroll_core::loans::policy::{validate_loan_policy, LoanPolicyInput, LoanTerms, PolicyRule};
use payroll_core::PayrollError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn amortization(principal: Decimal, payment: Decimal, rate: Option<Decimal>) -> AmortizationInput {
    AmortizationInput {
        loan_id: "L1".into(),
        principal,
        monthly_payment: payment,
        annual_rate: rate,
        start_date: d(2024, 1, 31),
        end_date: None,
    }
}

// ===========================================================================
// Amortization
// ===========================================================================

#[test]
fn test_interest_bearing_schedule_terminates() {
    let out = generate_schedule(&amortization(dec!(1000), dec!(100), Some(dec!(12)))).unwrap();
    let s = &out.result;

    assert_eq!(s.installments.len(), 11);
    assert_eq!(s.total_principal, dec!(1000));
    assert_eq!(s.installments.last().unwrap().remaining_balance, Decimal::ZERO);
    assert!(!s.balloon);
    assert!(!s.truncated);
    assert!(out.warnings.is_empty());

    // First month: 1% of 1000
    assert_eq!(s.installments[0].interest_amount, dec!(10));
    assert_eq!(s.installments[0].principal_amount, dec!(90));

    // Balances strictly decrease
    for pair in s.installments.windows(2) {
        assert!(pair[1].remaining_balance < pair[0].remaining_balance);
    }
}

#[test]
fn test_due_dates_clamp_to_month_end() {
    let out = generate_schedule(&amortization(dec!(300), dec!(100), None)).unwrap();
    let dates: Vec<NaiveDate> = out.result.installments.iter().map(|i| i.due_date).collect();
    assert_eq!(dates, vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)]);
}

#[test]
fn test_end_date_forces_balloon() {
    let mut input = amortization(dec!(1000), dec!(100), None);
    input.end_date = Some(d(2024, 4, 30));
    let out = generate_schedule(&input).unwrap();
    let s = &out.result;

    assert_eq!(s.installments.len(), 4);
    assert!(s.balloon);
    assert_eq!(s.installments[3].payment_amount, dec!(700));
    assert_eq!(s.installments[3].remaining_balance, Decimal::ZERO);
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn test_payment_below_interest_rejected() {
    let err = generate_schedule(&amortization(dec!(10000), dec!(50), Some(dec!(12)))).unwrap_err();
    match err {
        PayrollError::InsufficientPayment { payment, interest } => {
            assert_eq!(payment, dec!(50));
            assert_eq!(interest, dec!(100));
        }
        other => panic!("expected InsufficientPayment, got {other:?}"),
    }
}

#[test]
fn test_non_positive_principal_gives_empty_schedule() {
    let out = generate_schedule(&amortization(Decimal::ZERO, dec!(100), None)).unwrap();
    assert!(out.result.installments.is_empty());
    assert_eq!(out.warnings.len(), 1);
}

// ===========================================================================
// Policy
// ===========================================================================

#[test]
fn test_strict_policy_requires_documents() {
    let input = LoanPolicyInput {
        loan: LoanTerms {
            amount: dec!(2000),
            monthly_payment: dec!(200),
            annual_rate: None,
            start_date: d(2024, 1, 1),
            end_date: None,
        },
        approval_stages: None,
        documents: None,
        employee_salary: Some(dec!(4000)),
        schedule: None,
        strict: true,
    };
    let out = validate_loan_policy(&input).unwrap();
    assert!(!out.result.is_compliant);
    assert_eq!(out.result.violations.len(), 1);
    assert_eq!(out.result.violations[0].rule, PolicyRule::SupportingDocuments);
    assert_eq!(out.result.deduction_ratio, Some(dec!(0.05)));
}
