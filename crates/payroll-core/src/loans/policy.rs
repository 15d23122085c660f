use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::records::{Installment, InstallmentStatus};
use crate::types::*;
use crate::PayrollResult;

use super::amortization::monthly_rate;

/// Deduction above this share of salary blocks the loan.
const MAX_DEDUCTION_RATIO: Decimal = dec!(0.50);
/// Deduction above this share of salary is allowed but flagged.
const WARN_DEDUCTION_RATIO: Decimal = dec!(0.35);

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    pub amount: Money,
    pub monthly_payment: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_rate: Option<RatePct>,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStage {
    pub name: String,
    pub status: ApprovalStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanDocument {
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPolicyInput {
    pub loan: LoanTerms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_stages: Option<Vec<ApprovalStage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<LoanDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_salary: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<Installment>>,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    PositiveAmount,
    PositivePayment,
    DateOrder,
    CoversInterest,
    Affordability,
    ApprovalChain,
    SupportingDocuments,
    ScheduleCoverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFinding {
    pub rule: PolicyRule,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPolicyReport {
    pub is_compliant: bool,
    pub violations: Vec<PolicyFinding>,
    pub warnings: Vec<PolicyFinding>,
    /// monthly payment / salary, when a salary was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduction_ratio: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Check a loan configuration against the affordability, approval and
/// documentation rules. Findings are data; the caller decides whether a
/// non-compliant loan may still be activated.
pub fn validate_loan_policy(
    input: &LoanPolicyInput,
) -> PayrollResult<ComputationOutput<LoanPolicyReport>> {
    let start = Instant::now();
    let mut notes: Vec<String> = Vec::new();
    let mut violations: Vec<PolicyFinding> = Vec::new();
    let mut warnings: Vec<PolicyFinding> = Vec::new();
    let terms = &input.loan;

    if terms.amount <= Decimal::ZERO {
        violations.push(finding(PolicyRule::PositiveAmount, "Loan amount must be positive"));
    }
    if terms.monthly_payment <= Decimal::ZERO {
        violations.push(finding(
            PolicyRule::PositivePayment,
            "Monthly payment must be positive",
        ));
    }
    if let Some(end) = terms.end_date {
        if terms.start_date > end {
            violations.push(finding(
                PolicyRule::DateOrder,
                format!("Start date {} is after end date {}", terms.start_date, end),
            ));
        }
    }

    let interest_only = round_money(terms.amount * monthly_rate(terms.annual_rate));
    if terms.amount > Decimal::ZERO
        && terms.monthly_payment > Decimal::ZERO
        && interest_only > Decimal::ZERO
        && terms.monthly_payment <= interest_only
    {
        violations.push(finding(
            PolicyRule::CoversInterest,
            format!(
                "Monthly payment {} does not exceed interest-only amount {}",
                terms.monthly_payment, interest_only
            ),
        ));
    }

    let deduction_ratio = match input.employee_salary {
        Some(salary) if salary > Decimal::ZERO => Some(terms.monthly_payment / salary),
        Some(_) => {
            notes.push("Employee salary is not positive; affordability not checked".into());
            None
        }
        None => {
            notes.push("No employee salary supplied; affordability not checked".into());
            None
        }
    };
    if let Some(ratio) = deduction_ratio {
        let pct = (ratio * dec!(100)).round_dp(2);
        if ratio > MAX_DEDUCTION_RATIO {
            violations.push(finding(
                PolicyRule::Affordability,
                format!("Deduction is {pct}% of salary (limit 50%)"),
            ));
        } else if ratio > WARN_DEDUCTION_RATIO {
            warnings.push(finding(
                PolicyRule::Affordability,
                format!("Deduction is {pct}% of salary (above 35%)"),
            ));
        }
    }

    if input.strict {
        for stage in input.approval_stages.iter().flatten() {
            if stage.status != ApprovalStatus::Approved {
                violations.push(finding(
                    PolicyRule::ApprovalChain,
                    format!("Approval stage '{}' is not approved", stage.name),
                ));
            }
        }
        let has_documents = input.documents.as_ref().is_some_and(|docs| !docs.is_empty());
        if !has_documents {
            violations.push(finding(
                PolicyRule::SupportingDocuments,
                "At least one supporting document is required",
            ));
        }
    }

    if let Some(schedule) = &input.schedule {
        let scheduled: Money = schedule
            .iter()
            .filter(|i| i.status != InstallmentStatus::Skipped)
            .map(|i| i.payment_amount)
            .sum();
        if scheduled < terms.amount {
            warnings.push(finding(
                PolicyRule::ScheduleCoverage,
                format!(
                    "Scheduled payments {} fall short of loan amount {}",
                    scheduled, terms.amount
                ),
            ));
        }
    }

    let report = LoanPolicyReport {
        is_compliant: violations.is_empty(),
        violations,
        warnings,
        deduction_ratio,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan policy compliance",
        &serde_json::json!({
            "strict": input.strict,
            "max_deduction_ratio": MAX_DEDUCTION_RATIO.to_string(),
            "warn_deduction_ratio": WARN_DEDUCTION_RATIO.to_string(),
        }),
        notes,
        elapsed,
        report,
    ))
}

fn finding(rule: PolicyRule, message: impl Into<String>) -> PolicyFinding {
    PolicyFinding {
        rule,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
