use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// The flat payment does not cover the first month's interest, so the
    /// loan would never amortise.
    #[error("Insufficient payment: {payment} does not cover interest of {interest}")]
    InsufficientPayment { payment: Decimal, interest: Decimal },

    /// Internal consistency check failed. Indicates an engine defect, never
    /// bad user input.
    #[error("Calculation invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Cannot undo loan payment for loan {loan_id}: {reason}")]
    LoanPaymentUndo { loan_id: String, reason: String },

    #[error("Payroll period overlaps existing run {existing_run_id}")]
    PeriodOverlap { existing_run_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PayrollError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PayrollError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PayrollError {
    fn from(e: serde_json::Error) -> Self {
        PayrollError::SerializationError(e.to_string())
    }
}
