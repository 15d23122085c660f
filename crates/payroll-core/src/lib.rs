pub mod error;
pub mod records;
pub mod types;

#[cfg(feature = "loans")]
pub mod loans;

#[cfg(feature = "payroll")]
pub mod payroll;

#[cfg(feature = "payroll")]
pub mod settings;

#[cfg(feature = "ledger")]
pub mod ledger;

pub use error::PayrollError;
pub use types::*;

/// Standard result type for all payroll operations
pub type PayrollResult<T> = Result<T, PayrollError>;
