//! Loan-side engine: amortization schedules, policy checks, payroll
//! deduction allocation and reversal.

pub mod allocation;
pub mod amortization;
pub mod policy;
pub mod undo;
