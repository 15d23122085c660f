pub mod loans;
pub mod payroll;
pub mod run;
