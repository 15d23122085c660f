//! Payroll side of the engine: per-employee calculation, scenario
//! resolution and run totals.

pub mod calculator;
pub mod scenarios;
pub mod snapshot;
pub mod totals;
