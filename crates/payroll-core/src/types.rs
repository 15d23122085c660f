use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PayrollError;
use crate::PayrollResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Annual interest rates are carried as percentages (12 = 12% p.a.), the
/// way loan agreements state them.
pub type RatePct = Decimal;

/// Day counts. Decimal so attendance can carry half days.
pub type Days = Decimal;

/// Run-level and loan-level balance tolerance.
pub const BALANCE_TOLERANCE: Money = dec!(0.01);

/// Tolerance when comparing a collected amount against a scheduled amount.
pub const SCHEDULE_MATCH_TOLERANCE: Money = dec!(0.05);

/// Round to cents, half away from zero.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// An inclusive date range a payroll is calculated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PayPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> PayrollResult<Self> {
        let period = PayPeriod { start, end };
        period.validate()?;
        Ok(period)
    }

    pub fn validate(&self) -> PayrollResult<()> {
        if self.start > self.end {
            return Err(PayrollError::invalid(
                "period",
                format!("start {} is after end {}", self.start, self.end),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &PayPeriod) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Inclusive number of days `[start, end]` shares with this period.
    pub fn overlap_days(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        if lo > hi {
            0
        } else {
            ((hi - lo).num_days() + 1) as u32
        }
    }

    /// "2024-03" for a whole calendar month, "2024-03-01..2024-03-15" otherwise.
    pub fn label(&self) -> String {
        let whole_month = self.start.day() == 1
            && self.start.year() == self.end.year()
            && self.start.month() == self.end.month()
            && self.end.succ_opt().map_or(true, |next| next.day() == 1);
        if whole_month {
            self.start.format("%Y-%m").to_string()
        } else {
            format!("{}..{}", self.start, self.end)
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
