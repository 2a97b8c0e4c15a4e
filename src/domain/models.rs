//! Domain models for the shift ledger.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded shift: a calendar day's earnings for one user.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub id: i64,
    pub user_id: i64,
    /// Stored as `YYYY-MM-DD` text in SQLite so month filters stay a
    /// string-prefix match.
    pub date: NaiveDate,
    pub rate: f64,
    pub consum: f64,
    pub tips: f64,
}

impl ShiftRecord {
    /// Derived earnings for the shift; never stored.
    pub fn total(&self) -> f64 {
        self.rate + self.consum + self.tips
    }

    /// First seven characters of the stored date (`YYYY-MM`).
    pub fn month_prefix(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

/// A parsed entry that has not been written to the ledger yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShift {
    pub date: NaiveDate,
    pub rate: f64,
    pub consum: f64,
    pub tips: f64,
}

impl NewShift {
    pub fn total(&self) -> f64 {
        self.rate + self.consum + self.tips
    }
}

/// Aggregate summary over a set of shifts.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftStats {
    pub shifts: usize,
    pub total: f64,
    pub average: f64,
    /// Date and total of the highest-earning shift in the set.
    pub best: (NaiveDate, f64),
}

/// Summed earnings for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotal {
    pub month: String,
    pub total: f64,
}
