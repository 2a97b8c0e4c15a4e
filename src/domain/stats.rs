//! Read-side aggregation over shift rows.
//!
//! Every function here is pure and total: empty input never fails, it only
//! yields `None`/zero, and the caller decides how to word "no data".
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::models::{MonthTotal, ShiftRecord, ShiftStats};

/// Component sums over a row set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub rate: f64,
    pub consum: f64,
    pub tips: f64,
    pub grand: f64,
}

pub fn totals(rows: &[ShiftRecord]) -> Totals {
    rows.iter().fold(Totals::default(), |acc, r| Totals {
        rate: acc.rate + r.rate,
        consum: acc.consum + r.consum,
        tips: acc.tips + r.tips,
        grand: acc.grand + r.total(),
    })
}

/// Mean total per shift; 0 for an empty set, never a division error.
pub fn average(rows: &[ShiftRecord]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    totals(rows).grand / rows.len() as f64
}

/// The row with the highest total. Ties keep the first-encountered maximum.
pub fn best_shift(rows: &[ShiftRecord]) -> Option<&ShiftRecord> {
    rows.iter().reduce(|best, r| {
        match r.total().partial_cmp(&best.total()).unwrap_or(Ordering::Equal) {
            Ordering::Greater => r,
            _ => best,
        }
    })
}

/// The calendar month with the highest summed total.
pub fn best_month(rows: &[ShiftRecord]) -> Option<MonthTotal> {
    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    for r in rows {
        *by_month.entry(r.month_prefix()).or_insert(0.0) += r.total();
    }
    by_month
        .into_iter()
        .reduce(|best, m| {
            match m.1.partial_cmp(&best.1).unwrap_or(Ordering::Equal) {
                Ordering::Greater => m,
                _ => best,
            }
        })
        .map(|(month, total)| MonthTotal { month, total })
}

/// Bundle count, total, average and best shift; `None` when there is no data.
pub fn summarize(rows: &[ShiftRecord]) -> Option<ShiftStats> {
    let best = best_shift(rows)?;
    Some(ShiftStats {
        shifts: rows.len(),
        total: totals(rows).grand,
        average: average(rows),
        best: (best.date, best.total()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, date: &str, rate: f64, consum: f64, tips: f64) -> ShiftRecord {
        ShiftRecord {
            id,
            user_id: 1,
            date: date.parse().expect("valid date"),
            rate,
            consum,
            tips,
        }
    }

    #[test]
    fn totals_sum_every_component() {
        let rows = vec![
            row(1, "2026-02-01", 100.0, 80.0, 40.0),
            row(2, "2026-02-02", 50.0, 50.0, 50.0),
        ];
        let t = totals(&rows);
        assert_eq!((t.rate, t.consum, t.tips), (150.0, 130.0, 90.0));
        assert_eq!(t.grand, 370.0);
        assert_eq!(t.grand, t.rate + t.consum + t.tips);
    }

    #[test]
    fn average_is_total_over_count() {
        let rows = vec![
            row(1, "2026-02-01", 100.0, 80.0, 40.0),
            row(2, "2026-02-02", 50.0, 50.0, 50.0),
        ];
        assert_eq!(average(&rows), 185.0);
    }

    #[test]
    fn average_of_nothing_is_zero() {
        assert_eq!(average(&[]), 0.0);
    }

    #[test]
    fn best_shift_dominates_every_row() {
        let rows = vec![
            row(1, "2026-02-01", 100.0, 80.0, 40.0),
            row(2, "2026-02-02", 200.0, 0.0, 0.0),
            row(3, "2026-02-03", 50.0, 50.0, 50.0),
        ];
        let best = best_shift(&rows).unwrap();
        assert_eq!(best.id, 1);
        assert!(rows.iter().all(|r| best.total() >= r.total()));
    }

    #[test]
    fn best_shift_tie_keeps_first() {
        let rows = vec![
            row(1, "2026-02-01", 100.0, 0.0, 0.0),
            row(2, "2026-02-02", 50.0, 50.0, 0.0),
        ];
        assert_eq!(best_shift(&rows).unwrap().id, 1);
    }

    #[test]
    fn best_shift_of_nothing_is_none() {
        assert!(best_shift(&[]).is_none());
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn best_month_groups_by_prefix() {
        let rows = vec![
            row(1, "2026-01-15", 100.0, 0.0, 0.0),
            row(2, "2026-01-20", 100.0, 0.0, 0.0),
            row(3, "2026-02-01", 150.0, 0.0, 0.0),
        ];
        let best = best_month(&rows).unwrap();
        assert_eq!(best.month, "2026-01");
        assert_eq!(best.total, 200.0);
    }

    #[test]
    fn best_month_of_nothing_is_none() {
        assert!(best_month(&[]).is_none());
    }

    #[test]
    fn summarize_bundles_everything() {
        let rows = vec![
            row(1, "2026-02-01", 100.0, 80.0, 40.0),
        ];
        let stats = summarize(&rows).unwrap();
        assert_eq!(stats.shifts, 1);
        assert_eq!(stats.total, 220.0);
        assert_eq!(stats.average, 220.0);
        assert_eq!(stats.best, ("2026-02-01".parse().unwrap(), 220.0));
    }
}
