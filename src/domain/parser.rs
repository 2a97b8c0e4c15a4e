//! Free-text entry grammar for shift lines.
//!
//! A line is matched against the accepted formats in a fixed precedence
//! order. The 4-token formats are told apart only by the first token's
//! discriminating character, so the order below must not change:
//!
//! 1. `R C T` — three amounts, date = today
//! 2. `yesterday R C T` — date = today − 1 day
//! 3. `D.M R C T` — day.month in the current year
//! 4. `YYYY-MM-DD R C T` — explicit date
use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

use crate::domain::models::NewShift;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line does not match any shift entry format")]
    Format,
    #[error("invalid calendar date")]
    Date,
    #[error("amounts must be non-negative numbers")]
    Amount,
}

/// Parse one line of text into an unsaved shift entry.
pub fn parse_entry(text: &str, today: NaiveDate) -> Result<NewShift, ParseError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let (date, amounts) = match tokens.len() {
        3 => (today, &tokens[0..3]),
        4 => {
            let first = tokens[0];
            let date = if first.eq_ignore_ascii_case("yesterday") {
                today - Duration::days(1)
            } else if first.contains('.') {
                parse_day_month(first, today.year())?
            } else if first.contains('-') {
                NaiveDate::parse_from_str(first, "%Y-%m-%d").map_err(|_| ParseError::Date)?
            } else {
                return Err(ParseError::Format);
            };
            (date, &tokens[1..4])
        }
        _ => return Err(ParseError::Format),
    };

    let rate = parse_amount(amounts[0])?;
    let consum = parse_amount(amounts[1])?;
    let tips = parse_amount(amounts[2])?;

    Ok(NewShift { date, rate, consum, tips })
}

/// Classify a bare `YYYY-MM` line for the custom-month query flow.
pub fn parse_month(text: &str) -> Option<String> {
    let text = text.trim();
    if text.len() != 7 {
        return None;
    }
    // Validate by anchoring to the first of the month.
    NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok()?;
    Some(text.to_string())
}

fn parse_day_month(token: &str, year: i32) -> Result<NaiveDate, ParseError> {
    let (day, month) = token.split_once('.').ok_or(ParseError::Date)?;
    let day: u32 = day.parse().map_err(|_| ParseError::Date)?;
    let month: u32 = month.parse().map_err(|_| ParseError::Date)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ParseError::Date)
}

fn parse_amount(token: &str) -> Result<f64, ParseError> {
    let value: f64 = token.parse().map_err(|_| ParseError::Amount)?;
    if !value.is_finite() || value < 0.0 {
        return Err(ParseError::Amount);
    }
    Ok(value)
}
