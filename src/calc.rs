//! Schedule and fee arithmetic behind every total shown on screen and written
//! into a generated SOW.
//!
//! Nothing in here returns an error. A half-filled form row must still render,
//! so malformed or missing input degrades to zero.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;

use crate::model::{MilestoneLine, ResourceLine};

// Currency punctuation a user may type into a numeric field: "$12,500.00", "30 %"
static NUMERIC_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s$,%]").expect("static pattern"));

/// Counts Monday-Friday days in the inclusive range `[start, end]`.
///
/// An inverted range yields 0. No holiday calendar is applied.
pub fn count_business_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if end < start {
        return 0;
    }

    let mut count = 0;
    let mut current = start;
    loop {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        if current >= end {
            break;
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    count
}

/// `business_days * allocation/100 * hours_per_day * rate_per_hour`, in dollars
/// rounded to cents.
///
/// Allocation is not clamped to 0-100; a row missing any input
/// is worth 0.
pub fn estimate_resource_cost(line: &ResourceLine) -> f64 {
    let (Some(start), Some(end), Some(allocation), Some(hours), Some(rate)) = (
        line.start,
        line.end,
        line.allocation_percent,
        line.hours_per_day,
        line.rate_per_hour,
    ) else {
        return 0.0;
    };

    let days = f64::from(count_business_days(start, end));
    let cost = days * (allocation / 100.0) * hours * rate;
    if cost.is_finite() { round_currency(cost) } else { 0.0 }
}

/// Sum of every resource row's estimate.
pub fn total_contract_value(lines: &[ResourceLine]) -> f64 {
    round_currency(lines.iter().map(estimate_resource_cost).sum())
}

/// Share of the fixed fee owed for one milestone.
pub fn compute_milestone_payment(total_fee: f64, allocation_percent: Option<f64>) -> f64 {
    let Some(allocation) = allocation_percent else {
        return 0.0;
    };
    let payment = total_fee * (allocation / 100.0);
    if payment.is_finite() { round_currency(payment) } else { 0.0 }
}

/// Sum of net payments across all milestones. Allocations need not add up to 100.
pub fn total_milestone_payment(total_fee: f64, lines: &[MilestoneLine]) -> f64 {
    round_currency(
        lines
            .iter()
            .map(|m| compute_milestone_payment(total_fee, m.allocation_percent))
            .sum(),
    )
}

/// Change-order fee delta. Negative when scope shrinks.
pub fn compute_difference(change_order_fee: f64, original_sow_fee: f64) -> f64 {
    let delta = change_order_fee - original_sow_fee;
    if delta.is_finite() { round_currency(delta) } else { 0.0 }
}

/// Parses a typed number, tolerating `$`, `,`, `%` and spaces.
/// Returns `fallback` for anything else, including NaN and infinities.
pub fn parse_numeric_or_default(raw: &str, fallback: f64) -> f64 {
    parse_numeric(raw).unwrap_or(fallback)
}

/// Like [`parse_numeric_or_default`] but keeps "missing" distinct from zero.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned = NUMERIC_NOISE.replace_all(raw, "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts `YYYY-MM-DD` or `MM/DD/YYYY`.
pub fn parse_date_or_none(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `$1,234.56` style, `-$1,234.56` for negatives.
pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}
