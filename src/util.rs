// Utility helpers for parsing and basic statistics.
//
// This module centralizes the "dirty" CSV/number/year handling so the rest of
// the code can assume clean, typed values.
use chrono::{Datelike, NaiveDate};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters (suppression markers
///   such as `x`, `c` or `[z]`, and `NaN`/`inf`).
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a reporting year.
///
/// Accepts a plain year (`2022`), a financial year (`2022/23` or `2022-23`,
/// the first year wins) or an ISO date (`2023-03-31`).
pub fn parse_year_safe(s: Option<&str>) -> Option<i32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.year());
    }
    let head: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if head.len() != 4 {
        return None;
    }
    let rest = &s[head.len()..];
    let financial = rest.is_empty()
        || ((rest.starts_with('/') || rest.starts_with('-'))
            && rest[1..].len() == 2
            && rest[1..].chars().all(|c| c.is_ascii_digit()));
    if !financial {
        return None;
    }
    head.parse::<i32>().ok()
}

/// Trim a text cell, mapping blank cells to `None`.
pub fn non_blank(s: Option<String>) -> Option<String> {
    let s = s?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn average(v: &[f64]) -> Option<f64> {
    // Arithmetic mean; an empty slice has no mean rather than a zero mean.
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Median of an already sorted slice.
pub fn median_sorted(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

/// Fixed-decimal value with `en` thousands separators, e.g. `1,234.50`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (whole, frac) = match fixed.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (fixed.as_str(), None),
    };
    let grouped = whole
        .parse::<u64>()
        .map(|w| w.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| whole.to_string());
    // -0.001 rounds to "0.00" and should not keep its sign.
    let sign = if n < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        "-"
    } else {
        ""
    };
    match frac {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn format_optional_number(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "-".to_string())
}

/// Render a percentile the way the dashboard shows it: rounded, with an
/// ordinal suffix (`1st`, `42nd`, `100th`).
pub fn format_percentile(p: Option<f64>) -> String {
    let Some(p) = p else {
        return "-".to_string();
    };
    let n = p.round() as i64;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Counts for log lines and table footers, e.g. `9,855`.
pub fn format_int<T: ToFormattedString>(n: T) -> String {
    n.to_formatted_string(&Locale::en)
}
