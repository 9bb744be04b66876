// Utility helpers for parsing and basic arithmetic.
//
// This module centralizes the "dirty" spreadsheet text handling so the rest
// of the code can assume clean, typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues common in exported ledgers.
///
/// - Trims whitespace and strips thousands separators.
/// - Accepts accounting negatives like `(1,250.00)` and a trailing `Cr`/`Dr`
///   marker (`Cr` negates).
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let lower = s.to_ascii_lowercase();
    let (body, negate) = if let Some(rest) = lower.strip_suffix("cr") {
        (rest.trim().to_string(), true)
    } else if let Some(rest) = lower.strip_suffix("dr") {
        (rest.trim().to_string(), false)
    } else {
        (lower, false)
    };
    let (body, paren) = match body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => (inner.to_string(), true),
        None => (body, false),
    };
    if body.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let cleaned = body.replace([',', ' '], "");
    let v = cleaned.parse::<f64>().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(if negate ^ paren { -v } else { v })
}

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
];

/// Ledger exports mix ISO and day-first formats; a trailing time part
/// ("2025-04-01 00:00:00") is ignored.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })
}

/// Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(chrono::Days::new(serial.floor() as u64))
}

/// `part / whole * 100`, or 0 when `whole` is zero.
pub fn safe_pct(part: f64, whole: f64) -> f64 {
    if whole.abs() < f64::EPSILON {
        return 0.0;
    }
    let v = part * 100.0 / whole;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Join key for text columns: trimmed, inner whitespace collapsed,
/// upper-cased. Empty keys map to `UNMAPPED`.
pub fn normalize_key(s: &str) -> String {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        UNMAPPED.to_string()
    } else {
        joined.to_uppercase()
    }
}

pub const UNMAPPED: &str = "UNMAPPED";

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ledger_numbers() {
        assert_eq!(parse_f64_safe(Some(" 1,250.50 ")), Some(1250.5));
        assert_eq!(parse_f64_safe(Some("(300)")), Some(-300.0));
        assert_eq!(parse_f64_safe(Some("450.00 Cr")), Some(-450.0));
        assert_eq!(parse_f64_safe(Some("450 Dr")), Some(450.0));
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(Some("-")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_mixed_date_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 4, 7).unwrap();
        assert_eq!(parse_date_safe(Some("2025-04-07")), Some(d));
        assert_eq!(parse_date_safe(Some("07/04/2025")), Some(d));
        assert_eq!(parse_date_safe(Some("07-Apr-2025")), Some(d));
        assert_eq!(parse_date_safe(Some("2025-04-07 00:00:00")), Some(d));
        assert_eq!(parse_date_safe(Some("07 Apr 2025")), Some(d));
        assert_eq!(parse_date_safe(Some("soon")), None);
    }

    #[test]
    fn converts_excel_serials() {
        assert_eq!(
            excel_serial_to_date(45748.0),
            NaiveDate::from_ymd_opt(2025, 4, 1)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(excel_serial_to_date(1e20), None);
        assert_eq!(excel_serial_to_date(f64::MAX), None);
    }

    #[test]
    fn keys_and_formatting() {
        assert_eq!(normalize_key("  chennai   north "), "CHENNAI NORTH");
        assert_eq!(normalize_key("   "), UNMAPPED);
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-0.5, 1), "-0.5");
        assert_eq!(format_number(12.0, 0), "12");
        assert_eq!(format_int(9855), "9,855");
    }
}
