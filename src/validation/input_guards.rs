//! Primitive predicates shared by the receipt and item pipelines.
//!
//! Every predicate accepts any JSON value and answers `false` for values of
//! the wrong type, so callers can feed them missing or mistyped properties
//! directly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

// `\d` in the regex crate is Unicode-aware; the schema only admits ASCII digits.
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("date pattern is valid")
});
static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("time pattern is valid")
});
static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.[0-9]{2}$").expect("price pattern is valid"));

pub fn is_object(value: &Value) -> bool {
    value.is_object()
}

pub fn is_array(value: &Value) -> bool {
    value.is_array()
}

/// A string of at least one character. Whitespace-only strings qualify.
pub fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

/// `YYYY-MM-DD` naming a real day of the proleptic Gregorian calendar.
///
/// ```
/// use receipt_points::validation::is_date_string;
/// use serde_json::json;
///
/// assert!(is_date_string(&json!("2024-02-29")));
/// assert!(!is_date_string(&json!("2023-02-29")));
/// assert!(!is_date_string(&json!("2022-13-13")));
/// ```
pub fn is_date_string(value: &Value) -> bool {
    let Some(text) = value.as_str() else {
        return false;
    };
    let Some(captures) = DATE_PATTERN.captures(text) else {
        return false;
    };
    let field = |index: usize| captures[index].parse::<u32>().ok();
    match (field(1), field(2), field(3)) {
        (Some(year), Some(month), Some(day)) => {
            days_in_month(year, month).is_some_and(|days| (1..=days).contains(&day))
        }
        _ => false,
    }
}

/// 24-hour `HH:MM`; both components are exactly two digits.
pub fn is_time_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| TIME_PATTERN.is_match(s))
}

/// Unsigned decimal amount with exactly two fraction digits, e.g. `"6.49"`.
pub fn is_price_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| PRICE_PATTERN.is_match(s))
}

pub fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-based), or `None` when the month does not exist.
pub fn days_in_month(year: u32, month: u32) -> Option<u32> {
    const DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let index = usize::try_from(month.checked_sub(1)?).ok()?;
    let days = *DAYS.get(index)?;
    if month == 2 && is_leap_year(year) {
        Some(days + 1)
    } else {
        Some(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_and_array() {
        assert!(is_object(&json!({})));
        assert!(!is_object(&json!([])));
        assert!(!is_object(&json!("string")));
        assert!(!is_object(&Value::Null));

        assert!(is_array(&json!([])));
        assert!(!is_array(&json!({})));
        assert!(!is_array(&json!("string")));
        assert!(!is_array(&Value::Null));
    }

    #[test]
    fn non_empty_string() {
        assert!(is_non_empty_string(&json!("string")));
        assert!(is_non_empty_string(&json!("   ")));
        assert!(!is_non_empty_string(&json!("")));
        assert!(!is_non_empty_string(&json!({})));
        assert!(!is_non_empty_string(&json!([])));
        assert!(!is_non_empty_string(&json!(42)));
    }

    #[test]
    fn date_strings() {
        assert!(is_date_string(&json!("2022-01-13")));
        assert!(is_date_string(&json!("2022-12-31")));
        assert!(is_date_string(&json!("2000-02-29")));
        assert!(!is_date_string(&json!("1900-02-29")));
        assert!(!is_date_string(&json!("2022-13-13")));
        assert!(!is_date_string(&json!("2022-13-130")));
        assert!(!is_date_string(&json!("2022-00-10")));
        assert!(!is_date_string(&json!("2022-01-00")));
        assert!(!is_date_string(&json!("2022-04-31")));
        assert!(!is_date_string(&json!("2022-1-01")));
        assert!(!is_date_string(&json!("string")));
        assert!(!is_date_string(&json!(20220101)));
    }

    #[test]
    fn date_rejects_non_ascii_digits() {
        assert!(!is_date_string(&json!("٢٠٢٢-01-01")));
    }

    #[test]
    fn time_strings() {
        assert!(is_time_string(&json!("13:01")));
        assert!(is_time_string(&json!("01:01")));
        assert!(is_time_string(&json!("00:00")));
        assert!(is_time_string(&json!("23:59")));
        assert!(!is_time_string(&json!("24:00")));
        assert!(!is_time_string(&json!("13:1")));
        assert!(!is_time_string(&json!("1:01")));
        assert!(!is_time_string(&json!("12:60")));
        assert!(!is_time_string(&json!("12:00:00")));
        assert!(!is_time_string(&json!(1300)));
    }

    #[test]
    fn price_strings() {
        assert!(is_price_string(&json!("0.99")));
        assert!(is_price_string(&json!("17.53")));
        assert!(is_price_string(&json!("0.00")));
        assert!(!is_price_string(&json!("17.5")));
        assert!(!is_price_string(&json!(".99")));
        assert!(!is_price_string(&json!("-1.00")));
        assert!(!is_price_string(&json!("1,000.00")));
        assert!(!is_price_string(&json!(17.53)));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2023, 2), Some(28));
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2024, 4), Some(30));
        assert_eq!(days_in_month(2024, 12), Some(31));
        assert_eq!(days_in_month(2024, 0), None);
        assert_eq!(days_in_month(2024, 13), None);
    }
}
