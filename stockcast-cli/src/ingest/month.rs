//! Month-year header tokens (`"Jan-24"`, `"Dec-2024"`) and canonical `YYYY-MM` keys

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Short label shape used when scoring header candidates: three letters, hyphen, two digits
static SHORT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{3}-\d{2}$").expect("static month token regex"));

static MONTH_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("static month key regex"));

/// Check whether a label looks like a short month-year token (`"Jan-24"`)
pub fn is_short_month_token(label: &str) -> bool {
    SHORT_TOKEN.is_match(label)
}

/// Check whether a string is a canonical `YYYY-MM` key
pub fn is_month_key(key: &str) -> bool {
    MONTH_KEY.is_match(key)
}

/// Parse a header token into a `YYYY-MM` key.
///
/// Returns `None` for anything that is not `<mon>-<yy>` or `<mon>-<yyyy>`;
/// callers treat those headers as ordinary columns.
pub fn parse_month_key(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.trim().split('-').collect();
    if parts.len() != 2 {
        return None;
    }

    let month = month_number(parts[0])?;

    let year_part = parts[1];
    if !year_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = match year_part.len() {
        2 => format!("20{}", year_part),
        4 => year_part.to_string(),
        _ => return None,
    };

    Some(format!("{}-{:02}", year, month))
}

/// Build the `YYYY-MM` key for a calendar date
pub fn month_key_for_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Render a `YYYY-MM` key as a human label (`"2024-01"` -> `"Jan-24"`)
pub fn month_label(key: &str) -> Option<String> {
    if !is_month_key(key) {
        return None;
    }
    let year = &key[0..4];
    let month: usize = key[5..7].parse().ok()?;
    let abbrev = MONTHS.get(month.checked_sub(1)?)?;

    let mut label = String::with_capacity(6);
    let mut chars = abbrev.chars();
    if let Some(first) = chars.next() {
        label.push(first.to_ascii_uppercase());
    }
    label.extend(chars);
    label.push('-');
    label.push_str(&year[2..4]);
    Some(label)
}

/// Add whole months to a `YYYY-MM` key
pub fn add_months(key: &str, months: u32) -> Option<String> {
    if !is_month_key(key) {
        return None;
    }
    let year: i64 = key[0..4].parse().ok()?;
    let month: i64 = key[5..7].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    let index = year * 12 + (month - 1) + months as i64;
    // Keys compare as strings, so they must keep a four-digit year
    if index / 12 > 9999 {
        return None;
    }
    Some(format!("{:04}-{:02}", index / 12, index % 12 + 1))
}

fn month_number(abbrev: &str) -> Option<u32> {
    if abbrev.len() != 3 {
        return None;
    }
    let lower = abbrev.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_key() {
        assert_eq!(parse_month_key("Jan-24"), Some("2024-01".to_string()));
        assert_eq!(parse_month_key("Dec-2024"), Some("2024-12".to_string()));
        assert_eq!(parse_month_key("sep-25"), Some("2025-09".to_string()));
        assert_eq!(parse_month_key(" MAR-26 "), Some("2026-03".to_string()));
    }

    #[test]
    fn test_parse_month_key_rejects_other_shapes() {
        assert_eq!(parse_month_key("Foo-24"), None);
        assert_eq!(parse_month_key("Jan"), None);
        assert_eq!(parse_month_key("Jan-24-01"), None);
        assert_eq!(parse_month_key("January-24"), None);
        assert_eq!(parse_month_key("Jan-2x"), None);
        assert_eq!(parse_month_key("Jan-245"), None);
        assert_eq!(parse_month_key("Product"), None);
    }

    #[test]
    fn test_short_token_pattern() {
        assert!(is_short_month_token("Jan-24"));
        assert!(is_short_month_token("feb-25"));
        assert!(!is_short_month_token("Dec-2024"));
        assert!(!is_short_month_token("Description"));
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label("2024-01"), Some("Jan-24".to_string()));
        assert_eq!(month_label("2025-12"), Some("Dec-25".to_string()));
        assert_eq!(month_label("2025-13"), None);
        assert_eq!(month_label("bogus"), None);
    }

    #[test]
    fn test_add_months_rolls_over_year() {
        assert_eq!(add_months("2024-11", 0), Some("2024-11".to_string()));
        assert_eq!(add_months("2024-11", 2), Some("2025-01".to_string()));
        assert_eq!(add_months("2024-01", 23), Some("2025-12".to_string()));
        assert_eq!(add_months("9999-12", 0), Some("9999-12".to_string()));
        assert_eq!(add_months("9999-12", 1), None);
        assert_eq!(add_months("2024-01", 100_000), None);
    }

    #[test]
    fn test_month_key_for_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(month_key_for_date(date), "2026-10");
    }
}
