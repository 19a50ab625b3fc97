//! Date normalization.

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};

/// Formats tried when a rule does not list its own.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

/// Parses a date with the first matching format.
pub fn parse_date<S: AsRef<str>>(value: &str, formats: &[S]) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format.as_ref()).ok())
}

/// True when `format` is a well-formed strftime specification.
pub fn is_valid_format(format: &str) -> bool {
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tries_formats_in_order() {
        let formats = ["%Y-%m-%d", "%d/%m/%Y"];
        let expected = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert_eq!(parse_date("2024-12-31", &formats), expected);
        assert_eq!(parse_date(" 31/12/2024 ", &formats), expected);
        assert_eq!(parse_date("12/31/2024", &formats), None);
    }

    #[test]
    fn rejects_impossible_dates() {
        assert_eq!(parse_date("2024-02-30", DEFAULT_DATE_FORMATS), None);
    }

    #[test]
    fn validates_format_strings() {
        assert!(is_valid_format("%Y-%m-%d"));
        assert!(!is_valid_format("%Q"));
        assert!(!is_valid_format(""));
    }
}
