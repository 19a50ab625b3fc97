//! Leaf value checks: white space normalization, lexical form of the
//! primitive type, fixed value, then every facet. All failures are
//! reported, not just the first.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::LazyLock;

use bankreg_model::{Constraint, Decimal, LeafType, Location, PrimitiveType, ValidationError};
use chrono::NaiveDate;
use regex::Regex;

static DECIMAL_LEXICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("Invalid decimal lexical regex")
});

static INTEGER_LEXICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("Invalid integer lexical regex"));

pub(crate) fn check_value(
    value: &str,
    leaf: &LeafType,
    location: &Location,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let normalized = match leaf.base {
        PrimitiveType::String => leaf.facets.white_space.apply(value),
        _ => Cow::Borrowed(value.trim()),
    };
    let lexical: &str = &normalized;

    let number = if leaf.base.is_numeric() {
        match Numeral::parse(lexical, leaf.base) {
            Some(number) => Some(number),
            None => {
                errors.push(lexical_error(lexical, leaf.base, location));
                return errors;
            }
        }
    } else {
        let valid = match leaf.base {
            PrimitiveType::Date => is_date(lexical),
            PrimitiveType::Boolean => matches!(lexical, "true" | "false" | "1" | "0"),
            _ => true,
        };
        if !valid {
            errors.push(lexical_error(lexical, leaf.base, location));
            return errors;
        }
        None
    };

    if let Some(fixed) = &leaf.fixed {
        let matches = match &number {
            Some(number) => Numeral::parse(fixed, PrimitiveType::Decimal)
                .is_some_and(|fixed| fixed == *number),
            None => lexical == fixed,
        };
        if !matches {
            errors.push(ValidationError::new(
                location.clone(),
                Constraint::Fixed {
                    expected: fixed.clone(),
                },
                format!("value '{lexical}' must equal the fixed value '{fixed}'"),
            ));
        }
    }

    let facets = &leaf.facets;
    let length = lexical.chars().count();
    if let Some(expected) = facets.length
        && length != expected
    {
        errors.push(ValidationError::new(
            location.clone(),
            Constraint::Length {
                expected,
                actual: length,
            },
            format!("value '{lexical}' has length {length}, expected {expected}"),
        ));
    }
    if let Some(min) = facets.min_length
        && length < min
    {
        errors.push(ValidationError::new(
            location.clone(),
            Constraint::MinLength {
                min,
                actual: length,
            },
            format!("value '{lexical}' is shorter than {min} characters"),
        ));
    }
    if let Some(max) = facets.max_length
        && length > max
    {
        errors.push(ValidationError::new(
            location.clone(),
            Constraint::MaxLength {
                max,
                actual: length,
            },
            format!("value '{lexical}' is longer than {max} characters"),
        ));
    }

    for pattern in &facets.patterns {
        if !pattern.is_match(lexical) {
            errors.push(ValidationError::new(
                location.clone(),
                Constraint::Pattern {
                    pattern: pattern.as_str().to_string(),
                },
                format!("value '{lexical}' does not match pattern {}", pattern.as_str()),
            ));
        }
    }

    if !facets.enumeration.is_empty() {
        let allowed = facets.enumeration.iter().any(|candidate| match &number {
            Some(number) => Numeral::parse(candidate, PrimitiveType::Decimal)
                .is_some_and(|candidate| candidate == *number),
            None => candidate == lexical,
        });
        if !allowed {
            errors.push(ValidationError::new(
                location.clone(),
                Constraint::Enumeration {
                    allowed: facets.enumeration.clone(),
                },
                format!(
                    "value '{lexical}' is not one of: {}",
                    facets.enumeration.join(", ")
                ),
            ));
        }
    }

    if let Some(number) = &number {
        check_number(number, lexical, leaf, location, &mut errors);
    }
    errors
}

fn check_number(
    number: &Numeral,
    lexical: &str,
    leaf: &LeafType,
    location: &Location,
    errors: &mut Vec<ValidationError>,
) {
    let facets = &leaf.facets;
    if let Some(max) = facets.total_digits {
        let actual = number.total_digits();
        if actual > max {
            errors.push(ValidationError::new(
                location.clone(),
                Constraint::TotalDigits { max, actual },
                format!("value '{lexical}' has {actual} digits, at most {max} allowed"),
            ));
        }
    }
    if let Some(max) = facets.fraction_digits {
        let actual = number.fraction_digits();
        if actual > max {
            errors.push(ValidationError::new(
                location.clone(),
                Constraint::FractionDigits { max, actual },
                format!("value '{lexical}' has {actual} fraction digits, at most {max} allowed"),
            ));
        }
    }

    let mut out_of_range = |constraint: Constraint, op: &str, bound: Decimal| {
        errors.push(ValidationError::new(
            location.clone(),
            constraint,
            format!("value '{lexical}' is out of range: must be {op} {bound}"),
        ));
    };
    if let Some(bound) = facets.min_inclusive
        && *number < Numeral::from(bound)
    {
        out_of_range(Constraint::MinInclusive { bound }, ">=", bound);
    }
    if let Some(bound) = facets.max_inclusive
        && *number > Numeral::from(bound)
    {
        out_of_range(Constraint::MaxInclusive { bound }, "<=", bound);
    }
    if let Some(bound) = facets.min_exclusive
        && *number <= Numeral::from(bound)
    {
        out_of_range(Constraint::MinExclusive { bound }, ">", bound);
    }
    if let Some(bound) = facets.max_exclusive
        && *number >= Numeral::from(bound)
    {
        out_of_range(Constraint::MaxExclusive { bound }, "<", bound);
    }
}

fn lexical_error(value: &str, base: PrimitiveType, location: &Location) -> ValidationError {
    ValidationError::new(
        location.clone(),
        Constraint::Lexical { base },
        format!("value '{value}' is not a valid {base}"),
    )
}

/// A value of the `xs:decimal` value space, kept as canonical digits so
/// that facets apply at any magnitude or precision.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Numeral {
    negative: bool,
    /// No leading zeros.
    integral: String,
    /// No trailing zeros.
    fraction: String,
}

impl Numeral {
    /// `xs:decimal` or `xs:integer` lexical space.
    fn parse(value: &str, base: PrimitiveType) -> Option<Self> {
        let lexical = match base {
            PrimitiveType::Integer => &*INTEGER_LEXICAL,
            _ => &*DECIMAL_LEXICAL,
        };
        if !lexical.is_match(value) {
            return None;
        }
        let (negative, body) = match value.as_bytes().first() {
            Some(b'-') => (true, &value[1..]),
            Some(b'+') => (false, &value[1..]),
            _ => (false, value),
        };
        let (integral, fraction) = body.split_once('.').unwrap_or((body, ""));
        Some(Self::from_digits(negative, integral, fraction))
    }

    fn from_digits(negative: bool, integral: &str, fraction: &str) -> Self {
        let integral = integral.trim_start_matches('0').to_string();
        let fraction = fraction.trim_end_matches('0').to_string();
        let zero = integral.is_empty() && fraction.is_empty();
        Self {
            negative: negative && !zero,
            integral,
            fraction,
        }
    }

    fn fraction_digits(&self) -> u32 {
        u32::try_from(self.fraction.len()).unwrap_or(u32::MAX)
    }

    fn total_digits(&self) -> u32 {
        let digits = (self.integral.len() + self.fraction.len()).max(1);
        u32::try_from(digits).unwrap_or(u32::MAX)
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.integral
            .len()
            .cmp(&other.integral.len())
            .then_with(|| self.integral.cmp(&other.integral))
            .then_with(|| self.fraction.cmp(&other.fraction))
    }
}

impl From<Decimal> for Numeral {
    fn from(value: Decimal) -> Self {
        let digits = value.mantissa().unsigned_abs().to_string();
        let scale = value.scale() as usize;
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (integral, fraction) = padded.split_at(padded.len() - scale);
        Self::from_digits(value.is_negative(), integral, fraction)
    }
}

impl Ord for Numeral {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl PartialOrd for Numeral {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `xs:date` without a timezone.
fn is_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use bankreg_model::{Pattern, WhiteSpace};

    use super::*;

    fn codes(errors: &[ValidationError]) -> Vec<&'static str> {
        errors.iter().map(ValidationError::code).collect()
    }

    fn at() -> Location {
        Location::root("Report").child("Value", 1)
    }

    #[test]
    fn lexical_failure_stops_facet_checks() {
        let leaf = LeafType::decimal().with_fraction_digits(2);
        assert_eq!(codes(&check_value("12,5", &leaf, &at())), vec!["type"]);
        assert_eq!(codes(&check_value(".", &leaf, &at())), vec!["type"]);
        assert!(check_value(" 12.5 ", &leaf, &at()).is_empty());
        assert!(check_value("-.5", &leaf, &at()).is_empty());
    }

    #[test]
    fn integer_rejects_fraction_points() {
        let leaf = LeafType::new(PrimitiveType::Integer);
        assert_eq!(codes(&check_value("10.0", &leaf, &at())), vec!["type"]);
        assert!(check_value("+42", &leaf, &at()).is_empty());
    }

    #[test]
    fn fraction_digits_ignore_trailing_zeros() {
        let leaf = LeafType::decimal().with_fraction_digits(2);
        assert!(check_value("10.500", &leaf, &at()).is_empty());
        assert_eq!(
            codes(&check_value("10.505", &leaf, &at())),
            vec!["facet:fractionDigits"]
        );
    }

    #[test]
    fn facets_see_the_white_space_normalized_value() {
        let token = LeafType::string()
            .with_white_space(WhiteSpace::Collapse)
            .with_length(9)
            .with_pattern(Pattern::new("[A-Z]+ [A-Z]+").expect("pattern"));
        assert!(check_value("  ACME \n BANK ", &token, &at()).is_empty());

        let normalized = LeafType::string()
            .with_white_space(WhiteSpace::Replace)
            .with_enumeration(["A B"]);
        assert!(check_value("A\tB", &normalized, &at()).is_empty());

        let plain = LeafType::string().with_length(9);
        assert_eq!(
            codes(&check_value(" ACME BANK ", &plain, &at())),
            vec!["facet:length"]
        );
    }

    #[test]
    fn every_failing_facet_is_reported() {
        let leaf = LeafType::string()
            .with_length(3)
            .with_pattern(Pattern::new("[A-Z]+").expect("pattern"))
            .with_enumeration(["USD", "EUR"]);
        assert_eq!(
            codes(&check_value("usd1", &leaf, &at())),
            vec!["facet:length", "facet:pattern", "facet:enumeration"]
        );
    }

    #[test]
    fn fixed_numeric_values_compare_by_value() {
        let leaf = LeafType::decimal().with_fixed("100.00");
        assert!(check_value("100", &leaf, &at()).is_empty());
        assert_eq!(codes(&check_value("99.99", &leaf, &at())), vec!["fixed"]);
    }

    #[test]
    fn decimals_beyond_fixed_point_range_are_lexically_valid() {
        let leaf = LeafType::decimal();
        assert!(check_value("0.00000000000000000000000000001", &leaf, &at()).is_empty());
        assert!(check_value("1234567890123456789012345678901234567890", &leaf, &at()).is_empty());
        assert!(check_value("1.0000000000000000000000000000000", &leaf, &at()).is_empty());
        assert!(
            check_value(
                "12345678901234567890123456789012345678901",
                &LeafType::new(PrimitiveType::Integer),
                &at()
            )
            .is_empty()
        );
    }

    #[test]
    fn facets_apply_to_values_beyond_fixed_point_range() {
        let amount = LeafType::decimal()
            .with_fraction_digits(2)
            .with_total_digits(18)
            .with_min_inclusive(Decimal::ZERO);
        assert!(check_value("1.0000000000000000000000000000000", &amount, &at()).is_empty());
        assert_eq!(
            codes(&check_value("0.00000000000000000000000000001", &amount, &at())),
            vec!["facet:totalDigits", "facet:fractionDigits"]
        );
        assert_eq!(
            codes(&check_value("-1234567890123456789012345678901234567890", &amount, &at())),
            vec!["facet:totalDigits", "facet:minInclusive"]
        );

        let capped = LeafType::decimal().with_max_exclusive(Decimal::from_int(100));
        assert_eq!(
            codes(&check_value("99999999999999999999999999999999999999999", &capped, &at())),
            vec!["facet:maxExclusive"]
        );
        assert!(check_value("99.999999999999999999999999999999", &capped, &at()).is_empty());
    }

    #[test]
    fn numerals_order_by_value() {
        let n = |text: &str| Numeral::parse(text, PrimitiveType::Decimal).expect("numeral");
        assert!(n("-2") < n("-1.5"));
        assert!(n("-0.0") == n("0"));
        assert!(n("0.5") > n("0.45"));
        assert!(n("10") > n("9.99"));
        assert_eq!(Numeral::from(Decimal::parse("-0.050").expect("decimal")), n("-.05"));
        assert_eq!(Numeral::from(Decimal::from_int(100)), n("100.00"));
    }

    #[test]
    fn bounds_and_dates() {
        let leaf = LeafType::decimal()
            .with_min_inclusive(Decimal::from_int(8))
            .with_max_inclusive(Decimal::from_int(15));
        assert_eq!(
            codes(&check_value("7.99", &leaf, &at())),
            vec!["facet:minInclusive"]
        );
        assert!(check_value("15", &leaf, &at()).is_empty());

        let date = LeafType::date();
        assert!(check_value("2024-02-29", &date, &at()).is_empty());
        assert_eq!(codes(&check_value("2023-02-29", &date, &at())), vec!["type"]);
        assert_eq!(codes(&check_value("31/12/2024", &date, &at())), vec!["type"]);
    }
}
