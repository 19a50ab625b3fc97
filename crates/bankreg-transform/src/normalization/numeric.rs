//! Numeric normalization.

use bankreg_model::Decimal;

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Parses a monetary amount as an exact decimal.
///
/// Currency symbols, thousands separators, spaces and a trailing percent
/// sign are dropped. An amount wrapped in parentheses is negative.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (negative, inner) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let inner = inner.trim().strip_suffix('%').unwrap_or(inner.trim());
    let cleaned: String = inner
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != ',' && !CURRENCY_SYMBOLS.contains(ch))
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    let amount = Decimal::parse(cleaned).ok()?;
    if negative {
        if amount.is_negative() {
            return None;
        }
        Decimal::ZERO.checked_sub(amount).ok()
    } else {
        Some(amount)
    }
}

/// Parses an integer, tolerating thousands separators and a zero fraction.
pub fn parse_integer(value: &str) -> Option<i64> {
    let amount = parse_amount(value)?;
    let whole = amount.round_half_even(0).ok()?;
    if whole != amount {
        return None;
    }
    i64::try_from(whole.mantissa()).ok()
}
