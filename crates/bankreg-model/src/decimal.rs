//! Exact fixed-point decimals for reported amounts.
//!
//! Values are an `i128` mantissa with a base-10 scale, so `12.50` is
//! `(1250, 2)`. Equality and ordering are numeric (`1.5 == 1.50`); the scale
//! only affects rendering. Every reduction of precision goes through
//! round-half-to-even.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecimalError;

/// Largest supported number of fraction digits.
pub const MAX_SCALE: u32 = 28;

#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

fn pow10(exp: u32) -> Result<i128, DecimalError> {
    10i128.checked_pow(exp).ok_or(DecimalError::Overflow)
}

/// Integer division rounding half to even.
fn div_half_even(numerator: i128, denominator: i128) -> Result<i128, DecimalError> {
    if denominator == 0 {
        return Err(DecimalError::DivisionByZero);
    }
    let negative = (numerator < 0) != (denominator < 0);
    let n = numerator.unsigned_abs();
    let d = denominator.unsigned_abs();
    let mut quotient = n / d;
    let twice_remainder = (n % d) * 2;
    if twice_remainder > d || (twice_remainder == d && quotient % 2 == 1) {
        quotient += 1;
    }
    let quotient = i128::try_from(quotient).map_err(|_| DecimalError::Overflow)?;
    Ok(if negative { -quotient } else { quotient })
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    pub fn new(mantissa: i128, scale: u32) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::Overflow);
        }
        Ok(Self { mantissa, scale })
    }

    pub fn from_int(value: i64) -> Self {
        Self {
            mantissa: i128::from(value),
            scale: 0,
        }
    }

    pub fn mantissa(self) -> i128 {
        self.mantissa
    }

    pub fn scale(self) -> u32 {
        self.scale
    }

    /// Parse a plain decimal literal: optional sign, digits, optional fraction.
    ///
    /// Exponents, separators and surrounding whitespace are rejected; callers
    /// clean the text first.
    pub fn parse(input: &str) -> Result<Self, DecimalError> {
        let invalid = || DecimalError::Invalid {
            input: input.to_string(),
        };
        let (negative, body) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            _ => (false, input),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let scale = u32::try_from(frac_part.len()).map_err(|_| DecimalError::Overflow)?;
        if scale > MAX_SCALE {
            return Err(DecimalError::Overflow);
        }
        let mut mantissa: i128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit - b'0')))
                .ok_or(DecimalError::Overflow)?;
        }
        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }

    /// Convert through the shortest round-trip text form of the float.
    pub fn from_f64(value: f64) -> Result<Self, DecimalError> {
        if !value.is_finite() {
            return Err(DecimalError::Invalid {
                input: value.to_string(),
            });
        }
        Self::parse(&value.to_string())
    }

    /// Round (or pad) to exactly `scale` fraction digits, ties to even.
    pub fn round_half_even(self, scale: u32) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::Overflow);
        }
        let mantissa = match scale.cmp(&self.scale) {
            Ordering::Equal => self.mantissa,
            Ordering::Greater => self
                .mantissa
                .checked_mul(pow10(scale - self.scale)?)
                .ok_or(DecimalError::Overflow)?,
            Ordering::Less => div_half_even(self.mantissa, pow10(self.scale - scale)?)?,
        };
        Ok(Self { mantissa, scale })
    }

    fn aligned(self, other: Self) -> Result<(i128, i128, u32), DecimalError> {
        let scale = self.scale.max(other.scale);
        let left = self
            .mantissa
            .checked_mul(pow10(scale - self.scale)?)
            .ok_or(DecimalError::Overflow)?;
        let right = other
            .mantissa
            .checked_mul(pow10(scale - other.scale)?)
            .ok_or(DecimalError::Overflow)?;
        Ok((left, right, scale))
    }

    pub fn checked_add(self, other: Self) -> Result<Self, DecimalError> {
        let (left, right, scale) = self.aligned(other)?;
        let mantissa = left.checked_add(right).ok_or(DecimalError::Overflow)?;
        Ok(Self { mantissa, scale })
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, DecimalError> {
        let (left, right, scale) = self.aligned(other)?;
        let mantissa = left.checked_sub(right).ok_or(DecimalError::Overflow)?;
        Ok(Self { mantissa, scale })
    }

    pub fn checked_mul(self, other: Self) -> Result<Self, DecimalError> {
        let mantissa = self
            .mantissa
            .checked_mul(other.mantissa)
            .ok_or(DecimalError::Overflow)?;
        let scale = self.scale + other.scale;
        if scale > MAX_SCALE {
            let mantissa = div_half_even(mantissa, pow10(scale - MAX_SCALE)?)?;
            return Ok(Self {
                mantissa,
                scale: MAX_SCALE,
            });
        }
        Ok(Self { mantissa, scale })
    }

    /// Divide, producing exactly `scale` fraction digits rounded half to even.
    pub fn checked_div(self, other: Self, scale: u32) -> Result<Self, DecimalError> {
        if other.mantissa == 0 {
            return Err(DecimalError::DivisionByZero);
        }
        if scale > MAX_SCALE {
            return Err(DecimalError::Overflow);
        }
        // q * 10^scale = m1 * 10^(scale + s2) / (m2 * 10^s1)
        let mut num_exp = scale + other.scale;
        let mut den_exp = self.scale;
        let common = num_exp.min(den_exp);
        num_exp -= common;
        den_exp -= common;
        let numerator = self
            .mantissa
            .checked_mul(pow10(num_exp)?)
            .ok_or(DecimalError::Overflow)?;
        let denominator = other
            .mantissa
            .checked_mul(pow10(den_exp)?)
            .ok_or(DecimalError::Overflow)?;
        let mantissa = div_half_even(numerator, denominator)?;
        Ok(Self { mantissa, scale })
    }

    pub fn abs(self) -> Self {
        Self {
            mantissa: self.mantissa.saturating_abs(),
            scale: self.scale,
        }
    }

    pub fn is_zero(self) -> bool {
        self.mantissa == 0
    }

    pub fn is_negative(self) -> bool {
        self.mantissa < 0
    }

    /// Drop trailing fractional zeros (`12.500` becomes `12.5`).
    pub fn trimmed(self) -> Self {
        let mut mantissa = self.mantissa;
        let mut scale = self.scale;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    /// Significant fraction digits, as counted by the XSD `fractionDigits` facet.
    pub fn fraction_digits(self) -> u32 {
        self.trimmed().scale
    }

    /// Digit count as constrained by the XSD `totalDigits` facet.
    pub fn total_digits(self) -> u32 {
        let trimmed = self.trimmed();
        let mut magnitude = trimmed.mantissa.unsigned_abs();
        let mut digits = 1;
        while magnitude >= 10 {
            magnitude /= 10;
            digits += 1;
        }
        digits.max(trimmed.scale)
    }
}

fn compare_magnitude(left: Decimal, right: Decimal) -> Ordering {
    let left_pow = 10u128.pow(left.scale);
    let right_pow = 10u128.pow(right.scale);
    let left_mag = left.mantissa.unsigned_abs();
    let right_mag = right.mantissa.unsigned_abs();
    (left_mag / left_pow)
        .cmp(&(right_mag / right_pow))
        .then_with(|| {
            let scale = left.scale.max(right.scale);
            let left_frac = (left_mag % left_pow) * 10u128.pow(scale - left.scale);
            let right_frac = (right_mag % right_pow) * 10u128.pow(scale - right.scale);
            left_frac.cmp(&right_frac)
        })
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let left_sign = self.mantissa.signum();
        let right_sign = other.mantissa.signum();
        if left_sign != right_sign {
            return left_sign.cmp(&right_sign);
        }
        let magnitude = compare_magnitude(*self, *other);
        if left_sign < 0 {
            magnitude.reverse()
        } else {
            magnitude
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let trimmed = self.trimmed();
        trimmed.mantissa.hash(state);
        trimmed.scale.hash(state);
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.mantissa.unsigned_abs();
        let divisor = 10u128.pow(self.scale);
        let integral = magnitude / divisor;
        let fraction = magnitude % divisor;
        if self.mantissa < 0 {
            f.write_str("-")?;
        }
        if self.scale == 0 {
            write!(f, "{integral}")
        } else {
            write!(
                f,
                "{integral}.{fraction:0width$}",
                width = self.scale as usize
            )
        }
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        Decimal::parse(text).expect("valid decimal")
    }

    #[test]
    fn rounds_ties_to_even() {
        assert_eq!(dec("2.345").round_half_even(2).unwrap().to_string(), "2.34");
        assert_eq!(dec("2.355").round_half_even(2).unwrap().to_string(), "2.36");
        assert_eq!(dec("-2.345").round_half_even(2).unwrap().to_string(), "-2.34");
        assert_eq!(dec("0.125").round_half_even(2).unwrap().to_string(), "0.12");
        assert_eq!(dec("0.1251").round_half_even(2).unwrap().to_string(), "0.13");
        assert_eq!(dec("7").round_half_even(2).unwrap().to_string(), "7.00");
    }

    #[test]
    fn equality_ignores_scale() {
        assert_eq!(dec("1.5"), dec("1.50"));
        assert!(dec("-0.01") < dec("0"));
        assert!(dec("-3.2") < dec("-3.19"));
        assert!(dec("10.001") > dec("10"));
    }

    #[test]
    fn divides_with_rounding() {
        let ratio = dec("1200").checked_div(dec("9000"), 4).unwrap();
        assert_eq!(ratio.to_string(), "0.1333");
        let half = dec("1").checked_div(dec("8"), 2).unwrap();
        assert_eq!(half.to_string(), "0.12");
        assert_eq!(
            dec("1").checked_div(Decimal::ZERO, 2),
            Err(DecimalError::DivisionByZero)
        );
    }

    #[test]
    fn rejects_malformed_literals() {
        for input in ["", ".", "-", "1,000", "1e5", " 1", "1.2.3"] {
            assert!(Decimal::parse(input).is_err(), "{input:?} should fail");
        }
        assert_eq!(dec("1.").to_string(), "1");
        assert_eq!(dec(".5").to_string(), "0.5");
    }

    #[test]
    fn digit_counts_follow_xsd_facets() {
        assert_eq!(dec("12.500").fraction_digits(), 1);
        assert_eq!(dec("12.500").total_digits(), 3);
        assert_eq!(dec("0.05").total_digits(), 2);
        assert_eq!(dec("0").total_digits(), 1);
    }
}
