//! Raw and canonical record values.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;

/// Stable index of a record in its source (1-based data row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowIndex(pub usize);

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An untyped scalar exactly as the loader read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawValue {
    /// Treats blank text as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(text) => text.trim().is_empty(),
            RawValue::Integer(_) | RawValue::Float(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Missing => None,
            RawValue::Text(text) => Some(Cow::Borrowed(text.as_str())),
            RawValue::Integer(value) => Some(Cow::Owned(value.to_string())),
            RawValue::Float(value) => Some(Cow::Owned(value.to_string())),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

/// One source row belonging to a report section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub row: RowIndex,
    pub section: String,
    pub fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(row: usize, section: impl Into<String>) -> Self {
        Self {
            row: RowIndex(row),
            section: section.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }
}

/// A typed, normalized value ready to be rendered into the report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CanonicalValue {
    Text(String),
    /// A controlled-vocabulary code.
    Code(String),
    Decimal(Decimal),
    Integer(i64),
    Date(NaiveDate),
    Boolean(bool),
}

impl CanonicalValue {
    /// Lexical form used as element or attribute text.
    pub fn render(&self) -> String {
        match self {
            CanonicalValue::Text(text) | CanonicalValue::Code(text) => text.clone(),
            CanonicalValue::Decimal(value) => value.to_string(),
            CanonicalValue::Integer(value) => value.to_string(),
            CanonicalValue::Date(date) => date.format("%Y-%m-%d").to_string(),
            CanonicalValue::Boolean(value) => value.to_string(),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            CanonicalValue::Decimal(value) => Some(*value),
            CanonicalValue::Integer(value) => Some(Decimal::from_int(*value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CanonicalValue::Text(text) | CanonicalValue::Code(text) => Some(text),
            _ => None,
        }
    }

    fn rank(&self) -> (u8, u8) {
        match self {
            CanonicalValue::Boolean(_) => (0, 0),
            CanonicalValue::Integer(_) => (1, 0),
            CanonicalValue::Decimal(_) => (1, 1),
            CanonicalValue::Date(_) => (2, 0),
            CanonicalValue::Code(_) => (3, 0),
            CanonicalValue::Text(_) => (3, 1),
        }
    }
}

/// Natural order: numbers numerically, dates chronologically, text lexically.
impl Ord for CanonicalValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let value = match (self, other) {
            (CanonicalValue::Boolean(a), CanonicalValue::Boolean(b)) => a.cmp(b),
            (CanonicalValue::Date(a), CanonicalValue::Date(b)) => a.cmp(b),
            (CanonicalValue::Integer(a), CanonicalValue::Integer(b)) => a.cmp(b),
            _ => match (self.as_decimal(), other.as_decimal()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => match (self.as_str(), other.as_str()) {
                    (Some(a), Some(b)) => a.cmp(b),
                    _ => Ordering::Equal,
                },
            },
        };
        value.then_with(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialOrd for CanonicalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A soft-rule finding attached to a retained record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub rule: String,
    pub field: Option<String>,
    pub message: String,
}

/// A cleaned record. Built once by the rule engine and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    row: RowIndex,
    section: String,
    fields: BTreeMap<String, CanonicalValue>,
    annotations: Vec<Annotation>,
}

impl CanonicalRecord {
    pub fn new(row: RowIndex, section: impl Into<String>) -> Self {
        Self {
            row,
            section: section.into(),
            fields: BTreeMap::new(),
            annotations: Vec::new(),
        }
    }

    pub fn from_parts(
        row: RowIndex,
        section: impl Into<String>,
        fields: BTreeMap<String, CanonicalValue>,
        annotations: Vec<Annotation>,
    ) -> Self {
        Self {
            row,
            section: section.into(),
            fields,
            annotations,
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: CanonicalValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn row(&self) -> RowIndex {
        self.row
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn get(&self, field: &str) -> Option<&CanonicalValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, CanonicalValue> {
        &self.fields
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_counts_as_missing() {
        assert!(RawValue::Missing.is_missing());
        assert!(RawValue::from("   ").is_missing());
        assert!(!RawValue::from(0_i64).is_missing());
    }

    #[test]
    fn canonical_values_render_lexically() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).expect("valid date");
        assert_eq!(CanonicalValue::Date(date).render(), "2024-03-31");
        let amount = Decimal::parse("1500.5")
            .and_then(|d| d.round_half_even(2))
            .expect("amount");
        assert_eq!(CanonicalValue::Decimal(amount).render(), "1500.50");
    }

    #[test]
    fn natural_order_mixes_integers_and_decimals() {
        let two = CanonicalValue::Integer(2);
        let one_and_half = CanonicalValue::Decimal(Decimal::parse("1.5").expect("decimal"));
        assert!(one_and_half < two);
        assert!(CanonicalValue::Text("A".into()) < CanonicalValue::Code("B".into()));
    }
}
