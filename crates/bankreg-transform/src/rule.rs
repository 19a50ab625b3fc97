//! Rule types.
//!
//! Rules are a closed set of tagged variants. Every single-record rule is
//! evaluated through [`Rule::evaluate`], which only reads the record and
//! reports an [`Outcome`]; the engine applies the outcome. Cross-record rules
//! are data here and run in [`crate::engine`] once per batch.

use bankreg_model::{CanonicalValue, Decimal, DecimalError, Pattern, RawValue, Vocabulary};
use serde::{Deserialize, Serialize};

use crate::normalization::{
    MatchMode, TextOptions, clean_text, normalize_code, parse_date, parse_integer, resolve_code,
};
use crate::record::{Input, WorkingRecord};

/// Scale used for intermediate ratios before comparison.
const RATIO_SCALE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Failure excludes the record.
    #[default]
    Hard,
    /// Failure annotates the record and keeps it.
    Soft,
}

/// Result of evaluating one rule against one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pass,
    /// Write this value to the rule's target field.
    Set(CanonicalValue),
    Fail(String),
    /// Inputs are absent; the rule has nothing to say.
    Skip,
    /// Remove the rule's target field from the record.
    Clear,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub severity: Severity,
    /// Section the rule applies to; `None` applies it to every section.
    pub section: Option<String>,
    pub kind: RuleKind,
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    Normalize(NormalizeRule),
    Range(RangeRule),
    Vocabulary(VocabularyRule),
    CrossField(CrossFieldRule),
    CrossRecord(CrossRecordRule),
}

#[derive(Debug, Clone)]
pub struct NormalizeRule {
    pub field: String,
    pub required: bool,
    /// Raw value normalized in place of an absent field.
    pub default: Option<RawValue>,
    pub target: NormalizeTarget,
}

#[derive(Debug, Clone)]
pub enum NormalizeTarget {
    Text {
        options: TextOptions,
        pattern: Option<Pattern>,
    },
    Decimal {
        precision: u32,
        /// A zero amount is removed instead of kept.
        omit_zero: bool,
    },
    Integer,
    Date {
        formats: Vec<String>,
    },
    Code,
}

/// What a derived ratio does when its denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDenominator {
    #[default]
    Fail,
    /// Derive zero.
    Zero,
    /// Leave the target unset.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub value: Decimal,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: Decimal) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: Decimal) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangeRule {
    pub field: String,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct VocabularyRule {
    pub field: String,
    pub vocabulary: Vocabulary,
    pub mode: MatchMode,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    Field(String),
    Value(Decimal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrossFieldRule {
    /// `total` equals the sum of `components` within `tolerance`.
    SumEquals {
        total: String,
        components: Vec<String>,
        tolerance: Decimal,
    },
    /// `field` equals `numerator / denominator * multiplier` within `tolerance`.
    RatioMatches {
        field: String,
        numerator: String,
        denominator: String,
        multiplier: Decimal,
        tolerance: Decimal,
    },
    DeriveSum {
        target: String,
        components: Vec<String>,
        precision: u32,
    },
    DeriveRatio {
        target: String,
        numerator: String,
        denominator: String,
        multiplier: Decimal,
        precision: u32,
        on_zero: ZeroDenominator,
    },
    /// `target` gets `at_or_above` when `field >= threshold`, else `below`.
    Classify {
        target: String,
        field: String,
        threshold: Threshold,
        at_or_above: String,
        below: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossRecordRule {
    /// At most `max_per_key` records per key within a section.
    UniqueKey { key: Vec<String>, max_per_key: usize },
    /// The record's key must appear among `parent_section` records.
    ReferenceExists {
        key: Vec<String>,
        parent_section: String,
        parent_key: Vec<String>,
    },
    /// Stable sort of the section by key natural order.
    SortByKey { key: Vec<String> },
}

impl Rule {
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            severity: Severity::Hard,
            section: None,
            kind,
        }
    }

    #[must_use]
    pub fn soft(mut self) -> Self {
        self.severity = Severity::Soft;
        self
    }

    #[must_use]
    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn applies_to(&self, section: &str) -> bool {
        self.section.as_deref().is_none_or(|own| own == section)
    }

    pub fn is_cross_record(&self) -> bool {
        matches!(self.kind, RuleKind::CrossRecord(_))
    }

    /// Field written by `Set` or marked failed on coercion failure.
    pub fn target_field(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Normalize(rule) => Some(&rule.field),
            RuleKind::Vocabulary(rule) => Some(&rule.field),
            RuleKind::Range(_) | RuleKind::CrossRecord(_) => None,
            RuleKind::CrossField(rule) => match rule {
                CrossFieldRule::DeriveSum { target, .. }
                | CrossFieldRule::DeriveRatio { target, .. }
                | CrossFieldRule::Classify { target, .. } => Some(target),
                CrossFieldRule::SumEquals { .. } | CrossFieldRule::RatioMatches { .. } => None,
            },
        }
    }

    /// Field reported on a failure.
    pub fn subject_field(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Range(rule) => Some(&rule.field),
            RuleKind::CrossField(CrossFieldRule::SumEquals { total, .. }) => Some(total),
            RuleKind::CrossField(CrossFieldRule::RatioMatches { field, .. }) => Some(field),
            RuleKind::CrossRecord(
                CrossRecordRule::UniqueKey { key, .. }
                | CrossRecordRule::ReferenceExists { key, .. }
                | CrossRecordRule::SortByKey { key },
            ) => match key.as_slice() {
                [single] => Some(single),
                _ => None,
            },
            _ => self.target_field(),
        }
    }

    /// Fields read by the rule.
    pub fn inputs(&self) -> Vec<&str> {
        match &self.kind {
            RuleKind::Normalize(rule) => vec![&rule.field],
            RuleKind::Range(rule) => vec![&rule.field],
            RuleKind::Vocabulary(rule) => vec![&rule.field],
            RuleKind::CrossField(rule) => match rule {
                CrossFieldRule::SumEquals {
                    total, components, ..
                } => std::iter::once(total.as_str())
                    .chain(components.iter().map(String::as_str))
                    .collect(),
                CrossFieldRule::RatioMatches {
                    field,
                    numerator,
                    denominator,
                    ..
                } => vec![field, numerator, denominator],
                CrossFieldRule::DeriveSum { components, .. } => {
                    components.iter().map(String::as_str).collect()
                }
                CrossFieldRule::DeriveRatio {
                    numerator,
                    denominator,
                    ..
                } => vec![numerator, denominator],
                CrossFieldRule::Classify {
                    field, threshold, ..
                } => match threshold {
                    Threshold::Field(other) => vec![field, other],
                    Threshold::Value(_) => vec![field],
                },
            },
            RuleKind::CrossRecord(
                CrossRecordRule::UniqueKey { key, .. }
                | CrossRecordRule::ReferenceExists { key, .. }
                | CrossRecordRule::SortByKey { key },
            ) => key.iter().map(String::as_str).collect(),
        }
    }

    /// A failure of this rule means the target value could not be produced.
    pub(crate) fn is_coercion(&self) -> bool {
        matches!(self.kind, RuleKind::Normalize(_) | RuleKind::Vocabulary(_))
    }

    pub(crate) fn evaluate(&self, record: &WorkingRecord) -> Outcome {
        match &self.kind {
            RuleKind::Normalize(rule) => rule.evaluate(record),
            RuleKind::Range(rule) => rule.evaluate(record),
            RuleKind::Vocabulary(rule) => rule.evaluate(record),
            RuleKind::CrossField(rule) => rule.evaluate(record),
            RuleKind::CrossRecord(_) => Outcome::Skip,
        }
    }
}

impl NormalizeRule {
    fn evaluate(&self, record: &WorkingRecord) -> Outcome {
        let input = match (record.input(&self.field), &self.default) {
            (Some(input), _) => input,
            (None, Some(default)) => Input::Raw(default),
            (None, None) if self.required => {
                return Outcome::Fail("required value is missing".to_string());
            }
            (None, None) => return Outcome::Pass,
        };
        match self.coerce(input) {
            Ok(Some(CanonicalValue::Decimal(amount)))
                if amount.is_zero()
                    && matches!(self.target, NormalizeTarget::Decimal { omit_zero: true, .. }) =>
            {
                Outcome::Clear
            }
            Ok(Some(value)) => Outcome::Set(value),
            Ok(None) if self.required => {
                Outcome::Fail("value is empty after cleaning".to_string())
            }
            Ok(None) => Outcome::Set(CanonicalValue::Text(String::new())),
            Err(message) => Outcome::Fail(message),
        }
    }

    /// `Ok(None)` when cleaning leaves nothing.
    pub fn coerce(&self, input: Input<'_>) -> Result<Option<CanonicalValue>, String> {
        match &self.target {
            NormalizeTarget::Text { options, pattern } => {
                let cleaned = clean_text(&input.text(), options);
                if cleaned.is_empty() {
                    return Ok(None);
                }
                if let Some(pattern) = pattern
                    && !pattern.is_match(&cleaned)
                {
                    return Err(format!(
                        "'{cleaned}' does not match pattern {}",
                        pattern.as_str()
                    ));
                }
                Ok(Some(CanonicalValue::Text(cleaned)))
            }
            NormalizeTarget::Decimal { precision, .. } => {
                let amount = input
                    .decimal()
                    .ok_or_else(|| format!("'{}' is not a valid amount", input.text().trim()))?;
                amount
                    .round_half_even(*precision)
                    .map(|value| Some(CanonicalValue::Decimal(value)))
                    .map_err(|e| e.to_string())
            }
            NormalizeTarget::Integer => {
                let value = match input {
                    Input::Raw(RawValue::Integer(value))
                    | Input::Value(CanonicalValue::Integer(value)) => Some(*value),
                    _ => parse_integer(&input.text()),
                };
                value
                    .map(|value| Some(CanonicalValue::Integer(value)))
                    .ok_or_else(|| format!("'{}' is not a valid integer", input.text().trim()))
            }
            NormalizeTarget::Date { formats } => {
                if let Input::Value(CanonicalValue::Date(date)) = input {
                    return Ok(Some(CanonicalValue::Date(*date)));
                }
                let text = input.text();
                parse_date(&text, formats)
                    .map(|date| Some(CanonicalValue::Date(date)))
                    .ok_or_else(|| {
                        format!(
                            "'{}' does not match any accepted date format ({})",
                            text.trim(),
                            formats.join(", ")
                        )
                    })
            }
            NormalizeTarget::Code => {
                let code = normalize_code(&input.text());
                Ok((!code.is_empty()).then_some(CanonicalValue::Code(code)))
            }
        }
    }
}

impl RangeRule {
    fn evaluate(&self, record: &WorkingRecord) -> Outcome {
        let Some(input) = record.input(&self.field) else {
            return Outcome::Skip;
        };

        if self.min_length.is_some() || self.max_length.is_some() {
            let length = input.text().chars().count();
            if let Some(min) = self.min_length
                && length < min
            {
                return Outcome::Fail(format!("length {length} is below the minimum {min}"));
            }
            if let Some(max) = self.max_length
                && length > max
            {
                return Outcome::Fail(format!("length {length} exceeds the maximum {max}"));
            }
        }

        if self.min.is_none() && self.max.is_none() {
            return Outcome::Pass;
        }
        let Some(value) = input.decimal() else {
            return Outcome::Fail(format!("'{}' is not numeric", input.text().trim()));
        };
        if let Some(min) = self.min {
            let ok = if min.inclusive {
                value >= min.value
            } else {
                value > min.value
            };
            if !ok {
                let op = if min.inclusive { ">=" } else { ">" };
                return Outcome::Fail(format!("{value} is out of range: must be {op} {}", min.value));
            }
        }
        if let Some(max) = self.max {
            let ok = if max.inclusive {
                value <= max.value
            } else {
                value < max.value
            };
            if !ok {
                let op = if max.inclusive { "<=" } else { "<" };
                return Outcome::Fail(format!("{value} is out of range: must be {op} {}", max.value));
            }
        }
        Outcome::Pass
    }
}

impl VocabularyRule {
    fn evaluate(&self, record: &WorkingRecord) -> Outcome {
        let Some(input) = record.input(&self.field) else {
            return if self.required {
                Outcome::Fail("required value is missing".to_string())
            } else {
                Outcome::Skip
            };
        };
        let text = input.text();
        match resolve_code(&self.vocabulary, &text, self.mode) {
            Some(code) => Outcome::Set(CanonicalValue::Code(code)),
            None => Outcome::Fail(format!(
                "'{}' is not in vocabulary {}",
                text.trim(),
                self.vocabulary.name
            )),
        }
    }
}

impl CrossFieldRule {
    fn evaluate(&self, record: &WorkingRecord) -> Outcome {
        match self {
            CrossFieldRule::SumEquals {
                total,
                components,
                tolerance,
            } => {
                let Some(reported) = record.decimal(total) else {
                    return Outcome::Skip;
                };
                let Some(sum) = sum_of(record, components) else {
                    return Outcome::Skip;
                };
                match sum.and_then(|sum| reported.checked_sub(sum).map(|diff| (sum, diff))) {
                    Ok((_, diff)) if diff.abs() <= *tolerance => Outcome::Pass,
                    Ok((sum, _)) => Outcome::Fail(format!(
                        "{total} mismatch: reported={reported}, sum of components={sum}"
                    )),
                    Err(e) => Outcome::Fail(e.to_string()),
                }
            }
            CrossFieldRule::RatioMatches {
                field,
                numerator,
                denominator,
                multiplier,
                tolerance,
            } => {
                let (Some(reported), Some(num), Some(den)) = (
                    record.decimal(field),
                    record.decimal(numerator),
                    record.decimal(denominator),
                ) else {
                    return Outcome::Skip;
                };
                match ratio(num, den, *multiplier, RATIO_SCALE) {
                    Ok(calculated) => {
                        let within = reported
                            .checked_sub(calculated)
                            .map(|diff| diff.abs() <= *tolerance)
                            .unwrap_or(false);
                        if within {
                            Outcome::Pass
                        } else {
                            let shown = calculated.round_half_even(2).unwrap_or(calculated);
                            Outcome::Fail(format!(
                                "{field} mismatch: reported={reported}, calculated={shown}"
                            ))
                        }
                    }
                    Err(e) => Outcome::Fail(e.to_string()),
                }
            }
            CrossFieldRule::DeriveSum {
                components,
                precision,
                ..
            } => match sum_of(record, components) {
                None => Outcome::Skip,
                Some(sum) => match sum.and_then(|sum| sum.round_half_even(*precision)) {
                    Ok(value) => Outcome::Set(CanonicalValue::Decimal(value)),
                    Err(e) => Outcome::Fail(e.to_string()),
                },
            },
            CrossFieldRule::DeriveRatio {
                numerator,
                denominator,
                multiplier,
                precision,
                on_zero,
                ..
            } => {
                let (Some(num), Some(den)) = (record.decimal(numerator), record.decimal(denominator))
                else {
                    return Outcome::Skip;
                };
                if den.is_zero() {
                    match on_zero {
                        ZeroDenominator::Fail => {}
                        ZeroDenominator::Zero => {
                            return match Decimal::ZERO.round_half_even(*precision) {
                                Ok(zero) => Outcome::Set(CanonicalValue::Decimal(zero)),
                                Err(e) => Outcome::Fail(e.to_string()),
                            };
                        }
                        ZeroDenominator::Skip => return Outcome::Skip,
                    }
                }
                match ratio(num, den, *multiplier, *precision) {
                    Ok(value) => Outcome::Set(CanonicalValue::Decimal(value)),
                    Err(e) => Outcome::Fail(format!("cannot derive {numerator}/{denominator}: {e}")),
                }
            }
            CrossFieldRule::Classify {
                field,
                threshold,
                at_or_above,
                below,
                ..
            } => {
                let Some(value) = record.decimal(field) else {
                    return Outcome::Skip;
                };
                let limit = match threshold {
                    Threshold::Value(limit) => *limit,
                    Threshold::Field(other) => match record.decimal(other) {
                        Some(limit) => limit,
                        None => return Outcome::Skip,
                    },
                };
                let code = if value >= limit { at_or_above } else { below };
                Outcome::Set(CanonicalValue::Code(code.clone()))
            }
        }
    }
}

/// `None` when a component is absent.
fn sum_of(
    record: &WorkingRecord,
    components: &[String],
) -> Option<Result<Decimal, DecimalError>> {
    let mut values = Vec::with_capacity(components.len());
    for component in components {
        values.push(record.decimal(component)?);
    }
    Some(
        values
            .into_iter()
            .try_fold(Decimal::ZERO, Decimal::checked_add),
    )
}

/// `numerator * multiplier / denominator` at `scale`, half-even.
fn ratio(
    numerator: Decimal,
    denominator: Decimal,
    multiplier: Decimal,
    scale: u32,
) -> Result<Decimal, DecimalError> {
    numerator
        .checked_mul(multiplier)?
        .checked_div(denominator, scale)
}
