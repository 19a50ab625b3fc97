//! Mutable record state while rules run. Frozen into a
//! [`CanonicalRecord`] once the engine is done with it.

use std::borrow::Cow;
use std::collections::BTreeMap;

use bankreg_model::{
    Annotation, CanonicalRecord, CanonicalValue, DataQualityError, Decimal, RawRecord, RawValue,
    RowIndex,
};

use crate::normalization::parse_amount;

#[derive(Debug, Clone)]
enum Slot {
    Raw(RawValue),
    Value(CanonicalValue),
    /// Coercion failed; later rules reading the field are skipped.
    Failed,
}

/// A field value as a rule sees it.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    Raw(&'a RawValue),
    Value(&'a CanonicalValue),
}

impl Input<'_> {
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Input::Raw(raw) => raw.as_text().unwrap_or_default(),
            Input::Value(value) => Cow::Owned(value.render()),
        }
    }

    /// Numeric view: typed numbers directly, text through amount parsing.
    pub fn decimal(&self) -> Option<Decimal> {
        match self {
            Input::Raw(RawValue::Integer(value)) => Some(Decimal::from_int(*value)),
            Input::Raw(RawValue::Float(value)) => Decimal::from_f64(*value).ok(),
            Input::Raw(RawValue::Text(text)) => parse_amount(text),
            Input::Raw(RawValue::Missing) => None,
            Input::Value(value) => value
                .as_decimal()
                .or_else(|| value.as_str().and_then(parse_amount)),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WorkingRecord {
    row: RowIndex,
    section: String,
    slots: BTreeMap<String, Slot>,
    annotations: Vec<Annotation>,
    errors: Vec<DataQualityError>,
}

impl WorkingRecord {
    pub(crate) fn from_raw(raw: &RawRecord) -> Self {
        let slots = raw
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), Slot::Raw(value.clone())))
            .collect();
        Self {
            row: raw.row,
            section: raw.section.clone(),
            slots,
            annotations: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn row(&self) -> RowIndex {
        self.row
    }

    pub(crate) fn section(&self) -> &str {
        &self.section
    }

    /// The field's current value; blank text counts as absent.
    pub(crate) fn input(&self, field: &str) -> Option<Input<'_>> {
        match self.slots.get(field)? {
            Slot::Raw(raw) if raw.is_missing() => None,
            Slot::Raw(raw) => Some(Input::Raw(raw)),
            Slot::Value(CanonicalValue::Text(text)) if text.is_empty() => None,
            Slot::Value(value) => Some(Input::Value(value)),
            Slot::Failed => None,
        }
    }

    /// The field as a canonical value, converting untouched raw input.
    pub(crate) fn value(&self, field: &str) -> Option<CanonicalValue> {
        match self.input(field)? {
            Input::Raw(raw) => passthrough(raw),
            Input::Value(value) => Some(value.clone()),
        }
    }

    pub(crate) fn decimal(&self, field: &str) -> Option<Decimal> {
        self.input(field).and_then(|input| input.decimal())
    }

    pub(crate) fn is_failed(&self, field: &str) -> bool {
        matches!(self.slots.get(field), Some(Slot::Failed))
    }

    pub(crate) fn set(&mut self, field: &str, value: CanonicalValue) {
        self.slots.insert(field.to_string(), Slot::Value(value));
    }

    pub(crate) fn clear(&mut self, field: &str) {
        self.slots.remove(field);
    }

    pub(crate) fn mark_failed(&mut self, field: &str) {
        self.slots.insert(field.to_string(), Slot::Failed);
    }

    pub(crate) fn annotate(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub(crate) fn reject(&mut self, error: DataQualityError) {
        self.errors.push(error);
    }

    pub(crate) fn is_rejected(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn take_errors(&mut self) -> Vec<DataQualityError> {
        std::mem::take(&mut self.errors)
    }

    /// Values of `fields` in order, `None` for absent ones.
    pub(crate) fn key(&self, fields: &[String]) -> Vec<Option<CanonicalValue>> {
        fields.iter().map(|field| self.value(field)).collect()
    }

    pub(crate) fn finish(self) -> CanonicalRecord {
        let fields = self
            .slots
            .into_iter()
            .filter_map(|(name, slot)| {
                let value = match slot {
                    Slot::Raw(raw) => passthrough(&raw),
                    Slot::Value(CanonicalValue::Text(text)) if text.is_empty() => None,
                    Slot::Value(value) => Some(value),
                    Slot::Failed => None,
                }?;
                Some((name, value))
            })
            .collect();
        CanonicalRecord::from_parts(self.row, self.section, fields, self.annotations)
    }
}

/// Canonical form of a field no normalize rule touched.
fn passthrough(raw: &RawValue) -> Option<CanonicalValue> {
    match raw {
        RawValue::Missing => None,
        RawValue::Text(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| CanonicalValue::Text(trimmed.to_string()))
        }
        RawValue::Integer(value) => Some(CanonicalValue::Integer(*value)),
        RawValue::Float(value) => Some(match Decimal::from_f64(*value) {
            Ok(decimal) => CanonicalValue::Decimal(decimal),
            Err(_) => CanonicalValue::Text(value.to_string()),
        }),
    }
}
