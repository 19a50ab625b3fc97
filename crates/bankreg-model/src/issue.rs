//! Record-level data-quality errors and document-level validation errors.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::decimal::Decimal;
use crate::schema::PrimitiveType;
use crate::value::RowIndex;

/// A hard rule failure that excluded one source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityError {
    pub row: RowIndex,
    pub section: String,
    /// `None` for rules that judge the record as a whole.
    pub field: Option<String>,
    pub rule: String,
    pub message: String,
}

impl fmt::Display for DataQualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}", self.section, self.row)?;
        if let Some(field) = &self.field {
            write!(f, " field {field}")?;
        }
        write!(f, ": {} [{}]", self.message, self.rule)
    }
}

/// One step of a document location: element name and 1-based position
/// among same-named siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub position: usize,
}

/// Path from the document root to an element or attribute.
///
/// Renders as `Report/Item[2]/Amount`; positions of 1 are left implicit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    segments: Vec<PathSegment>,
    attribute: Option<String>,
}

impl Location {
    pub fn root(name: &str) -> Self {
        Self {
            segments: vec![PathSegment {
                name: name.to_string(),
                position: 1,
            }],
            attribute: None,
        }
    }

    #[must_use]
    pub fn child(&self, name: &str, position: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment {
            name: name.to_string(),
            position,
        });
        Self {
            segments,
            attribute: None,
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Self {
        Self {
            segments: self.segments.clone(),
            attribute: Some(name.to_string()),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            f.write_str(&segment.name)?;
            if segment.position > 1 {
                write!(f, "[{}]", segment.position)?;
            }
        }
        if let Some(attribute) = &self.attribute {
            write!(f, "/@{attribute}")?;
        }
        Ok(())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The schema constraint a document violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Constraint {
    RootElement { expected: String },
    UndeclaredElement,
    UndeclaredAttribute,
    MissingAttribute,
    DuplicateAttribute,
    Namespace {
        expected: Option<String>,
        actual: Option<String>,
    },
    SequenceOrder { after: String },
    MinOccurs { min: u32, actual: u32 },
    MaxOccurs { max: u32, actual: u32 },
    MixedContent,
    Lexical { base: PrimitiveType },
    Length { expected: usize, actual: usize },
    MinLength { min: usize, actual: usize },
    MaxLength { max: usize, actual: usize },
    Pattern { pattern: String },
    Enumeration { allowed: Vec<String> },
    TotalDigits { max: u32, actual: u32 },
    FractionDigits { max: u32, actual: u32 },
    MinInclusive { bound: Decimal },
    MaxInclusive { bound: Decimal },
    MinExclusive { bound: Decimal },
    MaxExclusive { bound: Decimal },
    Fixed { expected: String },
}

impl Constraint {
    /// Stable identifier used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            Constraint::RootElement { .. } => "root-element",
            Constraint::UndeclaredElement => "undeclared-element",
            Constraint::UndeclaredAttribute => "undeclared-attribute",
            Constraint::MissingAttribute => "missing-attribute",
            Constraint::DuplicateAttribute => "duplicate-attribute",
            Constraint::Namespace { .. } => "namespace",
            Constraint::SequenceOrder { .. } => "sequence-order",
            Constraint::MinOccurs { .. } => "min-occurs",
            Constraint::MaxOccurs { .. } => "max-occurs",
            Constraint::MixedContent => "mixed-content",
            Constraint::Lexical { .. } => "type",
            Constraint::Length { .. } => "facet:length",
            Constraint::MinLength { .. } => "facet:minLength",
            Constraint::MaxLength { .. } => "facet:maxLength",
            Constraint::Pattern { .. } => "facet:pattern",
            Constraint::Enumeration { .. } => "facet:enumeration",
            Constraint::TotalDigits { .. } => "facet:totalDigits",
            Constraint::FractionDigits { .. } => "facet:fractionDigits",
            Constraint::MinInclusive { .. } => "facet:minInclusive",
            Constraint::MaxInclusive { .. } => "facet:maxInclusive",
            Constraint::MinExclusive { .. } => "facet:minExclusive",
            Constraint::MaxExclusive { .. } => "facet:maxExclusive",
            Constraint::Fixed { .. } => "fixed",
        }
    }
}

/// One localized conformance failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub location: Location,
    pub constraint: Constraint,
    pub message: String,
}

impl ValidationError {
    pub fn new(location: Location, constraint: Constraint, message: impl Into<String>) -> Self {
        Self {
            location,
            constraint,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.constraint.code()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.location, self.message, self.code())
    }
}
