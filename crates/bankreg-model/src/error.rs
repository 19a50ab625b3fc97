use thiserror::Error;

/// Errors raised while building the schema model or binding table.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    #[error("invalid cardinality at {path}: minOccurs {min} exceeds maxOccurs {max}")]
    InvalidOccurs { path: String, min: u32, max: u32 },

    #[error("duplicate child element {name} under {path}")]
    DuplicateChild { path: String, name: String },

    #[error("duplicate attribute {name} on {path}")]
    DuplicateAttribute { path: String, name: String },

    #[error("inconsistent facets at {path}: {message}")]
    InvalidFacets { path: String, message: String },

    #[error("section {section} is bound more than once")]
    DuplicateSection { section: String },

    #[error("section {section}: path {path} does not resolve in the schema")]
    UnresolvedPath { section: String, path: String },

    #[error("section {section}: anchor overlaps the anchor of section {other}")]
    NestedAnchor { section: String, other: String },

    #[error("section {section}: repeating element {path} above the anchor")]
    RepeatingAncestor { section: String, path: String },

    #[error("section {section}: field {field} crosses repeating element {path}")]
    RepeatingInFieldPath {
        section: String,
        field: String,
        path: String,
    },

    #[error("section {section}: field {field} is bound to non-leaf element {path}")]
    NotALeaf {
        section: String,
        field: String,
        path: String,
    },

    #[error("section {section}: {path} is bound by more than one field")]
    DuplicateBinding { section: String, path: String },

    #[error(transparent)]
    Decimal(#[from] DecimalError),
}

/// Failures of fixed-point decimal parsing and arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("invalid decimal literal '{input}'")]
    Invalid { input: String },
    #[error("decimal value out of range")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
}

pub type Result<T> = std::result::Result<T, ModelError>;
