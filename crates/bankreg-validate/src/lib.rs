//! Conformance validation: checks a report document against the schema
//! model and reports every violation with its document location.

mod validator;
mod value;

pub use validator::validate;
