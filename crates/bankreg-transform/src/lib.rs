//! Rule engine: turns raw records into canonical records.
//!
//! A [`RuleSet`] is an ordered list of tagged rules, usually compiled from
//! `rules.toml`. [`clean`] runs it over one batch and returns the surviving
//! [`CanonicalRecord`](bankreg_model::CanonicalRecord)s together with the
//! data-quality errors of the records it excluded.

mod config;
pub mod engine;
pub mod error;
pub mod normalization;
mod record;
pub mod rule;
pub mod rule_set;

pub use engine::{CleanOutcome, clean, clean_with_options};
pub use error::RuleError;
pub use record::Input;
pub use rule::{
    Bound, CrossFieldRule, CrossRecordRule, NormalizeRule, NormalizeTarget, Outcome, RangeRule,
    Rule, RuleKind, Severity, Threshold, VocabularyRule, ZeroDenominator,
};
pub use rule_set::{CleanOptions, ErrorPolicy, RuleSet};
