use std::collections::BTreeSet;
use std::path::Path;

use bankreg_model::{SchemaModel, VocabularyRegistry};
use serde::{Deserialize, Serialize};

use crate::config::parse_rule_file;
use crate::error::RuleError;
use crate::rule::Rule;

/// What the engine does when a hard rule fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Exclude the record, report it, and continue.
    #[default]
    Quarantine,
    /// Stop the batch after the single-record phase.
    AbortBatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

/// An ordered, validated list of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    options: CleanOptions,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut ids = BTreeSet::new();
        for rule in &rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(RuleError::DuplicateId {
                    rule: rule.id.clone(),
                });
            }
        }
        Ok(Self {
            rules,
            options: CleanOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: CleanOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile a rule file. The schema, when given, supplies decimal
    /// precision for fields bound to leaves with `fractionDigits`.
    pub fn from_toml_str(
        text: &str,
        vocabularies: &VocabularyRegistry,
        schema: Option<&SchemaModel>,
    ) -> Result<Self, RuleError> {
        parse_rule_file(text, vocabularies, schema)
    }

    pub fn load(
        path: &Path,
        vocabularies: &VocabularyRegistry,
        schema: Option<&SchemaModel>,
    ) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, vocabularies, schema)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn options(&self) -> CleanOptions {
        self.options
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn single_record(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| !rule.is_cross_record())
    }

    pub(crate) fn cross_record(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.is_cross_record())
    }
}
