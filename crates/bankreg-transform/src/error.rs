use std::path::PathBuf;

/// Errors raised while loading or compiling a rule set.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RuleError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rule file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate rule id: {rule}")]
    DuplicateId { rule: String },

    #[error("rule {rule}: invalid pattern: {source}")]
    Pattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule {rule}: unknown vocabulary '{vocabulary}'")]
    UnknownVocabulary { rule: String, vocabulary: String },

    #[error("rule {rule}: invalid decimal '{value}' for {setting}")]
    InvalidDecimal {
        rule: String,
        setting: String,
        value: String,
    },

    #[error("rule {rule}: cannot resolve decimal precision for field {field}")]
    UnresolvedPrecision { rule: String, field: String },

    #[error("rule {rule}: {message}")]
    Invalid { rule: String, message: String },
}

impl RuleError {
    pub(crate) fn invalid(rule: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}
