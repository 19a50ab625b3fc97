//! Controlled-vocabulary resolution.

use bankreg_model::Vocabulary;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Code or synonym, ignoring case.
    #[default]
    Strict,
    /// Strict, then codes and synonyms compared on letters and digits only.
    Lenient,
}

/// Creates a compact key by keeping only uppercase alphanumeric characters.
fn compact_key(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Canonical code for `raw`, if the vocabulary knows it.
pub fn resolve_code(vocabulary: &Vocabulary, raw: &str, mode: MatchMode) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(code) = vocabulary.resolve(trimmed) {
        return Some(code.to_string());
    }
    if mode == MatchMode::Strict {
        return None;
    }

    let input = compact_key(trimmed);
    if input.is_empty() {
        return None;
    }
    vocabulary.terms().find_map(|term| {
        let matches = compact_key(&term.code) == input
            || term
                .synonyms
                .iter()
                .any(|synonym| compact_key(synonym) == input);
        matches.then(|| term.code.clone())
    })
}
