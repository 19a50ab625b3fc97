//! Controlled vocabularies used by code-valued fields.
//!
//! A vocabulary is a closed set of codes. Each code may carry synonyms that
//! normalize to it. Lookups are case-insensitive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// The canonical code written to the report.
    pub code: String,
    pub label: Option<String>,
    pub synonyms: Vec<String>,
}

impl Term {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: None,
            synonyms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub name: String,
    /// Key: uppercase code.
    terms: BTreeMap<String, Term>,
    /// Uppercase synonym -> uppercase code.
    synonyms: BTreeMap<String, String>,
}

impl Vocabulary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: BTreeMap::new(),
            synonyms: BTreeMap::new(),
        }
    }

    pub fn add_term(&mut self, term: Term) {
        let key = term.code.to_uppercase();
        for synonym in &term.synonyms {
            let synonym_key = synonym.to_uppercase();
            if synonym_key != key {
                self.synonyms.insert(synonym_key, key.clone());
            }
        }
        self.terms.insert(key, term);
    }

    #[must_use]
    pub fn with_term(mut self, term: Term) -> Self {
        self.add_term(term);
        self
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.terms.values().map(|term| term.code.as_str())
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Canonical code for a code or synonym, ignoring case.
    pub fn resolve(&self, value: &str) -> Option<&str> {
        let key = value.trim().to_uppercase();
        let key = self.synonyms.get(&key).unwrap_or(&key);
        self.terms.get(key).map(|term| term.code.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.resolve(value).is_some()
    }
}

/// All vocabularies of a standards directory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct VocabularyRegistry {
    vocabularies: BTreeMap<String, Vocabulary>,
}

impl VocabularyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, vocabulary: Vocabulary) {
        self.vocabularies.insert(vocabulary.name.clone(), vocabulary);
    }

    pub fn get(&self, name: &str) -> Option<&Vocabulary> {
        self.vocabularies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vocabularies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vocabularies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabularies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_codes_and_synonyms_case_insensitively() {
        let vocabulary = Vocabulary::new("report_type")
            .with_term(Term::new("QUARTERLY").with_synonyms(["Q", "Quarter"]))
            .with_term(Term::new("ANNUAL"));
        assert_eq!(vocabulary.resolve("quarterly"), Some("QUARTERLY"));
        assert_eq!(vocabulary.resolve(" quarter "), Some("QUARTERLY"));
        assert_eq!(vocabulary.resolve("monthly"), None);
        assert_eq!(vocabulary.codes().collect::<Vec<_>>(), ["ANNUAL", "QUARTERLY"]);
    }
}
