//! Controlled vocabulary loader (`vocabularies.csv`).
//!
//! Columns: `vocabulary`, `code`, `label`, `synonyms` (semicolon-separated).

use std::path::Path;

use bankreg_model::{Term, Vocabulary, VocabularyRegistry};

use crate::csv_utils::{get_optional, read_csv_rows, require, split_list};
use crate::error::StandardsError;

pub fn load_vocabularies(path: &Path) -> Result<VocabularyRegistry, StandardsError> {
    let rows = read_csv_rows(path)?;
    let mut vocabularies: Vec<Vocabulary> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        let name = require(row, "vocabulary", path, line)?;
        let code = require(row, "code", path, line)?;
        let term = Term {
            code,
            label: get_optional(row, "label"),
            synonyms: split_list(&get_optional(row, "synonyms").unwrap_or_default()),
        };
        match vocabularies.iter_mut().find(|v| v.name == name) {
            Some(vocabulary) => vocabulary.add_term(term),
            None => vocabularies.push(Vocabulary::new(name).with_term(term)),
        }
    }

    let mut registry = VocabularyRegistry::new();
    for vocabulary in vocabularies {
        registry.insert(vocabulary);
    }
    Ok(registry)
}
