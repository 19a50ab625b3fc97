//! Text cleaning.

use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFold {
    #[default]
    Preserve,
    Upper,
    Lower,
    Title,
}

/// Cleaning steps, applied in field order.
#[derive(Debug, Clone)]
pub struct TextOptions {
    pub remove_newlines: bool,
    pub collapse_whitespace: bool,
    /// Drop everything except ASCII letters, digits and whitespace.
    pub remove_special: bool,
    pub remove_digits: bool,
    pub ascii_only: bool,
    pub case: CaseFold,
    /// Matches are deleted after case folding and trimming.
    pub remove: Option<Regex>,
    pub max_length: Option<usize>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            remove_newlines: true,
            collapse_whitespace: true,
            remove_special: false,
            remove_digits: false,
            ascii_only: false,
            case: CaseFold::Preserve,
            remove: None,
            max_length: None,
        }
    }
}

pub fn clean_text(value: &str, options: &TextOptions) -> String {
    let mut text = if options.remove_newlines {
        value.replace(['\n', '\r', '\t'], " ")
    } else {
        value.to_string()
    };

    if options.collapse_whitespace {
        text = collapse_whitespace(&text);
    }
    if options.remove_special {
        text.retain(|ch| ch.is_ascii_alphanumeric() || ch.is_whitespace());
    }
    if options.remove_digits {
        text.retain(|ch| !ch.is_ascii_digit());
    }
    if options.ascii_only {
        text.retain(|ch| ch.is_ascii());
    }

    text = match options.case {
        CaseFold::Preserve => text,
        CaseFold::Upper => text.to_uppercase(),
        CaseFold::Lower => text.to_lowercase(),
        CaseFold::Title => title_case(&text),
    };

    let mut text = text.trim().to_string();
    if let Some(remove) = &options.remove {
        text = remove.replace_all(&text, "").trim().to_string();
    }
    if let Some(max) = options.max_length
        && text.chars().count() > max
    {
        text = text.chars().take(max).collect::<String>().trim().to_string();
    }
    text
}

/// Upper-cased token with inner whitespace collapsed.
pub fn normalize_code(value: &str) -> String {
    collapse_whitespace(value.trim()).to_uppercase()
}

fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_collapse_and_trim() {
        let cleaned = clean_text("  Hello   World!\n\n  Extra   Spaces  ", &TextOptions::default());
        assert_eq!(cleaned, "Hello World! Extra Spaces");
    }

    #[test]
    fn identifier_cleaning_uses_remove_pattern() {
        let options = TextOptions {
            case: CaseFold::Upper,
            remove: Some(Regex::new("[^A-Z0-9-]").expect("regex")),
            ..TextOptions::default()
        };
        assert_eq!(clean_text(" us-bank 12345 ", &options), "US-BANK12345");
    }

    #[test]
    fn currency_cleaning_truncates() {
        let options = TextOptions {
            case: CaseFold::Upper,
            remove_special: true,
            remove_digits: true,
            max_length: Some(3),
            ..TextOptions::default()
        };
        assert_eq!(clean_text("usd1$", &options), "USD");
        assert_eq!(clean_text("eur o", &options), "EUR");
    }

    #[test]
    fn title_case_restarts_after_non_letters() {
        let options = TextOptions {
            case: CaseFold::Title,
            ..TextOptions::default()
        };
        assert_eq!(clean_text("first NATIONAL bank-corp", &options), "First National Bank-Corp");
    }

    #[test]
    fn ascii_only_drops_other_characters() {
        let options = TextOptions {
            ascii_only: true,
            ..TextOptions::default()
        };
        assert_eq!(clean_text("Banque Générale", &options), "Banque Gnrale");
    }

    #[test]
    fn codes_are_upper_cased_tokens() {
        assert_eq!(normalize_code("  ad   hoc "), "AD HOC");
    }
}
