//! `rules.toml` parsing and compilation.
//!
//! Rules are declared as `[[rules]]` tables with an `id`, optional `section`
//! and `severity`, and a `kind` selecting the remaining keys. Decimal
//! settings accept numbers or strings; strings keep their exact digits.

use std::fmt;

use bankreg_model::decimal::MAX_SCALE;
use bankreg_model::{
    Decimal, Pattern, PrimitiveType, RawValue, SchemaModel, SectionBinding, VocabularyRegistry,
};
use regex::Regex;
use serde::Deserialize;
use serde::de::{self, Visitor};

use crate::error::RuleError;
use crate::normalization::{
    CaseFold, DEFAULT_DATE_FORMATS, MatchMode, TextOptions, is_valid_format,
};
use crate::rule::{
    Bound, CrossFieldRule, CrossRecordRule, NormalizeRule, NormalizeTarget, RangeRule, Rule,
    RuleKind, Severity, Threshold, VocabularyRule, ZeroDenominator,
};
use crate::rule_set::{CleanOptions, RuleSet};

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    engine: CleanOptions,
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
struct RuleSpec {
    id: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default)]
    section: Option<String>,
    #[serde(flatten)]
    kind: KindSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum KindSpec {
    Text(TextSpec),
    Decimal(DecimalSpec),
    Integer(IntegerSpec),
    Date(DateSpec),
    Code(CodeSpec),
    Range(RangeSpec),
    Vocabulary(VocabularySpec),
    SumEquals(SumEqualsSpec),
    RatioMatches(RatioMatchesSpec),
    DeriveSum(DeriveSumSpec),
    DeriveRatio(DeriveRatioSpec),
    Classify(ClassifySpec),
    UniqueKey(UniqueKeySpec),
    ReferenceExists(ReferenceExistsSpec),
    SortByKey(SortByKeySpec),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TextSpec {
    field: String,
    #[serde(default)]
    required: bool,
    default: Option<String>,
    #[serde(default)]
    case: CaseFold,
    #[serde(default = "default_true")]
    collapse_whitespace: bool,
    #[serde(default = "default_true")]
    remove_newlines: bool,
    #[serde(default)]
    remove_special: bool,
    #[serde(default)]
    remove_digits: bool,
    #[serde(default)]
    ascii_only: bool,
    remove: Option<String>,
    max_length: Option<usize>,
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecimalSpec {
    field: String,
    #[serde(default)]
    required: bool,
    default: Option<DecimalLiteral>,
    precision: Option<u32>,
    #[serde(default)]
    omit_zero: bool,
}

#[derive(Debug, Deserialize)]
struct IntegerSpec {
    field: String,
    #[serde(default)]
    required: bool,
    default: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DateSpec {
    field: String,
    #[serde(default)]
    required: bool,
    default: Option<String>,
    #[serde(default)]
    formats: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CodeSpec {
    field: String,
    #[serde(default)]
    required: bool,
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeSpec {
    field: String,
    min: Option<DecimalLiteral>,
    max: Option<DecimalLiteral>,
    min_exclusive: Option<DecimalLiteral>,
    max_exclusive: Option<DecimalLiteral>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct VocabularySpec {
    field: String,
    vocabulary: String,
    #[serde(default)]
    mode: MatchMode,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct SumEqualsSpec {
    total: String,
    components: Vec<String>,
    tolerance: Option<DecimalLiteral>,
}

#[derive(Debug, Deserialize)]
struct RatioMatchesSpec {
    field: String,
    numerator: String,
    denominator: String,
    multiplier: Option<DecimalLiteral>,
    tolerance: Option<DecimalLiteral>,
}

#[derive(Debug, Deserialize)]
struct DeriveSumSpec {
    target: String,
    components: Vec<String>,
    precision: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DeriveRatioSpec {
    target: String,
    numerator: String,
    denominator: String,
    multiplier: Option<DecimalLiteral>,
    precision: Option<u32>,
    #[serde(default)]
    on_zero: ZeroDenominator,
}

#[derive(Debug, Deserialize)]
struct ClassifySpec {
    target: String,
    field: String,
    threshold_field: Option<String>,
    threshold: Option<DecimalLiteral>,
    at_or_above: String,
    below: String,
}

#[derive(Debug, Deserialize)]
struct UniqueKeySpec {
    key: Vec<String>,
    #[serde(default = "default_max_per_key")]
    max_per_key: usize,
}

fn default_max_per_key() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct ReferenceExistsSpec {
    key: Vec<String>,
    parent_section: String,
    #[serde(default)]
    parent_key: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SortByKeySpec {
    key: Vec<String>,
}

/// A decimal setting as written in the file, before parsing.
#[derive(Debug, Clone)]
struct DecimalLiteral(String);

impl<'de> Deserialize<'de> for DecimalLiteral {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LiteralVisitor;

        impl Visitor<'_> for LiteralVisitor {
            type Value = DecimalLiteral;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal number or string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(DecimalLiteral(value.trim().to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(DecimalLiteral(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(DecimalLiteral(value.to_string()))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
                Ok(DecimalLiteral(value.to_string()))
            }
        }

        deserializer.deserialize_any(LiteralVisitor)
    }
}

pub(crate) fn parse_rule_file(
    text: &str,
    vocabularies: &VocabularyRegistry,
    schema: Option<&SchemaModel>,
) -> Result<RuleSet, RuleError> {
    let file: RuleFile = toml::from_str(text)?;
    let compiler = Compiler {
        vocabularies,
        schema,
    };
    let rules = file
        .rules
        .into_iter()
        .map(|spec| compiler.compile(spec))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleSet::new(rules)?.with_options(file.engine))
}

struct Compiler<'a> {
    vocabularies: &'a VocabularyRegistry,
    schema: Option<&'a SchemaModel>,
}

impl Compiler<'_> {
    fn compile(&self, spec: RuleSpec) -> Result<Rule, RuleError> {
        let id = spec.id;
        let section = spec.section;
        let kind = self.compile_kind(&id, section.as_deref(), spec.kind)?;
        Ok(Rule {
            id,
            severity: spec.severity,
            section,
            kind,
        })
    }

    fn compile_kind(
        &self,
        id: &str,
        section: Option<&str>,
        kind: KindSpec,
    ) -> Result<RuleKind, RuleError> {
        let kind = match kind {
            KindSpec::Text(spec) => {
                let options = TextOptions {
                    remove_newlines: spec.remove_newlines,
                    collapse_whitespace: spec.collapse_whitespace,
                    remove_special: spec.remove_special,
                    remove_digits: spec.remove_digits,
                    ascii_only: spec.ascii_only,
                    case: spec.case,
                    remove: spec
                        .remove
                        .as_deref()
                        .map(|source| regex(id, source))
                        .transpose()?,
                    max_length: spec.max_length,
                };
                let pattern = spec
                    .pattern
                    .as_deref()
                    .map(|source| {
                        Pattern::new(source).map_err(|source| RuleError::Pattern {
                            rule: id.to_string(),
                            source,
                        })
                    })
                    .transpose()?;
                RuleKind::Normalize(NormalizeRule {
                    field: spec.field,
                    required: spec.required,
                    default: spec.default.map(RawValue::Text),
                    target: NormalizeTarget::Text { options, pattern },
                })
            }
            KindSpec::Decimal(spec) => {
                if spec.omit_zero && spec.required {
                    return Err(RuleError::invalid(id, "omit_zero conflicts with required"));
                }
                let precision = match spec.precision {
                    Some(precision) => check_precision(id, precision)?,
                    None => self.resolve_precision(id, section, &spec.field)?,
                };
                let default = spec
                    .default
                    .map(|literal| {
                        decimal(id, "default", &literal).map(|_| RawValue::Text(literal.0))
                    })
                    .transpose()?;
                RuleKind::Normalize(NormalizeRule {
                    field: spec.field,
                    required: spec.required,
                    default,
                    target: NormalizeTarget::Decimal {
                        precision,
                        omit_zero: spec.omit_zero,
                    },
                })
            }
            KindSpec::Integer(spec) => RuleKind::Normalize(NormalizeRule {
                field: spec.field,
                required: spec.required,
                default: spec.default.map(RawValue::Integer),
                target: NormalizeTarget::Integer,
            }),
            KindSpec::Date(spec) => {
                let formats = if spec.formats.is_empty() {
                    DEFAULT_DATE_FORMATS.iter().map(|f| (*f).to_string()).collect()
                } else {
                    spec.formats
                };
                if let Some(bad) = formats.iter().find(|format| !is_valid_format(format)) {
                    return Err(RuleError::invalid(id, format!("invalid date format '{bad}'")));
                }
                RuleKind::Normalize(NormalizeRule {
                    field: spec.field,
                    required: spec.required,
                    default: spec.default.map(RawValue::Text),
                    target: NormalizeTarget::Date { formats },
                })
            }
            KindSpec::Code(spec) => RuleKind::Normalize(NormalizeRule {
                field: spec.field,
                required: spec.required,
                default: spec.default.map(RawValue::Text),
                target: NormalizeTarget::Code,
            }),
            KindSpec::Range(spec) => {
                let min = pick_bound(id, "min", spec.min.as_ref(), spec.min_exclusive.as_ref())?;
                let max = pick_bound(id, "max", spec.max.as_ref(), spec.max_exclusive.as_ref())?;
                if min.is_none()
                    && max.is_none()
                    && spec.min_length.is_none()
                    && spec.max_length.is_none()
                {
                    return Err(RuleError::invalid(id, "range rule without bounds"));
                }
                if let (Some(min), Some(max)) = (min, max)
                    && min.value > max.value
                {
                    return Err(RuleError::invalid(id, "min bound exceeds max bound"));
                }
                RuleKind::Range(RangeRule {
                    field: spec.field,
                    min,
                    max,
                    min_length: spec.min_length,
                    max_length: spec.max_length,
                })
            }
            KindSpec::Vocabulary(spec) => {
                let vocabulary = self.vocabularies.get(&spec.vocabulary).ok_or_else(|| {
                    RuleError::UnknownVocabulary {
                        rule: id.to_string(),
                        vocabulary: spec.vocabulary.clone(),
                    }
                })?;
                RuleKind::Vocabulary(VocabularyRule {
                    field: spec.field,
                    vocabulary: vocabulary.clone(),
                    mode: spec.mode,
                    required: spec.required,
                })
            }
            KindSpec::SumEquals(spec) => {
                non_empty(id, "components", &spec.components)?;
                RuleKind::CrossField(CrossFieldRule::SumEquals {
                    total: spec.total,
                    components: spec.components,
                    tolerance: optional_decimal(
                        id,
                        "tolerance",
                        spec.tolerance.as_ref(),
                        Decimal::ZERO,
                    )?,
                })
            }
            KindSpec::RatioMatches(spec) => RuleKind::CrossField(CrossFieldRule::RatioMatches {
                field: spec.field,
                numerator: spec.numerator,
                denominator: spec.denominator,
                multiplier: optional_decimal(
                        id,
                        "multiplier",
                        spec.multiplier.as_ref(),
                        Decimal::from_int(1),
                    )?,
                tolerance: optional_decimal(
                        id,
                        "tolerance",
                        spec.tolerance.as_ref(),
                        Decimal::ZERO,
                    )?,
            }),
            KindSpec::DeriveSum(spec) => {
                non_empty(id, "components", &spec.components)?;
                let precision = match spec.precision {
                    Some(precision) => check_precision(id, precision)?,
                    None => self.resolve_precision(id, section, &spec.target)?,
                };
                RuleKind::CrossField(CrossFieldRule::DeriveSum {
                    target: spec.target,
                    components: spec.components,
                    precision,
                })
            }
            KindSpec::DeriveRatio(spec) => {
                let precision = match spec.precision {
                    Some(precision) => check_precision(id, precision)?,
                    None => self.resolve_precision(id, section, &spec.target)?,
                };
                RuleKind::CrossField(CrossFieldRule::DeriveRatio {
                    target: spec.target,
                    numerator: spec.numerator,
                    denominator: spec.denominator,
                    multiplier: optional_decimal(
                        id,
                        "multiplier",
                        spec.multiplier.as_ref(),
                        Decimal::from_int(1),
                    )?,
                    precision,
                    on_zero: spec.on_zero,
                })
            }
            KindSpec::Classify(spec) => {
                let threshold = match (spec.threshold_field, spec.threshold) {
                    (Some(field), None) => Threshold::Field(field),
                    (None, Some(literal)) => Threshold::Value(decimal(id, "threshold", &literal)?),
                    _ => {
                        return Err(RuleError::invalid(
                            id,
                            "classify needs exactly one of threshold or threshold_field",
                        ));
                    }
                };
                RuleKind::CrossField(CrossFieldRule::Classify {
                    target: spec.target,
                    field: spec.field,
                    threshold,
                    at_or_above: spec.at_or_above,
                    below: spec.below,
                })
            }
            KindSpec::UniqueKey(spec) => {
                non_empty(id, "key", &spec.key)?;
                if spec.max_per_key == 0 {
                    return Err(RuleError::invalid(id, "max_per_key must be at least 1"));
                }
                RuleKind::CrossRecord(CrossRecordRule::UniqueKey {
                    key: spec.key,
                    max_per_key: spec.max_per_key,
                })
            }
            KindSpec::ReferenceExists(spec) => {
                non_empty(id, "key", &spec.key)?;
                if section.is_none() {
                    return Err(RuleError::invalid(id, "reference_exists needs a section"));
                }
                let parent_key = if spec.parent_key.is_empty() {
                    spec.key.clone()
                } else {
                    spec.parent_key
                };
                if parent_key.len() != spec.key.len() {
                    return Err(RuleError::invalid(id, "key and parent_key differ in length"));
                }
                RuleKind::CrossRecord(CrossRecordRule::ReferenceExists {
                    key: spec.key,
                    parent_section: spec.parent_section,
                    parent_key,
                })
            }
            KindSpec::SortByKey(spec) => {
                non_empty(id, "key", &spec.key)?;
                if section.is_none() {
                    return Err(RuleError::invalid(id, "sort_by_key needs a section"));
                }
                RuleKind::CrossRecord(CrossRecordRule::SortByKey { key: spec.key })
            }
        };
        Ok(kind)
    }

    /// `fractionDigits` of the leaf `field` is bound to.
    fn resolve_precision(
        &self,
        id: &str,
        section: Option<&str>,
        field: &str,
    ) -> Result<u32, RuleError> {
        let unresolved = || RuleError::UnresolvedPrecision {
            rule: id.to_string(),
            field: field.to_string(),
        };
        let schema = self.schema.ok_or_else(unresolved)?;
        let sections: Vec<&SectionBinding> = match section {
            Some(name) => schema.bindings().section(name).into_iter().collect(),
            None => schema.bindings().sections().iter().collect(),
        };
        let leaf = sections
            .into_iter()
            .find_map(|binding| {
                let target = binding.fields.iter().find(|b| b.field == field)?;
                let path = binding.anchor.join(&target.path);
                let node = schema.resolve(&path)?;
                match path.attribute() {
                    Some(name) => node.attribute(name).map(|attribute| &attribute.leaf),
                    None => node.leaf_type(),
                }
            })
            .ok_or_else(unresolved)?;
        match (leaf.facets.fraction_digits, leaf.base) {
            (Some(digits), _) => check_precision(id, digits),
            (None, PrimitiveType::Integer) => Ok(0),
            (None, _) => Err(unresolved()),
        }
    }
}

fn regex(id: &str, source: &str) -> Result<Regex, RuleError> {
    Regex::new(source).map_err(|source| RuleError::Pattern {
        rule: id.to_string(),
        source,
    })
}

fn check_precision(id: &str, precision: u32) -> Result<u32, RuleError> {
    if precision > MAX_SCALE {
        return Err(RuleError::invalid(
            id,
            format!("precision {precision} exceeds {MAX_SCALE}"),
        ));
    }
    Ok(precision)
}

fn decimal(id: &str, setting: &str, literal: &DecimalLiteral) -> Result<Decimal, RuleError> {
    Decimal::parse(&literal.0).map_err(|_| RuleError::InvalidDecimal {
        rule: id.to_string(),
        setting: setting.to_string(),
        value: literal.0.clone(),
    })
}

fn optional_decimal(
    id: &str,
    setting: &str,
    literal: Option<&DecimalLiteral>,
    fallback: Decimal,
) -> Result<Decimal, RuleError> {
    literal.map_or(Ok(fallback), |literal| decimal(id, setting, literal))
}

fn pick_bound(
    id: &str,
    name: &str,
    inclusive: Option<&DecimalLiteral>,
    exclusive: Option<&DecimalLiteral>,
) -> Result<Option<Bound>, RuleError> {
    match (inclusive, exclusive) {
        (None, None) => Ok(None),
        (Some(literal), None) => Ok(Some(Bound::inclusive(decimal(id, name, literal)?))),
        (None, Some(literal)) => Ok(Some(Bound::exclusive(decimal(
            id,
            &format!("{name}_exclusive"),
            literal,
        )?))),
        (Some(_), Some(_)) => Err(RuleError::invalid(
            id,
            format!("both {name} and {name}_exclusive given"),
        )),
    }
}

fn non_empty(id: &str, setting: &str, values: &[String]) -> Result<(), RuleError> {
    if values.is_empty() {
        return Err(RuleError::invalid(id, format!("{setting} must not be empty")));
    }
    Ok(())
}
