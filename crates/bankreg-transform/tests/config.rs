use bankreg_model::{
    AttributeDecl, CanonicalValue, Decimal, LeafType, PrimitiveType, RawRecord, SchemaModel,
    SchemaNode, SectionBinding, Term, Vocabulary, VocabularyRegistry,
};
use bankreg_transform::{
    CrossFieldRule, ErrorPolicy, NormalizeTarget, RuleError, RuleKind, RuleSet, Severity, clean,
};

fn schema() -> SchemaModel {
    let root = SchemaNode::sequence(
        "Report",
        vec![
            SchemaNode::sequence(
                "Capital",
                vec![
                    SchemaNode::leaf("Tier1", LeafType::decimal().with_fraction_digits(2)),
                    SchemaNode::leaf("Ratio", LeafType::decimal().with_fraction_digits(4)),
                ],
            ),
            SchemaNode::leaf("Count", LeafType::new(PrimitiveType::Integer)),
        ],
    )
    .with_attribute(AttributeDecl::required(
        "threshold",
        LeafType::decimal().with_fraction_digits(1),
    ));
    let sections = vec![
        SectionBinding::new("bank", "")
            .field("count", "Count")
            .field("threshold", "@threshold"),
        SectionBinding::new("capital", "Capital")
            .field("tier1", "Tier1")
            .field("ratio", "Ratio"),
    ];
    SchemaModel::new(root, sections).expect("schema")
}

fn vocabularies() -> VocabularyRegistry {
    let mut registry = VocabularyRegistry::new();
    registry.insert(
        Vocabulary::new("currency")
            .with_term(Term::new("USD").with_synonyms(["US Dollar"]))
            .with_term(Term::new("EUR")),
    );
    registry
}

fn compile(text: &str) -> Result<RuleSet, RuleError> {
    let schema = schema();
    RuleSet::from_toml_str(text, &vocabularies(), Some(&schema))
}

#[test]
fn compiles_rules_in_declared_order() {
    let rules = compile(
        r#"
[engine]
error_policy = "abort_batch"

[[rules]]
id = "capital.tier1"
section = "capital"
kind = "decimal"
field = "tier1"
required = true

[[rules]]
id = "capital.currency"
kind = "vocabulary"
field = "currency"
vocabulary = "currency"
mode = "lenient"
severity = "soft"

[[rules]]
id = "capital.ratio"
section = "capital"
kind = "derive_ratio"
target = "ratio"
numerator = "tier1"
denominator = "rwa"
multiplier = 100
"#,
    )
    .expect("compile");

    assert_eq!(rules.options().error_policy, ErrorPolicy::AbortBatch);
    let ids: Vec<&str> = rules.rules().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["capital.tier1", "capital.currency", "capital.ratio"]);
    assert_eq!(rules.rules()[1].severity, Severity::Soft);
    assert_eq!(rules.rules()[0].section.as_deref(), Some("capital"));
    assert!(rules.rules()[1].section.is_none());

    let RuleKind::CrossField(CrossFieldRule::DeriveRatio {
        precision,
        multiplier,
        ..
    }) = &rules.rules()[2].kind
    else {
        panic!("expected derive_ratio");
    };
    assert_eq!(*precision, 4);
    assert_eq!(*multiplier, Decimal::from_int(100));
}

#[test]
fn precision_comes_from_the_bound_leaf() {
    let rules = compile(
        r#"
[[rules]]
id = "tier1"
section = "capital"
kind = "decimal"
field = "tier1"

[[rules]]
id = "count"
section = "bank"
kind = "decimal"
field = "count"

[[rules]]
id = "threshold"
kind = "decimal"
field = "threshold"

[[rules]]
id = "explicit"
kind = "decimal"
field = "unbound"
precision = 3
"#,
    )
    .expect("compile");

    let precisions: Vec<u32> = rules
        .rules()
        .iter()
        .map(|rule| match &rule.kind {
            RuleKind::Normalize(normalize) => match normalize.target {
                NormalizeTarget::Decimal { precision, .. } => precision,
                _ => panic!("expected decimal target"),
            },
            _ => panic!("expected normalize rule"),
        })
        .collect();
    assert_eq!(precisions, vec![2, 0, 1, 3]);
}

#[test]
fn compiled_rules_clean_records() {
    let rules = compile(
        r#"
[[rules]]
id = "tier1"
section = "capital"
kind = "decimal"
field = "tier1"
required = true

[[rules]]
id = "tier1.range"
section = "capital"
kind = "range"
field = "tier1"
min = "0"

[[rules]]
id = "currency"
kind = "vocabulary"
field = "currency"
vocabulary = "currency"
"#,
    )
    .expect("compile");
    let raw = vec![
        RawRecord::new(1, "capital")
            .with_field("tier1", "$5,000.125")
            .with_field("currency", "us dollar"),
        RawRecord::new(2, "capital")
            .with_field("tier1", "-1")
            .with_field("currency", "EUR"),
    ];

    let outcome = clean(&raw, &rules);

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(
        record.get("tier1").map(CanonicalValue::render).as_deref(),
        Some("5000.12")
    );
    assert_eq!(
        record.get("currency"),
        Some(&CanonicalValue::Code("USD".to_string()))
    );
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].rule, "tier1.range");
}

#[test]
fn zero_amounts_drop_and_zero_denominators_derive_zero() {
    let rules = compile(
        r#"
[[rules]]
id = "impaired"
section = "capital"
kind = "decimal"
field = "impaired"
precision = 2
omit_zero = true

[[rules]]
id = "rate"
section = "capital"
kind = "derive_ratio"
target = "rate"
numerator = "impaired"
denominator = "exposure"
multiplier = 100
precision = 2
on_zero = "zero"
"#,
    )
    .expect("compile");
    let raw = vec![
        RawRecord::new(1, "capital")
            .with_field("impaired", "0.00")
            .with_field("exposure", "0"),
        RawRecord::new(2, "capital")
            .with_field("impaired", "50")
            .with_field("exposure", "0"),
        RawRecord::new(3, "capital")
            .with_field("impaired", "50")
            .with_field("exposure", "200"),
    ];

    let outcome = clean(&raw, &rules);

    assert!(outcome.is_clean(), "{:?}", outcome.errors);
    let rendered: Vec<(Option<String>, Option<String>)> = outcome
        .records
        .iter()
        .map(|record| {
            (
                record.get("impaired").map(CanonicalValue::render),
                record.get("rate").map(CanonicalValue::render),
            )
        })
        .collect();
    assert_eq!(
        rendered,
        vec![
            (None, None),
            (Some("50.00".to_string()), Some("0.00".to_string())),
            (Some("50.00".to_string()), Some("25.00".to_string())),
        ]
    );
}

#[test]
fn rejects_omit_zero_on_required_amounts() {
    let error = compile(
        r#"
[[rules]]
id = "tier1"
kind = "decimal"
field = "tier1"
precision = 2
required = true
omit_zero = true
"#,
    )
    .expect_err("conflicting settings");
    assert!(error.to_string().contains("omit_zero"), "{error}");
}

#[test]
fn rejects_duplicate_ids() {
    let error = compile(
        r#"
[[rules]]
id = "a"
kind = "code"
field = "x"

[[rules]]
id = "a"
kind = "code"
field = "y"
"#,
    )
    .expect_err("duplicate");
    assert!(matches!(error, RuleError::DuplicateId { ref rule } if rule == "a"));
}

#[test]
fn rejects_unknown_vocabulary() {
    let error = compile(
        r#"
[[rules]]
id = "kind"
kind = "vocabulary"
field = "kind"
vocabulary = "colour"
"#,
    )
    .expect_err("unknown vocabulary");
    assert!(matches!(
        error,
        RuleError::UnknownVocabulary { ref vocabulary, .. } if vocabulary == "colour"
    ));
}

#[test]
fn rejects_unresolvable_precision() {
    let error = compile(
        r#"
[[rules]]
id = "fee"
kind = "decimal"
field = "fee"
"#,
    )
    .expect_err("unresolved precision");
    assert_eq!(
        error.to_string(),
        "rule fee: cannot resolve decimal precision for field fee"
    );

    let error = RuleSet::from_toml_str(
        "[[rules]]\nid = \"t\"\nkind = \"decimal\"\nfield = \"tier1\"\n",
        &vocabularies(),
        None,
    )
    .expect_err("no schema");
    assert!(matches!(error, RuleError::UnresolvedPrecision { .. }));
}

#[test]
fn rejects_bad_patterns_and_formats() {
    let error = compile(
        r#"
[[rules]]
id = "name"
kind = "text"
field = "name"
pattern = "[A-Z"
"#,
    )
    .expect_err("bad pattern");
    assert!(matches!(error, RuleError::Pattern { .. }));

    let error = compile(
        r#"
[[rules]]
id = "date"
kind = "date"
field = "start"
formats = ["%Y-%Q"]
"#,
    )
    .expect_err("bad format");
    assert!(matches!(error, RuleError::Invalid { .. }));
}

#[test]
fn rejects_empty_components_and_bad_decimals() {
    let error = compile(
        r#"
[[rules]]
id = "total"
kind = "derive_sum"
target = "total"
components = []
precision = 2
"#,
    )
    .expect_err("empty components");
    assert_eq!(error.to_string(), "rule total: components must not be empty");

    let error = compile(
        r#"
[[rules]]
id = "weight"
kind = "range"
field = "weight"
max = "lots"
"#,
    )
    .expect_err("bad decimal");
    assert!(matches!(error, RuleError::InvalidDecimal { ref setting, .. } if setting == "max"));
}

#[test]
fn rejects_unknown_kinds() {
    let error = compile("[[rules]]\nid = \"x\"\nkind = \"teleport\"\nfield = \"x\"\n")
        .expect_err("unknown kind");
    assert!(matches!(error, RuleError::Parse(_)));
}
