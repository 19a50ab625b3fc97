use bankreg_model::{CanonicalValue, Decimal, RawRecord, RawValue};
use bankreg_transform::{
    Bound, CrossRecordRule, Input, NormalizeRule, NormalizeTarget, RangeRule, Rule, RuleKind,
    RuleSet, clean,
};
use proptest::prelude::*;

fn rule_set() -> RuleSet {
    RuleSet::new(vec![
        Rule::new(
            "amount",
            RuleKind::Normalize(NormalizeRule {
                field: "amount".to_string(),
                required: true,
                default: None,
                target: NormalizeTarget::Decimal {
                    precision: 2,
                    omit_zero: false,
                },
            }),
        ),
        Rule::new(
            "amount.range",
            RuleKind::Range(RangeRule {
                field: "amount".to_string(),
                min: Some(Bound::inclusive(Decimal::ZERO)),
                ..RangeRule::default()
            }),
        )
        .soft(),
        Rule::new(
            "id.unique",
            RuleKind::CrossRecord(CrossRecordRule::UniqueKey {
                key: vec!["id".to_string()],
                max_per_key: 1,
            }),
        ),
    ])
    .expect("rules")
}

fn raw_records() -> impl Strategy<Value = Vec<RawRecord>> {
    let amount = prop_oneof![
        (-1_000_000i64..1_000_000, 0u32..5).prop_map(|(m, s)| {
            Decimal::new(i128::from(m), s).expect("decimal").to_string()
        }),
        "[a-z]{1,4}",
        Just(String::new()),
    ];
    prop::collection::vec(("[A-C]", amount), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(index, (id, amount))| {
                RawRecord::new(index + 1, "position")
                    .with_field("id", id)
                    .with_field("amount", amount)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn clean_is_deterministic(raw in raw_records()) {
        let rules = rule_set();
        let first = clean(&raw, &rules);
        let second = clean(&raw, &rules);
        prop_assert_eq!(&first.records, &second.records);
        prop_assert_eq!(&first.errors, &second.errors);
        prop_assert_eq!(first.records.len() + first.excluded, raw.len());
    }

    #[test]
    fn surviving_records_keep_source_order(raw in raw_records()) {
        let outcome = clean(&raw, &rule_set());
        let rows: Vec<usize> = outcome.records.iter().map(|r| r.row().0).collect();
        let mut sorted = rows.clone();
        sorted.sort_unstable();
        prop_assert_eq!(rows, sorted);
    }

    #[test]
    fn decimal_normalization_is_idempotent(mantissa in any::<i64>(), scale in 0u32..8, precision in 0u32..6) {
        let rule = NormalizeRule {
            field: "amount".to_string(),
            required: true,
            default: None,
            target: NormalizeTarget::Decimal {
                precision,
                omit_zero: false,
            },
        };
        let raw = RawValue::Text(Decimal::new(i128::from(mantissa), scale).expect("decimal").to_string());
        let once = rule.coerce(Input::Raw(&raw)).expect("first pass").expect("value");
        let twice = rule.coerce(Input::Value(&once)).expect("second pass").expect("value");
        prop_assert_eq!(once.render(), twice.render());
        prop_assert!(matches!(once, CanonicalValue::Decimal(d) if d.scale() == precision));
    }
}
