use bankreg_core::{BatchContext, process_batch};
use bankreg_model::{
    BatchStatus, LeafType, MaxOccurs, RawRecord, SchemaModel, SchemaNode, SectionBinding,
    VocabularyRegistry,
};
use bankreg_transform::RuleSet;
use proptest::prelude::*;

const RULES: &str = r#"
[[rules]]
id = "amount"
section = "position"
kind = "decimal"
field = "amount"
required = true

[[rules]]
id = "unique"
section = "position"
kind = "unique_key"
key = ["position_id"]

[[rules]]
id = "order"
section = "position"
kind = "sort_by_key"
key = ["position_id"]
"#;

fn schema() -> SchemaModel {
    let root = SchemaNode::sequence(
        "Report",
        vec![
            SchemaNode::sequence(
                "Header",
                vec![SchemaNode::leaf("EntityId", LeafType::string().with_length(10))],
            ),
            SchemaNode::sequence(
                "Position",
                vec![
                    SchemaNode::leaf("Id", LeafType::string().with_min_length(1)),
                    SchemaNode::leaf(
                        "Amount",
                        LeafType::decimal()
                            .with_total_digits(12)
                            .with_fraction_digits(2),
                    ),
                    SchemaNode::leaf("Desk", LeafType::string()).optional(),
                ],
            )
            .with_occurs(0, MaxOccurs::Unbounded),
        ],
    )
    .in_namespace("urn:test:prop");
    let sections = vec![
        SectionBinding::new("header", "").field("entity_id", "Header/EntityId"),
        SectionBinding::new("position", "Position")
            .grouped_by(["position_id"])
            .field("position_id", "Id")
            .field("amount", "Amount")
            .field("desk", "Desk"),
    ];
    SchemaModel::new(root, sections).expect("schema")
}

#[derive(Debug, Clone)]
struct PositionRow {
    id: u32,
    cents: i64,
    desk: Option<String>,
}

fn position_rows() -> impl Strategy<Value = Vec<PositionRow>> {
    prop::collection::btree_map(
        1u32..10_000,
        (-1_000_000_000i64..1_000_000_000, prop::option::of("[A-Z]{2,6}")),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(id, (cents, desk))| PositionRow { id, cents, desk })
            .collect()
    })
}

fn raw_records(entity_id: &str, rows: &[PositionRow], reversed_fields: bool) -> Vec<RawRecord> {
    let mut records = vec![RawRecord::new(1, "header").with_field("entity_id", entity_id)];
    for (index, row) in rows.iter().enumerate() {
        let sign = if row.cents < 0 { "-" } else { "" };
        let amount = format!("{sign}{}.{:02}", row.cents.abs() / 100, row.cents.abs() % 100);
        let mut fields = vec![
            ("position_id", format!("P{:05}", row.id)),
            ("amount", amount),
        ];
        if let Some(desk) = &row.desk {
            fields.push(("desk", desk.clone()));
        }
        if reversed_fields {
            fields.reverse();
        }
        let record = fields
            .into_iter()
            .fold(RawRecord::new(index + 2, "position"), |record, (name, value)| {
                record.with_field(name, value)
            });
        records.push(record);
    }
    records
}

proptest! {
    #[test]
    fn generated_documents_validate(
        entity_id in "[A-Z0-9]{10}",
        rows in position_rows(),
    ) {
        let schema = schema();
        let rules = RuleSet::from_toml_str(RULES, &VocabularyRegistry::new(), Some(&schema))
            .expect("rules");
        let context = BatchContext::new("prop", &rules, &schema);

        let outcome = process_batch(&raw_records(&entity_id, &rows, false), &context);

        prop_assert!(outcome.validation_errors.is_empty(), "{:?}", outcome.validation_errors);
        prop_assert_eq!(outcome.status, BatchStatus::Compliant);
        let document = outcome.document.expect("document");
        prop_assert_eq!(document.root().children_named("Position").count(), rows.len());
    }

    #[test]
    fn output_order_ignores_field_order(
        entity_id in "[A-Z0-9]{10}",
        mut rows in position_rows(),
    ) {
        let schema = schema();
        let rules = RuleSet::from_toml_str(RULES, &VocabularyRegistry::new(), Some(&schema))
            .expect("rules");
        let context = BatchContext::new("prop", &rules, &schema);
        rows.reverse();

        let forward = process_batch(&raw_records(&entity_id, &rows, false), &context);
        let reversed = process_batch(&raw_records(&entity_id, &rows, true), &context);

        prop_assert_eq!(&forward.document, &reversed.document);
        let document = forward.document.expect("document");
        let ids: Vec<&str> = document
            .root()
            .children_named("Position")
            .filter_map(|position| position.text_at("Id"))
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(ids, sorted);
        for position in document.root().children_named("Position") {
            let names: Vec<&str> = position.children.iter().map(|child| child.name.as_str()).collect();
            prop_assert!(names.starts_with(&["Id", "Amount"]));
        }
    }
}
