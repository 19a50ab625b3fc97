use bankreg_model::{
    AttributeDecl, LeafType, MaxOccurs, ModelError, SchemaModel, SchemaNode, SectionBinding,
};

fn trade_schema() -> SchemaNode {
    SchemaNode::sequence(
        "TradeReport",
        vec![
            SchemaNode::sequence(
                "Header",
                vec![
                    SchemaNode::leaf("EntityId", LeafType::string().with_length(10)),
                    SchemaNode::leaf("Comment", LeafType::string()).optional(),
                ],
            ),
            SchemaNode::sequence(
                "Positions",
                vec![
                    SchemaNode::sequence(
                        "Position",
                        vec![
                            SchemaNode::leaf("Isin", LeafType::string()),
                            SchemaNode::leaf("Amount", LeafType::decimal()),
                        ],
                    )
                    .with_occurs(0, MaxOccurs::Unbounded),
                ],
            ),
        ],
    )
    .with_attribute(AttributeDecl::required("reportDate", LeafType::date()))
}

#[test]
fn accepts_well_formed_bindings() {
    let model = SchemaModel::new(
        trade_schema(),
        vec![
            SectionBinding::new("header", "")
                .field("entity_id", "Header/EntityId")
                .field("report_date", "@reportDate"),
            SectionBinding::new("positions", "Positions/Position")
                .grouped_by(["desk"])
                .field("isin", "Isin")
                .field("amount", "Amount"),
        ],
    )
    .expect("valid bindings");
    assert_eq!(model.bindings().sections().len(), 2);
    let positions = model.bindings().section("positions").expect("positions");
    assert!(positions.binding_for(&"Amount".into()).is_some());
}

#[test]
fn rejects_unresolved_field_paths() {
    let err = SchemaModel::new(
        trade_schema(),
        vec![SectionBinding::new("positions", "Positions/Position").field("isin", "Isn")],
    )
    .expect_err("typo in path");
    assert!(matches!(err, ModelError::UnresolvedPath { .. }));
}

#[test]
fn rejects_binding_to_container() {
    let err = SchemaModel::new(
        trade_schema(),
        vec![SectionBinding::new("header", "").field("header", "Header")],
    )
    .expect_err("container binding");
    assert!(matches!(err, ModelError::NotALeaf { .. }));
}

#[test]
fn rejects_field_crossing_repeating_element() {
    let err = SchemaModel::new(
        trade_schema(),
        vec![SectionBinding::new("report", "Positions").field("isin", "Position/Isin")],
    )
    .expect_err("crosses repeating Position");
    assert!(matches!(err, ModelError::RepeatingInFieldPath { .. }));
}

#[test]
fn rejects_nested_anchors_below_non_root() {
    let err = SchemaModel::new(
        trade_schema(),
        vec![
            SectionBinding::new("outer", "Positions"),
            SectionBinding::new("inner", "Positions/Position").field("isin", "Isin"),
        ],
    )
    .expect_err("nested anchors");
    assert!(matches!(err, ModelError::NestedAnchor { .. }));
}

#[test]
fn root_section_fields_must_avoid_inner_anchors() {
    let err = SchemaModel::new(
        trade_schema(),
        vec![
            SectionBinding::new("header", "").field("comment", "Header/Comment"),
            SectionBinding::new("header_detail", "Header").field("entity_id", "EntityId"),
        ],
    )
    .expect_err("root field enters inner anchor");
    assert!(matches!(err, ModelError::NestedAnchor { .. }));
}

#[test]
fn rejects_duplicate_sections_and_targets() {
    let duplicate_section = SchemaModel::new(
        trade_schema(),
        vec![
            SectionBinding::new("header", "Header"),
            SectionBinding::new("header", "Positions"),
        ],
    );
    assert!(matches!(
        duplicate_section,
        Err(ModelError::DuplicateSection { .. })
    ));

    let duplicate_target = SchemaModel::new(
        trade_schema(),
        vec![
            SectionBinding::new("header", "Header")
                .field("entity_id", "EntityId")
                .field("legal_id", "EntityId"),
        ],
    );
    assert!(matches!(
        duplicate_target,
        Err(ModelError::DuplicateBinding { .. })
    ));
}
