use bankreg_model::{EmitMode, SchemaPath};
use bankreg_standards::{StandardsRegistry, load_bindings, load_vocabularies, standards_root};

#[test]
fn shipped_standards_verify_and_load() {
    let (registry, summary) =
        StandardsRegistry::verify_and_load(&standards_root()).expect("verify standards");

    assert_eq!(summary.root_element, "BankRegulatoryReport");
    assert_eq!(
        summary.target_namespace.as_deref(),
        Some("urn:bankreg:regulatory-report:1.0")
    );
    assert_eq!(summary.section_count, 4);
    assert_eq!(summary.batch_key, "bank_id");
    assert!(summary.rules_file.is_some());
    assert_eq!(registry.batch_key(), "bank_id");

    let bank = registry
        .schema
        .bindings()
        .section("bank")
        .expect("bank section");
    assert!(bank.anchor.is_root());
    let capital = registry
        .schema
        .bindings()
        .section("capital")
        .expect("capital section");
    assert_eq!(capital.anchor, SchemaPath::new("CapitalAdequacy"));

    let thresholds = registry
        .schema
        .resolve(&SchemaPath::new("LiquidityMetrics/RegulatoryThresholds/LCR_Minimum"))
        .and_then(|node| node.leaf_type())
        .expect("threshold leaf");
    assert_eq!(thresholds.fixed.as_deref(), Some("100.00"));
}

#[test]
fn shipped_vocabularies_resolve_synonyms() {
    let registry =
        load_vocabularies(&standards_root().join("vocabularies.csv")).expect("load vocabularies");
    let report_type = registry.get("report_type").expect("report_type vocabulary");
    assert_eq!(report_type.resolve("qtr"), Some("QUARTERLY"));
    assert_eq!(report_type.resolve("Annual"), Some("ANNUAL"));
    assert_eq!(report_type.resolve("weekly"), None);
}

#[test]
fn bindings_rows_group_by_section() {
    let sections = load_bindings(&standards_root().join("bindings.csv")).expect("load bindings");
    let names: Vec<&str> = sections.iter().map(|s| s.section.as_str()).collect();
    assert_eq!(names, vec!["bank", "capital", "liquidity", "credit"]);

    let bank = &sections[0];
    let bank_id = bank
        .binding_for(&SchemaPath::new("@bankId"))
        .expect("bankId binding");
    assert_eq!(bank_id.field, "bank_id");
    assert_eq!(bank_id.emit, EmitMode::Omit);
}
