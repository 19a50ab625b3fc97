use std::fs;
use std::path::Path;

use bankreg_standards::hash::sha256_hex;
use bankreg_standards::{StandardsError, StandardsRegistry};

const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="ReportHeader">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="EntityId">
          <xs:simpleType>
            <xs:restriction base="xs:string">
              <xs:length value="10"/>
            </xs:restriction>
          </xs:simpleType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

const BINDINGS: &str = "section,anchor,group_by,field,path,emit\nheader,,,entity_id,EntityId,\n";

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    fs::write(path, contents).expect("write file");
}

fn write_manifest(dir: &Path, files: &[(&str, &str, &str)]) {
    let mut manifest = String::from(
        "[manifest]\nschema = \"bankreg.standards-manifest\"\nschema_version = 1\n\n[batch]\nkey_field = \"entity_id\"\n",
    );
    for (path, kind, role) in files {
        let bytes = fs::read(dir.join(path)).expect("read file");
        manifest.push_str(&format!(
            "\n[[files]]\npath = \"{path}\"\nsha256 = \"{}\"\nkind = \"{kind}\"\nrole = \"{role}\"\n",
            sha256_hex(&bytes)
        ));
    }
    write(&dir.join("manifest.toml"), &manifest);
}

fn minimal_standards(dir: &Path) {
    write(&dir.join("schema.xsd"), SCHEMA);
    write(&dir.join("bindings.csv"), BINDINGS);
    write_manifest(
        dir,
        &[
            ("schema.xsd", "xsd", "schema"),
            ("bindings.csv", "csv", "bindings"),
        ],
    );
}

#[test]
fn loads_minimal_standards() {
    let dir = tempfile::tempdir().expect("tempdir");
    minimal_standards(dir.path());

    let (registry, summary) =
        StandardsRegistry::verify_and_load(dir.path()).expect("verify standards");
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.element_count, 2);
    assert_eq!(summary.vocabulary_count, 0);
    assert!(summary.rules_file.is_none());
    assert!(registry.rules_path.is_none());
    assert_eq!(registry.schema.root().name, "ReportHeader");
}

#[test]
fn rejects_hash_mismatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    minimal_standards(dir.path());
    write(&dir.path().join("bindings.csv"), "section,anchor,group_by,field,path,emit\n");

    let error = StandardsRegistry::verify_and_load(dir.path()).expect_err("hash mismatch");
    assert!(matches!(error, StandardsError::Sha256Mismatch { .. }));
}

#[test]
fn rejects_unlisted_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    minimal_standards(dir.path());
    write(&dir.path().join("notes/extra.txt"), "stray");

    let error = StandardsRegistry::verify_and_load(dir.path()).expect_err("unexpected file");
    assert!(matches!(error, StandardsError::UnexpectedFile { .. }));
}

#[test]
fn rejects_missing_required_role() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(&dir.path().join("schema.xsd"), SCHEMA);
    write_manifest(dir.path(), &[("schema.xsd", "xsd", "schema")]);

    let error = StandardsRegistry::verify_and_load(dir.path()).expect_err("missing role");
    assert!(matches!(error, StandardsError::MissingRole { role } if role == "bindings"));
}

#[test]
fn rejects_paths_escaping_the_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    minimal_standards(dir.path());
    let manifest = fs::read_to_string(dir.path().join("manifest.toml")).expect("read manifest");
    write(
        &dir.path().join("manifest.toml"),
        &manifest.replace("path = \"schema.xsd\"", "path = \"../schema.xsd\""),
    );

    let error = StandardsRegistry::verify_and_load(dir.path()).expect_err("invalid path");
    assert!(matches!(error, StandardsError::InvalidPath { .. }));
}

#[test]
fn rejects_bindings_that_do_not_resolve() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(&dir.path().join("schema.xsd"), SCHEMA);
    write(
        &dir.path().join("bindings.csv"),
        "section,anchor,group_by,field,path,emit\nheader,,,settlement_date,SettlementDate,\n",
    );
    write_manifest(
        dir.path(),
        &[
            ("schema.xsd", "xsd", "schema"),
            ("bindings.csv", "csv", "bindings"),
        ],
    );

    let error = StandardsRegistry::verify_and_load(dir.path()).expect_err("unresolved binding");
    assert!(matches!(error, StandardsError::Model { .. }));
}
