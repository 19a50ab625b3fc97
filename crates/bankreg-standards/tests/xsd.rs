//! Tests for the XSD subset loader.

use bankreg_model::{Decimal, MaxOccurs, PrimitiveType, WhiteSpace};
use bankreg_standards::{XsdError, parse_xsd};

const HEADER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:test:header"
           elementFormDefault="qualified">
  <xs:element name="ReportHeader">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="EntityId" type="EntityIdType"/>
        <xs:element name="Note" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="version" type="xs:string" fixed="1.0"/>
    </xs:complexType>
  </xs:element>
  <xs:simpleType name="EntityIdType">
    <xs:restriction base="xs:string">
      <xs:length value="10"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>
"#;

#[test]
fn resolves_named_simple_types_and_occurs() {
    let root = parse_xsd(HEADER_XSD).expect("parse xsd");
    assert_eq!(root.name, "ReportHeader");
    assert_eq!(root.namespace.as_deref(), Some("urn:test:header"));

    let entity = root.child("EntityId").expect("EntityId");
    let leaf = entity.leaf_type().expect("leaf");
    assert_eq!(leaf.base, PrimitiveType::String);
    assert_eq!(leaf.facets.length, Some(10));
    assert_eq!(entity.namespace.as_deref(), Some("urn:test:header"));

    let note = root.child("Note").expect("Note");
    assert_eq!(note.occurs.min, 0);
    assert_eq!(note.occurs.max, MaxOccurs::Unbounded);

    let version = root.attribute("version").expect("version attribute");
    assert!(!version.required);
    assert_eq!(version.leaf.fixed.as_deref(), Some("1.0"));
}

#[test]
fn restriction_chains_accumulate_facets() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Amounts">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Positive" type="PositiveAmount"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:simpleType name="Amount">
    <xs:restriction base="xs:decimal">
      <xs:totalDigits value="18"/>
      <xs:fractionDigits value="2"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="PositiveAmount">
    <xs:restriction base="Amount">
      <xs:minExclusive value="0"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;
    let root = parse_xsd(xsd).expect("parse xsd");
    let leaf = root
        .child("Positive")
        .and_then(|node| node.leaf_type())
        .expect("leaf");
    assert_eq!(leaf.base, PrimitiveType::Decimal);
    assert_eq!(leaf.facets.total_digits, Some(18));
    assert_eq!(leaf.facets.fraction_digits, Some(2));
    assert_eq!(leaf.facets.min_exclusive, Some(Decimal::ZERO));
    assert_eq!(root.namespace, None);
}

#[test]
fn patterns_in_one_step_are_alternatives() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Code">
    <xs:simpleType>
      <xs:restriction base="xs:string">
        <xs:pattern value="[A-Z]{3}"/>
        <xs:pattern value="[0-9]{3}"/>
      </xs:restriction>
    </xs:simpleType>
  </xs:element>
</xs:schema>"#;
    let root = parse_xsd(xsd).expect("parse xsd");
    let leaf = root.leaf_type().expect("leaf");
    assert_eq!(leaf.facets.patterns.len(), 1);
    let pattern = &leaf.facets.patterns[0];
    assert!(pattern.is_match("ABC"));
    assert!(pattern.is_match("123"));
    assert!(!pattern.is_match("AB1"));
}

#[test]
fn bounded_integer_builtins_carry_ranges() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Count" type="xs:nonNegativeInteger"/>
</xs:schema>"#;
    let root = parse_xsd(xsd).expect("parse xsd");
    let leaf = root.leaf_type().expect("leaf");
    assert_eq!(leaf.base, PrimitiveType::Integer);
    assert_eq!(leaf.facets.min_inclusive, Some(Decimal::ZERO));
}

#[test]
fn token_types_carry_white_space_handling() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Names">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Token" type="xs:token"/>
        <xs:element name="Normalized" type="xs:normalizedString"/>
        <xs:element name="Code" type="CodeType"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:simpleType name="CodeType">
    <xs:restriction base="xs:string">
      <xs:whiteSpace value="collapse"/>
      <xs:maxLength value="3"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;
    let root = parse_xsd(xsd).expect("parse xsd");
    let white_space = |name: &str| {
        root.child(name)
            .and_then(|node| node.leaf_type())
            .map(|leaf| leaf.facets.white_space)
    };
    assert_eq!(white_space("Token"), Some(WhiteSpace::Collapse));
    assert_eq!(white_space("Normalized"), Some(WhiteSpace::Replace));
    assert_eq!(white_space("Code"), Some(WhiteSpace::Collapse));

    let relaxed = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Code">
    <xs:simpleType>
      <xs:restriction base="xs:token">
        <xs:whiteSpace value="preserve"/>
      </xs:restriction>
    </xs:simpleType>
  </xs:element>
</xs:schema>"#;
    assert!(matches!(parse_xsd(relaxed), Err(XsdError::Invalid(_))));
}

#[test]
fn rejects_constructs_outside_the_subset() {
    let choice = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Root">
    <xs:complexType>
      <xs:choice>
        <xs:element name="A" type="xs:string"/>
      </xs:choice>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
    assert!(matches!(parse_xsd(choice), Err(XsdError::Unsupported(_))));

    let unknown_builtin = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="When" type="xs:dateTime"/>
</xs:schema>"#;
    assert!(matches!(
        parse_xsd(unknown_builtin),
        Err(XsdError::Unsupported(_))
    ));
}

#[test]
fn rejects_recursive_types() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Node" type="NodeType"/>
  <xs:complexType name="NodeType">
    <xs:sequence>
      <xs:element name="Child" type="NodeType" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
    assert!(matches!(parse_xsd(xsd), Err(XsdError::RecursiveType(name)) if name == "NodeType"));
}

#[test]
fn rejects_malformed_xml() {
    let result = parse_xsd("<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">");
    assert!(result.is_err());
}
