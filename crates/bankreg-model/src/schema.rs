//! In-memory schema model: a resolved, finite element tree with
//! cardinality, ordering, namespace and simple-type constraints, plus the
//! binding table that maps record fields onto it.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::binding::{BindingTable, SectionBinding};
use crate::decimal::Decimal;
use crate::error::{ModelError, Result};

/// Upper occurrence bound of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    pub fn allows(self, count: u32) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count <= max,
            MaxOccurs::Unbounded => true,
        }
    }

    pub fn is_repeating(self) -> bool {
        !matches!(self, MaxOccurs::Bounded(0 | 1))
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxOccurs::Bounded(max) => write!(f, "{max}"),
            MaxOccurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurs {
    pub min: u32,
    pub max: MaxOccurs,
}

impl Occurs {
    pub const REQUIRED: Occurs = Occurs {
        min: 1,
        max: MaxOccurs::Bounded(1),
    };
    pub const OPTIONAL: Occurs = Occurs {
        min: 0,
        max: MaxOccurs::Bounded(1),
    };

    pub fn new(min: u32, max: MaxOccurs) -> Self {
        Self { min, max }
    }

    pub fn is_optional(self) -> bool {
        self.min == 0
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::REQUIRED
    }
}

/// Built-in simple types understood by the generator and validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Decimal,
    Integer,
    Date,
    Boolean,
}

impl PrimitiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Decimal => "decimal",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Date => "date",
            PrimitiveType::Boolean => "boolean",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, PrimitiveType::Decimal | PrimitiveType::Integer)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An XSD `pattern` facet. Patterns always match the whole value.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// `xs:whiteSpace` handling, from loosest to strictest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhiteSpace {
    #[default]
    Preserve,
    /// Tabs and line breaks become spaces.
    Replace,
    /// As `Replace`, then runs of spaces shrink to one and the ends are trimmed.
    Collapse,
}

impl WhiteSpace {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// The normalized value facets are checked against.
    pub fn apply(self, value: &str) -> Cow<'_, str> {
        match self {
            WhiteSpace::Preserve => Cow::Borrowed(value),
            WhiteSpace::Replace if !value.contains(['\t', '\n', '\r']) => Cow::Borrowed(value),
            WhiteSpace::Replace => Cow::Owned(value.replace(['\t', '\n', '\r'], " ")),
            WhiteSpace::Collapse => {
                let joined = value
                    .split([' ', '\t', '\n', '\r'])
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if joined == value {
                    Cow::Borrowed(value)
                } else {
                    Cow::Owned(joined)
                }
            }
        }
    }
}

/// Restriction facets of a simple type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub white_space: WhiteSpace,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub patterns: Vec<Pattern>,
    pub enumeration: Vec<String>,
    pub total_digits: Option<u32>,
    pub fraction_digits: Option<u32>,
    pub min_inclusive: Option<Decimal>,
    pub max_inclusive: Option<Decimal>,
    pub min_exclusive: Option<Decimal>,
    pub max_exclusive: Option<Decimal>,
}

/// The simple type of a leaf element or attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafType {
    pub base: PrimitiveType,
    pub facets: Facets,
    pub fixed: Option<String>,
}

impl LeafType {
    pub fn new(base: PrimitiveType) -> Self {
        Self {
            base,
            facets: Facets::default(),
            fixed: None,
        }
    }

    pub fn string() -> Self {
        Self::new(PrimitiveType::String)
    }

    pub fn decimal() -> Self {
        Self::new(PrimitiveType::Decimal)
    }

    pub fn date() -> Self {
        Self::new(PrimitiveType::Date)
    }

    #[must_use]
    pub fn with_white_space(mut self, white_space: WhiteSpace) -> Self {
        self.facets.white_space = white_space;
        self
    }

    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.facets.length = Some(length);
        self
    }

    #[must_use]
    pub fn with_min_length(mut self, length: usize) -> Self {
        self.facets.min_length = Some(length);
        self
    }

    #[must_use]
    pub fn with_max_length(mut self, length: usize) -> Self {
        self.facets.max_length = Some(length);
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.facets.patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn with_enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facets.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_total_digits(mut self, digits: u32) -> Self {
        self.facets.total_digits = Some(digits);
        self
    }

    #[must_use]
    pub fn with_fraction_digits(mut self, digits: u32) -> Self {
        self.facets.fraction_digits = Some(digits);
        self
    }

    #[must_use]
    pub fn with_min_inclusive(mut self, bound: Decimal) -> Self {
        self.facets.min_inclusive = Some(bound);
        self
    }

    #[must_use]
    pub fn with_max_inclusive(mut self, bound: Decimal) -> Self {
        self.facets.max_inclusive = Some(bound);
        self
    }

    #[must_use]
    pub fn with_min_exclusive(mut self, bound: Decimal) -> Self {
        self.facets.min_exclusive = Some(bound);
        self
    }

    #[must_use]
    pub fn with_max_exclusive(mut self, bound: Decimal) -> Self {
        self.facets.max_exclusive = Some(bound);
        self
    }

    #[must_use]
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    pub name: String,
    pub required: bool,
    pub leaf: LeafType,
}

impl AttributeDecl {
    pub fn required(name: impl Into<String>, leaf: LeafType) -> Self {
        Self {
            name: name.into(),
            required: true,
            leaf,
        }
    }

    pub fn optional(name: impl Into<String>, leaf: LeafType) -> Self {
        Self {
            name: name.into(),
            required: false,
            leaf,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    /// Element-only content: an ordered sequence of child declarations.
    Sequence(Vec<SchemaNode>),
    Leaf(LeafType),
}

/// One element declaration in the resolved schema tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub namespace: Option<String>,
    pub occurs: Occurs,
    pub attributes: Vec<AttributeDecl>,
    pub content: NodeContent,
}

impl SchemaNode {
    pub fn leaf(name: impl Into<String>, leaf: LeafType) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            occurs: Occurs::REQUIRED,
            attributes: Vec::new(),
            content: NodeContent::Leaf(leaf),
        }
    }

    pub fn sequence(name: impl Into<String>, children: Vec<SchemaNode>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            occurs: Occurs::REQUIRED,
            attributes: Vec::new(),
            content: NodeContent::Sequence(children),
        }
    }

    #[must_use]
    pub fn with_occurs(mut self, min: u32, max: MaxOccurs) -> Self {
        self.occurs = Occurs::new(min, max);
        self
    }

    #[must_use]
    pub fn optional(self) -> Self {
        let max = self.occurs.max;
        self.with_occurs(0, max)
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the namespace on this node; descendants without one inherit it.
    #[must_use]
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self.inherit_namespace(namespace);
        self
    }

    fn inherit_namespace(&mut self, namespace: &str) {
        let own = self
            .namespace
            .get_or_insert_with(|| namespace.to_string())
            .clone();
        if let NodeContent::Sequence(children) = &mut self.content {
            for child in children.iter_mut() {
                child.inherit_namespace(&own);
            }
        }
    }

    pub fn children(&self) -> &[SchemaNode] {
        match &self.content {
            NodeContent::Sequence(children) => children,
            NodeContent::Leaf(_) => &[],
        }
    }

    pub fn leaf_type(&self) -> Option<&LeafType> {
        match &self.content {
            NodeContent::Leaf(leaf) => Some(leaf),
            NodeContent::Sequence(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children().iter().find(|child| child.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

/// A slash-separated element path relative to some node, optionally ending
/// in an attribute step (`Header/@bankId`). The empty path is the node itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SchemaPath {
    steps: Vec<String>,
    attribute: Option<String>,
}

impl SchemaPath {
    pub fn new(path: &str) -> Self {
        let mut steps: Vec<String> = path
            .split('/')
            .map(str::trim)
            .filter(|step| !step.is_empty())
            .map(str::to_string)
            .collect();
        let attribute = match steps.last() {
            Some(last) if last.starts_with('@') => {
                steps.pop().map(|step| step.trim_start_matches('@').to_string())
            }
            _ => None,
        };
        Self { steps, attribute }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty() && self.attribute.is_none()
    }

    /// Element steps of `self` followed by `other`.
    pub fn join(&self, other: &SchemaPath) -> SchemaPath {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        SchemaPath {
            steps,
            attribute: other.attribute.clone(),
        }
    }

    /// The element part of the path, without any attribute step.
    pub fn element_path(&self) -> SchemaPath {
        SchemaPath {
            steps: self.steps.clone(),
            attribute: None,
        }
    }

    /// True when `self` is a strict or equal element prefix of `other`.
    pub fn is_prefix_of(&self, other: &SchemaPath) -> bool {
        self.attribute.is_none()
            && other.steps.len() >= self.steps.len()
            && other.steps[..self.steps.len()] == self.steps[..]
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.steps.clone();
        if let Some(attribute) = &self.attribute {
            parts.push(format!("@{attribute}"));
        }
        f.write_str(&parts.join("/"))
    }
}

impl From<&str> for SchemaPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SchemaPath {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<SchemaPath> for String {
    fn from(value: SchemaPath) -> Self {
        value.to_string()
    }
}

/// The regulator's schema: root element declaration plus field bindings.
///
/// Construction checks the tree and the bindings once; afterwards the model
/// is immutable and shared by reference between generator and validator.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    root: SchemaNode,
    bindings: BindingTable,
}

impl SchemaModel {
    pub fn new(root: SchemaNode, sections: Vec<SectionBinding>) -> Result<Self> {
        check_node(&root, &root.name)?;
        let bindings = BindingTable::resolve(&root, sections)?;
        Ok(Self { root, bindings })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.root.namespace.as_deref()
    }

    /// Resolve the element steps of a root-relative path.
    pub fn resolve(&self, path: &SchemaPath) -> Option<&SchemaNode> {
        resolve_from(&self.root, path.steps())
    }
}

pub(crate) fn resolve_from<'a>(node: &'a SchemaNode, steps: &[String]) -> Option<&'a SchemaNode> {
    steps
        .iter()
        .try_fold(node, |current, step| current.child(step))
}

fn check_node(node: &SchemaNode, path: &str) -> Result<()> {
    if let MaxOccurs::Bounded(max) = node.occurs.max
        && node.occurs.min > max
    {
        return Err(ModelError::InvalidOccurs {
            path: path.to_string(),
            min: node.occurs.min,
            max,
        });
    }

    let mut attribute_names = BTreeSet::new();
    for attribute in &node.attributes {
        if !attribute_names.insert(attribute.name.as_str()) {
            return Err(ModelError::DuplicateAttribute {
                path: path.to_string(),
                name: attribute.name.clone(),
            });
        }
        check_facets(&attribute.leaf, &format!("{path}/@{}", attribute.name))?;
    }

    match &node.content {
        NodeContent::Leaf(leaf) => check_facets(leaf, path),
        NodeContent::Sequence(children) => {
            let mut names = BTreeSet::new();
            for child in children {
                if !names.insert(child.name.as_str()) {
                    return Err(ModelError::DuplicateChild {
                        path: path.to_string(),
                        name: child.name.clone(),
                    });
                }
                check_node(child, &format!("{path}/{}", child.name))?;
            }
            Ok(())
        }
    }
}

fn check_facets(leaf: &LeafType, path: &str) -> Result<()> {
    let facets = &leaf.facets;
    let invalid = |message: &str| ModelError::InvalidFacets {
        path: path.to_string(),
        message: message.to_string(),
    };
    if let (Some(min), Some(max)) = (facets.min_length, facets.max_length)
        && min > max
    {
        return Err(invalid("minLength exceeds maxLength"));
    }
    if let Some(length) = facets.length
        && (facets.min_length.is_some_and(|min| min > length)
            || facets.max_length.is_some_and(|max| max < length))
    {
        return Err(invalid("length conflicts with minLength/maxLength"));
    }
    if let (Some(fraction), Some(total)) = (facets.fraction_digits, facets.total_digits)
        && fraction > total
    {
        return Err(invalid("fractionDigits exceeds totalDigits"));
    }
    if let (Some(min), Some(max)) = (facets.min_inclusive, facets.max_inclusive)
        && min > max
    {
        return Err(invalid("minInclusive exceeds maxInclusive"));
    }
    let has_numeric_bounds = facets.min_inclusive.is_some()
        || facets.max_inclusive.is_some()
        || facets.min_exclusive.is_some()
        || facets.max_exclusive.is_some()
        || facets.total_digits.is_some()
        || facets.fraction_digits.is_some();
    if has_numeric_bounds && !leaf.base.is_numeric() {
        return Err(invalid("numeric facets on a non-numeric type"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_space_normalization() {
        let text = "  Acme\t Bank\n plc ";
        assert_eq!(WhiteSpace::Preserve.apply(text), text);
        assert_eq!(WhiteSpace::Replace.apply(text), "  Acme  Bank  plc ");
        assert_eq!(WhiteSpace::Collapse.apply(text), "Acme Bank plc");
        assert!(matches!(WhiteSpace::Collapse.apply("Acme Bank"), Cow::Borrowed(_)));
        assert!(WhiteSpace::Replace < WhiteSpace::Collapse);
        assert_eq!(WhiteSpace::parse("collapse"), Some(WhiteSpace::Collapse));
        assert_eq!(WhiteSpace::parse("squash"), None);
    }

    #[test]
    fn parses_attribute_paths() {
        let path = SchemaPath::new("Header/@bankId");
        assert_eq!(path.steps(), ["Header".to_string()]);
        assert_eq!(path.attribute(), Some("bankId"));
        assert_eq!(path.to_string(), "Header/@bankId");
        assert!(SchemaPath::new("").is_root());
    }

    #[test]
    fn rejects_min_above_max() {
        let root = SchemaNode::sequence(
            "Report",
            vec![
                SchemaNode::leaf("Amount", LeafType::decimal())
                    .with_occurs(2, MaxOccurs::Bounded(1)),
            ],
        );
        let err = SchemaModel::new(root, Vec::new()).expect_err("invalid occurs");
        assert!(matches!(err, ModelError::InvalidOccurs { min: 2, max: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_children() {
        let root = SchemaNode::sequence(
            "Report",
            vec![
                SchemaNode::leaf("Amount", LeafType::decimal()),
                SchemaNode::leaf("Amount", LeafType::decimal()),
            ],
        );
        assert!(matches!(
            SchemaModel::new(root, Vec::new()),
            Err(ModelError::DuplicateChild { .. })
        ));
    }

    #[test]
    fn namespace_propagates_to_unqualified_children() {
        let root = SchemaNode::sequence(
            "Report",
            vec![SchemaNode::sequence(
                "Header",
                vec![SchemaNode::leaf("Id", LeafType::string())],
            )],
        )
        .in_namespace("urn:example");
        let id = &root.children()[0].children()[0];
        assert_eq!(id.namespace.as_deref(), Some("urn:example"));
    }

    #[test]
    fn pattern_matches_whole_value() {
        let pattern = Pattern::new("[A-Z]{2}").expect("pattern");
        assert!(pattern.is_match("AB"));
        assert!(!pattern.is_match("ABC"));
    }
}
