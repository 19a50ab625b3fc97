//! Loader for the supported XSD subset.
//!
//! The schema is read into a small element tree with quick-xml and then
//! resolved into a [`SchemaNode`] tree: named types are inlined, restriction
//! chains are flattened into one [`LeafType`], and namespaces are applied per
//! `elementFormDefault`. Anything outside the subset is rejected so that a
//! schema is never half understood.

use std::collections::BTreeMap;
use std::path::Path;

use bankreg_model::{
    AttributeDecl, Decimal, LeafType, MaxOccurs, NodeContent, Occurs, Pattern, PrimitiveType,
    SchemaNode, WhiteSpace,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::StandardsError;

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum XsdError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid schema: {0}")]
    Invalid(String),
    #[error("unsupported schema construct: {0}")]
    Unsupported(String),
    #[error("type {0} refers to itself")]
    RecursiveType(String),
}

type XsdResult<T> = Result<T, XsdError>;

/// Read and resolve an XSD file.
pub fn load_xsd(path: &Path) -> Result<SchemaNode, StandardsError> {
    let text = std::fs::read_to_string(path).map_err(|e| StandardsError::io(path, e))?;
    parse_xsd(&text).map_err(|source| StandardsError::Xsd {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve XSD text into the element tree of its first global element.
pub fn parse_xsd(text: &str) -> XsdResult<SchemaNode> {
    let tree = parse_tree(text)?;
    if !tree.is("schema") {
        return Err(XsdError::Invalid(format!(
            "document element must be xs:schema, found {}",
            tree.local
        )));
    }
    let schema = SchemaDoc::index(&tree)?;
    let root = tree
        .schema_children()
        .find(|child| child.is("element"))
        .ok_or_else(|| XsdError::Invalid("no global xs:element declared".to_string()))?;
    let mut visiting = Vec::new();
    schema.element(root, true, &mut visiting)
}

#[derive(Debug)]
struct XmlNode {
    local: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> XsdResult<Self> {
        let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let local = match qname.split_once(':') {
            Some((_, local)) => local.to_string(),
            None => qname,
        };
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(quick_xml::Error::from)?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            local,
            attributes,
            children: Vec::new(),
        })
    }

    fn is(&self, local: &str) -> bool {
        self.local == local
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn schema_children(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter(|child| !child.is("annotation"))
    }
}

fn parse_tree(text: &str) -> XsdResult<XmlNode> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(XmlNode::from_start(&start)?),
            Event::Empty(start) => {
                let node = XmlNode::from_start(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XsdError::Invalid("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(XsdError::Invalid("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| XsdError::Invalid("empty document".to_string()))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> XsdResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => {
            return Err(XsdError::Invalid("multiple document elements".to_string()));
        }
        None => *root = Some(node),
    }
    Ok(())
}

enum TypeRef<'a> {
    Builtin(&'a str),
    Named(&'a str),
}

struct SchemaDoc<'a> {
    target_namespace: Option<String>,
    qualified: bool,
    /// Prefixes bound to the XSD namespace; `None` is the default namespace.
    xsd_prefixes: Vec<Option<String>>,
    complex_types: BTreeMap<&'a str, &'a XmlNode>,
    simple_types: BTreeMap<&'a str, &'a XmlNode>,
}

impl<'a> SchemaDoc<'a> {
    fn index(tree: &'a XmlNode) -> XsdResult<Self> {
        let xsd_prefixes = tree
            .attributes
            .iter()
            .filter(|(_, value)| value == XSD_NAMESPACE)
            .filter_map(|(key, _)| {
                if key == "xmlns" {
                    Some(None)
                } else {
                    key.strip_prefix("xmlns:")
                        .map(|prefix| Some(prefix.to_string()))
                }
            })
            .collect();
        let qualified = match tree.attr("elementFormDefault") {
            None | Some("unqualified") => false,
            Some("qualified") => true,
            Some(other) => {
                return Err(XsdError::Invalid(format!(
                    "elementFormDefault '{other}'"
                )));
            }
        };

        let mut complex_types = BTreeMap::new();
        let mut simple_types = BTreeMap::new();
        for child in tree.schema_children() {
            match child.local.as_str() {
                "element" => {}
                "complexType" | "simpleType" => {
                    let name = child.attr("name").ok_or_else(|| {
                        XsdError::Invalid(format!("top-level xs:{} without name", child.local))
                    })?;
                    let table = if child.is("complexType") {
                        &mut complex_types
                    } else {
                        &mut simple_types
                    };
                    if table.insert(name, child).is_some() {
                        return Err(XsdError::Invalid(format!("type {name} declared twice")));
                    }
                }
                other => {
                    return Err(XsdError::Unsupported(format!("top-level xs:{other}")));
                }
            }
        }

        Ok(Self {
            target_namespace: tree.attr("targetNamespace").map(str::to_string),
            qualified,
            xsd_prefixes,
            complex_types,
            simple_types,
        })
    }

    fn type_ref<'q>(&self, qname: &'q str) -> TypeRef<'q> {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qname),
        };
        if self
            .xsd_prefixes
            .iter()
            .any(|bound| bound.as_deref() == prefix)
        {
            TypeRef::Builtin(local)
        } else {
            TypeRef::Named(local)
        }
    }

    fn element(
        &self,
        node: &XmlNode,
        global: bool,
        visiting: &mut Vec<String>,
    ) -> XsdResult<SchemaNode> {
        if node.attr("ref").is_some() {
            return Err(XsdError::Unsupported("xs:element ref".to_string()));
        }
        let name = node
            .attr("name")
            .ok_or_else(|| XsdError::Invalid("xs:element without name".to_string()))?;
        let occurs = if global {
            Occurs::REQUIRED
        } else {
            parse_occurs(node)?
        };
        let qualified = match node.attr("form") {
            None => global || self.qualified,
            Some("qualified") => true,
            Some("unqualified") => false,
            Some(other) => {
                return Err(XsdError::Invalid(format!("element {name}: form '{other}'")));
            }
        };

        let inline: Vec<&XmlNode> = node.schema_children().collect();
        let (mut content, attributes) = match (node.attr("type"), inline.as_slice()) {
            (Some(type_name), []) => self.named_content(type_name, visiting)?,
            (None, [child]) if child.is("complexType") => self.complex_content(child, visiting)?,
            (None, [child]) if child.is("simpleType") => {
                (NodeContent::Leaf(self.simple_type(child, visiting)?), Vec::new())
            }
            (None, []) => {
                return Err(XsdError::Unsupported(format!(
                    "element {name} without a type"
                )));
            }
            _ => {
                return Err(XsdError::Unsupported(format!(
                    "element {name}: unsupported content declaration"
                )));
            }
        };

        if let Some(fixed) = node.attr("fixed") {
            match &mut content {
                NodeContent::Leaf(leaf) => leaf.fixed = Some(fixed.to_string()),
                NodeContent::Sequence(_) => {
                    return Err(XsdError::Unsupported(format!(
                        "fixed value on complex element {name}"
                    )));
                }
            }
        }

        Ok(SchemaNode {
            name: name.to_string(),
            namespace: if qualified {
                self.target_namespace.clone()
            } else {
                None
            },
            occurs,
            attributes,
            content,
        })
    }

    fn named_content(
        &self,
        type_name: &str,
        visiting: &mut Vec<String>,
    ) -> XsdResult<(NodeContent, Vec<AttributeDecl>)> {
        let local = match self.type_ref(type_name) {
            TypeRef::Builtin(local) => return Ok((NodeContent::Leaf(builtin(local)?), Vec::new())),
            TypeRef::Named(local) => local,
        };
        if let Some(node) = self.complex_types.get(local) {
            enter(visiting, local)?;
            let content = self.complex_content(node, visiting);
            visiting.pop();
            return content;
        }
        let leaf = self.named_simple(local, visiting)?;
        Ok((NodeContent::Leaf(leaf), Vec::new()))
    }

    fn named_simple(&self, local: &str, visiting: &mut Vec<String>) -> XsdResult<LeafType> {
        let node = self
            .simple_types
            .get(local)
            .ok_or_else(|| XsdError::Invalid(format!("unknown type {local}")))?;
        enter(visiting, local)?;
        let leaf = self.simple_type(node, visiting);
        visiting.pop();
        leaf
    }

    fn complex_content(
        &self,
        node: &XmlNode,
        visiting: &mut Vec<String>,
    ) -> XsdResult<(NodeContent, Vec<AttributeDecl>)> {
        if node.attr("mixed") == Some("true") {
            return Err(XsdError::Unsupported("mixed content".to_string()));
        }
        let mut children = Vec::new();
        let mut attributes = Vec::new();
        let mut seen_sequence = false;
        for child in node.schema_children() {
            match child.local.as_str() {
                "sequence" if !seen_sequence => {
                    seen_sequence = true;
                    if parse_occurs(child)? != Occurs::REQUIRED {
                        return Err(XsdError::Unsupported(
                            "occurrence bounds on xs:sequence".to_string(),
                        ));
                    }
                    for item in child.schema_children() {
                        if !item.is("element") {
                            return Err(XsdError::Unsupported(format!(
                                "xs:{} inside xs:sequence",
                                item.local
                            )));
                        }
                        children.push(self.element(item, false, visiting)?);
                    }
                }
                "attribute" => attributes.push(self.attribute(child, visiting)?),
                other => {
                    return Err(XsdError::Unsupported(format!("xs:{other} in complex type")));
                }
            }
        }
        Ok((NodeContent::Sequence(children), attributes))
    }

    fn attribute(&self, node: &XmlNode, visiting: &mut Vec<String>) -> XsdResult<AttributeDecl> {
        if node.attr("ref").is_some() {
            return Err(XsdError::Unsupported("xs:attribute ref".to_string()));
        }
        let name = node
            .attr("name")
            .ok_or_else(|| XsdError::Invalid("xs:attribute without name".to_string()))?;
        let required = match node.attr("use") {
            None | Some("optional") => false,
            Some("required") => true,
            Some(other) => {
                return Err(XsdError::Unsupported(format!("attribute use '{other}'")));
            }
        };
        let inline: Vec<&XmlNode> = node.schema_children().collect();
        let mut leaf = match (node.attr("type"), inline.as_slice()) {
            (Some(type_name), []) => match self.type_ref(type_name) {
                TypeRef::Builtin(local) => builtin(local)?,
                TypeRef::Named(local) => self.named_simple(local, visiting)?,
            },
            (None, [child]) if child.is("simpleType") => self.simple_type(child, visiting)?,
            (None, []) => LeafType::string(),
            _ => {
                return Err(XsdError::Unsupported(format!(
                    "attribute {name}: unsupported type declaration"
                )));
            }
        };
        if let Some(fixed) = node.attr("fixed") {
            leaf.fixed = Some(fixed.to_string());
        }
        Ok(AttributeDecl {
            name: name.to_string(),
            required,
            leaf,
        })
    }

    fn simple_type(&self, node: &XmlNode, visiting: &mut Vec<String>) -> XsdResult<LeafType> {
        let inline: Vec<&XmlNode> = node.schema_children().collect();
        let restriction = match inline.as_slice() {
            [child] if child.is("restriction") => *child,
            [child] => {
                return Err(XsdError::Unsupported(format!(
                    "xs:{} in simple type",
                    child.local
                )));
            }
            _ => {
                return Err(XsdError::Invalid(
                    "simple type must contain one xs:restriction".to_string(),
                ));
            }
        };
        let base = restriction
            .attr("base")
            .ok_or_else(|| XsdError::Unsupported("xs:restriction without base".to_string()))?;
        let mut leaf = match self.type_ref(base) {
            TypeRef::Builtin(local) => builtin(local)?,
            TypeRef::Named(local) => self.named_simple(local, visiting)?,
        };
        apply_facets(&mut leaf, restriction)?;
        Ok(leaf)
    }
}

fn enter(visiting: &mut Vec<String>, local: &str) -> XsdResult<()> {
    if visiting.iter().any(|name| name == local) {
        return Err(XsdError::RecursiveType(local.to_string()));
    }
    visiting.push(local.to_string());
    Ok(())
}

fn parse_occurs(node: &XmlNode) -> XsdResult<Occurs> {
    let parse = |attr: &str, value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| XsdError::Invalid(format!("{attr} '{value}'")))
    };
    let min = match node.attr("minOccurs") {
        Some(value) => parse("minOccurs", value)?,
        None => 1,
    };
    let max = match node.attr("maxOccurs") {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(value) => MaxOccurs::Bounded(parse("maxOccurs", value)?),
        None => MaxOccurs::Bounded(1),
    };
    Ok(Occurs::new(min, max))
}

fn integer_range(min: i64, max: i64) -> LeafType {
    LeafType::new(PrimitiveType::Integer)
        .with_min_inclusive(Decimal::from_int(min))
        .with_max_inclusive(Decimal::from_int(max))
}

fn builtin(local: &str) -> XsdResult<LeafType> {
    let leaf = match local {
        "string" | "anySimpleType" => LeafType::string(),
        "normalizedString" => LeafType::string().with_white_space(WhiteSpace::Replace),
        "token" => LeafType::string().with_white_space(WhiteSpace::Collapse),
        "decimal" => LeafType::decimal(),
        "integer" => LeafType::new(PrimitiveType::Integer),
        "long" => integer_range(i64::MIN, i64::MAX),
        "int" => integer_range(i64::from(i32::MIN), i64::from(i32::MAX)),
        "short" => integer_range(i64::from(i16::MIN), i64::from(i16::MAX)),
        "byte" => integer_range(i64::from(i8::MIN), i64::from(i8::MAX)),
        "nonNegativeInteger" => {
            LeafType::new(PrimitiveType::Integer).with_min_inclusive(Decimal::from_int(0))
        }
        "positiveInteger" => {
            LeafType::new(PrimitiveType::Integer).with_min_inclusive(Decimal::from_int(1))
        }
        "nonPositiveInteger" => {
            LeafType::new(PrimitiveType::Integer).with_max_inclusive(Decimal::from_int(0))
        }
        "negativeInteger" => {
            LeafType::new(PrimitiveType::Integer).with_max_inclusive(Decimal::from_int(-1))
        }
        "date" => LeafType::date(),
        "boolean" => LeafType::new(PrimitiveType::Boolean),
        other => {
            return Err(XsdError::Unsupported(format!("built-in type xs:{other}")));
        }
    };
    Ok(leaf)
}

fn apply_facets(leaf: &mut LeafType, restriction: &XmlNode) -> XsdResult<()> {
    let mut patterns: Vec<String> = Vec::new();
    let mut enumeration: Vec<String> = Vec::new();
    for facet in restriction.schema_children() {
        let value = facet.attr("value").ok_or_else(|| {
            XsdError::Invalid(format!("xs:{} without value", facet.local))
        })?;
        let facets = &mut leaf.facets;
        match facet.local.as_str() {
            "length" => facets.length = Some(parse_count(facet, value)?),
            "minLength" => facets.min_length = Some(parse_count(facet, value)?),
            "maxLength" => facets.max_length = Some(parse_count(facet, value)?),
            "totalDigits" => facets.total_digits = Some(parse_digits(facet, value)?),
            "fractionDigits" => facets.fraction_digits = Some(parse_digits(facet, value)?),
            "minInclusive" => facets.min_inclusive = Some(parse_bound(facet, value)?),
            "maxInclusive" => facets.max_inclusive = Some(parse_bound(facet, value)?),
            "minExclusive" => facets.min_exclusive = Some(parse_bound(facet, value)?),
            "maxExclusive" => facets.max_exclusive = Some(parse_bound(facet, value)?),
            "pattern" => patterns.push(value.to_string()),
            "enumeration" => enumeration.push(value.to_string()),
            "whiteSpace" => {
                let white_space = WhiteSpace::parse(value).ok_or_else(|| {
                    XsdError::Invalid(format!("xs:whiteSpace value '{value}'"))
                })?;
                if white_space < facets.white_space {
                    return Err(XsdError::Invalid(format!(
                        "xs:whiteSpace '{value}' relaxes the base type"
                    )));
                }
                facets.white_space = white_space;
            }
            other => return Err(XsdError::Unsupported(format!("facet xs:{other}"))),
        }
    }

    // Patterns within one restriction step are alternatives; steps combine.
    if !patterns.is_empty() {
        let source = if patterns.len() == 1 {
            patterns.remove(0)
        } else {
            patterns
                .iter()
                .map(|pattern| format!("(?:{pattern})"))
                .collect::<Vec<_>>()
                .join("|")
        };
        let pattern = Pattern::new(&source)
            .map_err(|e| XsdError::Invalid(format!("pattern '{source}': {e}")))?;
        leaf.facets.patterns.push(pattern);
    }
    if !enumeration.is_empty() {
        leaf.facets.enumeration = enumeration;
    }
    Ok(())
}

fn parse_count(facet: &XmlNode, value: &str) -> XsdResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| XsdError::Invalid(format!("xs:{} value '{value}'", facet.local)))
}

fn parse_digits(facet: &XmlNode, value: &str) -> XsdResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| XsdError::Invalid(format!("xs:{} value '{value}'", facet.local)))
}

fn parse_bound(facet: &XmlNode, value: &str) -> XsdResult<Decimal> {
    Decimal::parse(value.trim())
        .map_err(|_| XsdError::Invalid(format!("xs:{} value '{value}'", facet.local)))
}
