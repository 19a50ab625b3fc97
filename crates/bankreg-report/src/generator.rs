//! Canonical records to report document.
//!
//! The walk follows the schema tree, not the records: children come out in
//! declaration order and attributes in declaration order, whatever order
//! the record fields were in. Each record of a bound section instantiates
//! that section's anchor element once.

use std::collections::BTreeMap;
use std::time::Instant;

use bankreg_model::{
    AttributeDecl, CanonicalRecord, CanonicalValue, Element, EmitMode, FieldBinding, LeafType,
    NodeContent, ReportDocument, RowIndex, SchemaModel, SchemaNode, SchemaPath, SectionBinding,
};
use tracing::{debug, info_span, warn};

use crate::error::StructuralGapError;

/// Build the report document for one batch of canonical records.
///
/// Fails with a [`StructuralGapError`] when a mandatory leaf, attribute or
/// anchor has nothing to fill it. Records are never dropped to satisfy
/// cardinality; surplus anchors are emitted and left to the validator.
pub fn generate(
    records: &[CanonicalRecord],
    schema: &SchemaModel,
) -> Result<ReportDocument, StructuralGapError> {
    let span = info_span!("generate", records = records.len());
    let _guard = span.enter();
    let start = Instant::now();

    let bindings = schema.bindings();
    let mut by_section: BTreeMap<&str, Vec<&CanonicalRecord>> = BTreeMap::new();
    for record in records {
        if bindings.section(record.section()).is_some() {
            by_section.entry(record.section()).or_default().push(record);
        }
    }
    for record in records {
        if bindings.section(record.section()).is_none() {
            warn!(
                section = record.section(),
                row = %record.row(),
                "record section has no binding, skipped"
            );
        }
    }

    let root_section = bindings
        .sections()
        .iter()
        .find(|section| section.anchor.is_root());
    let root_records = root_section
        .and_then(|section| by_section.get(section.section.as_str()))
        .map(Vec::as_slice)
        .unwrap_or_default();

    let generator = Generator {
        schema,
        by_section: &by_section,
        root: root_section.map(|binding| Bound {
            binding,
            records: root_records,
        }),
    };
    let scope = Scope { current: None };
    let root = generator
        .element(schema.root(), &SchemaPath::root(), scope)
        .inspect_err(|gap| warn!(path = %gap.path, section = ?gap.section, "structural gap"))?;

    debug!(
        elements = count_elements(&root),
        duration_ms = start.elapsed().as_millis(),
        "generate complete"
    );
    Ok(ReportDocument::new(root))
}

fn count_elements(element: &Element) -> usize {
    1 + element.children.iter().map(count_elements).sum::<usize>()
}

/// A section binding with the records that fill it.
#[derive(Clone, Copy)]
struct Bound<'a> {
    binding: &'a SectionBinding,
    records: &'a [&'a CanonicalRecord],
}

/// The anchor record being filled, if any.
#[derive(Clone, Copy)]
struct Scope<'a> {
    current: Option<(&'a SectionBinding, &'a CanonicalRecord)>,
}

/// What the records say about one leaf or attribute.
struct Lookup<'a> {
    binding: Option<(&'a SectionBinding, &'a FieldBinding)>,
    values: Vec<&'a CanonicalValue>,
    row: Option<RowIndex>,
}

struct Generator<'a> {
    schema: &'a SchemaModel,
    by_section: &'a BTreeMap<&'a str, Vec<&'a CanonicalRecord>>,
    root: Option<Bound<'a>>,
}

impl<'a> Generator<'a> {
    fn element(
        &self,
        node: &'a SchemaNode,
        path: &SchemaPath,
        scope: Scope<'a>,
    ) -> Result<Element, StructuralGapError> {
        let mut element = Element::new(&node.name).with_namespace(node.namespace.as_deref());

        for attribute in &node.attributes {
            let attribute_path = path.join(&SchemaPath::new(&format!("@{}", attribute.name)));
            for value in self.attribute_values(attribute, &attribute_path, scope)? {
                element = element.with_attribute(&attribute.name, value);
            }
        }

        match &node.content {
            NodeContent::Leaf(_) => {}
            NodeContent::Sequence(children) => {
                for child in children {
                    let child_path = path.join(&SchemaPath::new(&child.name));
                    self.emit_child(&mut element, child, &child_path, scope)?;
                }
            }
        }
        Ok(element)
    }

    fn emit_child(
        &self,
        parent: &mut Element,
        node: &'a SchemaNode,
        path: &SchemaPath,
        scope: Scope<'a>,
    ) -> Result<(), StructuralGapError> {
        if let Some(section) = self.schema.bindings().anchored_at(path)
            && !section.anchor.is_root()
        {
            let records = self.records_of(section);
            if records.is_empty() {
                if node.occurs.min > 0 {
                    return Err(StructuralGapError {
                        path: path.to_string(),
                        section: Some(section.section.clone()),
                        field: None,
                        row: None,
                    });
                }
                return Ok(());
            }
            for record in clustered(section, records) {
                let scope = Scope {
                    current: Some((section, record)),
                };
                parent.children.push(self.element(node, path, scope)?);
            }
            return Ok(());
        }

        match &node.content {
            NodeContent::Leaf(leaf) => {
                for text in self.leaf_values(node, leaf, path, scope)? {
                    parent.children.push(
                        Element::new(&node.name)
                            .with_namespace(node.namespace.as_deref())
                            .with_text(text),
                    );
                }
            }
            NodeContent::Sequence(_) => {
                if node.occurs.min == 0 && !self.has_data(node, path, scope) {
                    return Ok(());
                }
                parent.children.push(self.element(node, path, scope)?);
            }
        }
        Ok(())
    }

    fn leaf_values(
        &self,
        node: &SchemaNode,
        leaf: &LeafType,
        path: &SchemaPath,
        scope: Scope<'a>,
    ) -> Result<Vec<String>, StructuralGapError> {
        let lookup = self.lookup(path, scope);
        fill(&lookup, leaf.fixed.as_deref(), node.occurs.min == 0, path)
    }

    fn attribute_values(
        &self,
        attribute: &AttributeDecl,
        path: &SchemaPath,
        scope: Scope<'a>,
    ) -> Result<Vec<String>, StructuralGapError> {
        let lookup = self.lookup(path, scope);
        fill(&lookup, attribute.leaf.fixed.as_deref(), !attribute.required, path)
    }

    /// Values bound to `path`: from the current anchor record when its
    /// section binds the path, otherwise from every root-section record.
    fn lookup(&self, path: &SchemaPath, scope: Scope<'a>) -> Lookup<'a> {
        if let Some((section, record)) = scope.current
            && let Some(relative) = relative_to(&section.anchor, path)
            && let Some(binding) = section.binding_for(&relative)
        {
            return Lookup {
                binding: Some((section, binding)),
                values: record.get(&binding.field).into_iter().collect(),
                row: Some(record.row()),
            };
        }
        let row = scope.current.map(|(_, record)| record.row());
        if let Some(root) = self.root
            && let Some(binding) = root.binding.binding_for(path)
        {
            return Lookup {
                binding: Some((root.binding, binding)),
                values: root
                    .records
                    .iter()
                    .filter_map(|record| record.get(&binding.field))
                    .collect(),
                row: row.or_else(|| root.records.first().map(|record| record.row())),
            };
        }
        Lookup {
            binding: None,
            values: Vec::new(),
            row,
        }
    }

    /// True when anything below `node` would be emitted from data.
    fn has_data(&self, node: &SchemaNode, path: &SchemaPath, scope: Scope<'a>) -> bool {
        let attributes = node.attributes.iter().any(|attribute| {
            let attribute_path = path.join(&SchemaPath::new(&format!("@{}", attribute.name)));
            self.lookup(&attribute_path, scope).has_data()
        });
        if attributes {
            return true;
        }
        if let Some(section) = self.schema.bindings().anchored_at(path)
            && !section.anchor.is_root()
        {
            return !self.records_of(section).is_empty();
        }
        match &node.content {
            NodeContent::Leaf(_) => self.lookup(path, scope).has_data(),
            NodeContent::Sequence(children) => children.iter().any(|child| {
                let child_path = path.join(&SchemaPath::new(&child.name));
                self.has_data(child, &child_path, scope)
            }),
        }
    }

    fn records_of(&self, section: &SectionBinding) -> &'a [&'a CanonicalRecord] {
        self.by_section
            .get(section.section.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Lookup<'_> {
    fn has_data(&self) -> bool {
        !self.values.is_empty()
            || matches!(self.binding, Some((_, binding)) if binding.emit == EmitMode::Empty)
    }
}

/// Texts to emit for one leaf or attribute occurrence.
fn fill(
    lookup: &Lookup<'_>,
    fixed: Option<&str>,
    optional: bool,
    path: &SchemaPath,
) -> Result<Vec<String>, StructuralGapError> {
    if !lookup.values.is_empty() {
        return Ok(lookup.values.iter().map(|value| value.render()).collect());
    }
    if let Some(fixed) = fixed {
        return Ok(vec![fixed.to_string()]);
    }
    let binding = lookup.binding.map(|(_, binding)| binding);
    if optional {
        return Ok(match binding {
            Some(binding) if binding.emit == EmitMode::Empty => vec![String::new()],
            _ => Vec::new(),
        });
    }
    Err(StructuralGapError {
        path: path.to_string(),
        section: lookup.binding.map(|(section, _)| section.section.clone()),
        field: binding.map(|binding| binding.field.clone()),
        row: lookup.row,
    })
}

fn relative_to(anchor: &SchemaPath, path: &SchemaPath) -> Option<SchemaPath> {
    if !anchor.is_prefix_of(&path.element_path()) {
        return None;
    }
    let mut relative = path.steps()[anchor.steps().len()..].join("/");
    if let Some(attribute) = path.attribute() {
        if !relative.is_empty() {
            relative.push('/');
        }
        relative.push('@');
        relative.push_str(attribute);
    }
    Some(SchemaPath::new(&relative))
}

/// Records clustered by grouping key, clusters in order of first
/// appearance, source order within a cluster.
fn clustered<'r>(
    section: &SectionBinding,
    records: &[&'r CanonicalRecord],
) -> Vec<&'r CanonicalRecord> {
    if section.group_by.is_empty() {
        return records.to_vec();
    }
    let mut index: BTreeMap<Vec<Option<&CanonicalValue>>, usize> = BTreeMap::new();
    let mut clusters: Vec<Vec<&'r CanonicalRecord>> = Vec::new();
    for &record in records {
        let key: Vec<Option<&CanonicalValue>> = section
            .group_by
            .iter()
            .map(|field| record.get(field))
            .collect();
        let slot = *index.entry(key).or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[slot].push(record);
    }
    clusters.into_iter().flatten().collect()
}
