//! Document tree walk.
//!
//! This walk shares nothing with the generator: it reads the document as
//! found and compares every node with its declaration.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use bankreg_model::{
    Constraint, Element, Location, MaxOccurs, NodeContent, ReportDocument, SchemaModel,
    SchemaNode, ValidationError,
};
use rayon::prelude::*;
use tracing::{debug, info_span};

use crate::value::check_value;

/// Check `document` against `schema` and return every violation found.
///
/// An empty list means the document conforms. Subtrees under the root are
/// checked in parallel; errors come back in document order.
pub fn validate(document: &ReportDocument, schema: &SchemaModel) -> Vec<ValidationError> {
    let span = info_span!("validate");
    let _guard = span.enter();
    let start = Instant::now();

    let root = document.root();
    let declared = schema.root();
    let location = Location::root(&root.name);

    let errors = if root.name != declared.name {
        vec![ValidationError::new(
            location,
            Constraint::RootElement {
                expected: declared.name.clone(),
            },
            format!("root element is {}, expected {}", root.name, declared.name),
        )]
    } else if root.namespace != declared.namespace {
        vec![namespace_error(location, declared, root)]
    } else {
        check_element(root, declared, &location, true)
    };

    debug!(
        errors = errors.len(),
        duration_ms = start.elapsed().as_millis(),
        "validate complete"
    );
    errors
}

fn check_element(
    element: &Element,
    node: &SchemaNode,
    location: &Location,
    parallel: bool,
) -> Vec<ValidationError> {
    let mut errors = check_attributes(element, node, location);
    match &node.content {
        NodeContent::Leaf(leaf) => {
            for (child, position) in with_positions(&element.children) {
                errors.push(ValidationError::new(
                    location.child(&child.name, position),
                    Constraint::UndeclaredElement,
                    format!(
                        "leaf element {} cannot contain element {}",
                        node.name, child.name
                    ),
                ));
            }
            let text = element.text.as_deref().unwrap_or_default();
            errors.extend(check_value(text, leaf, location));
        }
        NodeContent::Sequence(declarations) => {
            if let Some(text) = element.text.as_deref()
                && !text.trim().is_empty()
            {
                errors.push(ValidationError::new(
                    location.clone(),
                    Constraint::MixedContent,
                    format!("element {} cannot contain text", node.name),
                ));
            }
            errors.extend(check_sequence(element, declarations, location, parallel));
        }
    }
    errors
}

fn check_attributes(
    element: &Element,
    node: &SchemaNode,
    location: &Location,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = BTreeSet::new();
    for attribute in &element.attributes {
        let at = location.attribute(&attribute.name);
        if !seen.insert(attribute.name.as_str()) {
            errors.push(ValidationError::new(
                at,
                Constraint::DuplicateAttribute,
                format!("attribute {} appears more than once", attribute.name),
            ));
            continue;
        }
        match node.attribute(&attribute.name) {
            Some(declaration) => {
                errors.extend(check_value(&attribute.value, &declaration.leaf, &at));
            }
            None => errors.push(ValidationError::new(
                at,
                Constraint::UndeclaredAttribute,
                format!("attribute {} is not declared on {}", attribute.name, node.name),
            )),
        }
    }
    for declaration in &node.attributes {
        if declaration.required && !seen.contains(declaration.name.as_str()) {
            errors.push(ValidationError::new(
                location.attribute(&declaration.name),
                Constraint::MissingAttribute,
                format!("required attribute {} is missing", declaration.name),
            ));
        }
    }
    errors
}

/// Counts, order and namespaces of the children, then each child subtree.
fn check_sequence(
    element: &Element,
    declarations: &[SchemaNode],
    location: &Location,
    parallel: bool,
) -> Vec<ValidationError> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for child in &element.children {
        *totals.entry(child.name.as_str()).or_default() += 1;
    }

    let mut cursor = 0;
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut structural: Vec<(Vec<ValidationError>, bool)> =
        Vec::with_capacity(element.children.len());
    let mut subtrees: Vec<(&Element, &SchemaNode, Location)> = Vec::new();

    for (child, position) in with_positions(&element.children) {
        let at = location.child(&child.name, position);
        let mut found = Vec::new();
        let Some(index) = declarations.iter().position(|d| d.name == child.name) else {
            found.push(ValidationError::new(
                at,
                Constraint::UndeclaredElement,
                format!("element {} is not allowed in {}", child.name, element.name),
            ));
            structural.push((found, false));
            continue;
        };
        let declaration = &declarations[index];

        if child.namespace != declaration.namespace {
            found.push(namespace_error(at.clone(), declaration, child));
        }
        if index < cursor {
            let after = &declarations[cursor].name;
            found.push(ValidationError::new(
                at.clone(),
                Constraint::SequenceOrder {
                    after: after.clone(),
                },
                format!("element {} must come before {after}", child.name),
            ));
        } else {
            cursor = index;
        }

        let count = seen.entry(child.name.as_str()).or_default();
        *count += 1;
        if let MaxOccurs::Bounded(max) = declaration.occurs.max
            && *count == max as usize + 1
        {
            let actual = to_u32(totals[child.name.as_str()]);
            found.push(ValidationError::new(
                at.clone(),
                Constraint::MaxOccurs { max, actual },
                format!(
                    "element {} occurs {actual} times, at most {max} allowed",
                    child.name
                ),
            ));
        }

        structural.push((found, true));
        subtrees.push((child, declaration, at));
    }

    let nested: Vec<Vec<ValidationError>> = if parallel {
        subtrees
            .par_iter()
            .map(|(child, declaration, at)| check_element(child, declaration, at, false))
            .collect()
    } else {
        subtrees
            .iter()
            .map(|(child, declaration, at)| check_element(child, declaration, at, false))
            .collect()
    };

    let mut errors = Vec::new();
    let mut nested = nested.into_iter();
    for (found, checked) in structural {
        errors.extend(found);
        if checked && let Some(subtree) = nested.next() {
            errors.extend(subtree);
        }
    }

    for declaration in declarations {
        let actual = totals.get(declaration.name.as_str()).copied().unwrap_or(0);
        let min = declaration.occurs.min;
        if actual < min as usize {
            errors.push(ValidationError::new(
                location.child(&declaration.name, actual + 1),
                Constraint::MinOccurs {
                    min,
                    actual: to_u32(actual),
                },
                format!(
                    "element {} occurs {actual} times, at least {min} required",
                    declaration.name
                ),
            ));
        }
    }
    errors
}

fn namespace_error(
    location: Location,
    declaration: &SchemaNode,
    element: &Element,
) -> ValidationError {
    let shown = |namespace: Option<&str>| namespace.unwrap_or("no namespace").to_string();
    ValidationError::new(
        location,
        Constraint::Namespace {
            expected: declaration.namespace.clone(),
            actual: element.namespace.clone(),
        },
        format!(
            "element {} is in {}, expected {}",
            element.name,
            shown(element.namespace.as_deref()),
            shown(declaration.namespace.as_deref())
        ),
    )
}

/// Each child with its 1-based position among same-named siblings.
fn with_positions(children: &[Element]) -> Vec<(&Element, usize)> {
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();
    children
        .iter()
        .map(|child| {
            let position = positions.entry(child.name.as_str()).or_default();
            *position += 1;
            (child, *position)
        })
        .collect()
}

fn to_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
