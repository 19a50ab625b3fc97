//! Field-to-path binding table.
//!
//! Each report section names an anchor element that is instantiated once per
//! record of that section, and binds record fields to leaves or attributes
//! below the anchor.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::schema::{SchemaNode, SchemaPath, resolve_from};

/// What to do with an optional element whose field is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    /// Leave the element out entirely.
    #[default]
    Omit,
    /// Emit-if-present-else-empty: write an empty element.
    Empty,
}

impl FromStr for EmitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "omit" => Ok(EmitMode::Omit),
            "empty" | "emit-if-present-else-empty" => Ok(EmitMode::Empty),
            other => Err(format!("unknown emit mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub field: String,
    /// Path relative to the section anchor.
    pub path: SchemaPath,
    #[serde(default)]
    pub emit: EmitMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBinding {
    pub section: String,
    /// Root-relative path of the element created per record.
    pub anchor: SchemaPath,
    /// Fields whose values cluster sibling anchor elements.
    #[serde(default)]
    pub group_by: Vec<String>,
    pub fields: Vec<FieldBinding>,
}

impl SectionBinding {
    pub fn new(section: impl Into<String>, anchor: &str) -> Self {
        Self {
            section: section.into(),
            anchor: SchemaPath::new(anchor),
            group_by: Vec::new(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn grouped_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn field(self, field: impl Into<String>, path: &str) -> Self {
        self.field_with(field, path, EmitMode::Omit)
    }

    #[must_use]
    pub fn field_with(mut self, field: impl Into<String>, path: &str, emit: EmitMode) -> Self {
        self.fields.push(FieldBinding {
            field: field.into(),
            path: SchemaPath::new(path),
            emit,
        });
        self
    }

    /// The binding targeting `relative` (an anchor-relative path), if any.
    pub fn binding_for(&self, relative: &SchemaPath) -> Option<&FieldBinding> {
        self.fields.iter().find(|binding| binding.path == *relative)
    }
}

/// Bindings checked against the schema tree they refer to.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    sections: Vec<SectionBinding>,
}

impl BindingTable {
    pub(crate) fn resolve(root: &SchemaNode, sections: Vec<SectionBinding>) -> Result<Self> {
        let mut names = BTreeSet::new();
        for section in &sections {
            if !names.insert(section.section.as_str()) {
                return Err(ModelError::DuplicateSection {
                    section: section.section.clone(),
                });
            }
            check_section(root, section)?;
        }

        for (index, section) in sections.iter().enumerate() {
            for other in &sections[index + 1..] {
                if overlaps(section, other) || overlaps(other, section) {
                    return Err(ModelError::NestedAnchor {
                        section: other.section.clone(),
                        other: section.section.clone(),
                    });
                }
            }
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[SectionBinding] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&SectionBinding> {
        self.sections.iter().find(|section| section.section == name)
    }

    pub fn anchored_at(&self, path: &SchemaPath) -> Option<&SectionBinding> {
        self.sections.iter().find(|section| section.anchor == *path)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Anchors may not nest, except below a root-anchored section whose own
/// fields stay clear of the inner anchor.
fn overlaps(outer: &SectionBinding, inner: &SectionBinding) -> bool {
    if !outer.anchor.is_prefix_of(&inner.anchor) {
        return false;
    }
    if !outer.anchor.is_root() || inner.anchor.is_root() {
        return true;
    }
    outer
        .fields
        .iter()
        .any(|binding| inner.anchor.is_prefix_of(&binding.path.element_path()))
}

fn check_section(root: &SchemaNode, section: &SectionBinding) -> Result<()> {
    let unresolved = |path: &SchemaPath| ModelError::UnresolvedPath {
        section: section.section.clone(),
        path: path.to_string(),
    };

    if section.anchor.attribute().is_some() {
        return Err(unresolved(&section.anchor));
    }
    let steps = section.anchor.steps();
    let anchor = resolve_from(root, steps).ok_or_else(|| unresolved(&section.anchor))?;
    for depth in 1..steps.len() {
        let ancestor = resolve_from(root, &steps[..depth])
            .ok_or_else(|| unresolved(&section.anchor))?;
        if ancestor.occurs.max.is_repeating() {
            return Err(ModelError::RepeatingAncestor {
                section: section.section.clone(),
                path: steps[..depth].join("/"),
            });
        }
    }

    let mut targets = BTreeSet::new();
    for binding in &section.fields {
        let full = section.anchor.join(&binding.path);
        let mut node = anchor;
        for step in binding.path.steps() {
            node = node.child(step).ok_or_else(|| unresolved(&full))?;
            if node.occurs.max.is_repeating() {
                return Err(ModelError::RepeatingInFieldPath {
                    section: section.section.clone(),
                    field: binding.field.clone(),
                    path: full.to_string(),
                });
            }
        }
        match binding.path.attribute() {
            Some(attribute) => {
                node.attribute(attribute).ok_or_else(|| unresolved(&full))?;
            }
            None if !node.is_leaf() => {
                return Err(ModelError::NotALeaf {
                    section: section.section.clone(),
                    field: binding.field.clone(),
                    path: full.to_string(),
                });
            }
            None => {}
        }
        if !targets.insert(binding.path.clone()) {
            return Err(ModelError::DuplicateBinding {
                section: section.section.clone(),
                path: full.to_string(),
            });
        }
    }
    Ok(())
}
