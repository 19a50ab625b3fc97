//! Binding table loader (`bindings.csv`).
//!
//! Columns: `section`, `anchor`, `group_by`, `field`, `path`, `emit`.
//! One row per field binding; the section-level columns repeat on every row
//! of a section and must agree. A row without `field` declares a section
//! with no bindings of its own.

use std::path::Path;

use bankreg_model::{EmitMode, FieldBinding, SchemaPath, SectionBinding};

use crate::csv_utils::{get_optional, read_csv_rows, require, split_list};
use crate::error::StandardsError;

pub fn load_bindings(path: &Path) -> Result<Vec<SectionBinding>, StandardsError> {
    let rows = read_csv_rows(path)?;
    let mut sections: Vec<SectionBinding> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        let section_name = require(row, "section", path, line)?;
        let anchor = get_optional(row, "anchor").unwrap_or_default();
        let group_by = split_list(&get_optional(row, "group_by").unwrap_or_default());

        let position = match sections.iter().position(|s| s.section == section_name) {
            Some(position) => {
                let existing = &sections[position];
                if existing.anchor != SchemaPath::new(&anchor) || existing.group_by != group_by {
                    return Err(StandardsError::csv(
                        path,
                        format!("row {line}: section {section_name} redeclares its anchor"),
                    ));
                }
                position
            }
            None => {
                sections.push(SectionBinding::new(&section_name, &anchor).grouped_by(group_by));
                sections.len() - 1
            }
        };

        let Some(field) = get_optional(row, "field") else {
            continue;
        };
        let target = get_optional(row, "path").unwrap_or_default();
        let emit: EmitMode = get_optional(row, "emit")
            .unwrap_or_default()
            .parse()
            .map_err(|message: String| {
                StandardsError::csv(path, format!("row {line}: {message}"))
            })?;
        sections[position].fields.push(FieldBinding {
            field,
            path: SchemaPath::new(&target),
            emit,
        });
    }

    Ok(sections)
}
