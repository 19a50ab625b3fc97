use std::fmt;
use std::path::PathBuf;

use bankreg_model::RowIndex;
use serde::Serialize;

/// A mandatory element or attribute the records cannot fill.
///
/// Raised by the generator and fatal to the batch: it points at a binding
/// or data-supply defect, not at a single bad record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub struct StructuralGapError {
    /// Root-relative schema path of the missing node.
    pub path: String,
    pub section: Option<String>,
    pub field: Option<String>,
    /// Record whose anchor was being filled, if any.
    pub row: Option<RowIndex>,
}

impl fmt::Display for StructuralGapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no data for mandatory {}", self.path)?;
        match (&self.section, &self.field) {
            (Some(section), Some(field)) => write!(f, " (section {section}, field {field})")?,
            (Some(section), None) => write!(f, " (section {section})")?,
            (None, Some(field)) => write!(f, " (field {field})")?,
            (None, None) => {}
        }
        if let Some(row) = self.row {
            write!(f, " at row {row}")?;
        }
        Ok(())
    }
}

/// Errors raised while reading or writing report XML.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to write XML: {0}")]
    Write(#[from] std::io::Error),

    #[error("malformed document: {message}")]
    Malformed { message: String },
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
