//! Document generation for the regulatory report.
//!
//! [`generate`] maps canonical records onto the schema tree through the
//! binding table. [`to_xml_string`] and [`write_document`] serialize the
//! result; [`read_document`] parses an existing report for validation.

pub mod error;
pub mod generator;
pub mod reader;
pub mod writer;

pub use error::{ReportError, StructuralGapError};
pub use generator::generate;
pub use reader::{read_document, read_document_file};
pub use writer::{to_xml_string, write_document, write_xml};
