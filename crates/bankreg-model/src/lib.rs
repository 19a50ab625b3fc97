//! Shared types for the regulatory reporting pipeline: raw and canonical
//! records, the schema model with its binding table, report documents, and
//! the error records each stage produces.

pub mod binding;
pub mod decimal;
pub mod document;
pub mod error;
pub mod issue;
pub mod schema;
pub mod status;
pub mod value;
pub mod vocabulary;

pub use binding::{BindingTable, EmitMode, FieldBinding, SectionBinding};
pub use decimal::Decimal;
pub use document::{Attribute, Element, ReportDocument};
pub use error::{DecimalError, ModelError, Result};
pub use issue::{Constraint, DataQualityError, Location, PathSegment, ValidationError};
pub use schema::{
    AttributeDecl, Facets, LeafType, MaxOccurs, NodeContent, Occurs, Pattern, PrimitiveType,
    SchemaModel, SchemaNode, SchemaPath, WhiteSpace,
};
pub use status::BatchStatus;
pub use value::{Annotation, CanonicalRecord, CanonicalValue, RawRecord, RawValue, RowIndex};
pub use vocabulary::{Term, Vocabulary, VocabularyRegistry};
