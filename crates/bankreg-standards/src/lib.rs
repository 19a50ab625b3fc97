#![deny(unsafe_code)]

//! Standards directory loading: manifest verification, the XSD subset
//! loader, binding and vocabulary tables.

pub mod bindings;
pub mod csv_utils;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod paths;
pub mod registry;
pub mod vocabulary;
pub mod xsd;

pub use crate::bindings::load_bindings;
pub use crate::error::StandardsError;
pub use crate::paths::{STANDARDS_ENV_VAR, standards_root};
pub use crate::registry::{StandardsRegistry, VerifySummary};
pub use crate::vocabulary::load_vocabularies;
pub use crate::xsd::{XsdError, load_xsd, parse_xsd};
