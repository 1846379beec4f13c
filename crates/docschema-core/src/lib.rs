//! Core contracts for docschema.
//!
//! This crate defines the typed field system, schemas, document ids, the
//! html sanitizer and the declarative definitions shared by the store, the
//! model layer and the CLI. It performs no I/O.

pub mod definition;
pub mod dependency;
pub mod document;
pub mod error;
pub mod graph;
pub mod html;
pub mod id;
pub mod items;
pub mod options;
pub mod redaction;
pub mod schema;
pub mod validation;

pub use definition::{CollectionDefinition, Definitions, FieldDefinition};
pub use dependency::{DependencyKind, DependencyRecord, read_dependencies};
pub use document::{Document, ID_FIELD, check_field_name, document_id, id_selector, into_document};
pub use error::{Error, Result, StoreError, StoreResult};
pub use graph::{ReferenceGraphReport, ReferenceGraphSummary, build_reference_report};
pub use html::{SanitizePolicy, Sanitized};
pub use id::{ObjectId, ParseObjectIdError};
pub use items::{
    Bool, Date, ForeignKey, Html, Id, IdArray, ItemFlags, Json, Kind, NumArray, Number,
    NumberType, SchemaItem, Text, TextArray,
};
pub use options::JsonOptions;
pub use redaction::{mask_text, redact_value};
pub use schema::Schema;
pub use validation::validate_definitions;
