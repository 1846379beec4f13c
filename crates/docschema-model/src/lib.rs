//! Typed repositories over a document store.
//!
//! A [`Model`] owns one collection and the default [`Schema`] of its
//! documents. Reads wrap stored rows in [`ModelInstance`]s; writes only reach
//! the store once every field validates and unique fields are confirmed free.
//! Models are looked up by collection name through a [`ModelRegistry`].
//!
//! [`Schema`]: docschema_core::Schema

mod expand;
pub mod instance;
pub mod model;
pub mod registry;
mod relations;
pub mod update;

pub use instance::ModelInstance;
pub use model::{DeletePolicy, Model, ModelStatus};
pub use registry::{ModelDefinition, ModelRegistry};
pub use update::{UpdateRequest, UpdateToken};

pub use docschema_core::{Document, Error, JsonOptions, ObjectId, Result};
