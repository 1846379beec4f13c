//! Document store collaborators.
//!
//! The model layer talks to storage through the [`Store`] and [`Collection`]
//! traits, which follow MongoDB semantics for selectors, projections and
//! update operators. [`MemoryStore`] is an in-process implementation.

pub mod memory;
pub mod options;
pub mod selector;
pub mod store;
pub mod update;

pub use memory::{MemoryCollection, MemoryStore};
pub use options::{FindOptions, IndexSpec, SortDirection};
pub use store::{Collection, Store, UpdateOutcome};

pub use docschema_core::{Document, StoreError, StoreResult};
