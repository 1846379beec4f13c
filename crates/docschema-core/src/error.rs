use thiserror::Error;

/// Errors raised by a document store backend.
///
/// Passed through the model layer unchanged so callers can tell
/// infrastructure failures apart from validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A write would violate a unique index.
    #[error("duplicate key in '{collection}' for index '{index}'")]
    DuplicateKey { collection: String, index: String },
    /// The named collection has not been created.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    /// The selector uses an operator or shape the store does not understand.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    /// The update document uses an operator or shape the store does not understand.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
    /// Catch-all for backend failures.
    #[error("store error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Core error type shared across docschema crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A field failed validation; carries the human readable message.
    #[error("{0}")]
    Validation(String),
    /// One or more unique fields collide with an existing document.
    #[error("{} must be unique", quote_fields(.fields))]
    NotUnique { fields: Vec<String> },
    /// A model was used before `initialize` completed.
    #[error("model '{0}' is not initialized")]
    NotInitialized(String),
    /// A model was used after the registry it belongs to was dropped.
    #[error("model '{0}' has outlived its registry")]
    Detached(String),
    /// A targeted document does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A schema or definition violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Store failure, passed through untouched.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// True for errors caused by the caller's data rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotUnique { .. })
    }
}

fn quote_fields(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| format!("'{field}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias for results returned by docschema crates.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_unique_lists_quoted_fields() {
        let err = Error::NotUnique {
            fields: vec!["slug".to_string(), "title".to_string()],
        };
        assert_eq!(err.to_string(), "'slug', 'title' must be unique");
    }

    #[test]
    fn store_errors_pass_through_display() {
        let err = Error::from(StoreError::CollectionNotFound("posts".to_string()));
        assert_eq!(err.to_string(), "collection not found: posts");
        assert!(!err.is_validation());
    }
}
