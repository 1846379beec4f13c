use serde::{Deserialize, Serialize};

/// Controls how a document is rendered for outward facing payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonOptions {
    /// Include sensitive fields unredacted.
    pub verbose: bool,
    /// Replace foreign key ids with the referenced documents.
    pub expand_foreign_keys: bool,
    /// Number of reference hops followed when expanding.
    pub expand_max_depth: u32,
    /// Collections that are never expanded.
    pub expand_schema_blacklist: Vec<String>,
}

impl JsonOptions {
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    pub fn expanded(max_depth: u32) -> Self {
        Self {
            expand_foreign_keys: true,
            expand_max_depth: max_depth,
            ..Self::default()
        }
    }

    pub fn with_blacklist<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand_schema_blacklist = collections.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_blacklisted(&self, collection: &str) -> bool {
        self.expand_schema_blacklist
            .iter()
            .any(|name| name == collection)
    }
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            expand_foreign_keys: false,
            expand_max_depth: 1,
            expand_schema_blacklist: Vec::new(),
        }
    }
}
