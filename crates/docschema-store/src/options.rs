use docschema_core::Document;

/// Sort direction for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Options that control how `find` behaves.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Sort keys, applied in order.
    pub sort: Vec<(String, SortDirection)>,
    /// Number of matching documents to skip.
    pub skip: Option<usize>,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
    /// Inclusion (`1`) or exclusion (`0`) projection.
    pub projection: Option<Document>,
}

impl FindOptions {
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((field.into(), direction));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Index over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// Non-unique single field index named after the field.
    pub fn single(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("{field}_1"),
            fields: vec![field],
            unique: false,
        }
    }

    /// Unique index; names are derived from the fields.
    pub fn unique(fields: Vec<String>) -> Self {
        Self {
            name: format!("{}_unique", fields.join("_1_")),
            fields,
            unique: true,
        }
    }
}
