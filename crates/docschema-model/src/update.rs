use docschema_core::ObjectId;

use crate::instance::ModelInstance;

/// Per-document outcome of a batch update.
#[derive(Debug, Clone)]
pub struct UpdateToken {
    pub id: ObjectId,
    pub error: bool,
    pub message: Option<String>,
    pub instance: ModelInstance,
}

/// Result of [`Model::update`](crate::Model::update).
///
/// Rows are updated independently: `tokens` keeps fetch order and `error` is
/// set when any row failed.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub error: bool,
    pub tokens: Vec<UpdateToken>,
}

impl UpdateRequest {
    pub(crate) fn succeeded(&mut self, id: ObjectId, instance: ModelInstance) {
        self.tokens.push(UpdateToken {
            id,
            error: false,
            message: None,
            instance,
        });
    }

    pub(crate) fn failed(&mut self, id: ObjectId, instance: ModelInstance, message: String) {
        self.error = true;
        self.tokens.push(UpdateToken {
            id,
            error: true,
            message: Some(message),
            instance,
        });
    }

    /// Tokens of rows that failed.
    pub fn failures(&self) -> impl Iterator<Item = &UpdateToken> {
        self.tokens.iter().filter(|token| token.error)
    }
}
