// error.rs — Error types for items, the datastore, and draft lifecycles.

use dw_draft::{DraftError, ItemId};
use thiserror::Error;

/// Errors that can occur during item and draft lifecycle operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An item or draft failed validation. The surrounding transaction is
    /// rolled back; lifecycle entry points report this as `Ok(false)`.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No item type with this name is registered.
    #[error("unknown item type: {0}")]
    UnknownType(String),

    /// The record carries an attribute its type does not declare.
    #[error("{item_type} has no attribute '{attribute}'")]
    UnknownAttribute { item_type: String, attribute: String },

    /// The requested item does not exist.
    #[error("{item_type} {id} not found")]
    NotFound { item_type: String, id: ItemId },

    /// A drafting operation was requested on a type without draft options.
    #[error("{0} is not draftable")]
    NotDraftable(String),

    /// The operation needs a persisted record.
    #[error("{0} record has not been saved")]
    NotPersisted(String),

    /// A draft store operation failed for a reason other than validation.
    #[error("draft error: {0}")]
    Draft(DraftError),

    /// A snapshot or changeset could not be encoded or decoded.
    #[error("changeset error: {0}")]
    Changeset(#[from] dw_changeset::ChangesetError),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize datastore contents.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The schema configuration is invalid.
    #[error("config error: {0}")]
    ConfigError(String),
}

impl From<DraftError> for ModelError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::Validation(msg) => ModelError::Validation(msg),
            other => ModelError::Draft(other),
        }
    }
}

impl ModelError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ModelError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_validation_becomes_model_validation() {
        let err: ModelError = DraftError::Validation("event can't be blank".into()).into();
        assert!(err.is_validation());

        let err: ModelError = DraftError::InvalidData("bad".into()).into();
        assert!(matches!(err, ModelError::Draft(_)));
    }
}
