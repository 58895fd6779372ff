// error.rs — Error types for draft records and draft tables.

use thiserror::Error;

use crate::draft::DraftId;

/// Errors that can occur during draft operations.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The draft failed validation (e.g., missing event). Nothing was written.
    #[error("draft is invalid: {0}")]
    Validation(String),

    /// The requested draft does not exist in its table.
    #[error("draft {id} not found in {class_name}")]
    NotFound { class_name: String, id: DraftId },

    /// A draft column could not be encoded or decoded.
    #[error("draft column error: {0}")]
    Codec(#[from] dw_changeset::ChangesetError),

    /// Invalid or malformed data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
