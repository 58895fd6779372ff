// error.rs — Error types for the changeset subsystem.

use thiserror::Error;

/// Errors that can occur while diffing or encoding attribute maps.
#[derive(Debug, Error)]
pub enum ChangesetError {
    /// JSON serialization or deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML serialization or deserialization failure.
    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A stored column held something the codec cannot read
    /// (e.g., a structured value in a text column).
    #[error("invalid stored value: expected {expected}, found {found}")]
    UnexpectedStoredValue {
        expected: &'static str,
        found: String,
    },

    /// Invalid or malformed data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
