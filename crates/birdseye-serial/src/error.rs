//! Error types for the structural serializer.

/// Errors produced when converting values to or from primitive form.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SerialError {
    /// The value's shape has no serialization rule (e.g. an enumeration
    /// scalar with no matching variant).
    #[error("unsupported value: {0}")]
    Unsupported(String),

    /// A primitive had a different kind than the target shape expects.
    #[error("type mismatch: expected {expected}, got {actual}")]
    Mismatch {
        expected: &'static str,
        actual: String,
    },

    /// A required field was absent from a primitive mapping.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(String),
}

/// Convenience alias for serializer results.
pub type SerialResult<T> = Result<T, SerialError>;
