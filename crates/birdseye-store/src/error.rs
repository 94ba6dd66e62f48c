//! Error types for the record store.

use birdseye_addr::AddressError;
use birdseye_exif::ExifError;
use birdseye_serial::SerialError;

/// Errors from store operations.
///
/// Absences (unknown identifier, no matching record) are not errors: they
/// come back as `None` or `false` from the operation itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure during read, write, or removal.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The metadata codec rejected a container.
    #[error("metadata codec error: {0}")]
    Codec(#[from] ExifError),

    /// A record could not be converted to or from primitive form.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerialError),

    /// Content addressing failed (hashing a source file, usually I/O).
    #[error("content addressing error: {0}")]
    Address(#[from] AddressError),

    /// A stored JPEG's pixel data would not decode.
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// A container file carries no readable record.
    #[error("corrupt container file: {0}")]
    CorruptContainer(String),

    /// The index document on disk would not parse.
    #[error("index document error: {0}")]
    IndexDocument(String),

    /// A two-step delete removed the backing file but failed to update the
    /// index; the dangling entry is cleaned up by the next reconcile.
    #[error(
        "inconsistent delete of {identifier}: file {filename} removed but index update failed: {reason}"
    )]
    InconsistentDelete {
        identifier: u64,
        filename: String,
        reason: String,
    },
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
