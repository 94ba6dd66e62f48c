//! Error types for the metadata codec.

use birdseye_serial::SerialError;

/// Errors from encoding or decoding container metadata.
#[derive(Debug, thiserror::Error)]
pub enum ExifError {
    /// The byte stream does not start with a JPEG marker.
    #[error("not a JPEG stream")]
    NotJpeg,

    /// The byte stream does not start with a TIFF header.
    #[error("not a TIFF stream")]
    NotTiff,

    /// The byte stream matches no known container magic.
    #[error("unrecognized container format")]
    UnknownContainer,

    /// The stream ended inside a structure that promised more bytes.
    #[error("truncated at byte {0}")]
    Truncated(usize),

    /// A structure was present but unreadable.
    #[error("malformed metadata: {0}")]
    Malformed(String),

    /// A valid file using features this codec does not handle
    /// (e.g. compressed TIFF strips).
    #[error("unsupported container layout: {0}")]
    UnsupportedLayout(String),

    /// The embedded payload could not be converted.
    #[error("serialization error: {0}")]
    Serial(#[from] SerialError),
}

/// Convenience alias for codec results.
pub type ExifResult<T> = Result<T, ExifError>;
