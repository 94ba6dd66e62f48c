//! Errors from content-addressing operations.

/// Errors from hashing files and composing content stamps.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    /// I/O failure while reading a file for hashing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sampled hasher needs at least two sample windows.
    #[error("invalid sample count {0}: need at least 2")]
    InvalidSampleCount(u32),

    /// A content stamp string was not 26 Crockford base-32 characters.
    #[error("invalid content stamp: {0}")]
    InvalidStamp(String),

    /// A hex digest string was malformed.
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),
}

/// Convenience alias for addressing results.
pub type AddressResult<T> = Result<T, AddressError>;
