//! Errors produced by data-model operations.

/// Errors from parsing identifiers and constructing model values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// A source identifier could not be split into path and frame index.
    #[error("invalid source identifier: {0}")]
    InvalidSourceIdentifier(String),

    /// A frame index pointed outside a multi-path source.
    #[error("frame index {index} out of range for {count} sub-paths")]
    FrameIndexOutOfRange { index: usize, count: usize },

    /// A pixel buffer did not match its declared dimensions.
    #[error("pixel buffer of {actual} bytes does not match {width}x{height} RGB8 ({expected} bytes)")]
    InvalidFrameBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}
