//! Metadata codec for the birdseye annotated-imagery store.
//!
//! Embeds a `(timestamp, position, payload)` triple in an image container's
//! EXIF-structured metadata block and recovers it with bounded, documented
//! precision loss (whole-second timestamps, ~1e-6 degree positions, ~1 cm
//! altitudes; payloads are exact).
//!
//! Two container paths:
//!
//! - **JPEG** ([`patch_jpeg`] / [`read_jpeg_metadata`]): the block is
//!   spliced in as an APP1 segment and every other byte of the source is
//!   copied through untouched -- no recompression, no pixel loss, no size
//!   blow-up.
//! - **TIFF** ([`write_tiff`] / [`read_tiff`]): a minimal baseline
//!   uncompressed container for frames with no reusable source bytes
//!   (video frames, vanished files). Pixels round-trip byte-for-byte.
//!
//! Decoding is tolerant at field level: a malformed GPS sub-block or
//! timestamp is logged and dropped while the rest of the block decodes.

pub mod block;
pub mod dms;
pub mod error;
pub mod jpeg;
pub mod metadata;
pub mod tiff;

pub use block::{decode_block, encode_block};
pub use dms::{
    altitude_to_rational, degrees_to_dms, dms_to_degrees, rational_to_altitude, Rational,
};
pub use error::{ExifError, ExifResult};
pub use jpeg::{extract_jpeg_block, is_jpeg, patch_jpeg, read_jpeg_metadata};
pub use metadata::ImageMetadata;
pub use tiff::{is_tiff, read_tiff, read_tiff_metadata, write_tiff};

/// Container formats the codec can recognize from leading magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Jpeg,
    Tiff,
}

/// Classify a byte stream by its magic, if it is a known container.
pub fn detect_container(data: &[u8]) -> Option<Container> {
    if is_jpeg(data) {
        Some(Container::Jpeg)
    } else if is_tiff(data) {
        Some(Container::Tiff)
    } else {
        None
    }
}

/// Decode the metadata of any recognized container stream.
pub fn read_metadata(data: &[u8]) -> ExifResult<ImageMetadata> {
    match detect_container(data) {
        Some(Container::Jpeg) => read_jpeg_metadata(data),
        Some(Container::Tiff) => read_tiff_metadata(data),
        None => Err(ExifError::UnknownContainer),
    }
}
