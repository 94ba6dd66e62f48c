//! Structural serializer for annotated-imagery records.
//!
//! Converts structured values (nested mappings, sequences, enumerations,
//! scalars, opaque binary blobs) to and from a portable primitive form that
//! any text or binary encoder can carry. The metadata codec stores the
//! primitive form as JSON inside image containers; the record store persists
//! it in the index document.
//!
//! # Key Types
//!
//! - [`Primitive`] -- the portable form: null, bool, int, float, string,
//!   sequence, string-keyed mapping, or opaque blob
//! - [`Portable`] -- per-shape conversion rules, resolved at compile time
//! - [`MapBuilder`] / [`MapReader`] -- record field mapping with declared
//!   defaults, ignored extra keys, and an explicit transient exclusion hook
//! - [`OpaqueBytes`] -- blob passthrough for numeric array data
//!
//! This crate stands alone: it knows nothing about images, files, or the
//! store built on top of it.

pub mod error;
pub mod portable;
pub mod primitive;
pub mod record;

pub use error::{SerialError, SerialResult};
pub use portable::{OpaqueBytes, Portable};
pub use primitive::Primitive;
pub use record::{MapBuilder, MapReader};
