//! Content addressing for the birdseye annotated-imagery store.
//!
//! Three independent primitives:
//!
//! - [`SampledHasher`] / [`ContentDigest`] -- a fast, length-seeded, sampled
//!   256-bit digest of a file's bytes, used for deduplication and for the
//!   content half of stored filenames
//! - [`ContentStamp`] -- a time-ordered 128-bit identifier (timestamp /
//!   grouping tag / content randomness) for pooling files from many
//!   devices without name collisions
//! - [`record_key`] -- the fixed-seed 64-bit hash of a record's logical key,
//!   used as the index's primary key
//!
//! Nothing here knows about image formats or the store; this crate only
//! turns bytes, times, and identifiers into identifiers.

pub mod digest;
pub mod error;
pub mod key;
pub mod stamp;

pub use digest::{ContentDigest, SampledHasher};
pub use error::{AddressError, AddressResult};
pub use key::{record_key, record_key_for};
pub use stamp::{
    grouping_hash, stamp_prefix_of, strip_stamp_prefix, timestamp_from_stamped_path, ContentStamp,
    STAMP_STR_LEN,
};
