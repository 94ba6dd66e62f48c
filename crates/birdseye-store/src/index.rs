//! Index document types.
//!
//! The index is one JSON document mapping the stable 64-bit record key to
//! the container filename and the record's primitive form. It is a cache
//! of container-embedded truth: deleting it loses nothing, because a
//! reconcile pass rebuilds it from the image folder.

use std::collections::BTreeMap;

use birdseye_serial::Primitive;
use birdseye_types::SourceRecord;
use serde::{Deserialize, Serialize};

/// One persisted index entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Container filename within the store's image folder.
    pub filename: String,
    /// The record in primitive form.
    pub data: Primitive,
}

/// The whole on-disk document: record key → entry.
pub(crate) type IndexDocument = BTreeMap<u64, IndexRecord>;

/// A decoded index entry, as returned by lookups.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEntry {
    /// Stable hash of the record's `path:index` logical key.
    pub identifier: u64,
    /// Container filename within the store's image folder.
    pub filename: String,
    pub record: SourceRecord,
}
