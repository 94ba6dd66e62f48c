//! Annotated record store.
//!
//! Persists image+record pairs as self-contained container files under a
//! store root and maintains a queryable, rebuildable index over them:
//!
//! ```text
//! root/
//!   index.json        record key -> { filename, record primitive form }
//!   images/           one annotated container file per saved entry
//!   thumbnails/       reserved, currently unused
//! ```
//!
//! The container files are the source of truth -- every one embeds its
//! record in the image metadata block via the codec -- and the index is a
//! disposable cache over them, resynchronized by
//! [`AnnotatedStore::reconcile`].
//!
//! # Key Types
//!
//! - [`AnnotatedStore`] -- the store handle: save, lookup, load, query,
//!   delete, reconcile
//! - [`Filter`] / [`AnnotationFilter`] -- typed predicate trees for
//!   structural queries
//! - [`StoreConfig`] -- cache capacity, hash sampling, base-path
//!   relativization
//! - [`StoredEntry`] / [`IndexRecord`] -- index entry shapes
//!
//! # Concurrency
//!
//! Single-threaded, synchronous, blocking. One writer per store root at a
//! time is a usage precondition, not something the store enforces.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use filter::{AnnotationFilter, Filter};
pub use index::{IndexRecord, StoredEntry};
pub use store::AnnotatedStore;
