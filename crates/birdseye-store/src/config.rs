//! Store configuration.

use std::path::PathBuf;

/// Tunables for an [`crate::AnnotatedStore`].
///
/// The defaults match typical interactive use: a few recent path queries
/// cached, sampling kicking in for anything bigger than a thumbnail.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// How many recent path-query results to keep (LRU). Zero disables
    /// the cache.
    pub query_cache_capacity: usize,
    /// Files at or above this byte size are hashed by sampling.
    pub sample_threshold: u64,
    /// Number of sample windows for large files (minimum 2).
    pub sample_count: u32,
    /// When set, source paths under this base are stored relative to it,
    /// so a relocated data folder keeps its records addressable.
    pub source_base_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_cache_capacity: 3,
            sample_threshold: 100_000,
            sample_count: 3,
            source_base_path: None,
        }
    }
}
