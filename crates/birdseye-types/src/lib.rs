//! Foundation types for the birdseye annotated-imagery store.
//!
//! This crate defines the data model shared by the metadata codec, the
//! content-addressing layer, and the record store, together with the
//! serializer bindings that give every model type a portable primitive
//! form.
//!
//! # Key Types
//!
//! - [`SourceRecord`] -- one annotated frame: logical key, annotations,
//!   geo fix, grouping reference
//! - [`AnnotationBox`] / [`Verdict`] -- labeled boxes with a tri-state
//!   reviewer verdict
//! - [`GeoPosition`] / [`GeoFix`] -- geographic position, optionally
//!   observed at a timezone-aware moment
//! - [`RecordReference`] -- by-value foreign reference to a grouping record
//! - [`ImageFrame`] -- packed RGB8 pixel buffer
//! - [`media`] -- still-image / video path classification

pub mod annotation;
pub mod error;
pub mod frame;
pub mod geo;
pub mod media;
pub mod record;

pub use annotation::{AnnotationBox, Verdict};
pub use error::TypeError;
pub use frame::ImageFrame;
pub use geo::{haversine_distance_m, GeoFix, GeoPosition};
pub use media::{is_hidden_path, is_image_path, is_media_path, is_video_path};
pub use record::{channels, RecordReference, SourceRecord, MULTIPATH_SEPARATOR};
