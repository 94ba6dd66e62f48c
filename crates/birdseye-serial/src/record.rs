//! Field-mapping helpers for record shapes.
//!
//! Records serialize as string-keyed mappings. [`MapBuilder`] emits named
//! fields (with an explicit transient exclusion hook); [`MapReader`] matches
//! mapping keys back to fields, substituting declared defaults for absent
//! keys and ignoring keys it was never asked about.

use std::collections::BTreeMap;

use crate::error::{SerialError, SerialResult};
use crate::portable::Portable;
use crate::primitive::Primitive;

/// Builds the primitive mapping for a record, field by field.
#[derive(Default)]
pub struct MapBuilder {
    entries: BTreeMap<String, Primitive>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a named field.
    pub fn field(mut self, name: &str, value: &impl Portable) -> Self {
        self.entries.insert(name.to_string(), value.to_primitive());
        self
    }

    /// Emit a pre-converted primitive under the given name.
    pub fn raw(mut self, name: &str, value: Primitive) -> Self {
        self.entries.insert(name.to_string(), value);
        self
    }

    /// Drop transient fields by name. This is the explicit exclusion hook
    /// for internally cached or derived data: excluded fields are absent
    /// from the serialized form and come back as their declared defaults.
    pub fn exclude(mut self, names: &[&str]) -> Self {
        for name in names {
            self.entries.remove(*name);
        }
        self
    }

    pub fn finish(self) -> Primitive {
        Primitive::Map(self.entries)
    }
}

/// Reads record fields out of a primitive mapping.
pub struct MapReader<'a> {
    entries: &'a BTreeMap<String, Primitive>,
}

impl<'a> MapReader<'a> {
    /// Wrap a primitive, failing unless it is a mapping.
    pub fn new(value: &'a Primitive) -> SerialResult<Self> {
        Ok(Self {
            entries: value.as_map()?,
        })
    }

    /// A field that must be present.
    pub fn required<T: Portable>(&self, name: &str) -> SerialResult<T> {
        match self.entries.get(name) {
            Some(value) => T::from_primitive(value),
            None => Err(SerialError::MissingField(name.to_string())),
        }
    }

    /// A field that falls back to `T::default()` when absent.
    pub fn or_default<T: Portable + Default>(&self, name: &str) -> SerialResult<T> {
        self.or_else(name, T::default)
    }

    /// A field that falls back to a computed default when absent.
    pub fn or_else<T: Portable>(&self, name: &str, fallback: impl FnOnce() -> T) -> SerialResult<T> {
        match self.entries.get(name) {
            Some(value) => T::from_primitive(value),
            None => Ok(fallback()),
        }
    }

    /// Raw access, mostly for version probes.
    pub fn get(&self, name: &str) -> Option<&'a Primitive> {
        self.entries.get(name)
    }
}
