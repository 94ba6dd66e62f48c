//! The portable primitive form.
//!
//! Every serializable value reduces to a [`Primitive`] tree, which any text
//! or binary encoder can then carry. The JSON bridge here is what the
//! metadata codec and the index document use.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SerialError, SerialResult};

/// Key under which opaque binary blobs appear in the JSON image.
const BLOB_KEY: &str = "$blob";

/// A structured value reduced to portable parts.
///
/// Mappings are string-keyed and ordered; sequences preserve order. Blobs
/// are opaque byte runs (numeric array data and the like) that pass through
/// the serializer unexamined.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Primitive>),
    Map(BTreeMap<String, Primitive>),
    Blob(Vec<u8>),
}

impl Primitive {
    /// Short name of this primitive's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Null => "null",
            Primitive::Bool(_) => "bool",
            Primitive::Int(_) => "int",
            Primitive::Float(_) => "float",
            Primitive::Str(_) => "string",
            Primitive::Seq(_) => "sequence",
            Primitive::Map(_) => "mapping",
            Primitive::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Primitive::Null)
    }

    fn mismatch(&self, expected: &'static str) -> SerialError {
        SerialError::Mismatch {
            expected,
            actual: self.kind().to_string(),
        }
    }

    pub fn as_bool(&self) -> SerialResult<bool> {
        match self {
            Primitive::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_i64(&self) -> SerialResult<i64> {
        match self {
            Primitive::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    /// Integers widen losslessly to floats here.
    pub fn as_f64(&self) -> SerialResult<f64> {
        match self {
            Primitive::Float(f) => Ok(*f),
            Primitive::Int(i) => Ok(*i as f64),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_str(&self) -> SerialResult<&str> {
        match self {
            Primitive::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_seq(&self) -> SerialResult<&[Primitive]> {
        match self {
            Primitive::Seq(items) => Ok(items),
            other => Err(other.mismatch("sequence")),
        }
    }

    pub fn as_map(&self) -> SerialResult<&BTreeMap<String, Primitive>> {
        match self {
            Primitive::Map(entries) => Ok(entries),
            other => Err(other.mismatch("mapping")),
        }
    }

    pub fn as_blob(&self) -> SerialResult<&[u8]> {
        match self {
            Primitive::Blob(bytes) => Ok(bytes),
            other => Err(other.mismatch("blob")),
        }
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> SerialResult<String> {
        serde_json::to_string(self).map_err(|e| SerialError::Json(e.to_string()))
    }

    /// Decode from a JSON string.
    pub fn from_json(text: &str) -> SerialResult<Primitive> {
        serde_json::from_str(text).map_err(|e| SerialError::Json(e.to_string()))
    }
}

impl Serialize for Primitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Primitive::Null => serializer.serialize_unit(),
            Primitive::Bool(b) => serializer.serialize_bool(*b),
            Primitive::Int(i) => serializer.serialize_i64(*i),
            Primitive::Float(f) => serializer.serialize_f64(*f),
            Primitive::Str(s) => serializer.serialize_str(s),
            Primitive::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Primitive::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Primitive::Blob(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BLOB_KEY, &hex::encode(bytes))?;
                map.end()
            }
        }
    }
}

struct PrimitiveVisitor;

impl<'de> Visitor<'de> for PrimitiveVisitor {
    type Value = Primitive;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-compatible primitive value")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Primitive, E> {
        Ok(Primitive::Null)
    }

    fn visit_bool<E: serde::de::Error>(self, value: bool) -> Result<Primitive, E> {
        Ok(Primitive::Bool(value))
    }

    fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Primitive, E> {
        Ok(Primitive::Int(value))
    }

    fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Primitive, E> {
        i64::try_from(value)
            .map(Primitive::Int)
            .map_err(|_| E::custom(format!("integer {value} out of range")))
    }

    fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Primitive, E> {
        Ok(Primitive::Float(value))
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Primitive, E> {
        Ok(Primitive::Str(value.to_owned()))
    }

    fn visit_string<E: serde::de::Error>(self, value: String) -> Result<Primitive, E> {
        Ok(Primitive::Str(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Primitive, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Primitive>()? {
            items.push(item);
        }
        Ok(Primitive::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Primitive, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Primitive>()? {
            entries.insert(key, value);
        }
        // A single-entry {"$blob": "<hex>"} mapping is the JSON image of a blob.
        if entries.len() == 1 {
            if let Some(Primitive::Str(encoded)) = entries.get(BLOB_KEY) {
                if let Ok(bytes) = hex::decode(encoded) {
                    return Ok(Primitive::Blob(bytes));
                }
            }
        }
        Ok(Primitive::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Primitive {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PrimitiveVisitor)
    }
}
