//! Bounding-box annotations.

use birdseye_serial::{MapBuilder, MapReader, Portable, Primitive, SerialError, SerialResult};

/// Domain tag for annotation identity hashes.
const IDENTITY_DOMAIN: &str = "birdseye-annotation-v1";

/// Reviewer verdict attached to an annotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// A confirmed detection.
    #[default]
    Positive,
    /// A confirmed non-detection.
    Negative,
    /// Undecided.
    Neutral,
}

impl Verdict {
    pub fn as_int(self) -> i64 {
        match self {
            Verdict::Positive => 1,
            Verdict::Negative => -1,
            Verdict::Neutral => 0,
        }
    }

    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            1 => Some(Verdict::Positive),
            -1 => Some(Verdict::Negative),
            0 => Some(Verdict::Neutral),
            _ => None,
        }
    }
}

impl Portable for Verdict {
    fn to_primitive(&self) -> Primitive {
        Primitive::Int(self.as_int())
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let raw = value.as_i64()?;
        Verdict::from_int(raw)
            .ok_or_else(|| SerialError::Unsupported(format!("verdict value {raw}")))
    }
}

/// A labeled box over one frame.
///
/// The box is `(i, j, h, w)`: top row, left column, height, width in
/// pixels. `tags` is an ordered set -- order is meaningful and callers are
/// expected not to repeat entries.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationBox {
    pub ijhw: (i64, i64, i64, i64),
    pub label: String,
    pub value: Verdict,
    pub description: String,
    pub tags: Vec<String>,
}

impl AnnotationBox {
    pub fn new(ijhw: (i64, i64, i64, i64), label: impl Into<String>) -> Self {
        Self {
            ijhw,
            label: label.into(),
            value: Verdict::Positive,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    /// Top-left corner `(i, j)`.
    pub fn corner(&self) -> (i64, i64) {
        (self.ijhw.0, self.ijhw.1)
    }

    /// Deterministic identity, derived from the box geometry and verdict
    /// only. Labels, descriptions and tags can be edited without changing
    /// which annotation this is.
    pub fn identity(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(IDENTITY_DOMAIN.as_bytes());
        hasher.update(b":");
        let (i, j, h, w) = self.ijhw;
        for part in [i, j, h, w, self.value.as_int()] {
            hasher.update(&part.to_be_bytes());
        }
        let digest = hasher.finalize();
        let mut first = [0u8; 8];
        first.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_be_bytes(first)
    }
}

impl Portable for AnnotationBox {
    fn to_primitive(&self) -> Primitive {
        MapBuilder::new()
            .field("ijhw", &self.ijhw)
            .field("label", &self.label)
            .field("value", &self.value)
            .field("description", &self.description)
            .field("tags", &self.tags)
            .finish()
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let reader = MapReader::new(value)?;
        Ok(Self {
            ijhw: reader.required("ijhw")?,
            label: reader.or_default("label")?,
            value: reader.or_default("value")?,
            description: reader.or_default("description")?,
            tags: reader.or_default("tags")?,
        })
    }
}
