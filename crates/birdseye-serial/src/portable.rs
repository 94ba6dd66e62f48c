//! The [`Portable`] trait: the explicit rule table binding Rust shapes to
//! primitive form.
//!
//! Each supported shape gets its own implementation, resolved at compile
//! time. There is deliberately no reflection and no fallback: a shape
//! without an implementation does not serialize.

use crate::error::{SerialError, SerialResult};
use crate::primitive::Primitive;

/// Conversion between a Rust value and its portable primitive form.
///
/// The round-trip law: `T::from_primitive(&v.to_primitive()) == v` for every
/// supported value `v` (excluded transient fields excepted -- those come back
/// as their declared defaults).
pub trait Portable: Sized {
    fn to_primitive(&self) -> Primitive;
    fn from_primitive(value: &Primitive) -> SerialResult<Self>;
}

impl Portable for bool {
    fn to_primitive(&self) -> Primitive {
        Primitive::Bool(*self)
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        value.as_bool()
    }
}

impl Portable for i64 {
    fn to_primitive(&self) -> Primitive {
        Primitive::Int(*self)
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        value.as_i64()
    }
}

impl Portable for u32 {
    fn to_primitive(&self) -> Primitive {
        Primitive::Int(i64::from(*self))
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let raw = value.as_i64()?;
        u32::try_from(raw).map_err(|_| SerialError::Mismatch {
            expected: "unsigned 32-bit int",
            actual: format!("int {raw}"),
        })
    }
}

impl Portable for f64 {
    fn to_primitive(&self) -> Primitive {
        Primitive::Float(*self)
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        value.as_f64()
    }
}

impl Portable for String {
    fn to_primitive(&self) -> Primitive {
        Primitive::Str(self.clone())
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        value.as_str().map(str::to_owned)
    }
}

/// Absent values flatten to `Null`, matching the mapping-field convention
/// that a missing key and an explicit null mean the same thing.
impl<T: Portable> Portable for Option<T> {
    fn to_primitive(&self) -> Primitive {
        match self {
            Some(inner) => inner.to_primitive(),
            None => Primitive::Null,
        }
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_primitive(value).map(Some)
        }
    }
}

impl<T: Portable> Portable for Vec<T> {
    fn to_primitive(&self) -> Primitive {
        Primitive::Seq(self.iter().map(Portable::to_primitive).collect())
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        value.as_seq()?.iter().map(T::from_primitive).collect()
    }
}

fn fixed_len(items: &[Primitive], expected: &'static str, len: usize) -> SerialResult<()> {
    if items.len() == len {
        Ok(())
    } else {
        Err(SerialError::Mismatch {
            expected,
            actual: format!("sequence of length {}", items.len()),
        })
    }
}

impl<A: Portable, B: Portable> Portable for (A, B) {
    fn to_primitive(&self) -> Primitive {
        Primitive::Seq(vec![self.0.to_primitive(), self.1.to_primitive()])
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let items = value.as_seq()?;
        fixed_len(items, "sequence of length 2", 2)?;
        Ok((A::from_primitive(&items[0])?, B::from_primitive(&items[1])?))
    }
}

impl<A: Portable, B: Portable, C: Portable, D: Portable> Portable for (A, B, C, D) {
    fn to_primitive(&self) -> Primitive {
        Primitive::Seq(vec![
            self.0.to_primitive(),
            self.1.to_primitive(),
            self.2.to_primitive(),
            self.3.to_primitive(),
        ])
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let items = value.as_seq()?;
        fixed_len(items, "sequence of length 4", 4)?;
        Ok((
            A::from_primitive(&items[0])?,
            B::from_primitive(&items[1])?,
            C::from_primitive(&items[2])?,
            D::from_primitive(&items[3])?,
        ))
    }
}

/// Opaque binary payload (numeric array data and the like), carried through
/// the serializer unexamined and round-tripped byte-for-byte.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpaqueBytes(pub Vec<u8>);

impl Portable for OpaqueBytes {
    fn to_primitive(&self) -> Primitive {
        Primitive::Blob(self.0.clone())
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        value.as_blob().map(|bytes| OpaqueBytes(bytes.to_vec()))
    }
}
