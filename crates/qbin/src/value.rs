//! The dynamic, self-describing value tree.
//!
//! A [`Value`] is what a parsed stream looks like before any typed
//! conversion. [`Converter`](crate::Converter) reads typed data out of it and
//! [`ValueBuilder`](crate::ValueBuilder) builds one from packer events.

use std::fmt;

use enum_as_inner::EnumAsInner;
use qbin_stable_type_id::Identifiable;

use crate::error::{Error, Result};

/// A node of the value tree.
///
/// Integers keep the full wire range, `-2^63 ..= 2^64 - 1`, and narrow with
/// a range check when read as a fixed width type. Maps preserve the order
/// of their entries and may contain duplicate keys.
#[derive(Debug, Clone, PartialEq, Default, EnumAsInner, Identifiable)]
pub enum Value {
    /// The nil value.
    #[default]
    Nil,

    /// A boolean.
    Boolean(bool),

    /// An integer.
    Integer(i128),

    /// A 32 or 64 bit float.
    Float(Float),

    /// An opaque byte string. Text is carried as UTF-8 bytes.
    Raw(Vec<u8>),

    /// An ordered sequence.
    Array(Vec<Value>),

    /// An ordered sequence of key/value pairs.
    Map(Vec<(Value, Value)>),
}

/// A floating point number remembering its encoded width.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum Float {
    /// Single precision.
    F32(f32),

    /// Double precision.
    F64(f64),
}

impl Float {
    /// Returns the number widened to `f64`.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::F32(v) => v.into(),
            Self::F64(v) => v,
        }
    }

    /// Returns the number as `f32`, rounding double precision values.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_f32(self) -> f32 {
        match self {
            Self::F32(v) => v,
            Self::F64(v) => v as f32,
        }
    }
}

/// The kind tag of a [`Value`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    #[allow(missing_docs)]
    Nil,
    #[allow(missing_docs)]
    Boolean,
    #[allow(missing_docs)]
    Integer,
    #[allow(missing_docs)]
    Float,
    #[allow(missing_docs)]
    Raw,
    #[allow(missing_docs)]
    Array,
    #[allow(missing_docs)]
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nil => "nil",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Raw => "raw",
            Self::Array => "array",
            Self::Map => "map",
        })
    }
}

/// Smallest integer representable on the wire.
pub const WIRE_INT_MIN: i128 = i64::MIN as i128;

/// Largest integer representable on the wire.
pub const WIRE_INT_MAX: i128 = u64::MAX as i128;

impl Value {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Nil => ValueKind::Nil,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::Raw(_) => ValueKind::Raw,
            Self::Array(_) => ValueKind::Array,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Whether this value is an array or a map.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Map(_))
    }

    /// Builds a raw value from UTF-8 text.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::Raw(text.into().into_bytes())
    }

    /// Reads the value as a boolean.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not a boolean.
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(Error::mismatch(ValueKind::Boolean, other.kind())),
        }
    }

    /// Reads the value as an integer of type `I`.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not an integer, or
    /// [`Error::IntegerOutOfRange`] if it does not fit in `I`.
    pub fn to_int<I: TryFrom<i128>>(&self) -> Result<I> {
        match self {
            Self::Integer(v) => narrow(*v),
            other => Err(Error::mismatch(ValueKind::Integer, other.kind())),
        }
    }

    /// Reads the value as `f64`.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not a float.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Self::Float(v) => Ok(v.to_f64()),
            other => Err(Error::mismatch(ValueKind::Float, other.kind())),
        }
    }

    /// Reads the value as `f32`, rounding double precision values.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not a float.
    pub fn to_f32(&self) -> Result<f32> {
        match self {
            Self::Float(v) => Ok(v.to_f32()),
            other => Err(Error::mismatch(ValueKind::Float, other.kind())),
        }
    }

    /// Borrows the bytes of a raw value.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not raw.
    pub fn to_raw(&self) -> Result<&[u8]> {
        match self {
            Self::Raw(v) => Ok(v),
            other => Err(Error::mismatch(ValueKind::Raw, other.kind())),
        }
    }

    /// Borrows a raw value as UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value is not raw, or
    /// [`Error::InvalidData`] if the bytes are not UTF-8.
    pub fn to_str(&self) -> Result<&str> {
        std::str::from_utf8(self.to_raw()?)
            .map_err(|e| Error::invalid_data(format!("invalid UTF-8: {e}")))
    }
}

/// Narrows a wire integer to `I`, reporting the target on failure.
pub(crate) fn narrow<I: TryFrom<i128>>(value: i128) -> Result<I> {
    I::try_from(value).map_err(|_| Error::IntegerOutOfRange {
        value,
        target: std::any::type_name::<I>(),
    })
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self { Self::Integer(v.into()) }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self { Self::Boolean(v) }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self { Self::Float(Float::F32(v)) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Self::Float(Float::F64(v)) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::Raw(v.as_bytes().to_vec()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::Raw(v.into_bytes()) }
}

impl From<Vec<Self>> for Value {
    fn from(v: Vec<Self>) -> Self { Self::Array(v) }
}

impl From<Vec<(Self, Self)>> for Value {
    fn from(v: Vec<(Self, Self)>) -> Self { Self::Map(v) }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map_or(Self::Nil, Into::into) }
}

/// An opaque byte string, serialized as a raw value.
///
/// `Vec<u8>` serializes as an array of integers. Wrap it in [`Raw`] to get
/// the compact byte string encoding instead.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Identifiable,
)]
pub struct Raw(pub Vec<u8>);

impl std::ops::Deref for Raw {
    type Target = [u8];

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl From<Vec<u8>> for Raw {
    fn from(v: Vec<u8>) -> Self { Self(v) }
}

#[cfg(test)]
mod test;
