//! A [`Packer`] that assembles a [`Value`] tree.

use crate::{
    error::{ProtocolViolation, Result},
    packer::Packer,
    value::{Float, Value},
};

/// Upper bound on speculative preallocation for declared container lengths.
const PREALLOCATION_LIMIT: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
enum Partial {
    Array { declared: usize, items: Vec<Value> },
    Map { declared: usize, entries: Vec<(Value, Value)>, key: Option<Value> },
}

/// Builds one [`Value`] out of packer events.
///
/// The builder is complete once a whole top-level value has been written.
/// Writing more after that, or closing a container with a different
/// element count than it declared, is a protocol violation.
///
/// ```ignore
/// let mut builder = ValueBuilder::new();
/// registry.pack(&mut builder, &point)?;
/// let tree = builder.finish()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueBuilder {
    open: Vec<Partial>,
    result: Option<Value>,
}

impl ValueBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self { Self { open: Vec::new(), result: None } }

    /// Whether a complete top-level value has been written.
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.result.is_some() }

    /// The complete value, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> { self.result.as_ref() }

    /// Number of containers currently open.
    #[must_use]
    pub fn depth(&self) -> usize { self.open.len() }

    /// Discards everything written so far.
    pub fn reset(&mut self) {
        self.open.clear();
        self.result = None;
    }

    /// Takes the complete value and resets the builder.
    pub fn take(&mut self) -> Option<Value> {
        self.open.clear();
        self.result.take()
    }

    /// Returns the complete value.
    ///
    /// # Errors
    ///
    /// [`ProtocolViolation::IncompleteValue`] if the value is not complete.
    pub fn finish(self) -> Result<Value> {
        self.result.ok_or_else(|| ProtocolViolation::IncompleteValue.into())
    }

    fn push(&mut self, value: Value) -> Result<()> {
        match self.open.last_mut() {
            None if self.result.is_some() => {
                Err(ProtocolViolation::ValueAlreadyComplete.into())
            }
            None => {
                self.result = Some(value);
                Ok(())
            }

            Some(Partial::Array { declared, items }) => {
                if items.len() == *declared {
                    return Err(overflow(*declared));
                }
                items.push(value);
                Ok(())
            }

            Some(Partial::Map { declared, entries, key }) => {
                match key.take() {
                    Some(key) => entries.push((key, value)),
                    None if entries.len() == *declared => {
                        return Err(overflow(*declared));
                    }
                    None => *key = Some(value),
                }
                Ok(())
            }
        }
    }

    fn open(&mut self, partial: Partial) -> Result<()> {
        if self.open.is_empty() && self.result.is_some() {
            return Err(ProtocolViolation::ValueAlreadyComplete.into());
        }

        self.open.push(partial);
        Ok(())
    }
}

const fn overflow(declared: usize) -> crate::Error {
    crate::Error::Protocol(ProtocolViolation::ElementCountMismatch {
        declared,
        written: declared + 1,
    })
}

impl Packer for ValueBuilder {
    fn write_nil(&mut self) -> Result<()> { self.push(Value::Nil) }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.push(Value::Boolean(v))
    }

    fn write_i64(&mut self, v: i64) -> Result<()> {
        self.push(Value::Integer(v.into()))
    }

    fn write_u64(&mut self, v: u64) -> Result<()> {
        self.push(Value::Integer(v.into()))
    }

    fn write_f32(&mut self, v: f32) -> Result<()> {
        self.push(Value::Float(Float::F32(v)))
    }

    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.push(Value::Float(Float::F64(v)))
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.push(Value::Raw(v.to_vec()))
    }

    fn write_array_begin(&mut self, len: usize) -> Result<()> {
        self.open(Partial::Array {
            declared: len,
            items: Vec::with_capacity(len.min(PREALLOCATION_LIMIT)),
        })
    }

    fn write_array_end(&mut self) -> Result<()> {
        if !matches!(self.open.last(), Some(Partial::Array { .. })) {
            return Err(ProtocolViolation::ArrayEndWithoutBegin.into());
        }
        let Some(Partial::Array { declared, items }) = self.open.pop() else {
            return Err(ProtocolViolation::ArrayEndWithoutBegin.into());
        };

        if items.len() != declared {
            return Err(ProtocolViolation::ElementCountMismatch {
                declared,
                written: items.len(),
            }
            .into());
        }

        self.push(Value::Array(items))
    }

    fn write_map_begin(&mut self, len: usize) -> Result<()> {
        self.open(Partial::Map {
            declared: len,
            entries: Vec::with_capacity(len.min(PREALLOCATION_LIMIT)),
            key: None,
        })
    }

    fn write_map_end(&mut self) -> Result<()> {
        if !matches!(self.open.last(), Some(Partial::Map { .. })) {
            return Err(ProtocolViolation::MapEndWithoutBegin.into());
        }
        let Some(Partial::Map { declared, entries, key }) = self.open.pop()
        else {
            return Err(ProtocolViolation::MapEndWithoutBegin.into());
        };

        if key.is_some() {
            return Err(ProtocolViolation::DanglingMapKey.into());
        }

        if entries.len() != declared {
            return Err(ProtocolViolation::ElementCountMismatch {
                declared,
                written: entries.len(),
            }
            .into());
        }

        self.push(Value::Map(entries))
    }

    // keep the exact integer instead of splitting on sign
    fn write_i128(&mut self, v: i128) -> Result<()> {
        if !(crate::value::WIRE_INT_MIN..=crate::value::WIRE_INT_MAX)
            .contains(&v)
        {
            return Err(crate::Error::IntegerOutOfRange {
                value: v,
                target: "wire integer",
            });
        }

        self.push(Value::Integer(v))
    }
}
