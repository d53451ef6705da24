//! The read side of the conversion engine.

use crate::{
    builder::ValueBuilder,
    error::{Error, Result},
    value::Value,
};

/// A pull-style source of primitive read events.
///
/// Every read consumes one element of the innermost open container.
/// Reading past the declared length fails with [`Error::EndOfInput`]; a kind
/// mismatch fails with [`Error::TypeMismatch`] and leaves the element
/// unconsumed. Integer reads narrow with a range check.
///
/// The trait is object safe; templates receive a `&mut dyn Unpacker`.
///
/// # Example
///
/// ```ignore
/// let mut unpacker = StreamUnpacker::new(bytes.as_slice());
///
/// let len = unpacker.read_array_begin()?;
/// let id = unpacker.read_u32()?;
/// let name = unpacker.read_str()?;
/// unpacker.read_array_end(false)?; // skips anything left
/// ```
pub trait Unpacker {
    /// Consumes a nil.
    fn read_nil(&mut self) -> Result<()>;

    /// Consumes the next element if it is nil.
    ///
    /// Returns whether a nil was consumed. Fails with
    /// [`Error::EndOfInput`] if the current container is exhausted.
    fn try_read_nil(&mut self) -> Result<bool>;

    /// Like [`try_read_nil`](Self::try_read_nil), but also returns `true`
    /// without consuming anything when the current container is exhausted.
    ///
    /// Templates use this for trailing optional fields: data written by an
    /// older schema with fewer fields reads as if the tail were nil.
    fn try_skip_nil(&mut self) -> Result<bool>;

    /// Reads a boolean.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads an `i8`.
    fn read_i8(&mut self) -> Result<i8>;

    /// Reads an `i16`.
    fn read_i16(&mut self) -> Result<i16>;

    /// Reads an `i32`.
    fn read_i32(&mut self) -> Result<i32>;

    /// Reads an `i64`.
    fn read_i64(&mut self) -> Result<i64>;

    /// Reads a `u8`.
    fn read_u8(&mut self) -> Result<u8>;

    /// Reads a `u16`.
    fn read_u16(&mut self) -> Result<u16>;

    /// Reads a `u32`.
    fn read_u32(&mut self) -> Result<u32>;

    /// Reads a `u64`.
    fn read_u64(&mut self) -> Result<u64>;

    /// Reads an integer of any width within the wire range.
    fn read_i128(&mut self) -> Result<i128>;

    /// Reads a float as `f32`, rounding double precision values.
    fn read_f32(&mut self) -> Result<f32>;

    /// Reads a float as `f64`.
    fn read_f64(&mut self) -> Result<f64>;

    /// Reads an opaque byte string.
    fn read_bytes(&mut self) -> Result<Vec<u8>>;

    /// Opens an array and returns its length.
    fn read_array_begin(&mut self) -> Result<usize>;

    /// Closes the innermost array.
    ///
    /// With `check` set, fails with
    /// [`ProtocolViolation::UnconsumedElements`](crate::ProtocolViolation)
    /// if elements remain, leaving the state untouched. Otherwise the
    /// remaining elements are skipped.
    fn read_array_end(&mut self, check: bool) -> Result<()>;

    /// Opens a map and returns its number of entries.
    fn read_map_begin(&mut self) -> Result<usize>;

    /// Closes the innermost map, with the same `check` semantics as
    /// [`read_array_end`](Self::read_array_end).
    fn read_map_end(&mut self, check: bool) -> Result<()>;

    /// Consumes one complete element, whatever its kind or size.
    ///
    /// On failure the nesting state is unwound to where it was before the
    /// call.
    fn skip(&mut self) -> Result<()>;

    /// Reads one complete element into `builder`, which is reset first.
    fn read_value_into(&mut self, builder: &mut ValueBuilder) -> Result<()>;

    /// Number of currently open containers.
    fn depth(&self) -> usize;

    /// Reads one complete element as a value tree.
    fn read_value(&mut self) -> Result<Value> {
        let mut builder = ValueBuilder::new();
        self.read_value_into(&mut builder)?;
        builder.finish()
    }

    /// Reads a byte string as UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidData`] if the bytes are not UTF-8.
    fn read_str(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| Error::invalid_data(format!("invalid UTF-8: {e}")))
    }
}
