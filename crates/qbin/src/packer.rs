//! The write side of the conversion engine.

use crate::{
    error::{Error, Result},
    value::{Float, Value},
};

/// A sink of primitive write events.
///
/// Containers are written as a begin call declaring the element count, the
/// elements themselves, then an end call. Map elements alternate between
/// key and value. Implementations reject element counts that disagree with
/// the declared length.
///
/// The trait is object safe; templates receive a `&mut dyn Packer`.
///
/// # Example
///
/// ```ignore
/// let mut packer = StreamPacker::new(Vec::new());
///
/// packer.write_array_begin(2)?;
/// packer.write_i64(-7)?;
/// packer.write_str("seven")?;
/// packer.write_array_end()?;
///
/// let bytes = packer.into_inner();
/// ```
pub trait Packer {
    // =========================================================================
    // Required methods
    // =========================================================================

    /// Writes nil.
    fn write_nil(&mut self) -> Result<()>;

    /// Writes a boolean.
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a signed integer.
    fn write_i64(&mut self, v: i64) -> Result<()>;

    /// Writes an unsigned integer.
    fn write_u64(&mut self, v: u64) -> Result<()>;

    /// Writes a single precision float.
    fn write_f32(&mut self, v: f32) -> Result<()>;

    /// Writes a double precision float.
    fn write_f64(&mut self, v: f64) -> Result<()>;

    /// Writes an opaque byte string.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Opens an array of `len` elements.
    fn write_array_begin(&mut self, len: usize) -> Result<()>;

    /// Closes the innermost array.
    fn write_array_end(&mut self) -> Result<()>;

    /// Opens a map of `len` entries.
    fn write_map_begin(&mut self, len: usize) -> Result<()>;

    /// Closes the innermost map.
    fn write_map_end(&mut self) -> Result<()>;

    // =========================================================================
    // Provided methods
    // =========================================================================

    /// Writes an `i8`.
    fn write_i8(&mut self, v: i8) -> Result<()> { self.write_i64(v.into()) }

    /// Writes an `i16`.
    fn write_i16(&mut self, v: i16) -> Result<()> { self.write_i64(v.into()) }

    /// Writes an `i32`.
    fn write_i32(&mut self, v: i32) -> Result<()> { self.write_i64(v.into()) }

    /// Writes a `u8`.
    fn write_u8(&mut self, v: u8) -> Result<()> { self.write_u64(v.into()) }

    /// Writes a `u16`.
    fn write_u16(&mut self, v: u16) -> Result<()> { self.write_u64(v.into()) }

    /// Writes a `u32`.
    fn write_u32(&mut self, v: u32) -> Result<()> { self.write_u64(v.into()) }

    /// Writes any integer within the wire range `-2^63 ..= 2^64 - 1`.
    ///
    /// # Errors
    ///
    /// [`Error::IntegerOutOfRange`] outside the wire range.
    fn write_i128(&mut self, v: i128) -> Result<()> {
        if let Ok(v) = i64::try_from(v) {
            self.write_i64(v)
        } else if let Ok(v) = u64::try_from(v) {
            self.write_u64(v)
        } else {
            Err(Error::IntegerOutOfRange { value: v, target: "wire integer" })
        }
    }

    /// Writes UTF-8 text as a byte string.
    fn write_str(&mut self, v: &str) -> Result<()> {
        self.write_bytes(v.as_bytes())
    }

    /// Writes a whole value tree.
    ///
    /// The tree is walked with an explicit work list, so arbitrarily deep
    /// trees do not grow the call stack.
    fn write_value(&mut self, value: &Value) -> Result<()> {
        enum Work<'a> {
            Value(&'a Value),
            ArrayEnd,
            MapEnd,
        }

        let mut work = vec![Work::Value(value)];

        while let Some(item) = work.pop() {
            match item {
                Work::ArrayEnd => self.write_array_end()?,
                Work::MapEnd => self.write_map_end()?,

                Work::Value(Value::Nil) => self.write_nil()?,
                Work::Value(Value::Boolean(v)) => self.write_bool(*v)?,
                Work::Value(Value::Integer(v)) => self.write_i128(*v)?,
                Work::Value(Value::Float(Float::F32(v))) => {
                    self.write_f32(*v)?;
                }
                Work::Value(Value::Float(Float::F64(v))) => {
                    self.write_f64(*v)?;
                }
                Work::Value(Value::Raw(v)) => self.write_bytes(v)?,

                Work::Value(Value::Array(items)) => {
                    self.write_array_begin(items.len())?;
                    work.push(Work::ArrayEnd);
                    work.extend(items.iter().rev().map(Work::Value));
                }
                Work::Value(Value::Map(entries)) => {
                    self.write_map_begin(entries.len())?;
                    work.push(Work::MapEnd);
                    for (key, value) in entries.iter().rev() {
                        work.push(Work::Value(value));
                        work.push(Work::Value(key));
                    }
                }
            }
        }

        Ok(())
    }
}
