//! An [`Unpacker`] over an already parsed [`Value`] tree.
//!
//! The converter lets typed templates read from a value tree exactly as they
//! would read from a byte stream. The cursor is the pair of the nesting
//! stack and, per depth, the sibling slice being walked: the position within
//! a container is derived from how many of its elements remain.

use crate::{
    builder::ValueBuilder,
    config::{Config, DefaultConfig},
    error::{Error, ProtocolViolation, Result},
    packer::Packer,
    stack::{FrameKind, UnpackerStack},
    unpacker::Unpacker,
    value::{Value, ValueKind, narrow},
};

/// The elements of one nesting level, addressed by slot.
#[derive(Debug, Clone, Copy)]
enum Siblings<'v> {
    Root(&'v Value),
    Array(&'v [Value]),

    // slot 2i is the key of entry i, slot 2i + 1 its value
    Map(&'v [(Value, Value)]),
}

impl<'v> Siblings<'v> {
    const fn slots(self) -> usize {
        match self {
            Self::Root(_) => 1,
            Self::Array(items) => items.len(),
            Self::Map(entries) => entries.len() * 2,
        }
    }

    fn slot(self, index: usize) -> Option<&'v Value> {
        match self {
            Self::Root(value) => (index == 0).then_some(value),
            Self::Array(items) => items.get(index),
            Self::Map(entries) => entries.get(index / 2).map(|(key, value)| {
                if index % 2 == 0 { key } else { value }
            }),
        }
    }
}

/// Reads typed data out of a borrowed [`Value`] tree.
///
/// The tree must outlive the converter. Each converter serves one read
/// session; [`reset`](Self::reset) rewinds it to the root.
///
/// # Example
///
/// ```ignore
/// let tree = Value::Array(vec![Value::from(1u8), Value::string("a")]);
/// let mut converter = Converter::new(&tree);
///
/// assert_eq!(converter.read_array_begin()?, 2);
/// assert_eq!(converter.read_u8()?, 1);
/// converter.read_array_end(false)?;
/// assert!(converter.is_exhausted());
/// ```
#[derive(Debug, Clone)]
pub struct Converter<'v> {
    stack: UnpackerStack,
    siblings: Vec<Siblings<'v>>,
}

impl<'v> Converter<'v> {
    /// Creates a converter with the [`DefaultConfig`] limits.
    #[must_use]
    pub fn new(root: &'v Value) -> Self { Self::with_config::<DefaultConfig>(root) }

    /// Creates a converter with the limits of `C`.
    #[must_use]
    pub fn with_config<C: Config>(root: &'v Value) -> Self {
        Self::with_max_depth(root, C::max_depth())
    }

    /// Creates a converter allowing at most `max_depth` open containers.
    #[must_use]
    pub fn with_max_depth(root: &'v Value, max_depth: usize) -> Self {
        let mut siblings = Vec::with_capacity(max_depth.min(64) + 1);
        siblings.push(Siblings::Root(root));

        Self { stack: UnpackerStack::new(max_depth), siblings }
    }

    /// Rewinds to the root so the tree can be read again.
    pub fn reset(&mut self) {
        self.stack.reset();
        self.siblings.truncate(1);
    }

    /// Whether the root value has been fully consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.stack.depth() == 0 && self.stack.top_count() == 0
    }

    /// The element under the cursor.
    fn current(&self) -> Result<&'v Value> {
        self.stack.check_count()?;

        let siblings = self.siblings[self.stack.depth()];
        let index = siblings.slots() - self.stack.top_count();

        siblings.slot(index).ok_or(Error::EndOfInput)
    }

    /// Opens the frame of a container that has already been consumed from
    /// its parent. Scalars are left alone.
    fn descend(&mut self, value: &'v Value) -> Result<()> {
        let siblings = match value {
            Value::Array(items) => {
                self.stack.push_array(items.len())?;
                Siblings::Array(items)
            }
            Value::Map(entries) => {
                self.stack.push_map(entries.len())?;
                Siblings::Map(entries)
            }
            _ => return Ok(()),
        };

        self.siblings.truncate(self.stack.depth());
        self.siblings.push(siblings);

        Ok(())
    }

    /// Consumes and returns the element under the cursor.
    /// Fails while the element under the cursor is still in place if it is
    /// a container that cannot be opened.
    fn ensure_room_for_current(&self) -> Result<()> {
        if matches!(self.current()?, Value::Array(_) | Value::Map(_)) {
            self.stack.ensure_room()?;
        }

        Ok(())
    }

    fn advance(&mut self) -> Result<&'v Value> {
        let value = self.current()?;
        self.stack.reduce_count()?;

        Ok(value)
    }

    fn read_scalar<T>(
        &mut self,
        read: impl FnOnce(&'v Value) -> Result<T>,
    ) -> Result<T> {
        let value = read(self.current()?)?;
        self.stack.reduce_count()?;

        Ok(value)
    }

    fn read_int<I: TryFrom<i128>>(&mut self) -> Result<I> {
        self.read_scalar(Value::to_int)
    }

    fn begin(&mut self, expected: ValueKind) -> Result<usize> {
        let value = self.current()?;
        if value.kind() != expected {
            return Err(Error::mismatch(expected, value.kind()));
        }

        self.stack.ensure_room()?;
        self.stack.reduce_count()?;
        self.descend(value)?;

        Ok(match value {
            Value::Array(items) => items.len(),
            Value::Map(entries) => entries.len(),
            _ => 0,
        })
    }

    fn end(&mut self, kind: FrameKind, check: bool) -> Result<()> {
        if self.stack.top().kind() != kind {
            return Err(match kind {
                FrameKind::Map => ProtocolViolation::MapEndWithoutBegin,
                _ => ProtocolViolation::ArrayEndWithoutBegin,
            }
            .into());
        }

        let remaining = self.stack.top_count();
        if remaining > 0 {
            if check {
                return Err(
                    ProtocolViolation::UnconsumedElements { remaining }.into()
                );
            }

            for _ in 0..remaining {
                self.skip()?;
            }
        }

        self.stack.pop()?;
        Ok(())
    }

    /// Unwinds a failed multi-step operation back to `depth`.
    fn unwind(&mut self, depth: usize) {
        self.stack.truncate(depth);
        self.siblings.truncate(depth + 1);
    }

    fn skip_from(&mut self, target: usize) -> Result<()> {
        self.ensure_room_for_current()?;
        let value = self.advance()?;
        self.descend(value)?;

        while self.stack.depth() > target {
            if self.stack.top_count() == 0 {
                self.stack.pop()?;
                continue;
            }

            let value = self.advance()?;
            self.descend(value)?;
        }

        Ok(())
    }

    fn read_value_from(&mut self, builder: &mut ValueBuilder) -> Result<()> {
        loop {
            while self.stack.top_count() == 0 && self.stack.depth() > 0 {
                match self.stack.pop()?.kind() {
                    FrameKind::Map => builder.write_map_end()?,
                    _ => builder.write_array_end()?,
                }

                if builder.is_complete() {
                    return Ok(());
                }
            }

            let value = self.advance()?;
            match value {
                Value::Array(items) => builder.write_array_begin(items.len())?,
                Value::Map(entries) => {
                    builder.write_map_begin(entries.len())?;
                }
                scalar => builder.write_value(scalar)?,
            }

            if builder.is_complete() {
                return Ok(());
            }

            self.descend(value)?;
        }
    }
}

impl Unpacker for Converter<'_> {
    fn read_nil(&mut self) -> Result<()> {
        self.read_scalar(|value| match value {
            Value::Nil => Ok(()),
            other => Err(Error::mismatch(ValueKind::Nil, other.kind())),
        })
    }

    fn try_read_nil(&mut self) -> Result<bool> {
        if self.current()?.is_nil() {
            self.stack.reduce_count()?;
            return Ok(true);
        }

        Ok(false)
    }

    fn try_skip_nil(&mut self) -> Result<bool> {
        if self.stack.depth() > 0 && self.stack.top_count() == 0 {
            return Ok(true);
        }

        self.try_read_nil()
    }

    fn read_bool(&mut self) -> Result<bool> { self.read_scalar(Value::to_bool) }

    fn read_i8(&mut self) -> Result<i8> { self.read_int() }

    fn read_i16(&mut self) -> Result<i16> { self.read_int() }

    fn read_i32(&mut self) -> Result<i32> { self.read_int() }

    fn read_i64(&mut self) -> Result<i64> { self.read_int() }

    fn read_u8(&mut self) -> Result<u8> { self.read_int() }

    fn read_u16(&mut self) -> Result<u16> { self.read_int() }

    fn read_u32(&mut self) -> Result<u32> { self.read_int() }

    fn read_u64(&mut self) -> Result<u64> { self.read_int() }

    fn read_i128(&mut self) -> Result<i128> { self.read_int() }

    fn read_f32(&mut self) -> Result<f32> { self.read_scalar(Value::to_f32) }

    fn read_f64(&mut self) -> Result<f64> { self.read_scalar(Value::to_f64) }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_scalar(|value| value.to_raw().map(<[u8]>::to_vec))
    }

    fn read_str(&mut self) -> Result<String> {
        self.read_scalar(|value| value.to_str().map(str::to_owned))
    }

    fn read_array_begin(&mut self) -> Result<usize> {
        self.begin(ValueKind::Array)
    }

    fn read_array_end(&mut self, check: bool) -> Result<()> {
        self.end(FrameKind::Array, check)
    }

    fn read_map_begin(&mut self) -> Result<usize> { self.begin(ValueKind::Map) }

    fn read_map_end(&mut self, check: bool) -> Result<()> {
        self.end(FrameKind::Map, check)
    }

    fn skip(&mut self) -> Result<()> {
        let depth = self.stack.depth();
        let result = self.skip_from(depth);
        if result.is_err() {
            self.unwind(depth);
        }

        result
    }

    fn read_value_into(&mut self, builder: &mut ValueBuilder) -> Result<()> {
        builder.reset();
        self.ensure_room_for_current()?;

        let depth = self.stack.depth();
        let result = self.read_value_from(builder);
        if result.is_err() {
            self.unwind(depth);
        }

        result
    }

    fn depth(&self) -> usize { self.stack.depth() }
}
