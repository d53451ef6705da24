//! MessagePack compatible binary encoding.
//!
//! [`StreamPacker`] and [`StreamUnpacker`] implement [`Packer`] and
//! [`Unpacker`] over [`std::io::Write`] and [`std::io::Read`].
//!
//! # Format Overview
//!
//! Every value starts with a type byte, multi-byte payloads are big-endian:
//!
//! - **Integers**: positive fixint `0x00..=0x7f`, negative fixint
//!   `0xe0..=0xff`, then `0xcc..=0xcf` (u8 to u64) and `0xd0..=0xd3` (i8 to
//!   i64). The smallest encoding is always chosen.
//! - **Nil and booleans**: `0xc0`, `0xc2` (false), `0xc3` (true).
//! - **Floats**: `0xca` (f32) and `0xcb` (f64).
//! - **Raw bytes**: fixraw `0xa0..=0xbf`, then `0xda` (16-bit length) and
//!   `0xdb` (32-bit length). `0xd9` and the `0xc4..=0xc6` binary family are
//!   accepted when reading.
//! - **Arrays**: fixarray `0x90..=0x9f`, `0xdc`, `0xdd`.
//! - **Maps**: fixmap `0x80..=0x8f`, `0xde`, `0xdf`.
//!
//! Extension types are rejected as invalid data.
//!
//! # Example
//!
//! ```ignore
//! use qbin::stream::{StreamPacker, StreamUnpacker};
//!
//! let mut packer = StreamPacker::new(Vec::new());
//! packer.write_array_begin(2)?;
//! packer.write_u32(42)?;
//! packer.write_str("answer")?;
//! packer.write_array_end()?;
//! let bytes = packer.finish()?;
//!
//! let mut unpacker = StreamUnpacker::new(bytes.as_slice());
//! assert_eq!(unpacker.read_array_begin()?, 2);
//! assert_eq!(unpacker.read_u32()?, 42);
//! ```

use std::io::{self, Read, Write};

use crate::{
    builder::ValueBuilder,
    config::{Config, DefaultConfig},
    error::{Error, ProtocolViolation, Result},
    packer::Packer,
    stack::{FrameKind, UnpackerStack},
    unpacker::Unpacker,
    value::{Value, ValueKind, narrow},
};

// =============================================================================
// Type bytes
// =============================================================================

const NIL: u8 = 0xc0;
const FALSE: u8 = 0xc2;
const TRUE: u8 = 0xc3;
const BIN8: u8 = 0xc4;
const BIN16: u8 = 0xc5;
const BIN32: u8 = 0xc6;
const FLOAT32: u8 = 0xca;
const FLOAT64: u8 = 0xcb;
const UINT8: u8 = 0xcc;
const UINT16: u8 = 0xcd;
const UINT32: u8 = 0xce;
const UINT64: u8 = 0xcf;
const INT8: u8 = 0xd0;
const INT16: u8 = 0xd1;
const INT32: u8 = 0xd2;
const INT64: u8 = 0xd3;
const STR8: u8 = 0xd9;
const RAW16: u8 = 0xda;
const RAW32: u8 = 0xdb;
const ARRAY16: u8 = 0xdc;
const ARRAY32: u8 = 0xdd;
const MAP16: u8 = 0xde;
const MAP32: u8 = 0xdf;

const FIXMAP: u8 = 0x80;
const FIXARRAY: u8 = 0x90;
const FIXRAW: u8 = 0xa0;

// =============================================================================
// StreamPacker
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct PackFrame {
    kind: FrameKind,
    len: usize,
    slots: usize,
    written: usize,
}

impl PackFrame {
    const fn entries(&self) -> usize {
        match self.kind {
            FrameKind::Map => self.written / 2,
            _ => self.written,
        }
    }
}

/// Writes the binary format to any [`Write`] implementation.
///
/// The packer tracks open containers and rejects writes that disagree with
/// the declared lengths. Several top-level values may be written one after
/// another.
///
/// ```ignore
/// // to memory
/// let packer = StreamPacker::new(Vec::new());
///
/// // to a file
/// let file = std::fs::File::create("output.bin")?;
/// let packer = StreamPacker::new(std::io::BufWriter::new(file));
/// ```
#[derive(Debug)]
pub struct StreamPacker<W> {
    writer: W,
    open: Vec<PackFrame>,
}

impl<W> StreamPacker<W> {
    /// Creates a packer wrapping the given writer.
    #[must_use]
    pub const fn new(writer: W) -> Self { Self { writer, open: Vec::new() } }

    /// Returns a reference to the underlying writer.
    #[must_use]
    pub const fn get_ref(&self) -> &W { &self.writer }

    /// Returns a mutable reference to the underlying writer.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn get_mut(&mut self) -> &mut W { &mut self.writer }

    /// Consumes the packer and returns the underlying writer, whether or not
    /// every container was closed.
    #[must_use]
    pub fn into_inner(self) -> W { self.writer }

    /// Number of containers currently open.
    #[must_use]
    pub fn depth(&self) -> usize { self.open.len() }

    /// Consumes the packer and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// [`ProtocolViolation::IncompleteValue`] if a container is still open.
    pub fn finish(self) -> Result<W> {
        if !self.open.is_empty() {
            return Err(ProtocolViolation::IncompleteValue.into());
        }

        Ok(self.writer)
    }
}

impl<W: Write> StreamPacker<W> {
    /// Flushes the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates the writer's failure.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(Error::from)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(Error::from)
    }

    /// Writes a type byte followed by its payload.
    fn header(&mut self, marker: u8, payload: &[u8]) -> Result<()> {
        let mut buf = [0u8; 9];
        buf[0] = marker;
        buf[1..=payload.len()].copy_from_slice(payload);

        self.put(&buf[..=payload.len()])
    }

    /// Accounts for one element in the innermost open container.
    fn element(&mut self) -> Result<()> {
        if let Some(frame) = self.open.last_mut() {
            if frame.written == frame.slots {
                return Err(ProtocolViolation::ElementCountMismatch {
                    declared: frame.len,
                    written: frame.len + 1,
                }
                .into());
            }

            frame.written += 1;
        }

        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn length(
        &mut self,
        len: usize,
        fix: u8,
        fix_max: usize,
        markers: (u8, u8),
    ) -> Result<()> {
        if len <= fix_max {
            self.put(&[fix | len as u8])
        } else if let Ok(len) = u16::try_from(len) {
            self.header(markers.0, &len.to_be_bytes())
        } else if let Ok(len) = u32::try_from(len) {
            self.header(markers.1, &len.to_be_bytes())
        } else {
            Err(Error::invalid_data(format!("length {len} exceeds u32")))
        }
    }

    fn open(&mut self, kind: FrameKind, len: usize) -> Result<()> {
        self.element()?;

        let slots = match kind {
            FrameKind::Map => {
                self.length(len, FIXMAP, 15, (MAP16, MAP32))?;
                len * 2
            }
            _ => {
                self.length(len, FIXARRAY, 15, (ARRAY16, ARRAY32))?;
                len
            }
        };

        self.open.push(PackFrame { kind, len, slots, written: 0 });
        Ok(())
    }

    fn close(&mut self, kind: FrameKind) -> Result<()> {
        let Some(frame) = self.open.last().copied().filter(|f| f.kind == kind)
        else {
            return Err(match kind {
                FrameKind::Map => ProtocolViolation::MapEndWithoutBegin,
                _ => ProtocolViolation::ArrayEndWithoutBegin,
            }
            .into());
        };

        if frame.written != frame.slots {
            return Err(if frame.written % 2 == 1 && kind == FrameKind::Map {
                ProtocolViolation::DanglingMapKey
            } else {
                ProtocolViolation::ElementCountMismatch {
                    declared: frame.len,
                    written: frame.entries(),
                }
            }
            .into());
        }

        self.open.pop();
        Ok(())
    }
}

impl<W: Write> Packer for StreamPacker<W> {
    fn write_nil(&mut self) -> Result<()> {
        self.element()?;
        self.put(&[NIL])
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.element()?;
        self.put(&[if v { TRUE } else { FALSE }])
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_i64(&mut self, v: i64) -> Result<()> {
        if let Ok(v) = u64::try_from(v) {
            return self.write_u64(v);
        }

        self.element()?;

        if v >= -32 {
            self.put(&[v as u8])
        } else if let Ok(v) = i8::try_from(v) {
            self.header(INT8, &v.to_be_bytes())
        } else if let Ok(v) = i16::try_from(v) {
            self.header(INT16, &v.to_be_bytes())
        } else if let Ok(v) = i32::try_from(v) {
            self.header(INT32, &v.to_be_bytes())
        } else {
            self.header(INT64, &v.to_be_bytes())
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_u64(&mut self, v: u64) -> Result<()> {
        self.element()?;

        if v < 0x80 {
            self.put(&[v as u8])
        } else if let Ok(v) = u8::try_from(v) {
            self.header(UINT8, &[v])
        } else if let Ok(v) = u16::try_from(v) {
            self.header(UINT16, &v.to_be_bytes())
        } else if let Ok(v) = u32::try_from(v) {
            self.header(UINT32, &v.to_be_bytes())
        } else {
            self.header(UINT64, &v.to_be_bytes())
        }
    }

    fn write_f32(&mut self, v: f32) -> Result<()> {
        self.element()?;
        self.header(FLOAT32, &v.to_be_bytes())
    }

    fn write_f64(&mut self, v: f64) -> Result<()> {
        self.element()?;
        self.header(FLOAT64, &v.to_be_bytes())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.element()?;
        self.length(v.len(), FIXRAW, 31, (RAW16, RAW32))?;
        self.put(v)
    }

    fn write_array_begin(&mut self, len: usize) -> Result<()> {
        self.open(FrameKind::Array, len)
    }

    fn write_array_end(&mut self) -> Result<()> { self.close(FrameKind::Array) }

    fn write_map_begin(&mut self, len: usize) -> Result<()> {
        self.open(FrameKind::Map, len)
    }

    fn write_map_end(&mut self) -> Result<()> { self.close(FrameKind::Map) }
}

// =============================================================================
// StreamUnpacker
// =============================================================================

/// A decoded type byte together with its fixed-size payload. Raw payloads
/// are left in the reader until consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Head {
    Nil,
    Bool(bool),
    Int(i128),
    F32(f32),
    F64(f64),
    Raw(usize),
    Array(usize),
    Map(usize),
}

impl Head {
    const fn kind(self) -> ValueKind {
        match self {
            Self::Nil => ValueKind::Nil,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Int(_) => ValueKind::Integer,
            Self::F32(_) | Self::F64(_) => ValueKind::Float,
            Self::Raw(_) => ValueKind::Raw,
            Self::Array(_) => ValueKind::Array,
            Self::Map(_) => ValueKind::Map,
        }
    }
}

/// Reads the binary format from any [`Read`] implementation.
///
/// The unpacker peeks one type byte ahead, so a kind mismatch leaves the
/// element unconsumed exactly like [`Converter`](crate::Converter) does.
/// Once a top-level value has been consumed, the next read starts a new
/// top-level value.
///
/// Reading from a slice advances the slice, which makes it easy to check
/// for trailing input:
///
/// ```ignore
/// let mut unpacker = StreamUnpacker::new(bytes.as_slice());
/// let value = unpacker.read_value()?;
/// assert!(unpacker.get_ref().is_empty());
/// ```
#[derive(Debug)]
pub struct StreamUnpacker<R> {
    reader: R,
    stack: UnpackerStack,
    head: Option<Head>,
    max_container_len: usize,
    max_raw_len: usize,
}

impl<R> StreamUnpacker<R> {
    /// Creates an unpacker with the [`DefaultConfig`] limits.
    #[must_use]
    pub fn new(reader: R) -> Self { Self::with_config::<DefaultConfig>(reader) }

    /// Creates an unpacker with the limits of `C`.
    #[must_use]
    pub fn with_config<C: Config>(reader: R) -> Self {
        Self {
            reader,
            stack: UnpackerStack::new(C::max_depth()),
            head: None,
            max_container_len: C::max_container_len(),
            max_raw_len: C::max_raw_len(),
        }
    }

    /// Returns a reference to the underlying reader.
    #[must_use]
    pub const fn get_ref(&self) -> &R { &self.reader }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Reading from it while an element is peeked or a container is open
    /// desynchronizes the unpacker.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn get_mut(&mut self) -> &mut R { &mut self.reader }

    /// Consumes the unpacker and returns the underlying reader.
    #[must_use]
    pub fn into_inner(self) -> R { self.reader }
}

impl<R: Read> StreamUnpacker<R> {
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf).map_err(Error::from_io)?;
        Ok(buf)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    fn read_len16(&mut self) -> Result<usize> {
        Ok(u16::from_be_bytes(self.read_array()?).into())
    }

    fn read_len32(&mut self) -> Result<usize> {
        usize::try_from(u32::from_be_bytes(self.read_array()?))
            .map_err(|_| Error::invalid_data("length exceeds usize"))
    }

    #[allow(clippy::cast_possible_wrap)]
    fn read_head(&mut self) -> Result<Head> {
        let byte = self.read_byte()?;

        let head = match byte {
            0x00..=0x7f => Head::Int(byte.into()),
            0x80..=0x8f => Head::Map((byte & 0x0f).into()),
            0x90..=0x9f => Head::Array((byte & 0x0f).into()),
            0xa0..=0xbf => Head::Raw((byte & 0x1f).into()),
            0xe0..=0xff => Head::Int((byte as i8).into()),

            NIL => Head::Nil,
            FALSE => Head::Bool(false),
            TRUE => Head::Bool(true),

            BIN8 | STR8 => Head::Raw(self.read_byte()?.into()),
            BIN16 | RAW16 => Head::Raw(self.read_len16()?),
            BIN32 | RAW32 => Head::Raw(self.read_len32()?),

            FLOAT32 => Head::F32(f32::from_be_bytes(self.read_array()?)),
            FLOAT64 => Head::F64(f64::from_be_bytes(self.read_array()?)),

            UINT8 => Head::Int(self.read_byte()?.into()),
            UINT16 => Head::Int(u16::from_be_bytes(self.read_array()?).into()),
            UINT32 => Head::Int(u32::from_be_bytes(self.read_array()?).into()),
            UINT64 => Head::Int(u64::from_be_bytes(self.read_array()?).into()),
            INT8 => Head::Int(i8::from_be_bytes(self.read_array()?).into()),
            INT16 => Head::Int(i16::from_be_bytes(self.read_array()?).into()),
            INT32 => Head::Int(i32::from_be_bytes(self.read_array()?).into()),
            INT64 => Head::Int(i64::from_be_bytes(self.read_array()?).into()),

            ARRAY16 => Head::Array(self.read_len16()?),
            ARRAY32 => Head::Array(self.read_len32()?),
            MAP16 => Head::Map(self.read_len16()?),
            MAP32 => Head::Map(self.read_len32()?),

            other => {
                return Err(Error::invalid_data(format!(
                    "unsupported type byte 0x{other:02x}"
                )));
            }
        };

        match head {
            Head::Raw(len) if len > self.max_raw_len => Err(Error::invalid_data(
                format!("raw length {len} exceeds {}", self.max_raw_len),
            )),
            Head::Array(len) | Head::Map(len) if len > self.max_container_len => {
                Err(Error::invalid_data(format!(
                    "container length {len} exceeds {}",
                    self.max_container_len
                )))
            }
            head => Ok(head),
        }
    }

    /// The element under the cursor, decoding its header if needed.
    fn peek(&mut self) -> Result<Head> {
        // a finished top-level value makes room for the next one
        if self.stack.depth() == 0 && self.stack.top_count() == 0 {
            self.stack.reset();
        }

        self.stack.check_count()?;

        if let Some(head) = self.head {
            return Ok(head);
        }

        let head = self.read_head()?;
        self.head = Some(head);

        Ok(head)
    }

    /// Fails while the element under the cursor is still in place if it is
    /// a container that cannot be opened.
    fn ensure_room_for_current(&mut self) -> Result<()> {
        if matches!(self.peek()?, Head::Array(_) | Head::Map(_)) {
            self.stack.ensure_room()?;
        }

        Ok(())
    }

    /// Consumes the element under the cursor. Raw payloads stay in the
    /// reader.
    fn advance(&mut self) -> Result<Head> {
        let head = self.peek()?;
        self.stack.reduce_count()?;
        self.head = None;

        Ok(head)
    }

    fn read_payload(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).map_err(Error::from_io)?;
        Ok(buf)
    }

    fn skip_payload(&mut self, len: usize) -> Result<()> {
        let len = len as u64;
        let copied = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())
            .map_err(Error::from_io)?;

        if copied != len {
            return Err(Error::EndOfInput);
        }

        Ok(())
    }

    fn read_scalar<T>(
        &mut self,
        read: impl FnOnce(Head) -> Result<T>,
    ) -> Result<T> {
        let value = read(self.peek()?)?;
        self.advance()?;

        Ok(value)
    }

    fn read_int<I: TryFrom<i128>>(&mut self) -> Result<I> {
        self.read_scalar(|head| match head {
            Head::Int(v) => narrow(v),
            other => Err(Error::mismatch(ValueKind::Integer, other.kind())),
        })
    }

    fn begin(&mut self, expected: ValueKind) -> Result<usize> {
        let head = self.peek()?;
        let len = match head {
            Head::Array(len) if expected == ValueKind::Array => len,
            Head::Map(len) if expected == ValueKind::Map => len,
            other => return Err(Error::mismatch(expected, other.kind())),
        };

        self.stack.ensure_room()?;
        self.advance()?;
        self.descend(head)?;

        Ok(len)
    }

    /// Opens the frame of a consumed container, or discards the payload of
    /// a consumed raw value.
    fn descend(&mut self, head: Head) -> Result<()> {
        match head {
            Head::Array(len) => self.stack.push_array(len),
            Head::Map(len) => self.stack.push_map(len),
            Head::Raw(len) => self.skip_payload(len),
            _ => Ok(()),
        }
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

    fn skip_from(&mut self, target: usize) -> Result<()> {
        self.ensure_room_for_current()?;
        let head = self.advance()?;
        self.descend(head)?;

        while self.stack.depth() > target {
            if self.stack.top_count() == 0 {
                self.stack.pop()?;
                continue;
            }

            let head = self.advance()?;
            self.descend(head)?;
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

            match self.advance()? {
                Head::Nil => builder.write_nil()?,
                Head::Bool(v) => builder.write_bool(v)?,
                Head::Int(v) => builder.write_i128(v)?,
                Head::F32(v) => builder.write_f32(v)?,
                Head::F64(v) => builder.write_f64(v)?,
                Head::Raw(len) => {
                    let bytes = self.read_payload(len)?;
                    builder.write_bytes(&bytes)?;
                }
                Head::Array(len) => {
                    self.stack.push_array(len)?;
                    builder.write_array_begin(len)?;
                }
                Head::Map(len) => {
                    self.stack.push_map(len)?;
                    builder.write_map_begin(len)?;
                }
            }

            if builder.is_complete() {
                return Ok(());
            }
        }
    }

    fn unwind(&mut self, depth: usize) { self.stack.truncate(depth); }
}

impl<R: Read> Unpacker for StreamUnpacker<R> {
    fn read_nil(&mut self) -> Result<()> {
        self.read_scalar(|head| match head {
            Head::Nil => Ok(()),
            other => Err(Error::mismatch(ValueKind::Nil, other.kind())),
        })
    }

    fn try_read_nil(&mut self) -> Result<bool> {
        if self.peek()? == Head::Nil {
            self.advance()?;
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

    fn read_bool(&mut self) -> Result<bool> {
        self.read_scalar(|head| match head {
            Head::Bool(v) => Ok(v),
            other => Err(Error::mismatch(ValueKind::Boolean, other.kind())),
        })
    }

    fn read_i8(&mut self) -> Result<i8> { self.read_int() }

    fn read_i16(&mut self) -> Result<i16> { self.read_int() }

    fn read_i32(&mut self) -> Result<i32> { self.read_int() }

    fn read_i64(&mut self) -> Result<i64> { self.read_int() }

    fn read_u8(&mut self) -> Result<u8> { self.read_int() }

    fn read_u16(&mut self) -> Result<u16> { self.read_int() }

    fn read_u32(&mut self) -> Result<u32> { self.read_int() }

    fn read_u64(&mut self) -> Result<u64> { self.read_int() }

    fn read_i128(&mut self) -> Result<i128> { self.read_int() }

    #[allow(clippy::cast_possible_truncation)]
    fn read_f32(&mut self) -> Result<f32> {
        self.read_scalar(|head| match head {
            Head::F32(v) => Ok(v),
            Head::F64(v) => Ok(v as f32),
            other => Err(Error::mismatch(ValueKind::Float, other.kind())),
        })
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.read_scalar(|head| match head {
            Head::F32(v) => Ok(v.into()),
            Head::F64(v) => Ok(v),
            other => Err(Error::mismatch(ValueKind::Float, other.kind())),
        })
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_scalar(|head| match head {
            Head::Raw(len) => Ok(len),
            other => Err(Error::mismatch(ValueKind::Raw, other.kind())),
        })?;

        self.read_payload(len)
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

// =============================================================================
// Convenience functions
// =============================================================================

/// Encodes a value tree.
///
/// # Errors
///
/// Fails if an integer in the tree is outside the wire range or a container
/// is longer than `u32::MAX`.
pub fn to_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut packer = StreamPacker::new(Vec::new());
    packer.write_value(value)?;
    packer.finish()
}

/// Parses exactly one value tree from `bytes`.
///
/// # Errors
///
/// Fails on malformed or truncated input, or if bytes remain after the
/// value.
pub fn parse(bytes: &[u8]) -> Result<Value> {
    let mut unpacker = StreamUnpacker::new(bytes);
    let value = unpacker.read_value()?;

    if !unpacker.get_ref().is_empty() {
        return Err(Error::invalid_data(format!(
            "{} trailing bytes after value",
            unpacker.get_ref().len()
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod test;
