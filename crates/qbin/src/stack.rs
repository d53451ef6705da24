//! Bookkeeping of open containers for unpackers.
//!
//! The stack always holds a top-level frame expecting exactly one value.
//! Every open array or map pushes a frame counting the elements that remain
//! to be consumed. Map frames count keys and values separately, so a map of
//! `n` entries starts with `2n` slots.

use crate::error::{Error, ProtocolViolation, Result};

/// The kind of an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// The implicit top-level frame.
    Top,

    /// An open array.
    Array,

    /// An open map.
    Map,
}

/// One level of nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    kind: FrameKind,
    remaining: usize,
}

impl Frame {
    /// The kind of container this frame tracks.
    #[must_use]
    pub const fn kind(&self) -> FrameKind { self.kind }

    /// Elements left to consume.
    #[must_use]
    pub const fn remaining(&self) -> usize { self.remaining }
}

/// The stack of open containers shared by every [`Unpacker`].
///
/// Depth is the number of open containers; the top-level frame is at depth
/// zero and is never popped.
///
/// [`Unpacker`]: crate::Unpacker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackerStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl UnpackerStack {
    /// Creates a stack allowing at most `max_depth` open containers.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        let mut frames = Vec::with_capacity(max_depth.min(64) + 1);
        frames.push(Frame { kind: FrameKind::Top, remaining: 1 });

        Self { frames, max_depth }
    }

    /// Number of currently open containers.
    #[must_use]
    pub fn depth(&self) -> usize { self.frames.len() - 1 }

    /// The nesting limit this stack was created with.
    #[must_use]
    pub const fn max_depth(&self) -> usize { self.max_depth }

    /// The innermost frame.
    #[must_use]
    pub fn top(&self) -> Frame { self.frames[self.frames.len() - 1] }

    /// Elements left in the innermost frame.
    #[must_use]
    pub fn top_count(&self) -> usize { self.top().remaining }

    /// Whether the innermost frame is an array.
    #[must_use]
    pub fn top_is_array(&self) -> bool { self.top().kind == FrameKind::Array }

    /// Whether the innermost frame is a map.
    #[must_use]
    pub fn top_is_map(&self) -> bool { self.top().kind == FrameKind::Map }

    /// Fails if opening one more container would exceed the limit.
    ///
    /// # Errors
    ///
    /// [`Error::DepthExceeded`] when the stack is full.
    pub fn ensure_room(&self) -> Result<()> {
        if self.depth() >= self.max_depth {
            return Err(Error::DepthExceeded { max: self.max_depth });
        }

        Ok(())
    }

    /// Opens an array of `len` elements.
    ///
    /// # Errors
    ///
    /// [`Error::DepthExceeded`] when the stack is full.
    pub fn push_array(&mut self, len: usize) -> Result<()> {
        self.push(FrameKind::Array, len)
    }

    /// Opens a map of `len` entries, that is `2 * len` slots.
    ///
    /// # Errors
    ///
    /// [`Error::DepthExceeded`] when the stack is full, or
    /// [`Error::InvalidData`] if the slot count overflows.
    pub fn push_map(&mut self, len: usize) -> Result<()> {
        let slots = len
            .checked_mul(2)
            .ok_or_else(|| Error::invalid_data("map length overflows"))?;

        self.push(FrameKind::Map, slots)
    }

    fn push(&mut self, kind: FrameKind, remaining: usize) -> Result<()> {
        self.ensure_room()?;
        self.frames.push(Frame { kind, remaining });

        Ok(())
    }

    /// Closes the innermost container and returns its frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolViolation::ArrayEndWithoutBegin`] when no container is open.
    pub fn pop(&mut self) -> Result<Frame> {
        if self.depth() == 0 {
            return Err(ProtocolViolation::ArrayEndWithoutBegin.into());
        }

        self.frames
            .pop()
            .ok_or_else(|| ProtocolViolation::ArrayEndWithoutBegin.into())
    }

    /// Fails if the innermost frame has nothing left to consume.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfInput`] when the innermost frame is exhausted.
    pub fn check_count(&self) -> Result<()> {
        if self.top_count() == 0 {
            return Err(Error::EndOfInput);
        }

        Ok(())
    }

    /// Consumes one element of the innermost frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolViolation::CountUnderflow`] when the frame is exhausted.
    pub fn reduce_count(&mut self) -> Result<()> {
        let top = self.top_mut();
        top.remaining = top
            .remaining
            .checked_sub(1)
            .ok_or(ProtocolViolation::CountUnderflow)?;

        Ok(())
    }

    /// Drops every frame deeper than `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth + 1);
    }

    /// Returns to the initial state: only the top-level frame, expecting one
    /// value.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
        self.frames[0].remaining = 1;
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

impl Default for UnpackerStack {
    fn default() -> Self {
        Self::new(<crate::DefaultConfig as crate::Config>::max_depth())
    }
}
