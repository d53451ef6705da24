//! Error types shared by every packer, unpacker and template.

use std::{borrow::Cow, io};

use crate::value::ValueKind;

/// A specialized [`Result`](std::result::Result) for qbin operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while packing, unpacking or resolving
/// templates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The value at the cursor is of a different kind than requested.
    #[error("expected {expected} but found {actual}")]
    TypeMismatch {
        /// The kind the caller asked for.
        expected: ValueKind,

        /// The kind actually present.
        actual: ValueKind,
    },

    /// The caller drove the packer or unpacker in an invalid order.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    /// A read was attempted past the last element of the current container,
    /// or past the end of the input.
    #[error("unexpected end of input")]
    EndOfInput,

    /// Opening another container would exceed the nesting limit.
    #[error("nesting depth exceeds the limit of {max}")]
    DepthExceeded {
        /// The configured maximum number of open containers.
        max: usize,
    },

    /// An integer does not fit in the requested width.
    #[error("integer {value} is out of range for `{target}`")]
    IntegerOutOfRange {
        /// The integer found.
        value: i128,

        /// The requested target type.
        target: &'static str,
    },

    /// Nil was found or supplied where it is not allowed.
    #[error("nil is not permitted for {context}")]
    NullNotPermitted {
        /// What rejected the nil, usually a type or field name.
        context: Cow<'static, str>,
    },

    /// No template is registered for the type and none can be built.
    #[error("no template registered for `{type_name}`")]
    TemplateNotFound {
        /// The Rust type name.
        type_name: &'static str,
    },

    /// A placeholder template was invoked before the real template was
    /// published.
    #[error("template lookup for `{type_name}` did not resolve")]
    TemplateLookupFailed {
        /// The Rust type name.
        type_name: &'static str,
    },

    /// Deriving the wire layout of a struct failed.
    #[error(transparent)]
    SchemaBuild(#[from] SchemaError),

    /// The input is malformed.
    #[error("invalid data: {0}")]
    InvalidData(Cow<'static, str>),

    /// The underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn mismatch(expected: ValueKind, actual: ValueKind) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    pub(crate) fn invalid_data(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Maps an I/O error, turning a short read into [`Error::EndOfInput`].
    pub(crate) fn from_io(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Self::EndOfInput
        } else {
            Self::Io(error)
        }
    }
}

/// Misuse of the packer or unpacker call protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// `read_array_end` or `write_array_end` without a matching open array.
    #[error("array end without a matching array begin")]
    ArrayEndWithoutBegin,

    /// `read_map_end` or `write_map_end` without a matching open map.
    #[error("map end without a matching map begin")]
    MapEndWithoutBegin,

    /// A checked container end was requested with elements left unread.
    #[error("container closed with {remaining} unread elements")]
    UnconsumedElements {
        /// Elements (for maps, keys and values) left in the container.
        remaining: usize,
    },

    /// More elements were consumed than the container declared.
    #[error("element count underflow")]
    CountUnderflow,

    /// A container was written with a different number of elements than it
    /// declared.
    #[error("container declared {declared} elements but {written} were written")]
    ElementCountMismatch {
        /// The length passed to the begin call.
        declared: usize,

        /// The number of elements actually written.
        written: usize,
    },

    /// A map was closed between a key and its value.
    #[error("map closed with a dangling key")]
    DanglingMapKey,

    /// A value was written after the top-level value was already complete.
    #[error("top-level value is already complete")]
    ValueAlreadyComplete,

    /// The builder was finished before the top-level value was complete.
    #[error("top-level value is incomplete")]
    IncompleteValue,
}

/// Failure to derive the wire layout of a struct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two fields resolve to the same index.
    #[error("duplicated index {index} in `{type_name}`")]
    DuplicateIndex {
        /// The struct being described.
        type_name: &'static str,

        /// The index claimed twice.
        index: i64,
    },

    /// An index is negative or above
    /// [`MAX_FIELD_INDEX`](crate::schema::MAX_FIELD_INDEX).
    #[error("invalid index {index} in `{type_name}`")]
    InvalidIndex {
        /// The struct being described.
        type_name: &'static str,

        /// The offending index.
        index: i64,
    },

    /// A field selected for serialization has no bound accessor.
    #[error("field `{field}` of `{type_name}` has no accessor")]
    UnboundField {
        /// The struct being described.
        type_name: &'static str,

        /// The field without an accessor.
        field: &'static str,
    },

    /// An explicit field list names a field the struct does not declare.
    #[error("`{type_name}` has no field named `{field}`")]
    UnknownField {
        /// The struct being described.
        type_name: &'static str,

        /// The unknown field name.
        field: String,
    },
}
