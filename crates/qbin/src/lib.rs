//! qbin: self-describing binary object serialization.
//!
//! The crate converts between typed Rust values and a compact, MessagePack
//! compatible wire format, with a dynamic [`Value`] tree as the intermediate
//! representation.
//!
//! # Overview
//!
//! Reading and writing go through two object-safe traits:
//!
//! - [`Packer`]: sink of primitive write events (`write_i64`,
//!   `write_array_begin`, ...)
//! - [`Unpacker`]: pull-style source of primitive read events
//!
//! Each has two implementations:
//!
//! - [`StreamPacker`] / [`StreamUnpacker`] speak the binary format over
//!   [`std::io::Write`] / [`std::io::Read`]
//! - [`ValueBuilder`] builds a [`Value`] tree, and [`Converter`] walks an
//!   already parsed [`Value`] tree as if it were a stream
//!
//! Typed conversion is performed by a [`Template`] per type. Templates are
//! resolved lazily by the [`TemplateRegistry`], which supports recursive
//! types through placeholder templates. Struct templates are derived from a
//! [`schema::StructDecl`] by the [`FieldEntryReader`], which decides what is
//! serialized and at which array index.
//!
//! # Example
//!
//! ```ignore
//! use qbin::{Identifiable, Message, TemplateRegistry};
//!
//! #[derive(Debug, Default, PartialEq, Identifiable, Message)]
//! struct Point {
//!     pub x: i64,
//!     pub y: i64,
//!     #[message(optional)]
//!     pub label: Option<String>,
//! }
//!
//! let registry = TemplateRegistry::new();
//! let bytes = registry.encode(&Point { x: 1, y: 2, label: None })?;
//! let point: Point = registry.decode(&bytes)?;
//!
//! // or through the dynamic tree
//! let tree = qbin::stream::parse(&bytes)?;
//! let point: Point = registry.from_value(&tree)?;
//! ```

// the derive macros refer to `::qbin` even inside this crate
extern crate self as qbin;

pub mod builder;
pub mod config;
pub mod converter;
pub mod error;
pub mod message;
pub mod packer;
pub mod registry;
pub mod schema;
pub mod stack;
pub mod stream;
pub mod template;
pub mod unpacker;
pub mod value;

pub use builder::ValueBuilder;
pub use config::{Config, DefaultConfig};
pub use converter::Converter;
pub use error::{Error, ProtocolViolation, Result, SchemaError};
pub use message::Message;
pub use packer::Packer;
pub use qbin_derive::Message;
pub use qbin_stable_type_id::{Identifiable, StableTypeID};
pub use registry::TemplateRegistry;
pub use schema::FieldEntryReader;
pub use stack::UnpackerStack;
pub use stream::{StreamPacker, StreamUnpacker};
pub use template::{Decoded, Packable, Template, Templated};
pub use unpacker::Unpacker;
pub use value::{Float, Raw, Value, ValueKind};
