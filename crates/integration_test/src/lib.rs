//! Shared message types for the qbin integration tests.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]

use qbin::{Identifiable, Message, Value};

// ============================================================================
// Plain messages
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
pub struct Point {
    pub x: i64,
    pub y: i64,
    #[message(optional)]
    pub label: Option<String>,
}

/// Declared as `x` (index 2), `y`, `z` (index 0); laid out as
/// `[z, hole, x, y]`.
#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
pub struct Sparse {
    #[message(index = 2)]
    pub x: i32,
    pub y: i32,
    #[message(index = 0)]
    pub z: i32,
}

#[derive(Debug, Default, Identifiable, Message)]
pub struct Duplicate {
    #[message(index = 1)]
    pub a: u8,
    #[message(index = 1)]
    pub b: u8,
}

#[derive(Debug, Default, Identifiable, Message)]
pub struct NegativeIndex {
    #[message(index = -1)]
    pub a: u8,
}

/// Only `id` is serialized; the `Duplicate` fields never need a template.
#[derive(Debug, Default, Identifiable, Message)]
pub struct Holder {
    pub id: u32,
    cache: Duplicate,
    #[message(transient)]
    pub pending: Duplicate,
}

impl Holder {
    pub fn new(id: u32) -> Self { Self { id, ..Self::default() } }
}

/// Like [`Holder`], but the type policy serializes the private field.
#[derive(Debug, Default, Identifiable, Message)]
#[message(policy = "required")]
pub struct EagerHolder {
    pub id: u32,
    cache: Duplicate,
}

// ============================================================================
// Field options
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
#[message(policy = "optional")]
pub struct Settings {
    #[message(required)]
    version: u32,
    theme: Option<String>,
    #[message(not_nullable)]
    owner: Option<String>,
    #[message(ignore)]
    dirty: bool,
}

impl Settings {
    pub fn new(version: u32, owner: Option<&str>) -> Self {
        Self {
            version,
            theme: None,
            owner: owner.map(str::to_owned),
            dirty: false,
        }
    }

    pub fn version(&self) -> u32 { self.version }

    pub fn theme(&self) -> Option<&str> { self.theme.as_deref() }

    pub fn owner(&self) -> Option<&str> { self.owner.as_deref() }

    pub fn set_dirty(&mut self) { self.dirty = true; }

    pub fn is_dirty(&self) -> bool { self.dirty }
}

#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
pub struct Entity {
    pub id: u64,
}

/// Serialized as `[id, hole, hole, name, score]`; `scratch` is private and
/// excluded.
#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
pub struct Player {
    #[message(base)]
    pub entity: Entity,
    #[message(index = 3)]
    pub name: String,
    pub score: Option<u32>,
    scratch: Vec<u8>,
    #[message(transient)]
    pub session: u64,
}

impl Player {
    pub fn new(id: u64, name: &str, score: Option<u32>) -> Self {
        Self {
            entity: Entity { id },
            name: name.to_owned(),
            score,
            scratch: Vec::new(),
            session: 0,
        }
    }

    pub fn with_scratch(mut self, scratch: &[u8]) -> Self {
        self.scratch = scratch.to_vec();
        self
    }

    pub fn scratch(&self) -> &[u8] { &self.scratch }
}

// ============================================================================
// Recursive and generic messages
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
    pub parent_hint: Option<Box<TreeNode>>,
}

impl TreeNode {
    pub fn leaf(label: &str) -> Self {
        Self { label: label.to_owned(), ..Self::default() }
    }

    pub fn with_children(label: &str, children: Vec<Self>) -> Self {
        Self { label: label.to_owned(), children, parent_hint: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Identifiable, Message)]
pub struct Tagged<T> {
    pub tag: String,
    pub payload: T,
}

/// Builds a tree of the given depth and fan-out.
pub fn tree(depth: usize, fan_out: usize) -> TreeNode {
    if depth == 0 {
        return TreeNode::leaf("leaf");
    }

    TreeNode::with_children(
        &format!("level-{depth}"),
        (0..fan_out).map(|_| tree(depth - 1, fan_out)).collect(),
    )
}

/// A mixed value tree shared by the traversal tests.
pub fn document() -> Value {
    Value::Array(vec![
        Value::from(1u8),
        Value::string("two"),
        Value::Array(vec![Value::from(3u8), Value::Array(vec![Value::Nil])]),
        Value::Map(vec![
            (Value::string("k"), Value::from(-4i8)),
            (Value::from(5u8), Value::Array(Vec::new())),
        ]),
        Value::from(6.5f64),
        Value::Boolean(false),
    ])
}
