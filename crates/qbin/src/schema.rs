//! Derivation of the positional field schema of struct types.
//!
//! A struct is serialized as an array whose positions are fixed by the
//! schema. The [`FieldEntryReader`] turns a [`StructDecl`], normally emitted
//! by `#[derive(Message)]`, into that schema: a dense list of
//! [`FieldEntry`] indexed from 0 to the highest assigned index, with
//! [`FieldEntry::Hole`] wherever no field claims an index.
//!
//! ```ignore
//! // x: index 2, y: no index, z: index 0
//! let decl = StructDecl::new("Sample")
//!     .field(FieldDecl::new("x").public().index(2))
//!     .field(FieldDecl::new("y").public())
//!     .field(FieldDecl::new("z").public().index(0));
//!
//! // [z, hole, x, y]
//! let entries = FieldEntryReader::read_field_entries(&decl)?;
//! ```

use crate::error::SchemaError;

/// Highest index a field may claim. Bounds the size of the schema.
pub const MAX_FIELD_INDEX: i64 = u16::MAX as i64;

/// How a field takes part in serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldOption {
    /// Always written; reading fails if the element is missing.
    Required,

    /// Written when present; a nil or missing element keeps the default.
    Optional,

    /// Like [`FieldOption::Required`], and writing or reading nil fails.
    NotNullable,

    /// Not serialized.
    Ignore,

    /// No explicit choice; resolved by the type policy or visibility.
    #[default]
    Default,
}

/// Visibility of a field outside its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Declared `pub`.
    Public,

    /// Anything narrower than `pub`.
    #[default]
    Private,
}

/// Storage modifiers of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Modifiers {
    /// Shared by all instances; never serialized.
    pub is_static: bool,

    /// Immutable after construction; never serialized.
    pub is_final: bool,

    /// Excluded under the built-in default policy.
    pub is_transient: bool,
}

/// Serialization markers attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct FieldAnnotations {
    /// `#[message(ignore)]`
    pub ignore: bool,

    /// `#[message(required)]`
    pub required: bool,

    /// `#[message(optional)]`
    pub optional: bool,

    /// `#[message(not_nullable)]`
    pub not_nullable: bool,

    /// `#[message(index = N)]`
    pub index: Option<i64>,
}

/// Description of one field of a struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDecl {
    name: &'static str,
    visibility: Visibility,
    modifiers: Modifiers,
    nullable: bool,
    annotations: FieldAnnotations,
}

impl FieldDecl {
    /// A private, non-nullable field without annotations.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            visibility: Visibility::Private,
            modifiers: Modifiers {
                is_static: false,
                is_final: false,
                is_transient: false,
            },
            nullable: false,
            annotations: FieldAnnotations {
                ignore: false,
                required: false,
                optional: false,
                not_nullable: false,
                index: None,
            },
        }
    }

    /// Marks the field `pub`.
    #[must_use]
    pub const fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    /// Marks the field type as able to hold nil.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the field transient.
    #[must_use]
    pub const fn transient(mut self) -> Self {
        self.modifiers.is_transient = true;
        self
    }

    /// Replaces the storage modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Adds the ignore marker.
    #[must_use]
    pub const fn ignore(mut self) -> Self {
        self.annotations.ignore = true;
        self
    }

    /// Adds the required marker.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.annotations.required = true;
        self
    }

    /// Adds the optional marker.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.annotations.optional = true;
        self
    }

    /// Adds the not-nullable marker.
    #[must_use]
    pub const fn not_nullable(mut self) -> Self {
        self.annotations.not_nullable = true;
        self
    }

    /// Pins the field to an array index.
    #[must_use]
    pub const fn index(mut self, index: i64) -> Self {
        self.annotations.index = Some(index);
        self
    }

    /// The field name.
    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// The field visibility.
    #[must_use]
    pub const fn visibility(&self) -> Visibility { self.visibility }

    /// The storage modifiers.
    #[must_use]
    pub const fn modifiers(&self) -> Modifiers { self.modifiers }

    /// Whether the field type can hold nil.
    #[must_use]
    pub const fn is_nullable(&self) -> bool { self.nullable }

    /// The serialization markers.
    #[must_use]
    pub const fn annotations(&self) -> FieldAnnotations { self.annotations }
}

/// Description of a struct: its fields, its default field policy, and the
/// struct it extends, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructDecl {
    name: &'static str,
    policy: FieldOption,
    base: Option<Box<StructDecl>>,
    fields: Vec<FieldDecl>,
}

impl StructDecl {
    /// A struct without fields, base, or policy.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            policy: FieldOption::Default,
            base: None,
            fields: Vec::new(),
        }
    }

    /// Sets the option applied to fields without explicit markers.
    #[must_use]
    pub const fn with_policy(mut self, policy: FieldOption) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the struct whose fields precede the own fields.
    #[must_use]
    pub fn with_base(mut self, base: Self) -> Self {
        self.base = Some(Box::new(base));
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// The struct name.
    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// The type-wide field policy.
    #[must_use]
    pub const fn policy(&self) -> FieldOption { self.policy }

    /// The extended struct.
    #[must_use]
    pub fn base(&self) -> Option<&Self> { self.base.as_deref() }

    /// The own fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] { &self.fields }

    /// All fields: the base chain first, outermost base leading, then the
    /// own fields, each in declaration order.
    #[must_use]
    pub fn all_fields(&self) -> Vec<FieldDecl> {
        let mut chain = Vec::new();
        let mut current = Some(self);

        while let Some(decl) = current {
            chain.push(decl);
            current = decl.base();
        }

        chain.iter().rev().flat_map(|decl| decl.fields.iter().copied()).collect()
    }
}

/// One position of a struct schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldEntry {
    /// A field serialized at this position.
    Present {
        /// The field.
        field: FieldDecl,

        /// Its resolved option, never [`FieldOption::Ignore`] or
        /// [`FieldOption::Default`].
        option: FieldOption,
    },

    /// No field; written as nil and skipped on read.
    Hole,
}

impl FieldEntry {
    /// The field name, `None` for a hole.
    #[must_use]
    pub const fn name(&self) -> Option<&'static str> {
        match self {
            Self::Present { field, .. } => Some(field.name),
            Self::Hole => None,
        }
    }

    /// The resolved option, `None` for a hole.
    #[must_use]
    pub const fn option(&self) -> Option<FieldOption> {
        match self {
            Self::Present { option, .. } => Some(*option),
            Self::Hole => None,
        }
    }

    /// Whether no field occupies this position.
    #[must_use]
    pub const fn is_hole(&self) -> bool { matches!(self, Self::Hole) }
}

/// Derives struct schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldEntryReader;

impl FieldEntryReader {
    /// Derives the schema of `decl` under its own type policy.
    ///
    /// # Errors
    ///
    /// [`SchemaError::DuplicateIndex`] if two fields resolve to the same
    /// index, [`SchemaError::InvalidIndex`] if an index is negative or
    /// above [`MAX_FIELD_INDEX`].
    pub fn read_field_entries(
        decl: &StructDecl,
    ) -> Result<Vec<FieldEntry>, SchemaError> {
        Self::read_field_entries_with(
            decl,
            Self::read_implicit_field_option(decl),
        )
    }

    /// Derives the schema of `decl`, resolving fields without explicit
    /// markers with `implicit`.
    ///
    /// Fields without explicit index take the highest index assigned so
    /// far plus one, so an explicit index may point backwards:
    ///
    /// ```text
    /// index(0) a  -> 0
    ///          b  -> 1
    /// index(3) c  -> 3
    ///          d  -> 4
    /// index(2) e  -> 2
    ///          f  -> 5
    /// ```
    ///
    /// # Errors
    ///
    /// See [`Self::read_field_entries`].
    #[tracing::instrument(skip_all, fields(type_name = decl.name()), level = "debug")]
    pub fn read_field_entries_with(
        decl: &StructDecl,
        implicit: FieldOption,
    ) -> Result<Vec<FieldEntry>, SchemaError> {
        let mut indexed: Vec<Option<FieldEntry>> = Vec::new();
        let mut max_index = -1i64;

        for field in decl.all_fields() {
            let option = Self::read_field_option(&field, implicit);
            if option == FieldOption::Ignore {
                continue;
            }

            let index = Self::read_field_index(&field, max_index);
            let slot = Self::slot(decl, index)?;

            if indexed.get(slot).is_some_and(Option::is_some) {
                return Err(SchemaError::DuplicateIndex {
                    type_name: decl.name(),
                    index,
                });
            }

            if indexed.len() <= slot {
                indexed.resize(slot + 1, None);
            }
            indexed[slot] = Some(FieldEntry::Present { field, option });

            max_index = max_index.max(index);
        }

        let entries: Vec<FieldEntry> = indexed
            .into_iter()
            .map(|entry| entry.unwrap_or(FieldEntry::Hole))
            .collect();

        tracing::debug!(
            fields = entries.iter().filter(|e| !e.is_hole()).count(),
            holes = entries.iter().filter(|e| e.is_hole()).count(),
            max_index,
            "derived struct schema"
        );

        Ok(entries)
    }

    /// The type-wide policy applied to fields without explicit markers.
    #[must_use]
    pub const fn read_implicit_field_option(decl: &StructDecl) -> FieldOption {
        decl.policy()
    }

    /// Builds a schema from an explicit list of slots, `None` marking a
    /// hole.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownField`] if a name matches no field of `decl`.
    pub fn convert_field_entries(
        decl: &StructDecl,
        slots: &[Option<(&str, FieldOption)>],
    ) -> Result<Vec<FieldEntry>, SchemaError> {
        let fields = decl.all_fields();

        slots
            .iter()
            .map(|slot| match slot {
                None => Ok(FieldEntry::Hole),
                Some((name, option)) => fields
                    .iter()
                    .find(|field| field.name() == *name)
                    .map(|field| FieldEntry::Present {
                        field: *field,
                        option: *option,
                    })
                    .ok_or_else(|| SchemaError::UnknownField {
                        type_name: decl.name(),
                        field: (*name).to_owned(),
                    }),
            })
            .collect()
    }

    /// Resolves how `field` is serialized. The first matching rule wins:
    ///
    /// 1. static or final: ignored
    /// 2. explicit ignore, required, optional or not-nullable marker; a
    ///    not-nullable field whose type cannot hold nil is required
    /// 3. `implicit`, unless it is [`FieldOption::Default`]
    /// 4. transient: ignored; public: required; otherwise ignored
    #[must_use]
    pub const fn read_field_option(
        field: &FieldDecl,
        implicit: FieldOption,
    ) -> FieldOption {
        let modifiers = field.modifiers;
        let annotations = field.annotations;

        if modifiers.is_static || modifiers.is_final {
            return FieldOption::Ignore;
        }

        if annotations.ignore {
            return FieldOption::Ignore;
        } else if annotations.required {
            return FieldOption::Required;
        } else if annotations.optional {
            return FieldOption::Optional;
        } else if annotations.not_nullable {
            return if field.nullable {
                FieldOption::NotNullable
            } else {
                FieldOption::Required
            };
        }

        if !matches!(implicit, FieldOption::Default) {
            return implicit;
        }

        if modifiers.is_transient {
            FieldOption::Ignore
        } else if matches!(field.visibility, Visibility::Public) {
            FieldOption::Required
        } else {
            FieldOption::Ignore
        }
    }

    /// The explicit index of `field`, or `max_index + 1`.
    #[must_use]
    pub const fn read_field_index(field: &FieldDecl, max_index: i64) -> i64 {
        match field.annotations.index {
            Some(index) => index,
            None => max_index + 1,
        }
    }

    fn slot(decl: &StructDecl, index: i64) -> Result<usize, SchemaError> {
        if !(0..=MAX_FIELD_INDEX).contains(&index) {
            return Err(SchemaError::InvalidIndex {
                type_name: decl.name(),
                index,
            });
        }

        usize::try_from(index).map_err(|_| SchemaError::InvalidIndex {
            type_name: decl.name(),
            index,
        })
    }
}

#[cfg(test)]
mod test;
