//! Struct templates driven by a derived schema.
//!
//! `#[derive(Message)]` implements [`Message`] for a struct with named
//! fields: it describes the struct as a [`StructDecl`] and declares how each
//! field binds to the template of its type. [`StructTemplate`] combines both with
//! the schema produced by the [`FieldEntryReader`] and becomes the struct's
//! template.
//!
//! On the wire a struct is an array with one element per schema position.
//! Holes are written as nil. Reading tolerates shorter arrays written by
//! older schemas (missing optional fields keep their default) and longer
//! arrays written by newer ones (the excess is skipped).

use std::sync::Arc;

use crate::{
    error::{Error, Result, SchemaError},
    packer::Packer,
    registry::TemplateRegistry,
    schema::{FieldEntry, FieldEntryReader, FieldOption, StructDecl},
    template::{Decoded, Template, Templated},
    unpacker::Unpacker,
};

/// A struct serialized as a positional array.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Default, Identifiable, Message)]
/// #[message(policy = "optional")]
/// struct Profile {
///     #[message(required, index = 0)]
///     id: u64,
///     nickname: Option<String>,
///     #[message(ignore)]
///     cache: Vec<u8>,
/// }
/// ```
pub trait Message: Templated + Default {
    /// Describes the struct for schema derivation.
    fn declaration() -> StructDecl;

    /// Declares the bindings of every field that may be serialized.
    ///
    /// Whether a field is serialized depends on the schema, including the
    /// policy of a struct embedding this one, so fields without an ignore
    /// marker should all be declared.
    fn bind_fields() -> Vec<FieldBinding<Self>>;
}

/// Reads and writes one field of `T`.
pub trait FieldCodec<T>: Send + Sync {
    /// Writes the field of `value`.
    ///
    /// # Errors
    ///
    /// Propagates failures of the field template.
    fn write(&self, value: &T, packer: &mut dyn Packer) -> Result<()>;

    /// Reads the field into `value`.
    ///
    /// # Errors
    ///
    /// Propagates failures of the field template.
    fn read(&self, value: &mut T, unpacker: &mut dyn Unpacker) -> Result<()>;

    /// Whether the field of `value` holds nil.
    fn is_nil(&self, value: &T) -> bool;
}

/// A field accessed through plain accessor functions.
pub struct Field<T, F> {
    template: Arc<dyn Template<F>>,
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
    nil: fn(&F) -> bool,
}

impl<T, F: Templated> Field<T, F> {
    /// Binds a field of type `F` to its template.
    ///
    /// # Errors
    ///
    /// Fails if the template of `F` cannot be resolved.
    pub fn bind(
        registry: &TemplateRegistry,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Result<Self> {
        Ok(Self { template: registry.lookup::<F>()?, get, get_mut, nil: |_| false })
    }
}

impl<T, F> Field<T, F> {
    /// Sets how to tell that the field holds nil, e.g. `Option::is_none`.
    #[must_use]
    pub fn with_nil_check(mut self, nil: fn(&F) -> bool) -> Self {
        self.nil = nil;
        self
    }
}

impl<T, F: Default + Send + Sync> FieldCodec<T> for Field<T, F> {
    fn write(&self, value: &T, packer: &mut dyn Packer) -> Result<()> {
        self.template.write(packer, (self.get)(value))
    }

    fn read(&self, value: &mut T, unpacker: &mut dyn Unpacker) -> Result<()> {
        let slot = (self.get_mut)(value);
        let previous = std::mem::take(slot);
        *slot = self.template.read(unpacker, Some(previous))?.into_inner();
        Ok(())
    }

    fn is_nil(&self, value: &T) -> bool { (self.nil)((self.get)(value)) }
}

/// A field of an embedded base struct `B`, seen through `T`.
pub struct Projected<T, B> {
    inner: Box<dyn FieldCodec<B>>,
    get: fn(&T) -> &B,
    get_mut: fn(&mut T) -> &mut B,
}

impl<T, B> FieldCodec<T> for Projected<T, B> {
    fn write(&self, value: &T, packer: &mut dyn Packer) -> Result<()> {
        self.inner.write((self.get)(value), packer)
    }

    fn read(&self, value: &mut T, unpacker: &mut dyn Unpacker) -> Result<()> {
        self.inner.read((self.get_mut)(value), unpacker)
    }

    fn is_nil(&self, value: &T) -> bool { self.inner.is_nil((self.get)(value)) }
}

type Binder<T> =
    Box<dyn FnOnce(&TemplateRegistry) -> Result<Box<dyn FieldCodec<T>>>>;

/// A declared field and how to bind it to a codec.
///
/// Binding is deferred: [`StructTemplate::build`] only binds the fields the
/// schema serializes, so excluded fields never have their template looked
/// up.
pub struct FieldBinding<T> {
    name: &'static str,
    bind: Binder<T>,
}

impl<T: 'static> FieldBinding<T> {
    /// Declares `name`, bound by `bind` once the schema selects it.
    #[must_use]
    pub fn new<C, B>(name: &'static str, bind: B) -> Self
    where
        C: FieldCodec<T> + 'static,
        B: FnOnce(&TemplateRegistry) -> Result<C> + 'static,
    {
        Self {
            name,
            bind: Box::new(move |registry: &TemplateRegistry| {
                let codec: Box<dyn FieldCodec<T>> = Box::new(bind(registry)?);
                Ok(codec)
            }),
        }
    }

    /// Declares a field of type `F` reached through plain accessors.
    #[must_use]
    pub fn field<F: Templated + Default>(
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        Self::new(name, move |registry| Field::bind(registry, get, get_mut))
    }

    /// The declared field name.
    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// Re-targets the binding of a base struct field to the struct `U`
    /// embedding it.
    #[must_use]
    pub fn project<U: 'static>(
        self,
        get: fn(&U) -> &T,
        get_mut: fn(&mut U) -> &mut T,
    ) -> FieldBinding<U> {
        let bind = self.bind;

        FieldBinding {
            name: self.name,
            bind: Box::new(move |registry: &TemplateRegistry| {
                let codec: Box<dyn FieldCodec<U>> =
                    Box::new(Projected { inner: bind(registry)?, get, get_mut });
                Ok(codec)
            }),
        }
    }
}

impl<T> std::fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

enum Slot<T> {
    Field {
        name: &'static str,
        option: FieldOption,
        codec: Box<dyn FieldCodec<T>>,
    },
    Hole,
}

/// The template of a [`Message`] struct.
pub struct StructTemplate<T> {
    type_name: &'static str,
    slots: Vec<Slot<T>>,
}

impl<T: Message> StructTemplate<T> {
    /// Derives the schema of `T` and binds its fields.
    ///
    /// # Errors
    ///
    /// Fails if the schema is invalid or a serialized field cannot be
    /// bound.
    pub fn build(registry: &TemplateRegistry) -> Result<Self> {
        let decl = T::declaration();
        let entries = FieldEntryReader::read_field_entries(&decl)?;

        Self::from_entries(registry, decl.name(), entries, T::bind_fields())
    }
}

impl<T> StructTemplate<T> {
    /// Pairs each schema entry with the binding of the same name and binds
    /// it. Bindings no entry asks for are dropped unbound.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnboundField`] if an entry has no binding left; each
    /// binding serves one entry. Otherwise propagates binding failures.
    pub fn from_entries(
        registry: &TemplateRegistry,
        type_name: &'static str,
        entries: Vec<FieldEntry>,
        mut bindings: Vec<FieldBinding<T>>,
    ) -> Result<Self> {
        let slots = entries
            .into_iter()
            .map(|entry| match entry {
                FieldEntry::Hole => Ok(Slot::Hole),
                FieldEntry::Present { field, option } => {
                    let position = bindings
                        .iter()
                        .position(|binding| binding.name == field.name())
                        .ok_or(SchemaError::UnboundField {
                            type_name,
                            field: field.name(),
                        })?;

                    let binding = bindings.swap_remove(position);

                    Ok(Slot::Field {
                        name: field.name(),
                        option,
                        codec: (binding.bind)(registry)?,
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(type_name, slots = slots.len(), "built struct template");

        Ok(Self { type_name, slots })
    }

    /// Number of array elements written per value.
    #[must_use]
    pub fn len(&self) -> usize { self.slots.len() }

    /// Whether the struct has no serialized field.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
}

impl<T: Default + Send + Sync> Template<T> for StructTemplate<T> {
    fn write(&self, packer: &mut dyn Packer, value: &T) -> Result<()> {
        packer.write_array_begin(self.slots.len())?;

        for slot in &self.slots {
            match slot {
                Slot::Hole => packer.write_nil()?,
                Slot::Field { name, option, codec } => {
                    if *option == FieldOption::NotNullable && codec.is_nil(value)
                    {
                        return Err(Error::NullNotPermitted {
                            context: format!("{}.{name}", self.type_name).into(),
                        });
                    }

                    codec.write(value, packer)?;
                }
            }
        }

        packer.write_array_end()
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<T>,
    ) -> Result<Decoded<T>> {
        let reused = reuse.is_some();
        let mut value = reuse.unwrap_or_default();

        unpacker.read_array_begin()?;

        for slot in &self.slots {
            match slot {
                Slot::Hole => {
                    if !unpacker.try_skip_nil()? {
                        unpacker.skip()?;
                    }
                }

                Slot::Field { option: FieldOption::Optional, codec, .. } => {
                    if !unpacker.try_skip_nil()? {
                        codec.read(&mut value, unpacker)?;
                    }
                }

                Slot::Field { name, option: FieldOption::NotNullable, codec } => {
                    if unpacker.try_read_nil()? {
                        return Err(Error::NullNotPermitted {
                            context: format!("{}.{name}", self.type_name).into(),
                        });
                    }

                    codec.read(&mut value, unpacker)?;
                }

                Slot::Field { codec, .. } => codec.read(&mut value, unpacker)?,
            }
        }

        // elements appended by a newer schema
        unpacker.read_array_end(false)?;

        Ok(if reused { Decoded::Reused(value) } else { Decoded::Fresh(value) })
    }
}

impl<T> std::fmt::Debug for StructTemplate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<_> = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Field { name, .. } => Some(*name),
                Slot::Hole => None,
            })
            .collect();

        f.debug_struct("StructTemplate")
            .field("type_name", &self.type_name)
            .field("fields", &fields)
            .finish()
    }
}
