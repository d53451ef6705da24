//! Typed conversion between Rust values and packer/unpacker events.
//!
//! A [`Template`] knows how to write one Rust type to a [`Packer`] and read
//! it back from an [`Unpacker`]. Templates are obtained from the
//! [`TemplateRegistry`], which builds them through [`Templated`] on first
//! use and shares them afterwards.
//!
//! Templates for the standard types live in [`builtin`]; struct templates
//! are produced by `#[derive(Message)]`, see [`crate::message`].

use std::{any::type_name, sync::Arc};

use qbin_stable_type_id::Identifiable;

use crate::{
    error::{Error, Result},
    packer::Packer,
    registry::{TemplateRegistry, WeakRegistry},
    unpacker::Unpacker,
};

pub mod builtin;

/// The outcome of [`Template::read`].
///
/// Reads may be given a previous instance to populate. The template either
/// hands that instance back, updated in place, or builds a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoded<T> {
    /// A newly built instance; any reuse hint was dropped.
    Fresh(T),

    /// The instance passed as reuse hint, updated in place.
    Reused(T),
}

impl<T> Decoded<T> {
    /// Returns the decoded instance.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Fresh(v) | Self::Reused(v) => v,
        }
    }

    /// Borrows the decoded instance.
    #[must_use]
    pub const fn get(&self) -> &T {
        match self {
            Self::Fresh(v) | Self::Reused(v) => v,
        }
    }

    /// Whether the reuse hint was populated in place.
    #[must_use]
    pub const fn is_reused(&self) -> bool { matches!(self, Self::Reused(_)) }

    /// Maps the instance, keeping the fresh/reused distinction.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Self::Fresh(v) => Decoded::Fresh(f(v)),
            Self::Reused(v) => Decoded::Reused(f(v)),
        }
    }
}

/// Writes and reads values of type `T`.
///
/// Implementations are shared between threads through the registry and
/// must not keep per-call state.
///
/// # Example
///
/// ```ignore
/// struct Celsius(f64);
///
/// struct CelsiusTemplate;
///
/// impl Template<Celsius> for CelsiusTemplate {
///     fn write(&self, packer: &mut dyn Packer, value: &Celsius) -> Result<()> {
///         packer.write_f64(value.0)
///     }
///
///     fn read(
///         &self,
///         unpacker: &mut dyn Unpacker,
///         _reuse: Option<Celsius>,
///     ) -> Result<Decoded<Celsius>> {
///         Ok(Decoded::Fresh(Celsius(unpacker.read_f64()?)))
///     }
/// }
/// ```
pub trait Template<T>: Send + Sync {
    /// Writes `value`.
    fn write(&self, packer: &mut dyn Packer, value: &T) -> Result<()>;

    /// Reads a value, optionally populating `reuse` in place.
    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<T>,
    ) -> Result<Decoded<T>>;

    /// Writes a value that may be absent.
    ///
    /// # Errors
    ///
    /// [`Error::NullNotPermitted`] when `value` is `None`. Templates for
    /// nullable types write nil instead by being templates of `Option<T>`.
    fn write_nullable(
        &self,
        packer: &mut dyn Packer,
        value: Option<&T>,
    ) -> Result<()> {
        match value {
            Some(value) => self.write(packer, value),
            None => Err(Error::NullNotPermitted {
                context: type_name::<T>().into(),
            }),
        }
    }
}

/// Types whose template the registry can build on demand.
///
/// Implemented for the standard types in [`builtin`] and by
/// `#[derive(Message)]`. Building may look up other templates, including
/// the one being built; see [`TemplateRegistry::lookup`].
pub trait Templated: Identifiable + Sized + Send + Sync + 'static {
    /// Builds the template of `Self`.
    ///
    /// # Errors
    ///
    /// Fails if a dependency cannot be resolved or the type's schema is
    /// invalid.
    fn build_template(
        registry: &TemplateRegistry,
    ) -> Result<Arc<dyn Template<Self>>>;
}

/// Types that serialize themselves without a separate template.
///
/// Register the capability with [`TemplateRegistry::register_packable`];
/// the registry then serves a [`DefaultTemplate`] delegating to these
/// methods.
pub trait Packable {
    /// Writes `self`.
    ///
    /// # Errors
    ///
    /// Propagates packer failures.
    fn write_to(&self, packer: &mut dyn Packer) -> Result<()>;

    /// Overwrites `self` with the next value.
    ///
    /// # Errors
    ///
    /// Propagates unpacker failures.
    fn read_from(&mut self, unpacker: &mut dyn Unpacker) -> Result<()>;
}

/// Type-erased entry points of a [`Packable`] implementation.
pub(crate) struct PackableFns<T> {
    write: fn(&T, &mut dyn Packer) -> Result<()>,
    read: fn(&mut dyn Unpacker, Option<T>) -> Result<Decoded<T>>,
}

impl<T> Clone for PackableFns<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for PackableFns<T> {}

impl<T: Packable + Default> PackableFns<T> {
    pub(crate) fn new() -> Self {
        Self {
            write: |value, packer| value.write_to(packer),
            read: |unpacker, reuse| match reuse {
                Some(mut value) => {
                    value.read_from(unpacker)?;
                    Ok(Decoded::Reused(value))
                }
                None => {
                    let mut value = T::default();
                    value.read_from(unpacker)?;
                    Ok(Decoded::Fresh(value))
                }
            },
        }
    }
}

/// The fallback template of a type.
///
/// Whether `T` is [`Packable`] is decided once, at construction. If it is,
/// the template delegates to the type itself. Otherwise every call
/// dispatches to the template the registry has published for `T`. This is
/// also the placeholder handed out while a recursive type is being built:
/// invoking it before the real template is published fails with
/// [`Error::TemplateLookupFailed`].
pub struct DefaultTemplate<T> {
    registry: WeakRegistry,
    packable: Option<PackableFns<T>>,
}

impl<T: Identifiable + Send + Sync + 'static> DefaultTemplate<T> {
    /// Creates the fallback template of `T` within `registry`.
    #[must_use]
    pub fn new(registry: &TemplateRegistry) -> Self {
        Self {
            registry: registry.downgrade(),
            packable: registry.packable_fns::<T>(),
        }
    }

    /// Whether this template delegates to a [`Packable`] implementation.
    #[must_use]
    pub const fn is_packable(&self) -> bool { self.packable.is_some() }

    fn resolve(&self) -> Result<Arc<dyn Template<T>>> {
        let failed = || Error::TemplateLookupFailed { type_name: type_name::<T>() };

        let registry = self.registry.upgrade().ok_or_else(failed)?;
        let template = registry.published::<T>()?.ok_or_else(failed)?;

        // resolving to ourselves would recurse forever
        if std::ptr::addr_eq(Arc::as_ptr(&template), std::ptr::from_ref(self)) {
            return Err(failed());
        }

        Ok(template)
    }
}

impl<T: Identifiable + Send + Sync + 'static> Template<T>
    for DefaultTemplate<T>
{
    fn write(&self, packer: &mut dyn Packer, value: &T) -> Result<()> {
        match &self.packable {
            Some(fns) => (fns.write)(value, packer),
            None => self.resolve()?.write(packer, value),
        }
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<T>,
    ) -> Result<Decoded<T>> {
        match &self.packable {
            Some(fns) => (fns.read)(unpacker, reuse),
            None => self.resolve()?.read(unpacker, reuse),
        }
    }
}

impl<T> std::fmt::Debug for DefaultTemplate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultTemplate")
            .field("type", &type_name::<T>())
            .field("packable", &self.packable.is_some())
            .finish_non_exhaustive()
    }
}
