//! Lazy, thread-safe resolution of templates by type.
//!
//! The registry maps a type's [`StableTypeID`] to its shared template. A
//! template is built the first time it is looked up, either from a builder
//! registered explicitly or through the type's [`Templated`]
//! implementation.
//!
//! # Recursive types
//!
//! Building the template of `Node { children: Vec<Node> }` needs the
//! template of `Vec<Node>`, which needs the template of `Node` again. While
//! a template is being built, lookups of the same type return a
//! placeholder, a [`DefaultTemplate`] that dispatches to the registry on
//! every call. Templates built during one build session stay private to
//! the building thread and are published together once the outermost build
//! succeeds. If it fails, none of them are published.
//!
//! Invoking a placeholder before its template is published fails with
//! [`Error::TemplateLookupFailed`] instead of recursing.

use std::{
    any::{Any, type_name},
    cell::RefCell,
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use fxhash::{FxBuildHasher, FxHashMap};
use parking_lot::ReentrantMutex;
use qbin_stable_type_id::{Identifiable, StableTypeID};

use crate::{
    builder::ValueBuilder,
    converter::Converter,
    error::{Error, Result},
    packer::Packer,
    stream::{StreamPacker, StreamUnpacker},
    template::{Decoded, DefaultTemplate, Packable, PackableFns, Template, Templated},
    unpacker::Unpacker,
    value::Value,
};

/// Builds the template of `T`, possibly looking up other templates.
pub type BuildFn<T> = fn(&TemplateRegistry) -> Result<Arc<dyn Template<T>>>;

/// A type-erased `Arc<dyn Template<T>>`, `BuildFn<T>` or `PackableFns<T>`.
type Erased = Arc<dyn Any + Send + Sync>;

enum Pending {
    Placeholder(Erased),
    Built(Erased),
}

impl Pending {
    const fn template(&self) -> &Erased {
        match self {
            Self::Placeholder(template) | Self::Built(template) => template,
        }
    }
}

/// State of the build session owned by the thread holding the build lock.
#[derive(Default)]
struct BuildSession {
    depth: usize,
    pending: FxHashMap<StableTypeID, Pending>,
}

struct Inner {
    published: DashMap<StableTypeID, Erased, FxBuildHasher>,
    builders: DashMap<StableTypeID, Erased, FxBuildHasher>,
    packables: DashMap<StableTypeID, Erased, FxBuildHasher>,
    session: ReentrantMutex<RefCell<BuildSession>>,
}

/// Resets the build session if a builder unwinds.
struct Rollback<'a> {
    session: &'a RefCell<BuildSession>,
    armed: bool,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Ok(mut session) = self.session.try_borrow_mut() {
            *session = BuildSession::default();
        }
    }
}

/// The registry of templates.
///
/// Cloning is cheap and yields a handle to the same registry. The registry
/// can be shared between threads; builds are serialized, lookups of
/// published templates are not.
///
/// # Example
///
/// ```ignore
/// let registry = TemplateRegistry::new();
///
/// let bytes = registry.encode(&vec![1u32, 2, 3])?;
/// let back: Vec<u32> = registry.decode(&bytes)?;
///
/// let template = registry.lookup::<Vec<u32>>()?;
/// template.write(&mut packer, &back)?;
/// ```
#[derive(Clone)]
pub struct TemplateRegistry {
    inner: Arc<Inner>,
}

/// A handle that does not keep the registry alive.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<Inner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<TemplateRegistry> {
        self.0.upgrade().map(|inner| TemplateRegistry { inner })
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("published", &self.inner.published.len())
            .field("builders", &self.inner.builders.len())
            .finish_non_exhaustive()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self { Self::new() }
}

fn erase<T: 'static>(template: Arc<dyn Template<T>>) -> Erased {
    Arc::new(template)
}

fn unerase<T: 'static>(erased: &Erased) -> Result<Arc<dyn Template<T>>> {
    (**erased)
        .downcast_ref::<Arc<dyn Template<T>>>()
        .cloned()
        .ok_or(Error::TemplateLookupFailed { type_name: type_name::<T>() })
}

fn build_default<T: Identifiable + Send + Sync + 'static>(
    registry: &TemplateRegistry,
) -> Result<Arc<dyn Template<T>>> {
    Ok(Arc::new(DefaultTemplate::<T>::new(registry)))
}

impl TemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                published: DashMap::default(),
                builders: DashMap::default(),
                packables: DashMap::default(),
                session: ReentrantMutex::new(RefCell::new(
                    BuildSession::default(),
                )),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    /// Returns the template of `T`, building it on first use.
    ///
    /// Called from within a build of `T` itself, this returns a placeholder
    /// that must not be invoked until the build has finished.
    ///
    /// # Errors
    ///
    /// Propagates failures of the build, such as an invalid schema or a
    /// dependency without template.
    pub fn lookup<T: Templated>(&self) -> Result<Arc<dyn Template<T>>> {
        self.resolve::<T>(Some(T::build_template))
    }

    /// Returns the template of `T` from registered templates and builders
    /// only.
    ///
    /// # Errors
    ///
    /// [`Error::TemplateNotFound`] if nothing is registered for `T`.
    pub fn lookup_registered<T: Identifiable + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<dyn Template<T>>> {
        self.resolve::<T>(None)
    }

    /// Publishes `template` for `T`, replacing any previous one.
    pub fn register<T: Identifiable + Send + Sync + 'static>(
        &self,
        template: Arc<dyn Template<T>>,
    ) {
        tracing::debug!(type_name = type_name::<T>(), "registered template");
        self.inner.published.insert(T::STABLE_TYPE_ID, erase(template));
    }

    /// Registers a builder used the first time `T` is looked up. It takes
    /// precedence over the [`Templated`] implementation of `T`.
    ///
    /// Has no effect once a template of `T` is published.
    pub fn register_builder<T: Identifiable + Send + Sync + 'static>(
        &self,
        builder: BuildFn<T>,
    ) {
        self.inner.builders.insert(T::STABLE_TYPE_ID, Arc::new(builder));
    }

    /// Declares that `T` serializes itself through [`Packable`].
    ///
    /// Lookups of `T` then resolve to a [`DefaultTemplate`] delegating to
    /// the type.
    pub fn register_packable<T>(&self)
    where
        T: Packable + Default + Identifiable + Send + Sync + 'static,
    {
        self.inner
            .packables
            .insert(T::STABLE_TYPE_ID, Arc::new(PackableFns::<T>::new()));
        self.register_builder::<T>(build_default::<T>);
    }

    /// Whether a template of `T` has been published.
    #[must_use]
    pub fn is_published<T: Identifiable>(&self) -> bool {
        self.inner.published.contains_key(&T::STABLE_TYPE_ID)
    }

    /// Number of published templates.
    #[must_use]
    pub fn published_count(&self) -> usize { self.inner.published.len() }

    pub(crate) fn published<T: Identifiable + 'static>(
        &self,
    ) -> Result<Option<Arc<dyn Template<T>>>> {
        self.inner
            .published
            .get(&T::STABLE_TYPE_ID)
            .map(|entry| unerase::<T>(entry.value()))
            .transpose()
    }

    pub(crate) fn packable_fns<T: Identifiable + 'static>(
        &self,
    ) -> Option<PackableFns<T>> {
        self.inner
            .packables
            .get(&T::STABLE_TYPE_ID)
            .and_then(|entry| {
                (**entry.value()).downcast_ref::<PackableFns<T>>().copied()
            })
    }

    fn builder<T: Identifiable + 'static>(&self) -> Option<BuildFn<T>> {
        self.inner
            .builders
            .get(&T::STABLE_TYPE_ID)
            .and_then(|entry| (**entry.value()).downcast_ref::<BuildFn<T>>().copied())
    }

    #[tracing::instrument(
        skip_all,
        fields(type_name = type_name::<T>()),
        level = "debug"
    )]
    fn resolve<T: Identifiable + Send + Sync + 'static>(
        &self,
        fallback: Option<BuildFn<T>>,
    ) -> Result<Arc<dyn Template<T>>> {
        if let Some(template) = self.published::<T>()? {
            return Ok(template);
        }

        let guard = self.inner.session.lock();

        // another thread may have published while we waited for the lock
        if let Some(template) = self.published::<T>()? {
            return Ok(template);
        }

        if let Some(pending) = guard.borrow().pending.get(&T::STABLE_TYPE_ID) {
            tracing::trace!("returning in-progress template");
            return unerase::<T>(pending.template());
        }

        let build = self.builder::<T>().or(fallback).ok_or(
            Error::TemplateNotFound { type_name: type_name::<T>() },
        )?;

        let placeholder: Arc<dyn Template<T>> =
            Arc::new(DefaultTemplate::<T>::new(self));
        {
            let mut session = guard.borrow_mut();
            session.depth += 1;
            session
                .pending
                .insert(T::STABLE_TYPE_ID, Pending::Placeholder(erase(placeholder)));
        }

        tracing::debug!("building template");

        let mut rollback = Rollback { session: &*guard, armed: true };
        let built = build(self);
        rollback.armed = false;

        let mut session = guard.borrow_mut();
        session.depth -= 1;
        let outermost = session.depth == 0;

        match built {
            Ok(template) => {
                session
                    .pending
                    .insert(T::STABLE_TYPE_ID, Pending::Built(erase(template.clone())));

                if outermost {
                    let pending = std::mem::take(&mut session.pending);
                    let mut published = 0;

                    for (id, entry) in pending {
                        if let Pending::Built(template) = entry {
                            self.inner.published.insert(id, template);
                            published += 1;
                        }
                    }

                    tracing::debug!(published, "published build session");
                }

                Ok(template)
            }

            Err(error) => {
                if outermost {
                    session.pending.clear();
                } else {
                    session.pending.remove(&T::STABLE_TYPE_ID);
                }

                tracing::debug!(%error, "template build failed");
                Err(error)
            }
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Writes `value` with the template of `T`.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be resolved or the write fails.
    pub fn pack<T: Templated>(
        &self,
        packer: &mut dyn Packer,
        value: &T,
    ) -> Result<()> {
        self.lookup::<T>()?.write(packer, value)
    }

    /// Reads a `T` with its template.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be resolved or the read fails.
    pub fn unpack<T: Templated>(&self, unpacker: &mut dyn Unpacker) -> Result<T> {
        Ok(self.lookup::<T>()?.read(unpacker, None)?.into_inner())
    }

    /// Reads a `T`, populating `target` in place where the template
    /// supports it.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be resolved or the read fails.
    pub fn unpack_into<T: Templated>(
        &self,
        unpacker: &mut dyn Unpacker,
        target: T,
    ) -> Result<Decoded<T>> {
        self.lookup::<T>()?.read(unpacker, Some(target))
    }

    /// Encodes `value` to bytes.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be resolved or the write fails.
    pub fn encode<T: Templated>(&self, value: &T) -> Result<Vec<u8>> {
        let mut packer = StreamPacker::new(Vec::new());
        self.pack(&mut packer, value)?;
        packer.finish()
    }

    /// Decodes a `T` from bytes holding exactly one value.
    ///
    /// # Errors
    ///
    /// Fails on malformed input, trailing bytes, or if the template cannot
    /// be resolved.
    pub fn decode<T: Templated>(&self, bytes: &[u8]) -> Result<T> {
        let mut unpacker = StreamUnpacker::new(bytes);
        let value = self.unpack(&mut unpacker)?;

        if !unpacker.get_ref().is_empty() {
            return Err(Error::invalid_data(format!(
                "{} trailing bytes after value",
                unpacker.get_ref().len()
            )));
        }

        Ok(value)
    }

    /// Converts `value` into a value tree.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be resolved or the write fails.
    pub fn to_value<T: Templated>(&self, value: &T) -> Result<Value> {
        let mut builder = ValueBuilder::new();
        self.pack(&mut builder, value)?;
        builder.finish()
    }

    /// Converts a value tree into a `T`.
    ///
    /// # Errors
    ///
    /// Fails if the tree does not have the shape the template of `T`
    /// expects.
    pub fn from_value<T: Templated>(&self, value: &Value) -> Result<T> {
        self.unpack(&mut Converter::new(value))
    }
}

#[cfg(test)]
mod test;
