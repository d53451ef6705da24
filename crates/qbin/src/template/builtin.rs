//! Templates of the standard types.
//!
//! | Rust type | Wire shape |
//! |-----------|------------|
//! | `bool` | boolean |
//! | `i8` ..= `i128`, `u8` ..= `u64` | integer, range checked on read |
//! | `f32`, `f64` | float |
//! | `String`, [`Raw`] | raw bytes |
//! | [`Value`] | whatever the tree holds |
//! | `Vec<T>` | array |
//! | `Option<T>` | nil or `T` |
//! | `Box<T>` | `T` |
//! | `HashMap<K, V, S>`, `BTreeMap<K, V>` | map |
//! | `SystemTime` | integer milliseconds since the Unix epoch |

use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
    sync::Arc,
    time::{Duration, SystemTime},
};

use qbin_stable_type_id::Identifiable;

use crate::{
    error::{Error, Result},
    packer::Packer,
    registry::TemplateRegistry,
    template::{Decoded, Template, Templated},
    unpacker::Unpacker,
    value::{Raw, Value},
};

/// Upper bound on speculative preallocation for declared container lengths.
const PREALLOCATION_LIMIT: usize = 1024;

macro_rules! scalar_templates {
    ($($name:ident($ty:ty) => $write:ident, $read:ident;)*) => {
        $(
            #[doc = concat!("Template of `", stringify!($ty), "`.")]
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $name;

            impl Template<$ty> for $name {
                fn write(&self, packer: &mut dyn Packer, value: &$ty) -> Result<()> {
                    packer.$write(*value)
                }

                fn read(
                    &self,
                    unpacker: &mut dyn Unpacker,
                    _reuse: Option<$ty>,
                ) -> Result<Decoded<$ty>> {
                    unpacker.$read().map(Decoded::Fresh)
                }
            }

            impl Templated for $ty {
                fn build_template(
                    _: &TemplateRegistry,
                ) -> Result<Arc<dyn Template<Self>>> {
                    Ok(Arc::new($name))
                }
            }
        )*
    };
}

scalar_templates! {
    BoolTemplate(bool) => write_bool, read_bool;
    I8Template(i8) => write_i8, read_i8;
    I16Template(i16) => write_i16, read_i16;
    I32Template(i32) => write_i32, read_i32;
    I64Template(i64) => write_i64, read_i64;
    I128Template(i128) => write_i128, read_i128;
    U8Template(u8) => write_u8, read_u8;
    U16Template(u16) => write_u16, read_u16;
    U32Template(u32) => write_u32, read_u32;
    U64Template(u64) => write_u64, read_u64;
    F32Template(f32) => write_f32, read_f32;
    F64Template(f64) => write_f64, read_f64;
}

/// Template of `String`, written as UTF-8 raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTemplate;

impl Template<String> for StringTemplate {
    fn write(&self, packer: &mut dyn Packer, value: &String) -> Result<()> {
        packer.write_str(value)
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        _reuse: Option<String>,
    ) -> Result<Decoded<String>> {
        unpacker.read_str().map(Decoded::Fresh)
    }
}

impl Templated for String {
    fn build_template(_: &TemplateRegistry) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(StringTemplate))
    }
}

/// Template of `SystemTime`, written as signed milliseconds since the Unix
/// epoch. Sub-millisecond precision is truncated toward the epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeTemplate;

impl SystemTimeTemplate {
    const TARGET: &'static str = "SystemTime";

    fn to_millis(time: SystemTime) -> Result<i64> {
        let since = time.duration_since(SystemTime::UNIX_EPOCH);
        let (millis, negative) = match since {
            Ok(elapsed) => (elapsed.as_millis(), false),
            Err(before) => (before.duration().as_millis(), true),
        };

        // u128 milliseconds of any SystemTime fit an i128
        let signed = i128::try_from(millis).unwrap_or(i128::MAX);
        let signed = if negative { -signed } else { signed };

        i64::try_from(signed).map_err(|_| Error::IntegerOutOfRange {
            value: signed,
            target: "i64",
        })
    }

    fn from_millis(millis: i64) -> Result<SystemTime> {
        let offset = Duration::from_millis(millis.unsigned_abs());
        let time = if millis < 0 {
            SystemTime::UNIX_EPOCH.checked_sub(offset)
        } else {
            SystemTime::UNIX_EPOCH.checked_add(offset)
        };

        time.ok_or(Error::IntegerOutOfRange {
            value: millis.into(),
            target: Self::TARGET,
        })
    }
}

impl Template<SystemTime> for SystemTimeTemplate {
    fn write(&self, packer: &mut dyn Packer, value: &SystemTime) -> Result<()> {
        packer.write_i64(Self::to_millis(*value)?)
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        _reuse: Option<SystemTime>,
    ) -> Result<Decoded<SystemTime>> {
        let millis = unpacker.read_i64()?;
        Self::from_millis(millis).map(Decoded::Fresh)
    }
}

impl Templated for SystemTime {
    fn build_template(_: &TemplateRegistry) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(SystemTimeTemplate))
    }
}

/// Template of [`Raw`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTemplate;

impl Template<Raw> for RawTemplate {
    fn write(&self, packer: &mut dyn Packer, value: &Raw) -> Result<()> {
        packer.write_bytes(value)
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        _reuse: Option<Raw>,
    ) -> Result<Decoded<Raw>> {
        unpacker.read_bytes().map(|bytes| Decoded::Fresh(Raw(bytes)))
    }
}

impl Templated for Raw {
    fn build_template(_: &TemplateRegistry) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(RawTemplate))
    }
}

/// Template of [`Value`]: copies the tree element by element.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueTemplate;

impl Template<Value> for ValueTemplate {
    fn write(&self, packer: &mut dyn Packer, value: &Value) -> Result<()> {
        packer.write_value(value)
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        _reuse: Option<Value>,
    ) -> Result<Decoded<Value>> {
        unpacker.read_value().map(Decoded::Fresh)
    }
}

impl Templated for Value {
    fn build_template(_: &TemplateRegistry) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(ValueTemplate))
    }
}

/// Template of `Vec<T>`, written as an array.
///
/// A reused vector of the same length hands each element to the element
/// template as its own reuse hint.
pub struct ListTemplate<T> {
    element: Arc<dyn Template<T>>,
}

impl<T> ListTemplate<T> {
    /// Creates a list template around the element template.
    #[must_use]
    pub fn new(element: Arc<dyn Template<T>>) -> Self { Self { element } }
}

impl<T: Send + Sync> Template<Vec<T>> for ListTemplate<T> {
    fn write(&self, packer: &mut dyn Packer, value: &Vec<T>) -> Result<()> {
        packer.write_array_begin(value.len())?;
        for item in value {
            self.element.write(packer, item)?;
        }
        packer.write_array_end()
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<Vec<T>>,
    ) -> Result<Decoded<Vec<T>>> {
        let len = unpacker.read_array_begin()?;

        let decoded = match reuse {
            Some(items) if items.len() == len => Decoded::Reused(
                items
                    .into_iter()
                    .map(|item| {
                        self.element
                            .read(unpacker, Some(item))
                            .map(Decoded::into_inner)
                    })
                    .collect::<Result<Vec<T>>>()?,
            ),
            _ => {
                let mut items = Vec::with_capacity(len.min(PREALLOCATION_LIMIT));
                for _ in 0..len {
                    items.push(self.element.read(unpacker, None)?.into_inner());
                }
                Decoded::Fresh(items)
            }
        };

        unpacker.read_array_end(false)?;
        Ok(decoded)
    }
}

impl<T: Templated> Templated for Vec<T> {
    fn build_template(
        registry: &TemplateRegistry,
    ) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(ListTemplate::new(registry.lookup::<T>()?)))
    }
}

/// Template of `Option<T>`: `None` is written as nil.
pub struct NullableTemplate<T> {
    inner: Arc<dyn Template<T>>,
}

impl<T> NullableTemplate<T> {
    /// Creates a nullable template around the template of `T`.
    #[must_use]
    pub fn new(inner: Arc<dyn Template<T>>) -> Self { Self { inner } }
}

impl<T: Send + Sync> Template<Option<T>> for NullableTemplate<T> {
    fn write(&self, packer: &mut dyn Packer, value: &Option<T>) -> Result<()> {
        match value {
            Some(value) => self.inner.write(packer, value),
            None => packer.write_nil(),
        }
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<Option<T>>,
    ) -> Result<Decoded<Option<T>>> {
        if unpacker.try_read_nil()? {
            return Ok(Decoded::Fresh(None));
        }

        Ok(self.inner.read(unpacker, reuse.flatten())?.map(Some))
    }
}

impl<T: Templated> Templated for Option<T> {
    fn build_template(
        registry: &TemplateRegistry,
    ) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(NullableTemplate::new(registry.lookup::<T>()?)))
    }
}

/// Template of `Box<T>`, transparent on the wire.
pub struct BoxTemplate<T> {
    inner: Arc<dyn Template<T>>,
}

impl<T> BoxTemplate<T> {
    /// Creates a box template around the template of `T`.
    #[must_use]
    pub fn new(inner: Arc<dyn Template<T>>) -> Self { Self { inner } }
}

impl<T: Send + Sync> Template<Box<T>> for BoxTemplate<T> {
    fn write(&self, packer: &mut dyn Packer, value: &Box<T>) -> Result<()> {
        self.inner.write(packer, value)
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<Box<T>>,
    ) -> Result<Decoded<Box<T>>> {
        let inner = self.inner.read(unpacker, reuse.map(|boxed| *boxed))?;
        Ok(Decoded::Fresh(Box::new(inner.into_inner())))
    }
}

impl<T: Templated> Templated for Box<T> {
    fn build_template(
        registry: &TemplateRegistry,
    ) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(BoxTemplate::new(registry.lookup::<T>()?)))
    }
}

/// Template of `HashMap<K, V>` and `BTreeMap<K, V>`, written as a map.
///
/// A reused map is cleared and refilled.
pub struct MapTemplate<K, V> {
    key: Arc<dyn Template<K>>,
    value: Arc<dyn Template<V>>,
}

impl<K, V> MapTemplate<K, V> {
    /// Creates a map template around the key and value templates.
    #[must_use]
    pub fn new(key: Arc<dyn Template<K>>, value: Arc<dyn Template<V>>) -> Self {
        Self { key, value }
    }

    fn write_entries<'a>(
        &self,
        packer: &mut dyn Packer,
        len: usize,
        entries: impl Iterator<Item = (&'a K, &'a V)>,
    ) -> Result<()>
    where
        K: 'a,
        V: 'a,
    {
        packer.write_map_begin(len)?;
        for (key, value) in entries {
            self.key.write(packer, key)?;
            self.value.write(packer, value)?;
        }
        packer.write_map_end()
    }

    fn read_entries(
        &self,
        unpacker: &mut dyn Unpacker,
        mut insert: impl FnMut(K, V),
    ) -> Result<()> {
        let len = unpacker.read_map_begin()?;
        for _ in 0..len {
            let key = self.key.read(unpacker, None)?.into_inner();
            let value = self.value.read(unpacker, None)?.into_inner();
            insert(key, value);
        }
        unpacker.read_map_end(false)
    }
}

impl<K, V, S> Template<HashMap<K, V, S>> for MapTemplate<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Default,
{
    fn write(
        &self,
        packer: &mut dyn Packer,
        value: &HashMap<K, V, S>,
    ) -> Result<()> {
        self.write_entries(packer, value.len(), value.iter())
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<HashMap<K, V, S>>,
    ) -> Result<Decoded<HashMap<K, V, S>>> {
        let (mut map, reused) = match reuse {
            Some(mut map) => {
                map.clear();
                (map, true)
            }
            None => (HashMap::default(), false),
        };

        self.read_entries(unpacker, |key, value| {
            map.insert(key, value);
        })?;

        Ok(if reused { Decoded::Reused(map) } else { Decoded::Fresh(map) })
    }
}

impl<K, V, S> Templated for HashMap<K, V, S>
where
    K: Templated + Eq + Hash,
    V: Templated,
    S: Identifiable + BuildHasher + Default + Send + Sync + 'static,
{
    fn build_template(
        registry: &TemplateRegistry,
    ) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(MapTemplate::new(
            registry.lookup::<K>()?,
            registry.lookup::<V>()?,
        )))
    }
}

impl<K, V> Template<BTreeMap<K, V>> for MapTemplate<K, V>
where
    K: Ord + Send + Sync,
    V: Send + Sync,
{
    fn write(
        &self,
        packer: &mut dyn Packer,
        value: &BTreeMap<K, V>,
    ) -> Result<()> {
        self.write_entries(packer, value.len(), value.iter())
    }

    fn read(
        &self,
        unpacker: &mut dyn Unpacker,
        reuse: Option<BTreeMap<K, V>>,
    ) -> Result<Decoded<BTreeMap<K, V>>> {
        let (mut map, reused) = match reuse {
            Some(mut map) => {
                map.clear();
                (map, true)
            }
            None => (BTreeMap::new(), false),
        };

        self.read_entries(unpacker, |key, value| {
            map.insert(key, value);
        })?;

        Ok(if reused { Decoded::Reused(map) } else { Decoded::Fresh(map) })
    }
}

impl<K, V> Templated for BTreeMap<K, V>
where
    K: Templated + Ord,
    V: Templated,
{
    fn build_template(
        registry: &TemplateRegistry,
    ) -> Result<Arc<dyn Template<Self>>> {
        Ok(Arc::new(MapTemplate::new(
            registry.lookup::<K>()?,
            registry.lookup::<V>()?,
        )))
    }
}
