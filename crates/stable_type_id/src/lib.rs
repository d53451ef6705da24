//! Stable type identifiers used as keys of the template registry.
//!
//! [`std::any::TypeId`] is neither stable across compiler runs nor usable in
//! `const` context. [`StableTypeID`] is computed at compile time from a fully
//! qualified type name and combined with the identifiers of generic
//! parameters, so `Vec<i32>` and `Vec<String>` get different keys.

use std::{
    collections::{BTreeMap, HashMap, hash_map::RandomState},
    hash::{BuildHasherDefault, DefaultHasher},
    sync::Arc,
    time::SystemTime,
};

pub use qbin_identifiable_derive::Identifiable;

/// A deterministic 128-bit identifier of a type.
///
/// # Examples
///
/// ```ignore
/// let id = StableTypeID::from_unique_type_name("myapp@1.0.0::models::User");
/// let same =
///     StableTypeID::from_unique_type_name("myapp@1.0.0::models::User");
/// assert_eq!(id, same);
///
/// let param = StableTypeID::from_unique_type_name("String");
/// assert_ne!(id.combine(param), param.combine(id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StableTypeID(u64, u64);

impl StableTypeID {
    /// Hashes a fully qualified type name into an identifier.
    ///
    /// The name should be unique per type, ideally in the form
    /// `package@version::module::path::TypeName`.
    #[must_use]
    pub const fn from_unique_type_name(name: &'static str) -> Self {
        const K0: u64 = 0x736f_6d65_7073_6575;
        const K1: u64 = 0x646f_7261_6e64_6f6d;
        const K2: u64 = 0x6c79_6765_6e65_7261;
        const K3: u64 = 0x7465_6462_7974_6573;

        let bytes = name.as_bytes();
        let len = bytes.len();

        let mut v0 = K0;
        let mut v1 = K1;
        let mut v2 = K2;
        let mut v3 = K3;

        v0 ^= len as u64;
        v1 ^= (len as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);

        let mut i = 0;
        while i + 8 <= len {
            let chunk = Self::read_u64_le(bytes, i);
            v0 ^= chunk;
            Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
            Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
            v3 ^= chunk;
            i += 8;
        }

        let mut tail = 0u64;
        let mut shift = 0;
        while i < len {
            tail |= (bytes[i] as u64) << shift;
            shift += 8;
            i += 1;
        }

        v0 ^= tail;
        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        v3 ^= tail;

        let mut round = 0;
        while round < 4 {
            Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
            round += 1;
        }

        v0 ^= v2;
        v1 ^= v3;
        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);

        let hash1 = v0 ^ v1;
        let hash2 = v2 ^ v3;

        Self(hash1, hash2)
    }

    /// Folds `other` into this identifier.
    ///
    /// The combination is order sensitive: `a.combine(b) != b.combine(a)`.
    /// Generic types fold the identifier of each type parameter into the
    /// identifier of their base name.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        let mut v0 = self.0 ^ 0x736f_6d65_7073_6575;
        let mut v1 = self.1 ^ 0x646f_7261_6e64_6f6d;
        let mut v2 = other.0 ^ 0x6c79_6765_6e65_7261;
        let mut v3 = other.1 ^ 0x7465_6462_7974_6573;

        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);

        // order sensitivity
        v0 ^= 0x1f83_d9ab_fb41_bd6b;
        v1 ^= 0x5be0_cd19_137e_2179;

        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);

        v0 ^= v2;
        v1 ^= v3;
        v2 ^= v0.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        v3 ^= v1.wrapping_mul(0xc2b2_ae35_86d4_0f00);

        Self::sipround(&mut v0, &mut v1, &mut v2, &mut v3);

        let hash1 = v0 ^ v1;
        let hash2 = v2 ^ v3;

        Self(hash1, hash2)
    }

    const fn read_u64_le(bytes: &[u8], start: usize) -> u64 {
        (bytes[start] as u64)
            | ((bytes[start + 1] as u64) << 8)
            | ((bytes[start + 2] as u64) << 16)
            | ((bytes[start + 3] as u64) << 24)
            | ((bytes[start + 4] as u64) << 32)
            | ((bytes[start + 5] as u64) << 40)
            | ((bytes[start + 6] as u64) << 48)
            | ((bytes[start + 7] as u64) << 56)
    }

    const fn sipround(v0: &mut u64, v1: &mut u64, v2: &mut u64, v3: &mut u64) {
        *v0 = v0.wrapping_add(*v1);
        *v1 = v1.rotate_left(13);
        *v1 ^= *v0;
        *v0 = v0.rotate_left(32);

        *v2 = v2.wrapping_add(*v3);
        *v3 = v3.rotate_left(16);
        *v3 ^= *v2;

        *v0 = v0.wrapping_add(*v3);
        *v3 = v3.rotate_left(21);
        *v3 ^= *v0;

        *v2 = v2.wrapping_add(*v1);
        *v1 = v1.rotate_left(17);
        *v1 ^= *v2;
        *v2 = v2.rotate_left(32);
    }
}

/// A type with a stable identifier.
///
/// Prefer `#[derive(Identifiable)]`, which hashes the package name, version,
/// module path and type name, and folds in the identifiers of any type
/// parameters.
///
/// ```ignore
/// #[derive(Identifiable)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// let id = Point::STABLE_TYPE_ID;
/// ```
#[diagnostic::on_unimplemented(
    message = "The type `{Self}` does not implement `Identifiable`",
    note = "You can derive `Identifiable` using the `#[derive(Identifiable)]` \
            macro",
    label = "`Identifiable` is required for stable type identification"
)]
pub trait Identifiable {
    /// The stable identifier of the type.
    const STABLE_TYPE_ID: StableTypeID;
}

macro_rules! identifiable_leaf {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Identifiable for $ty {
                const STABLE_TYPE_ID: StableTypeID =
                    StableTypeID::from_unique_type_name($name);
            }
        )*
    };
}

identifiable_leaf! {
    bool => "core::primitive::bool",
    i8 => "core::primitive::i8",
    i16 => "core::primitive::i16",
    i32 => "core::primitive::i32",
    i64 => "core::primitive::i64",
    i128 => "core::primitive::i128",
    u8 => "core::primitive::u8",
    u16 => "core::primitive::u16",
    u32 => "core::primitive::u32",
    u64 => "core::primitive::u64",
    u128 => "core::primitive::u128",
    f32 => "core::primitive::f32",
    f64 => "core::primitive::f64",
    String => "alloc::string::String",
    () => "std::tuple::Unit",
    SystemTime => "std::time::SystemTime",
    RandomState => "std::hash::RandomState",
    DefaultHasher => "std::hash::DefaultHasher",
}

macro_rules! identifiable_wrapper {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            impl<T: Identifiable + ?Sized> Identifiable for $ty<T> {
                const STABLE_TYPE_ID: StableTypeID =
                    StableTypeID::from_unique_type_name($name)
                        .combine(T::STABLE_TYPE_ID);
            }
        )*
    };
}

identifiable_wrapper! {
    Arc => "std::sync::Arc",
    Box => "std::boxed::Box",
}

impl<T: Identifiable> Identifiable for [T] {
    const STABLE_TYPE_ID: StableTypeID =
        StableTypeID::from_unique_type_name("std::slice::Slice")
            .combine(T::STABLE_TYPE_ID);
}

impl<T: Identifiable> Identifiable for Vec<T> {
    const STABLE_TYPE_ID: StableTypeID =
        StableTypeID::from_unique_type_name("std::vec::Vec")
            .combine(T::STABLE_TYPE_ID);
}

impl<T: Identifiable> Identifiable for Option<T> {
    const STABLE_TYPE_ID: StableTypeID =
        StableTypeID::from_unique_type_name("core::option::Option")
            .combine(T::STABLE_TYPE_ID);
}

impl<H: Identifiable> Identifiable for BuildHasherDefault<H> {
    const STABLE_TYPE_ID: StableTypeID =
        StableTypeID::from_unique_type_name("std::hash::BuildHasherDefault")
            .combine(H::STABLE_TYPE_ID);
}

impl<K, V, S> Identifiable for HashMap<K, V, S>
where
    K: Identifiable,
    V: Identifiable,
    S: Identifiable,
{
    const STABLE_TYPE_ID: StableTypeID =
        StableTypeID::from_unique_type_name("std::collections::HashMap")
            .combine(K::STABLE_TYPE_ID)
            .combine(V::STABLE_TYPE_ID)
            .combine(S::STABLE_TYPE_ID);
}

impl<K: Identifiable, V: Identifiable> Identifiable for BTreeMap<K, V> {
    const STABLE_TYPE_ID: StableTypeID =
        StableTypeID::from_unique_type_name("std::collections::BTreeMap")
            .combine(K::STABLE_TYPE_ID)
            .combine(V::STABLE_TYPE_ID);
}

macro_rules! identifiable_tuple {
    ($($name:ident)+) => {
        impl<$($name: Identifiable),+> Identifiable for ($($name,)+) {
            const STABLE_TYPE_ID: StableTypeID = {
                let base = StableTypeID::from_unique_type_name("std::tuple::Tuple");
                $(
                    let base = base.combine($name::STABLE_TYPE_ID);
                )+
                base
            };
        }
    };
}

identifiable_tuple! { A }
identifiable_tuple! { A B }
identifiable_tuple! { A B C }
identifiable_tuple! { A B C D }
identifiable_tuple! { A B C D E }
identifiable_tuple! { A B C D E F }

#[cfg(test)]
mod test;
