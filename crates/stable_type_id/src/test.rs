use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasherDefault, DefaultHasher},
};

use super::{Identifiable, StableTypeID};

#[test]
fn same_name_same_id() {
    let a = StableTypeID::from_unique_type_name("qbin@0.1.0::value::Value");
    let b = StableTypeID::from_unique_type_name("qbin@0.1.0::value::Value");
    let c = StableTypeID::from_unique_type_name("qbin@0.1.0::value::Raw");

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn combine_is_order_sensitive() {
    let a = StableTypeID::from_unique_type_name("a");
    let b = StableTypeID::from_unique_type_name("b");

    assert_ne!(a.combine(b), b.combine(a));
}

#[test]
fn generic_instantiations_differ() {
    assert_ne!(Vec::<i32>::STABLE_TYPE_ID, Vec::<u32>::STABLE_TYPE_ID);
    assert_ne!(Option::<i64>::STABLE_TYPE_ID, Box::<i64>::STABLE_TYPE_ID);
    assert_ne!(
        HashMap::<String, i64>::STABLE_TYPE_ID,
        BTreeMap::<String, i64>::STABLE_TYPE_ID
    );
    assert_ne!(
        HashMap::<String, i64>::STABLE_TYPE_ID,
        HashMap::<i64, String>::STABLE_TYPE_ID
    );
}

#[test]
fn derived_ids_include_type_parameters() {
    #[derive(crate::Identifiable)]
    #[qbin_stable_type_id(crate)]
    struct Wrapper<T> {
        _value: T,
    }

    #[derive(crate::Identifiable)]
    #[qbin_stable_type_id(crate)]
    struct Plain;

    assert_ne!(Wrapper::<i32>::STABLE_TYPE_ID, Wrapper::<String>::STABLE_TYPE_ID);
    assert_ne!(Plain::STABLE_TYPE_ID, Wrapper::<i32>::STABLE_TYPE_ID);
    assert_eq!(Plain::STABLE_TYPE_ID, Plain::STABLE_TYPE_ID);
}

#[test]
fn hasher_is_part_of_map_id() {
    type Seeded = HashMap<String, u32>;
    type Fixed = HashMap<String, u32, BuildHasherDefault<DefaultHasher>>;

    assert_ne!(Seeded::STABLE_TYPE_ID, Fixed::STABLE_TYPE_ID);
    assert_eq!(Fixed::STABLE_TYPE_ID, Fixed::STABLE_TYPE_ID);
}
