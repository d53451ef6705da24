use crate::{Error, Float, Value, ValueKind};

#[test]
fn narrowing_checks_range() {
    let value = Value::from(300u16);

    assert_eq!(value.to_int::<u16>().ok(), Some(300));
    assert_eq!(value.to_int::<i64>().ok(), Some(300));
    assert!(matches!(
        value.to_int::<u8>(),
        Err(Error::IntegerOutOfRange { value: 300, target: "u8" })
    ));
}

#[test]
fn full_unsigned_range_survives() {
    let value = Value::from(u64::MAX);

    assert_eq!(value.to_int::<u64>().ok(), Some(u64::MAX));
    assert!(value.to_int::<i64>().is_err());
}

#[test]
fn negative_into_unsigned_fails() {
    let value = Value::from(-1i8);

    assert!(matches!(
        value.to_int::<u32>(),
        Err(Error::IntegerOutOfRange { value: -1, .. })
    ));
}

#[test]
fn kind_mismatch_reports_both_sides() {
    let value = Value::string("hello");

    match value.to_bool() {
        Err(Error::TypeMismatch { expected, actual }) => {
            assert_eq!(expected, ValueKind::Boolean);
            assert_eq!(actual, ValueKind::Raw);
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(value.to_str().ok(), Some("hello"));
}

#[test]
fn floats_widen_and_round() {
    let single = Value::from(1.5f32);
    let double = Value::Float(Float::F64(0.1));

    assert!((single.to_f64().unwrap_or_default() - 1.5).abs() < f64::EPSILON);
    assert!((double.to_f32().unwrap_or_default() - 0.1f32).abs() < f32::EPSILON);
    assert!(Value::Nil.to_f64().is_err());
}

#[test]
fn option_converts_to_nil() {
    assert_eq!(Value::from(None::<i32>), Value::Nil);
    assert_eq!(Value::from(Some(7i32)), Value::Integer(7));
}

#[test]
fn generated_accessors() {
    let value = Value::Array(vec![Value::Nil, Value::from(true)]);

    assert!(value.is_array());
    assert!(value.is_container());
    assert_eq!(value.as_array().map(Vec::len), Some(2));
    assert!(Value::Nil.is_nil());
    assert_eq!(Value::default(), Value::Nil);
}
