use super::{StreamPacker, StreamUnpacker, parse, to_bytes};
use crate::{
    Config, Error, Packer, ProtocolViolation, Unpacker, Value, ValueKind,
};

fn packed(write: impl FnOnce(&mut StreamPacker<Vec<u8>>)) -> Vec<u8> {
    let mut packer = StreamPacker::new(Vec::new());
    write(&mut packer);
    packer.finish().unwrap()
}

#[test]
fn integers_use_smallest_encoding() {
    let cases: &[(i128, &[u8])] = &[
        (0, &[0x00]),
        (127, &[0x7f]),
        (128, &[0xcc, 0x80]),
        (256, &[0xcd, 0x01, 0x00]),
        (70_000, &[0xce, 0x00, 0x01, 0x11, 0x70]),
        (-1, &[0xff]),
        (-32, &[0xe0]),
        (-33, &[0xd0, 0xdf]),
        (-129, &[0xd1, 0xff, 0x7f]),
        (i128::from(u64::MAX), &[0xcf, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
        (
            i128::from(i64::MIN),
            &[0xd3, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ),
    ];

    for &(value, expected) in cases {
        let bytes = packed(|p| p.write_i128(value).unwrap());
        assert_eq!(bytes, expected, "encoding of {value}");

        let decoded = StreamUnpacker::new(bytes.as_slice()).read_i128().unwrap();
        assert_eq!(decoded, value, "decoding of {value}");
    }
}

#[test]
fn scalars_and_headers() {
    assert_eq!(packed(|p| p.write_nil().unwrap()), [0xc0]);
    assert_eq!(packed(|p| p.write_bool(true).unwrap()), [0xc3]);
    assert_eq!(
        packed(|p| p.write_f32(1.0).unwrap()),
        [0xca, 0x3f, 0x80, 0x00, 0x00]
    );
    assert_eq!(packed(|p| p.write_str("abc").unwrap()), [0xa3, b'a', b'b', b'c']);
    assert_eq!(
        packed(|p| {
            p.write_array_begin(2).unwrap();
            p.write_u8(1).unwrap();
            p.write_u8(2).unwrap();
            p.write_array_end().unwrap();
        }),
        [0x92, 0x01, 0x02]
    );
    assert_eq!(
        packed(|p| {
            p.write_map_begin(0).unwrap();
            p.write_map_end().unwrap();
        }),
        [0x80]
    );
}

#[test]
fn long_raw_uses_length_prefix() {
    let text = "x".repeat(40);
    let bytes = packed(|p| p.write_str(&text).unwrap());

    assert_eq!(&bytes[..3], &[0xda, 0x00, 40]);
    assert_eq!(parse(&bytes).unwrap(), Value::string(text));
}

#[test]
fn accepts_binary_and_str8_families() {
    assert_eq!(parse(&[0xc4, 0x02, 1, 2]).unwrap(), Value::Raw(vec![1, 2]));
    assert_eq!(parse(&[0xd9, 0x01, b'z']).unwrap(), Value::string("z"));
    assert_eq!(parse(&[0xc5, 0x00, 0x00]).unwrap(), Value::Raw(Vec::new()));
}

#[test]
fn tree_survives_encoding() {
    let tree = Value::Map(vec![
        (Value::string("id"), Value::from(u64::MAX)),
        (
            Value::string("tags"),
            Value::Array((0..20).map(Value::from).collect()),
        ),
        (Value::Nil, Value::from(2.5f64)),
        (Value::from(false), Value::from(-0.5f32)),
    ]);

    assert_eq!(parse(&to_bytes(&tree).unwrap()).unwrap(), tree);
}

#[test]
fn parse_rejects_trailing_bytes() {
    assert!(matches!(parse(&[0xc0, 0xc0]), Err(Error::InvalidData(_))));
}

#[test]
fn truncated_input_is_end_of_input() {
    assert!(matches!(parse(&[0xcd, 0x01]), Err(Error::EndOfInput)));
    assert!(matches!(parse(&[0x92, 0x01]), Err(Error::EndOfInput)));
    assert!(matches!(parse(&[0xa3, b'a']), Err(Error::EndOfInput)));
    assert!(matches!(parse(&[]), Err(Error::EndOfInput)));
}

#[test]
fn extension_types_are_rejected() {
    assert!(matches!(parse(&[0xc1]), Err(Error::InvalidData(_))));
    assert!(matches!(parse(&[0xd4, 0x01, 0x00]), Err(Error::InvalidData(_))));
}

#[test]
fn consecutive_top_level_values() {
    let bytes = packed(|p| {
        p.write_u8(1).unwrap();
        p.write_str("two").unwrap();
        p.write_nil().unwrap();
    });
    let mut unpacker = StreamUnpacker::new(bytes.as_slice());

    assert_eq!(unpacker.read_u8().unwrap(), 1);
    assert_eq!(unpacker.read_str().unwrap(), "two");
    assert!(unpacker.try_read_nil().unwrap());
    assert!(matches!(unpacker.read_nil(), Err(Error::EndOfInput)));
}

#[test]
fn mismatch_does_not_consume() {
    let bytes = packed(|p| p.write_str("text").unwrap());
    let mut unpacker = StreamUnpacker::new(bytes.as_slice());

    assert!(matches!(
        unpacker.read_u32(),
        Err(Error::TypeMismatch { expected: ValueKind::Integer, actual: ValueKind::Raw })
    ));
    assert!(!unpacker.try_read_nil().unwrap());
    assert_eq!(unpacker.read_str().unwrap(), "text");
}

#[test]
fn skip_and_unchecked_end() {
    let bytes = packed(|p| {
        p.write_array_begin(4).unwrap();
        p.write_str("skipped").unwrap();
        p.write_map_begin(1).unwrap();
        p.write_u8(1).unwrap();
        p.write_array_begin(2).unwrap();
        p.write_nil().unwrap();
        p.write_bytes(&[9; 50]).unwrap();
        p.write_array_end().unwrap();
        p.write_map_end().unwrap();
        p.write_i8(-5).unwrap();
        p.write_str("dropped").unwrap();
        p.write_array_end().unwrap();
        p.write_bool(true).unwrap();
    });
    let mut unpacker = StreamUnpacker::new(bytes.as_slice());

    assert_eq!(unpacker.read_array_begin().unwrap(), 4);
    unpacker.skip().unwrap();
    unpacker.skip().unwrap();
    assert_eq!(unpacker.depth(), 1);
    assert_eq!(unpacker.read_i8().unwrap(), -5);

    assert!(matches!(
        unpacker.read_array_end(true),
        Err(Error::Protocol(ProtocolViolation::UnconsumedElements { remaining: 1 }))
    ));
    unpacker.read_array_end(false).unwrap();

    assert_eq!(unpacker.depth(), 0);
    assert!(unpacker.read_bool().unwrap());
    assert!(unpacker.get_ref().is_empty());
}

#[test]
fn try_skip_nil_at_container_end() {
    let bytes = packed(|p| {
        p.write_array_begin(1).unwrap();
        p.write_nil().unwrap();
        p.write_array_end().unwrap();
    });
    let mut unpacker = StreamUnpacker::new(bytes.as_slice());
    unpacker.read_array_begin().unwrap();

    assert!(unpacker.try_skip_nil().unwrap());
    assert!(unpacker.try_skip_nil().unwrap());
    assert!(matches!(unpacker.try_read_nil(), Err(Error::EndOfInput)));
    unpacker.read_array_end(true).unwrap();
}

struct Tight;

impl Config for Tight {
    fn max_depth() -> usize { 2 }

    fn max_container_len() -> usize { 8 }

    fn max_raw_len() -> usize { 4 }
}

#[test]
fn config_limits_are_enforced() {
    let deep = [0x91, 0x91, 0x91, 0xc0];
    let mut unpacker = StreamUnpacker::with_config::<Tight>(&deep[..]);
    assert!(matches!(unpacker.read_value(), Err(Error::DepthExceeded { max: 2 })));
    assert_eq!(unpacker.depth(), 0);

    let long_raw = [0xa5, 1, 2, 3, 4, 5];
    let mut unpacker = StreamUnpacker::with_config::<Tight>(&long_raw[..]);
    assert!(matches!(unpacker.read_bytes(), Err(Error::InvalidData(_))));

    let long_array = [0xdc, 0x00, 0x09];
    let mut unpacker = StreamUnpacker::with_config::<Tight>(&long_array[..]);
    assert!(matches!(unpacker.skip(), Err(Error::InvalidData(_))));
}

#[test]
fn container_past_depth_limit_stays_in_place() {
    // [[[nil]], 9]
    let bytes = [0x92, 0x91, 0x91, 0xc0, 0x09];
    let mut unpacker = StreamUnpacker::with_config::<Tight>(&bytes[..]);
    unpacker.read_array_begin().unwrap();
    unpacker.read_array_begin().unwrap();

    assert!(matches!(unpacker.skip(), Err(Error::DepthExceeded { max: 2 })));
    assert!(matches!(unpacker.read_value(), Err(Error::DepthExceeded { max: 2 })));
    assert_eq!(unpacker.depth(), 2);

    assert!(!unpacker.try_read_nil().unwrap());
    assert!(matches!(
        unpacker.read_array_end(true),
        Err(Error::Protocol(ProtocolViolation::UnconsumedElements { remaining: 1 }))
    ));
}

#[test]
fn packer_enforces_declared_lengths() {
    let mut packer = StreamPacker::new(Vec::new());
    packer.write_array_begin(1).unwrap();
    packer.write_nil().unwrap();
    assert!(matches!(
        packer.write_nil(),
        Err(Error::Protocol(ProtocolViolation::ElementCountMismatch {
            declared: 1,
            written: 2,
        }))
    ));

    let mut packer = StreamPacker::new(Vec::new());
    packer.write_map_begin(2).unwrap();
    packer.write_u8(1).unwrap();
    packer.write_u8(1).unwrap();
    packer.write_u8(2).unwrap();
    assert!(matches!(
        packer.write_map_end(),
        Err(Error::Protocol(ProtocolViolation::DanglingMapKey))
    ));
    assert!(matches!(
        packer.write_array_end(),
        Err(Error::Protocol(ProtocolViolation::ArrayEndWithoutBegin))
    ));
    assert_eq!(packer.depth(), 1);
    assert!(packer.finish().is_err());
}

#[test]
fn packer_rejects_out_of_range_integers() {
    let mut packer = StreamPacker::new(Vec::new());

    assert!(matches!(
        packer.write_i128(i128::from(u64::MAX) + 1),
        Err(Error::IntegerOutOfRange { .. })
    ));
    assert!(packer.get_ref().is_empty());
}

#[test]
fn floats_convert_between_widths() {
    let bytes = packed(|p| {
        p.write_f64(0.5).unwrap();
        p.write_f32(0.25).unwrap();
    });
    let mut unpacker = StreamUnpacker::new(bytes.as_slice());

    assert!((unpacker.read_f32().unwrap() - 0.5).abs() < f32::EPSILON);
    assert!((unpacker.read_f64().unwrap() - 0.25).abs() < f64::EPSILON);
}
