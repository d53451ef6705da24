//! Struct layouts produced by `#[derive(Message)]`.

#![allow(missing_docs)]

use qbin::{
    Error, Message, SchemaError, TemplateRegistry, Value,
    schema::{FieldEntry, FieldEntryReader, FieldOption},
};
use qbin_integration_test::{
    Duplicate, EagerHolder, Holder, NegativeIndex, Player, Settings, Sparse,
};

fn names(entries: &[FieldEntry]) -> Vec<Option<&'static str>> {
    entries.iter().map(FieldEntry::name).collect()
}

#[test]
fn explicit_indices_with_hole() {
    let entries =
        FieldEntryReader::read_field_entries(&Sparse::declaration()).unwrap();
    assert_eq!(names(&entries), vec![Some("z"), None, Some("x"), Some("y")]);

    let registry = TemplateRegistry::new();
    let value = registry.to_value(&Sparse { x: 1, y: 2, z: 3 }).unwrap();

    assert_eq!(
        value,
        Value::Array(vec![
            Value::from(3u8),
            Value::Nil,
            Value::from(1u8),
            Value::from(2u8),
        ])
    );
}

#[test]
fn duplicate_index_fails_before_use() {
    let registry = TemplateRegistry::new();

    assert!(matches!(
        registry.lookup::<Duplicate>(),
        Err(Error::SchemaBuild(SchemaError::DuplicateIndex { index: 1, .. }))
    ));
    assert!(matches!(
        registry.to_value(&Duplicate::default()),
        Err(Error::SchemaBuild(_))
    ));
}

#[test]
fn excluded_fields_skip_template_lookup() {
    let registry = TemplateRegistry::new();

    let bytes = registry.encode(&Holder::new(9)).unwrap();
    assert_eq!(registry.decode::<Holder>(&bytes).unwrap().id, 9);
    assert_eq!(
        registry.to_value(&Holder::new(9)).unwrap(),
        Value::Array(vec![Value::from(9u8)])
    );
    assert!(!registry.is_published::<Duplicate>());
}

#[test]
fn policy_selected_field_needs_its_template() {
    let registry = TemplateRegistry::new();

    assert!(matches!(
        registry.encode(&EagerHolder::default()),
        Err(Error::SchemaBuild(SchemaError::DuplicateIndex { index: 1, .. }))
    ));
    assert_eq!(registry.published_count(), 0);
}

#[test]
fn negative_index_fails() {
    let registry = TemplateRegistry::new();

    assert!(matches!(
        registry.lookup::<NegativeIndex>(),
        Err(Error::SchemaBuild(SchemaError::InvalidIndex { index: -1, .. }))
    ));
}

#[test]
fn type_policy_and_markers() {
    let entries =
        FieldEntryReader::read_field_entries(&Settings::declaration()).unwrap();

    assert_eq!(
        names(&entries),
        vec![Some("version"), Some("theme"), Some("owner")]
    );
    assert_eq!(
        entries.iter().map(FieldEntry::option).collect::<Vec<_>>(),
        vec![
            Some(FieldOption::Required),
            Some(FieldOption::Optional),
            Some(FieldOption::NotNullable),
        ]
    );
}

#[test]
fn not_nullable_field_rejects_nil() {
    let registry = TemplateRegistry::new();

    assert!(matches!(
        registry.to_value(&Settings::new(1, None)),
        Err(Error::NullNotPermitted { .. })
    ));

    let value = Value::Array(vec![Value::from(1u8), Value::Nil, Value::Nil]);
    assert!(matches!(
        registry.from_value::<Settings>(&value),
        Err(Error::NullNotPermitted { .. })
    ));
}

#[test]
fn optional_and_ignored_fields() {
    let registry = TemplateRegistry::new();
    let mut settings = Settings::new(2, Some("root"));
    settings.set_dirty();

    let value = registry.to_value(&settings).unwrap();
    assert_eq!(
        value,
        Value::Array(vec![Value::from(2u8), Value::Nil, Value::string("root")])
    );

    let back: Settings = registry.from_value(&value).unwrap();
    assert_eq!(back.version(), 2);
    assert_eq!(back.theme(), None);
    assert_eq!(back.owner(), Some("root"));
    assert!(!back.is_dirty());
}

#[test]
fn base_fields_and_visibility() {
    let registry = TemplateRegistry::new();
    let player = Player::new(7, "neo", Some(10)).with_scratch(&[1, 2]);

    let value = registry.to_value(&player).unwrap();
    assert_eq!(
        value,
        Value::Array(vec![
            Value::from(7u8),
            Value::Nil,
            Value::Nil,
            Value::string("neo"),
            Value::from(10u8),
        ])
    );

    let back: Player = registry.from_value(&value).unwrap();
    assert_eq!(back, Player::new(7, "neo", Some(10)));
    assert!(back.scratch().is_empty());
}

#[test]
fn older_and_newer_writers() {
    let registry = TemplateRegistry::new();

    // an older writer knew only the version
    let old = Value::Array(vec![Value::from(3u8)]);
    assert!(matches!(
        registry.from_value::<Settings>(&old),
        Err(Error::EndOfInput)
    ));

    // a newer writer appended fields
    let new = Value::Array(vec![
        Value::from(3u8),
        Value::string("dark"),
        Value::string("me"),
        Value::Map(Vec::new()),
        Value::from(1.0f64),
    ]);
    let back: Settings = registry.from_value(&new).unwrap();
    assert_eq!(back.theme(), Some("dark"));
}
