use tracing_test::traced_test;

use super::{
    FieldDecl, FieldEntry, FieldEntryReader, FieldOption, Modifiers,
    StructDecl,
};
use crate::SchemaError;

fn names(entries: &[FieldEntry]) -> Vec<Option<&'static str>> {
    entries.iter().map(FieldEntry::name).collect()
}

#[test]
fn explicit_indices_leave_holes() {
    let decl = StructDecl::new("Sample")
        .field(FieldDecl::new("x").public().index(2))
        .field(FieldDecl::new("y").public())
        .field(FieldDecl::new("z").public().index(0));

    let entries = FieldEntryReader::read_field_entries(&decl).unwrap();

    assert_eq!(names(&entries), vec![Some("z"), None, Some("x"), Some("y")]);
    assert!(entries[1].is_hole());
    assert_eq!(entries[0].option(), Some(FieldOption::Required));
}

#[test]
fn implicit_index_follows_max_so_far() {
    let decl = StructDecl::new("Sample")
        .field(FieldDecl::new("a").public().index(0))
        .field(FieldDecl::new("b").public())
        .field(FieldDecl::new("c").public().index(3))
        .field(FieldDecl::new("d").public())
        .field(FieldDecl::new("e").public().index(2))
        .field(FieldDecl::new("f").public());

    let entries = FieldEntryReader::read_field_entries(&decl).unwrap();

    assert_eq!(
        names(&entries),
        vec![Some("a"), Some("b"), Some("e"), Some("c"), Some("d"), Some("f")]
    );
}

#[test]
fn duplicate_index_fails() {
    let decl = StructDecl::new("Dup")
        .field(FieldDecl::new("a").public().index(1))
        .field(FieldDecl::new("b").public().index(1));

    assert_eq!(
        FieldEntryReader::read_field_entries(&decl),
        Err(SchemaError::DuplicateIndex { type_name: "Dup", index: 1 })
    );
}

#[test]
fn implicit_index_can_collide() {
    // b takes 1, then c claims 1 explicitly
    let decl = StructDecl::new("Dup")
        .field(FieldDecl::new("a").public())
        .field(FieldDecl::new("b").public())
        .field(FieldDecl::new("c").public().index(1));

    assert!(matches!(
        FieldEntryReader::read_field_entries(&decl),
        Err(SchemaError::DuplicateIndex { index: 1, .. })
    ));
}

#[test]
fn negative_and_huge_indices_fail() {
    let negative = StructDecl::new("Neg")
        .field(FieldDecl::new("a").public().index(-1));
    assert_eq!(
        FieldEntryReader::read_field_entries(&negative),
        Err(SchemaError::InvalidIndex { type_name: "Neg", index: -1 })
    );

    let huge = StructDecl::new("Huge")
        .field(FieldDecl::new("a").public().index(1 << 40));
    assert!(matches!(
        FieldEntryReader::read_field_entries(&huge),
        Err(SchemaError::InvalidIndex { .. })
    ));
}

#[test]
fn ignored_fields_take_no_index() {
    let decl = StructDecl::new("Sample")
        .field(FieldDecl::new("a").public())
        .field(FieldDecl::new("hidden"))
        .field(FieldDecl::new("skipped").public().ignore())
        .field(FieldDecl::new("b").public());

    let entries = FieldEntryReader::read_field_entries(&decl).unwrap();
    assert_eq!(names(&entries), vec![Some("a"), Some("b")]);
}

#[test]
fn default_policy_uses_visibility() {
    let option = |field: FieldDecl| {
        FieldEntryReader::read_field_option(&field, FieldOption::Default)
    };

    assert_eq!(option(FieldDecl::new("a").public()), FieldOption::Required);
    assert_eq!(option(FieldDecl::new("a")), FieldOption::Ignore);
    assert_eq!(
        option(FieldDecl::new("a").public().transient()),
        FieldOption::Ignore
    );
}

#[test]
fn markers_beat_policy() {
    let option = |field: FieldDecl| {
        FieldEntryReader::read_field_option(&field, FieldOption::Optional)
    };

    assert_eq!(option(FieldDecl::new("a")), FieldOption::Optional);
    assert_eq!(option(FieldDecl::new("a").transient()), FieldOption::Optional);
    assert_eq!(option(FieldDecl::new("a").required()), FieldOption::Required);
    assert_eq!(option(FieldDecl::new("a").ignore()), FieldOption::Ignore);
    assert_eq!(
        option(FieldDecl::new("a").nullable().not_nullable()),
        FieldOption::NotNullable
    );
    assert_eq!(
        option(FieldDecl::new("a").not_nullable()),
        FieldOption::Required
    );
}

#[test]
fn static_and_final_always_excluded() {
    let constant = Modifiers { is_final: true, ..Modifiers::default() };
    let shared = Modifiers { is_static: true, ..Modifiers::default() };

    for modifiers in [constant, shared] {
        let field = FieldDecl::new("a").public().required().with_modifiers(modifiers);
        assert_eq!(
            FieldEntryReader::read_field_option(&field, FieldOption::Required),
            FieldOption::Ignore
        );
    }
}

#[test]
fn type_policy_applies() {
    let decl = StructDecl::new("Sample")
        .with_policy(FieldOption::Optional)
        .field(FieldDecl::new("a"))
        .field(FieldDecl::new("b").required());

    assert_eq!(
        FieldEntryReader::read_implicit_field_option(&decl),
        FieldOption::Optional
    );

    let entries = FieldEntryReader::read_field_entries(&decl).unwrap();
    assert_eq!(entries[0].option(), Some(FieldOption::Optional));
    assert_eq!(entries[1].option(), Some(FieldOption::Required));
}

#[test]
fn base_fields_come_first() {
    let root = StructDecl::new("Root").field(FieldDecl::new("id").public());
    let middle = StructDecl::new("Middle")
        .with_base(root)
        .field(FieldDecl::new("created").public());
    let leaf = StructDecl::new("Leaf")
        .with_base(middle)
        .field(FieldDecl::new("body").public());

    let entries = FieldEntryReader::read_field_entries(&leaf).unwrap();
    assert_eq!(
        names(&entries),
        vec![Some("id"), Some("created"), Some("body")]
    );
}

#[test]
fn convert_explicit_list() {
    let decl = StructDecl::new("Sample")
        .field(FieldDecl::new("a"))
        .field(FieldDecl::new("b"));

    let entries = FieldEntryReader::convert_field_entries(
        &decl,
        &[Some(("b", FieldOption::Optional)), None, Some(("a", FieldOption::Required))],
    )
    .unwrap();

    assert_eq!(names(&entries), vec![Some("b"), None, Some("a")]);
    assert_eq!(entries[0].option(), Some(FieldOption::Optional));

    assert!(matches!(
        FieldEntryReader::convert_field_entries(
            &decl,
            &[Some(("c", FieldOption::Required))]
        ),
        Err(SchemaError::UnknownField { .. })
    ));
}

#[test]
fn empty_struct_has_empty_schema() {
    let decl = StructDecl::new("Empty").field(FieldDecl::new("private"));
    assert!(FieldEntryReader::read_field_entries(&decl).unwrap().is_empty());
}

#[test]
#[traced_test]
fn derivation_is_logged() {
    let decl = StructDecl::new("Logged")
        .field(FieldDecl::new("a").public().index(1));
    FieldEntryReader::read_field_entries(&decl).unwrap();

    assert!(logs_contain("derived struct schema"));
    assert!(logs_contain("holes=1"));
}
