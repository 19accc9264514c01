//! Tests for document paths and locations.

use crate::{DocumentPath, Location, PathStep};

#[test]
fn test_parse_mixes_keys_and_indices() {
    let path = DocumentPath::parse("definitions/V/query/SELECT/columns/0/ref");
    assert_eq!(path.len(), 7);
    assert_eq!(path.get(5), Some(&PathStep::Index(0)));
    assert_eq!(path.get(6), Some(&PathStep::key("ref")));
    assert_eq!(path.definition_name(), Some("V"));
}

#[test]
fn test_parse_ignores_empty_steps() {
    let path = DocumentPath::parse("/definitions//Books/");
    assert_eq!(path, DocumentPath::definition("Books"));
}

#[test]
fn test_display_round_trips_through_parse() {
    let text = "definitions/Books/elements/genre/target";
    assert_eq!(DocumentPath::parse(text).to_string(), text);
}

#[test]
fn test_definition_name_requires_definitions_prefix() {
    assert_eq!(DocumentPath::parse("vocabularies/Foo").definition_name(), None);
    assert_eq!(DocumentPath::parse("definitions").definition_name(), None);
}

#[test]
fn test_serialize_as_json_array() {
    let path = DocumentPath::parse("definitions/V/query/SELECT/columns/2");
    let json = serde_json::to_value(&path).unwrap();
    assert_eq!(
        json,
        serde_json::json!(["definitions", "V", "query", "SELECT", "columns", 2])
    );
}

#[test]
fn test_child_does_not_modify_parent() {
    let parent = DocumentPath::definition("Books");
    let child = parent.child("elements").child("ID");
    assert_eq!(parent.len(), 2);
    assert!(child.starts_with(&parent));
    assert_eq!(child.last(), Some(&PathStep::key("ID")));
}

#[test]
fn test_location_display() {
    assert_eq!(Location::new("db/schema.cds", 3, 7).to_string(), "db/schema.cds:3:7");
    assert_eq!(Location::file_only("db/schema.cds").to_string(), "db/schema.cds");
    assert!(!Location::file_only("x.cds").has_position());
}

#[test]
fn test_location_deserializes_from_csn_shape() {
    let loc: Location =
        serde_json::from_value(serde_json::json!({ "file": "a.cds", "line": 2, "col": 9 }))
            .unwrap();
    assert_eq!(loc, Location::new("a.cds", 2, 9));
}
