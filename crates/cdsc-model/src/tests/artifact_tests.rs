//! Tests for typed artifact views and reference shapes.

use crate::{DefinitionKind, SchemaDocument, StructuralFacts};
use cdsc_common::DocumentPath;
use serde_json::json;

#[test]
fn test_kind_and_structural_facts() {
    let doc = SchemaDocument::from_value(json!({
        "definitions": {
            "Books": {
                "kind": "entity",
                "elements": {
                    "genre": { "type": "cds.Association", "target": "Genres" },
                    "tags": { "items": { "type": "cds.String" } },
                    "status": { "type": "cds.String", "enum": { "open": {}, "closed": {} } }
                }
            },
            "Price": { "kind": "type", "type": "cds.Decimal" }
        }
    }))
    .unwrap();

    let books = doc.artifact(doc.definition("Books").unwrap());
    assert_eq!(books.kind(), Some(DefinitionKind::Entity));
    assert!(books.has_intrinsic_structure());

    let genre = doc.artifact(books.element("genre").unwrap());
    assert_eq!(doc.as_str(genre.target().unwrap()), Some("Genres"));
    assert!(genre.has_intrinsic_structure());
    assert!(genre.elements().is_none());

    let tags = doc.artifact(books.element("tags").unwrap());
    assert!(tags.items().is_some());

    let status = doc.artifact(books.element("status").unwrap());
    assert_eq!(doc.entries(status.enum_symbols().unwrap()).count(), 2);

    let price = doc.artifact(doc.definition("Price").unwrap());
    assert_eq!(price.kind(), Some(DefinitionKind::Type));
    assert!(!price.has_intrinsic_structure());
    assert_eq!(doc.as_str(price.type_ref().unwrap()), Some("cds.Decimal"));
}

#[test]
fn test_projection_counts_as_query() {
    let doc = SchemaDocument::from_value(json!({
        "definitions": {
            "P": { "kind": "entity", "projection": { "from": { "ref": ["Books"] } } },
            "V": { "kind": "entity", "query": { "SELECT": { "from": { "ref": ["Books"] } } } }
        }
    }))
    .unwrap();

    let p = doc.artifact(doc.definition("P").unwrap());
    assert!(p.is_projection());
    assert!(p.query().is_some());

    let v = doc.artifact(doc.definition("V").unwrap());
    assert!(!v.is_projection());
    assert!(doc.is_query(v.query().unwrap()));
}

#[test]
fn test_segment_names() {
    let doc = SchemaDocument::from_value(json!({
        "definitions": {
            "V": {
                "kind": "entity",
                "query": { "SELECT": {
                    "from": { "ref": ["Books", { "id": "author", "where": [] }] }
                } }
            }
        }
    }))
    .unwrap();

    let from = doc
        .node_at(&DocumentPath::parse("definitions/V/query/SELECT/from"))
        .unwrap();
    let path = doc.ref_path(from).unwrap();
    let segments: Vec<_> = doc.items(path).collect();
    assert_eq!(doc.segment_name(segments[0]), Some("Books"));
    assert_eq!(doc.segment_name(segments[1]), Some("author"));
    assert!(doc.is_plain_segment(segments[0]));
    assert!(!doc.is_plain_segment(segments[1]));
}

#[test]
fn test_unknown_kind_maps_to_other() {
    assert_eq!(DefinitionKind::from_kind("bogus"), DefinitionKind::Other);
    assert_eq!(DefinitionKind::Entity.to_string(), "entity");
}

#[test]
fn test_builtin_type_names() {
    assert!(crate::is_builtin_type("cds.Integer"));
    assert!(crate::is_builtin_type("Integer"));
    assert!(crate::is_builtin_type("hana.TINYINT"));
    assert!(!crate::is_builtin_type("Genres"));
    assert!(!crate::is_builtin_type("my.Integer"));
}
