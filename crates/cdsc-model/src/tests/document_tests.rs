//! Tests for the schema document arena.

use crate::{NodeId, SchemaDocument, Value};
use cdsc_common::{DocumentPath, Location};
use serde_json::json;

fn bookshop() -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "definitions": {
            "Books": {
                "kind": "entity",
                "$location": { "file": "db/schema.cds", "line": 3, "col": 8 },
                "elements": {
                    "ID": { "type": "cds.Integer", "key": true },
                    "title": { "type": "cds.String" }
                }
            },
            "Authors": { "kind": "entity", "elements": { "ID": { "type": "cds.Integer" } } }
        }
    }))
    .unwrap()
}

#[test]
fn test_definitions_keep_document_order() {
    let doc = bookshop();
    let names: Vec<&str> = doc.definitions().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["Books", "Authors"]);
}

#[test]
fn test_node_ids_are_allocated_in_pre_order() {
    let doc = bookshop();
    let books = doc.definition("Books").unwrap();
    let authors = doc.definition("Authors").unwrap();
    let id = doc.node_at(&DocumentPath::parse("definitions/Books/elements/ID")).unwrap();
    assert!(books < id);
    assert!(id < authors);
}

#[test]
fn test_path_of_inverts_node_at() {
    let doc = bookshop();
    let path = DocumentPath::parse("definitions/Books/elements/title/type");
    let id = doc.node_at(&path).unwrap();
    assert_eq!(doc.as_str(id), Some("cds.String"));
    assert_eq!(doc.path_of(id), path);
    assert_eq!(doc.path_of(doc.root()), DocumentPath::new());
}

#[test]
fn test_owning_definition_walks_containers() {
    let doc = bookshop();
    let books = doc.definition("Books").unwrap();
    let key = doc
        .node_at(&DocumentPath::parse("definitions/Books/elements/ID/key"))
        .unwrap();
    assert_eq!(doc.owning_definition(key), Some(books));
    assert_eq!(doc.owning_definition(doc.root()), None);
    assert!(doc.is_definition(books));
    assert_eq!(doc.definition_name(books), Some("Books"));
    assert_eq!(doc.definition_name(key), None);
}

#[test]
fn test_location_reads_dollar_location() {
    let doc = bookshop();
    let books = doc.definition("Books").unwrap();
    assert_eq!(doc.location(books), Some(Location::new("db/schema.cds", 3, 8)));
    assert_eq!(doc.location(doc.definition("Authors").unwrap()), None);
}

#[test]
fn test_missing_nodes_are_none() {
    let doc = bookshop();
    assert!(doc.node(NodeId::NONE).is_none());
    assert!(doc.node_at(&DocumentPath::parse("definitions/Nope")).is_none());
    assert!(doc.node_at(&DocumentPath::parse("definitions/Books/kind/0")).is_none());
    assert_eq!(doc.entries(NodeId::NONE).count(), 0);
}

#[test]
fn test_default_node_id_is_none() {
    let id = NodeId::default();
    assert_eq!(id, NodeId::NONE);
    assert!(id.is_none());
    assert_eq!(id.into_option(), None);
}

#[test]
fn test_to_json_round_trips_subtree() {
    let doc = bookshop();
    let id = doc.definition("Authors").unwrap();
    assert_eq!(
        doc.to_json(id),
        json!({ "kind": "entity", "elements": { "ID": { "type": "cds.Integer" } } })
    );
    assert!(matches!(doc.value(id), Some(Value::Object(_))));
}
