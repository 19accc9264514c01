//! Cache invalidation scope and cycle detection.

use cdsc_common::DocumentPath;
use cdsc_model::SchemaDocument;
use cdsc_resolver::{ModelErrorKind, Resolver, collect_ref_paths};
use serde_json::json;

fn bookshop() -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "definitions": {
            "Genres": {
                "kind": "entity",
                "elements": {
                    "ID": { "type": "Integer", "key": true },
                    "parent": { "type": "Association", "target": "Genres" }
                }
            },
            "Books": {
                "kind": "entity",
                "@title": { "ref": ["genre", "parent", "ID"] },
                "elements": {
                    "ID": { "type": "Integer", "key": true },
                    "title": { "type": "String" },
                    "genre": { "type": "Association", "target": "Genres" }
                }
            },
            "V": {
                "kind": "entity",
                "query": {
                    "SELECT": {
                        "from": { "ref": ["Books"], "as": "B" },
                        "columns": [
                            { "ref": ["B", "ID"] },
                            { "ref": ["B", "genre", "parent"], "as": "parentGenre" }
                        ],
                        "where": [{ "ref": ["title"] }, "like", { "val": "A%" }]
                    }
                },
                "elements": {
                    "ID": { "type": "Integer" },
                    "parentGenre": { "type": "Association", "target": "Genres" }
                }
            }
        }
    }))
    .unwrap()
}

fn refs_of(doc: &SchemaDocument, name: &str) -> Vec<DocumentPath> {
    collect_ref_paths(doc, doc.definition(name).unwrap())
}

#[test]
fn test_drop_only_affects_one_definition() {
    let doc = bookshop();
    let resolver = Resolver::new(&doc);
    let view = doc.definition("V").unwrap();

    for name in ["Books", "V"] {
        for path in refs_of(&doc, name) {
            resolver.inspect_ref(&path).unwrap();
        }
    }
    let before = resolver.stats();
    let cached_before = resolver.cached_node_count();

    let dropped = resolver.drop_definition_cache(view);
    assert!(dropped > 0);
    assert_eq!(resolver.cached_node_count(), cached_before - dropped);

    // Books is still fully memoized.
    for path in refs_of(&doc, "Books") {
        resolver.inspect_ref(&path).unwrap();
    }
    let after_books = resolver.stats();
    assert_eq!(after_books.resolutions, before.resolutions);
    assert_eq!(after_books.topology_builds, before.topology_builds);

    // V resolves again, exactly like in a fresh session.
    let fresh = Resolver::new(&doc);
    for path in refs_of(&doc, "V") {
        let again = resolver.inspect_ref(&path).unwrap();
        let expected = fresh.inspect_ref(&path).unwrap();
        assert_eq!(again, expected, "{path}");
    }
    assert_eq!(resolver.stats().topology_builds, before.topology_builds + 1);
    assert_eq!(resolver.stats().dropped_entries, dropped);
}

#[test]
fn test_dropping_a_referenced_definition_keeps_dependents() {
    let doc = bookshop();
    let resolver = Resolver::new(&doc);
    let column = DocumentPath::parse("definitions/V/query/SELECT/columns/1");

    let first = resolver.inspect_ref(&column).unwrap();
    resolver.drop_definition_cache(doc.definition("Books").unwrap());

    let resolutions = resolver.stats().resolutions;
    let second = resolver.inspect_ref(&column).unwrap();
    assert_eq!(first, second);
    assert_eq!(resolver.stats().resolutions, resolutions);
}

#[test]
fn test_drop_of_uninitialized_definition_is_a_no_op() {
    let doc = bookshop();
    let resolver = Resolver::new(&doc);
    assert_eq!(resolver.drop_definition_cache(doc.definition("Genres").unwrap()), 0);
}

#[test]
fn test_type_cycles_are_reported() {
    let doc = SchemaDocument::from_value(json!({
        "definitions": {
            "A": { "kind": "type", "type": "B", "$location": { "file": "types.cds", "line": 1, "col": 6 } },
            "B": { "kind": "type", "type": "A" },
            "C": { "kind": "type", "$origin": "D" },
            "D": { "kind": "type", "$origin": "C" },
            "T": {
                "kind": "type",
                "elements": { "x": { "type": { "ref": ["T", "x"] } } }
            }
        }
    }))
    .unwrap();
    let resolver = Resolver::new(&doc);

    let err = resolver.effective_type(doc.definition("A").unwrap()).unwrap_err();
    assert!(!err.is_internal());
    assert_eq!(err.kind(), Some(ModelErrorKind::CircularType));
    let location = err.as_model().and_then(|e| e.location.clone()).unwrap();
    assert_eq!(location.file, "types.cds");

    let err = resolver.effective_type(doc.definition("C").unwrap()).unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::CircularType));

    let x = doc
        .node_at(&DocumentPath::parse("definitions/T/elements/x"))
        .unwrap();
    let err = resolver.effective_type(x).unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::CircularType));

    // The session stays usable.
    let t = doc.definition("T").unwrap();
    assert_eq!(resolver.effective_type(t).unwrap(), t);
}
