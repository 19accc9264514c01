//! Tests for effective types, origins and navigation environments.

use crate::error::ModelErrorKind;
use crate::session::Resolver;
use cdsc_common::DocumentPath;
use cdsc_model::{NodeId, SchemaDocument};
use serde_json::json;

fn doc() -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "definitions": {
            "Amount": { "kind": "type", "type": "Decimal" },
            "Price": { "kind": "type", "type": "Amount" },
            "Address": {
                "kind": "type",
                "elements": { "street": { "type": "String" }, "city": { "type": "String" } }
            },
            "A": { "kind": "type", "type": "B" },
            "B": { "kind": "type", "type": "A" },
            "OrderLines": { "kind": "entity", "elements": { "pos": { "type": "Integer" } } },
            "Books": {
                "kind": "entity",
                "elements": {
                    "ID": { "type": "Integer" },
                    "title": { "type": "String" },
                    "price": { "type": "Price" },
                    "copyOfPrice": { "type": { "ref": ["Books", "price"] } },
                    "broken": { "type": "Association", "target": "Nowhere" }
                }
            },
            "Orders": {
                "kind": "entity",
                "elements": {
                    "ID": { "type": "Integer" },
                    "shipTo": { "type": "Address" },
                    "stops": { "items": { "type": "Address" } },
                    "lines": {
                        "type": "Composition",
                        "target": "OrderLines",
                        "targetAspect": { "elements": { "pos": { "type": "Integer" } } }
                    },
                    "loop": { "type": "A" }
                }
            },
            "BookTitles": {
                "kind": "entity",
                "query": {
                    "SELECT": {
                        "from": { "ref": ["Books"] },
                        "columns": [{ "ref": ["ID"] }, { "ref": ["title"], "as": "name" }]
                    }
                },
                "elements": {
                    "ID": { "$origin": ["Books", "ID"], "type": "Integer" },
                    "name": { "type": "String" }
                }
            },
            "Shipments": {
                "kind": "entity",
                "query": {
                    "SELECT": { "from": { "ref": ["Orders"] }, "columns": [{ "ref": ["shipTo"] }] }
                },
                "elements": {
                    "shipTo": { "elements": { "street": { "type": "String" }, "city": { "type": "String" } } }
                }
            },
            "Derived": { "kind": "entity", "$origin": "Books" }
        }
    }))
    .unwrap()
}

fn at(doc: &SchemaDocument, path: &str) -> NodeId {
    doc.node_at(&DocumentPath::parse(path))
        .unwrap_or_else(|| panic!("no node at {path}"))
}

#[test]
fn test_effective_type_follows_type_chain() {
    let doc = doc();
    let resolver = Resolver::new(&doc);
    let price = at(&doc, "definitions/Books/elements/price");
    let amount = doc.definition("Amount").unwrap();

    assert_eq!(resolver.effective_type(price).unwrap(), amount);
    assert_eq!(resolver.stats().effective_type_walks, 1);

    // Every node on the chain was memoized by the first walk.
    let price_type = doc.definition("Price").unwrap();
    assert_eq!(resolver.effective_type(price_type).unwrap(), amount);
    assert_eq!(resolver.stats().effective_type_walks, 1);
}

#[test]
fn test_effective_type_stops_at_structure() {
    let doc = doc();
    let resolver = Resolver::new(&doc);
    let address = doc.definition("Address").unwrap();

    let ship_to = at(&doc, "definitions/Orders/elements/shipTo");
    assert_eq!(resolver.effective_type(ship_to).unwrap(), address);

    // A member with a builtin type is its own effective type.
    let id = at(&doc, "definitions/Books/elements/ID");
    assert_eq!(resolver.effective_type(id).unwrap(), id);

    // Associations own their target.
    let lines = at(&doc, "definitions/Orders/elements/lines");
    assert_eq!(resolver.effective_type(lines).unwrap(), lines);
}

#[test]
fn test_effective_type_through_type_of_reference() {
    let doc = doc();
    let resolver = Resolver::new(&doc);
    let copy = at(&doc, "definitions/Books/elements/copyOfPrice");
    assert_eq!(
        resolver.effective_type(copy).unwrap(),
        doc.definition("Amount").unwrap()
    );
}

#[test]
fn test_circular_type_chain() {
    let doc = doc();
    let resolver = Resolver::new(&doc);
    let looping = at(&doc, "definitions/Orders/elements/loop");

    let err = resolver.effective_type(looping).unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::CircularType));

    // The failed walk leaves no markers behind: asking again fails the same way.
    let err = resolver.effective_type(doc.definition("B").unwrap()).unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::CircularType));
    let err = resolver.effective_type(looping).unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::CircularType));
}

#[test]
fn test_navigation_env() {
    let doc = doc();
    let resolver = Resolver::new(&doc);
    let address = doc.definition("Address").unwrap();

    let stops = at(&doc, "definitions/Orders/elements/stops");
    assert_eq!(resolver.navigation_env(stops, false).unwrap(), Some(address));

    let lines = at(&doc, "definitions/Orders/elements/lines");
    assert_eq!(
        resolver.navigation_env(lines, false).unwrap(),
        doc.definition("OrderLines")
    );
    assert_eq!(
        resolver.navigation_env(lines, true).unwrap(),
        Some(at(&doc, "definitions/Orders/elements/lines/targetAspect"))
    );

    let id = at(&doc, "definitions/Orders/elements/ID");
    assert_eq!(resolver.navigation_env(id, false).unwrap(), None);

    let broken = at(&doc, "definitions/Books/elements/broken");
    let err = resolver.navigation_env(broken, false).unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::UnknownDefinition));
}

#[test]
fn test_origin_markers_and_types() {
    let doc = doc();
    let resolver = Resolver::new(&doc);

    let derived = doc.definition("Derived").unwrap();
    assert_eq!(resolver.get_origin(derived).unwrap(), doc.definition("Books"));

    let id = at(&doc, "definitions/BookTitles/elements/ID");
    assert_eq!(
        resolver.get_origin(id).unwrap(),
        Some(at(&doc, "definitions/Books/elements/ID"))
    );

    let price = at(&doc, "definitions/Books/elements/price");
    assert_eq!(resolver.get_origin(price).unwrap(), doc.definition("Price"));

    let books = doc.definition("Books").unwrap();
    assert_eq!(resolver.get_origin(books).unwrap(), None);
}

#[test]
fn test_origin_of_query_members() {
    let doc = doc();
    let resolver = Resolver::new(&doc);

    // Renamed column: the origin is what the column refers to.
    let name = at(&doc, "definitions/BookTitles/elements/name");
    assert_eq!(
        resolver.get_origin(name).unwrap(),
        Some(at(&doc, "definitions/Books/elements/title"))
    );

    // Sub-members without a column derive from their parent's origin.
    let street = at(&doc, "definitions/Shipments/elements/shipTo/elements/street");
    assert_eq!(
        resolver.get_origin(street).unwrap(),
        Some(at(&doc, "definitions/Address/elements/street"))
    );
}

#[test]
fn test_origin_is_memoized() {
    let doc = doc();
    let resolver = Resolver::new(&doc);
    let name = at(&doc, "definitions/BookTitles/elements/name");

    resolver.get_origin(name).unwrap();
    let computations = resolver.stats().origin_computations;
    resolver.get_origin(name).unwrap();
    assert_eq!(resolver.stats().origin_computations, computations);
}
