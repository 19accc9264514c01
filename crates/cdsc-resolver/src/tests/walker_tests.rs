use crate::context::RefContext;
use crate::error::ModelErrorKind;
use crate::session::ResolverOptions;
use crate::topology::build_topology;
use crate::walker::{BaseRef, RefSite, SiteKind, analyze};
use cdsc_common::DocumentPath;
use cdsc_model::{NodeId, SchemaDocument};
use serde_json::json;

fn doc() -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "definitions": {
            "Genres": {
                "kind": "entity",
                "includes": ["Managed"],
                "elements": { "ID": { "type": "Integer" } }
            },
            "Managed": { "kind": "aspect", "elements": { "createdAt": { "type": "Timestamp" } } },
            "Books": {
                "kind": "entity",
                "@title": { "ref": ["genre", "ID"] },
                "foo": { "ref": ["ID"] },
                "elements": {
                    "ID": { "type": "Integer" },
                    "genre": {
                        "type": "Association",
                        "target": "Genres",
                        "keys": [{ "ref": ["ID"] }]
                    },
                    "sameGenre": {
                        "type": "Association",
                        "target": "Books",
                        "on": [{ "ref": ["sameGenre", "genre"] }, "=", { "ref": ["genre"] }]
                    }
                }
            },
            "Orders": {
                "kind": "entity",
                "elements": {
                    "ID": { "type": "Integer" },
                    "lines": {
                        "type": "Composition",
                        "targetAspect": {
                            "elements": {
                                "order": {
                                    "type": "Association",
                                    "target": "Orders",
                                    "on": [{ "ref": ["order", "ID"] }, "=", { "ref": ["up_", "ID"] }]
                                }
                            }
                        }
                    }
                }
            },
            "V": {
                "kind": "entity",
                "query": {
                    "SELECT": {
                        "from": {
                            "join": "inner",
                            "args": [{ "ref": ["Books"], "as": "B" }, { "ref": ["Genres"], "as": "G" }],
                            "on": [{ "ref": ["B", "genre", "ID"] }, "=", { "ref": ["G", "ID"] }]
                        },
                        "mixin": {
                            "toGenre": {
                                "type": "Association",
                                "target": "Genres",
                                "on": [{ "ref": ["toGenre", "ID"] }, "=", { "ref": ["G", "ID"] }]
                            }
                        },
                        "columns": [
                            { "ref": ["B", "ID"] },
                            { "ref": ["B", "genre"], "expand": [{ "ref": ["ID"] }] },
                            { "ref": [{ "id": "genre", "where": [{ "ref": ["ID"] }, ">", { "val": 1 }] }, "ID"], "as": "gid" },
                            { "ref": ["B", "sameGenre"], "as": "back" }
                        ],
                        "where": [{ "ref": ["B", "ID"] }, ">", { "val": 0 }],
                        "orderBy": [{ "xpr": [{ "ref": ["gid"] }] }]
                    }
                },
                "elements": {
                    "ID": { "type": "Integer" },
                    "genre": { "elements": { "ID": { "type": "Integer" } } },
                    "gid": { "type": "Integer" },
                    "back": {
                        "type": "Association",
                        "target": "Books",
                        "on": [{ "ref": ["back", "ID"] }, "=", { "ref": ["ID"] }]
                    }
                }
            },
            "U": {
                "kind": "entity",
                "query": {
                    "SET": {
                        "op": "union",
                        "args": [
                            { "SELECT": { "from": { "ref": ["Books"] }, "columns": [{ "ref": ["ID"] }] } },
                            { "SELECT": { "from": { "ref": ["Genres"] }, "columns": [{ "ref": ["ID"] }] } }
                        ],
                        "orderBy": [{ "ref": ["ID"] }]
                    }
                },
                "elements": { "ID": { "type": "Integer" } }
            }
        }
    }))
    .unwrap()
}

fn at(doc: &SchemaDocument, path: &str) -> NodeId {
    doc.node_at(&DocumentPath::parse(path))
        .unwrap_or_else(|| panic!("no node at {path}"))
}

fn site(doc: &SchemaDocument, path: &str) -> RefSite {
    try_site(doc, path).unwrap_or_else(|err| panic!("{path}: {err}"))
}

fn try_site(doc: &SchemaDocument, path: &str) -> crate::error::Result<RefSite> {
    let path = DocumentPath::parse(path);
    let definition = crate::walker::path_definition(doc, &path)?;
    let topology = build_topology(doc, definition, &ResolverOptions::default())?.topology;
    analyze(doc, &topology, &path)
}

#[test]
fn test_definition_and_member_sites() {
    let doc = doc();
    let books = site(&doc, "definitions/Books");
    assert_eq!(books.kind, SiteKind::Definition);
    assert_eq!(books.holder, at(&doc, "definitions/Books"));
    assert_eq!(books.context, RefContext::Member);

    let genre = site(&doc, "definitions/Books/elements/genre");
    assert_eq!(genre.kind, SiteKind::Member);
    assert_eq!(genre.member, Some(genre.holder));
    assert_eq!(genre.member_parent, Some(books.holder));
}

#[test]
fn test_structural_contexts() {
    let doc = doc();
    let cases = [
        ("definitions/Books/elements/ID/type", RefContext::Type),
        ("definitions/Books/elements/genre/target", RefContext::Target),
        ("definitions/Books/elements/genre/keys/0", RefContext::Keys),
        ("definitions/Books/elements/sameGenre/on/2", RefContext::On),
        ("definitions/Books/@title", RefContext::Annotation),
        ("definitions/Genres/includes/0", RefContext::Includes),
        ("definitions/Orders/elements/lines/targetAspect/elements/order/on/2", RefContext::On),
    ];
    for (path, context) in cases {
        let site = site(&doc, path);
        assert_eq!(site.kind, SiteKind::Reference, "{path}");
        assert_eq!(site.context, context, "{path}");
        assert_eq!(site.holder, at(&doc, path), "{path}");
    }
}

#[test]
fn test_bare_strings_below_type_positions_only() {
    let doc = doc();
    // The string `Association` is the holder itself.
    let site = site(&doc, "definitions/Books/elements/genre/type");
    assert_eq!(site.context, RefContext::Type);

    // A value inside an ON condition is no reference.
    let err = try_site(&doc, "definitions/Books/elements/sameGenre/on/1").unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::InvalidReference));
}

#[test]
fn test_member_of_anonymous_aspect() {
    let doc = doc();
    let site = site(&doc, "definitions/Orders/elements/lines/targetAspect/elements/order/on/0");
    assert_eq!(site.member, Some(at(&doc, "definitions/Orders/elements/lines/targetAspect/elements/order")));
    assert_eq!(site.member_parent, Some(at(&doc, "definitions/Orders/elements/lines/targetAspect")));
    assert_eq!(site.query, None);
}

#[test]
fn test_query_contexts() {
    let doc = doc();
    let cases = [
        ("definitions/V/query/SELECT/from/args/0", RefContext::From),
        ("definitions/V/query/SELECT/from/on/0", RefContext::JoinOn),
        ("definitions/V/query/SELECT/columns/0", RefContext::Columns),
        ("definitions/V/query/SELECT/where/0", RefContext::Where),
        ("definitions/V/query/SELECT/orderBy/0/xpr/0", RefContext::OrderByExpr),
        ("definitions/V/query/SELECT/mixin/toGenre/on/2", RefContext::MixinOn),
        ("definitions/U/query/SET/orderBy/0", RefContext::OrderBySet),
    ];
    for (path, context) in cases {
        let site = site(&doc, path);
        assert_eq!(site.context, context, "{path}");
        assert_eq!(site.query, Some(0), "{path}");
    }

    let arm = site(&doc, "definitions/U/query/SET/args/1/SELECT/columns/0");
    assert_eq!(arm.context, RefContext::Columns);
    assert_eq!(arm.query, Some(1));
}

#[test]
fn test_published_association_on_condition() {
    let doc = doc();
    let site = site(&doc, "definitions/V/elements/back/on/2");
    assert_eq!(site.context, RefContext::QueryOn);
    assert_eq!(site.query, Some(0));
    assert_eq!(site.member, Some(at(&doc, "definitions/V/elements/back")));

    let mixin = self::site(&doc, "definitions/V/query/SELECT/mixin/toGenre/on/0");
    assert_eq!(mixin.member_parent, Some(at(&doc, "definitions/V/query/SELECT")));
}

#[test]
fn test_path_into_ref_array_denotes_holder() {
    let doc = doc();
    let holder = at(&doc, "definitions/V/query/SELECT/where/0");
    for path in [
        "definitions/V/query/SELECT/where/0/ref",
        "definitions/V/query/SELECT/where/0/ref/1",
    ] {
        let site = site(&doc, path);
        assert_eq!(site.holder, holder, "{path}");
        assert_eq!(site.context, RefContext::Where, "{path}");
    }
}

#[test]
fn test_filter_and_expand_bases() {
    let doc = doc();
    let filter = site(&doc, "definitions/V/query/SELECT/columns/2/ref/0/where/0");
    assert_eq!(filter.context, RefContext::RefWhere);
    assert_eq!(
        filter.base,
        Some(BaseRef::Segment {
            path: DocumentPath::parse("definitions/V/query/SELECT/columns/2"),
            index: 0,
        })
    );

    let expand = site(&doc, "definitions/V/query/SELECT/columns/1/expand/0");
    assert_eq!(expand.context, RefContext::Expand);
    assert_eq!(
        expand.base,
        Some(BaseRef::Column {
            path: DocumentPath::parse("definitions/V/query/SELECT/columns/1"),
        })
    );
}

#[test]
fn test_unsupported_and_invalid_paths() {
    let doc = doc();
    let err = try_site(&doc, "definitions/Books/foo").unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::UnsupportedContext));
    assert_eq!(err.as_model().and_then(|e| e.name.as_deref()), Some("foo"));

    let err = try_site(&doc, "definitions/Books/elements/nope").unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::InvalidPath));

    let err = try_site(&doc, "elements/Books").unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::InvalidPath));

    let err = try_site(&doc, "definitions/Nope/elements/ID").unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::UnknownDefinition));

    let err = try_site(&doc, "definitions/Books/elements").unwrap_err();
    assert_eq!(err.kind(), Some(ModelErrorKind::InvalidReference));
}
