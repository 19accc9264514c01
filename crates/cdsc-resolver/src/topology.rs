//! Query Topology Builder.
//!
//! For one top-level definition this discovers every query in pre-order,
//! numbers them from 1, builds their alias tables (table aliases, named
//! sub-queries, mixins), links each query to its enclosing lexical scope and
//! cross-links result columns with the members they infer.
//!
//! The builder is a pure function of the document: it returns the topology
//! plus the per-node facts to memoize, and the session decides whether to
//! store them. This lets the semantic-location mapper number queries without
//! touching the cache.

use crate::error::{ModelErrorKind, ResolveError, Result};
use crate::session::ResolverOptions;
use cdsc_common::limits::MAX_QUERY_NESTING_DEPTH;
use cdsc_model::{NodeId, SchemaDocument, Value};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Properties of a `SELECT` that may hold correlated sub-queries.
const EXPRESSION_PROPERTIES: &[&str] = &["columns", "where", "having", "groupBy", "orderBy"];

/// What a table alias stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasBinding {
    /// A path in `from`; resolved on demand in the `from` context.
    Ref { from: NodeId },
    /// A named sub-query in `from`.
    Query { from: NodeId, query: usize },
}

impl AliasBinding {
    /// The `from` item introducing the alias.
    pub fn from_node(&self) -> NodeId {
        match self {
            AliasBinding::Ref { from } | AliasBinding::Query { from, .. } => *from,
        }
    }
}

/// One query level: a `SELECT`, plus every `SET` sharing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryScope {
    /// 1-based, pre-order across the definition.
    pub number: usize,
    /// The query node (`{ SELECT }`, or the `projection` body).
    pub node: NodeId,
    /// The `SELECT` body.
    pub select: NodeId,
    /// `SET` nodes whose leading query this is.
    pub set_nodes: Vec<NodeId>,
    pub aliases: IndexMap<String, AliasBinding>,
    pub mixins: IndexMap<String, NodeId>,
    /// Node carrying the result `elements`: the definition for its main
    /// query, the `SELECT` (or `SET`) body for sub-queries.
    pub elements_owner: Option<NodeId>,
    /// Index of the enclosing lexical scope.
    pub next: Option<usize>,
}

impl QueryScope {
    /// The result `elements` mapping.
    pub fn elements(&self, doc: &SchemaDocument) -> Option<NodeId> {
        doc.prop(self.elements_owner?, "elements")
    }
}

/// All queries of one top-level definition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    pub definition: NodeId,
    pub queries: Vec<QueryScope>,
    query_of: FxHashMap<NodeId, usize>,
}

impl Topology {
    pub fn scope(&self, index: usize) -> Option<&QueryScope> {
        self.queries.get(index)
    }

    /// Scope with 1-based query number `number`.
    pub fn by_number(&self, number: usize) -> Option<&QueryScope> {
        number.checked_sub(1).and_then(|index| self.queries.get(index))
    }

    /// The scope a query node (`{ SELECT }`, `SELECT` body or `SET`) belongs to.
    pub fn query_of(&self, node: NodeId) -> Option<usize> {
        self.query_of.get(&node).copied()
    }

    pub fn main(&self) -> Option<&QueryScope> {
        self.queries.first()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Per-node facts discovered while building a topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TopologyLink {
    Parent { member: NodeId, parent: NodeId },
    Column { column: NodeId, element: NodeId },
}

pub(crate) struct TopologyBuild {
    pub topology: Topology,
    pub links: Vec<TopologyLink>,
}

pub(crate) fn build_topology(
    doc: &SchemaDocument,
    definition: NodeId,
    options: &ResolverOptions,
) -> Result<TopologyBuild> {
    let mut builder = TopologyBuilder {
        doc,
        options,
        definition,
        queries: Vec::new(),
        query_of: FxHashMap::default(),
        links: Vec::new(),
        depth: 0,
    };

    builder.collect_members(definition, definition);

    let art = doc.artifact(definition);
    if let Some(query) = art.query() {
        if art.is_projection() {
            builder.visit_select(query, query, None, true)?;
        } else {
            builder.visit_query(query, None, true)?;
        }
    }

    debug!(
        "[TOPOLOGY] {}: {} queries, {} links",
        doc.definition_name(definition).unwrap_or("?"),
        builder.queries.len(),
        builder.links.len()
    );

    Ok(TopologyBuild {
        topology: Topology {
            definition,
            queries: builder.queries,
            query_of: builder.query_of,
        },
        links: builder.links,
    })
}

/// Implicit alias of a `from` path: its last segment, without namespace prefix.
pub fn implicit_alias(doc: &SchemaDocument, ref_path: NodeId) -> Option<String> {
    let last = doc.array(ref_path)?.last().copied()?;
    let name = doc.segment_name(last)?;
    Some(name.rsplit('.').next().unwrap_or(name).to_string())
}

/// Result-member name of a column: explicit `as`, else the last `ref` segment.
pub fn column_name(doc: &SchemaDocument, column: NodeId) -> Option<String> {
    if let Some(alias) = doc.prop_str(column, "as") {
        return Some(alias.to_string());
    }
    let ref_path = doc.ref_path(column)?;
    let last = doc.array(ref_path)?.last().copied()?;
    doc.segment_name(last).map(str::to_string)
}

struct TopologyBuilder<'a> {
    doc: &'a SchemaDocument,
    options: &'a ResolverOptions,
    definition: NodeId,
    queries: Vec<QueryScope>,
    query_of: FxHashMap<NodeId, usize>,
    links: Vec<TopologyLink>,
    depth: usize,
}

impl TopologyBuilder<'_> {
    fn malformed(&self, node: NodeId, message: String) -> ResolveError {
        let err = crate::error::ModelError::new(ModelErrorKind::MalformedQuery, message)
            .with_location(self.doc.location(node));
        ResolveError::Model(err)
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Record structural parent links for all members below `owner`.
    fn collect_members(&mut self, owner: NodeId, parent: NodeId) {
        for prop in ["elements", "enum", "params", "actions"] {
            let Some(map) = self.doc.prop(owner, prop) else {
                continue;
            };
            let members: Vec<NodeId> = self.doc.entries(map).map(|(_, m)| m).collect();
            for member in members {
                self.links.push(TopologyLink::Parent { member, parent });
                self.collect_members(member, member);
            }
        }
        // Members of array items and anonymous aspects hang below the
        // member owning the `items` / `targetAspect`.
        if let Some(items) = self.doc.prop(owner, "items").filter(|i| self.doc.is_object(*i)) {
            self.collect_members(items, parent);
        }
        if let Some(aspect) = self
            .doc
            .prop(owner, "targetAspect")
            .filter(|a| self.doc.is_object(*a))
        {
            self.collect_members(aspect, aspect);
        }
        if let Some(returns) = self.doc.prop(owner, "returns").filter(|r| self.doc.is_object(*r)) {
            self.collect_members(returns, returns);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Visit a `{ SELECT }` or `{ SET }` node; returns its scope index.
    fn visit_query(&mut self, node: NodeId, next: Option<usize>, is_main: bool) -> Result<usize> {
        if self.depth >= MAX_QUERY_NESTING_DEPTH {
            return Err(self.malformed(node, "queries are nested too deeply".to_string()));
        }
        self.depth += 1;
        let result = if let Some(set) = self.doc.prop(node, "SET") {
            self.visit_set(node, set, next, is_main)
        } else if let Some(select) = self.doc.prop(node, "SELECT") {
            self.visit_select(node, select, next, is_main)
        } else {
            Err(self.malformed(node, "expected a SELECT or SET query".to_string()))
        };
        self.depth -= 1;
        result
    }

    fn visit_set(&mut self, node: NodeId, set: NodeId, next: Option<usize>, is_main: bool) -> Result<usize> {
        let args: Vec<NodeId> = self.doc.items(self.doc.prop(set, "args").unwrap_or(NodeId::NONE)).collect();
        let Some((&first, rest)) = args.split_first() else {
            return Err(self.malformed(node, "SET without query arguments".to_string()));
        };

        // The SET shares its scope with its leading query.
        let leading = self.visit_query(first, next, is_main)?;
        self.query_of.insert(node, leading);
        self.query_of.insert(set, leading);
        self.queries[leading].set_nodes.push(node);

        if self.queries[leading].elements_owner.is_none() && self.doc.has_prop(set, "elements") {
            self.queries[leading].elements_owner = Some(set);
        }

        for &arg in rest {
            let index = self.visit_query(arg, next, false)?;
            if self.queries[index].elements_owner.is_none() {
                self.queries[index].elements_owner = self.queries[leading].elements_owner;
            }
        }
        trace!(
            "[TOPOLOGY] SET with {} arms shares query {}",
            args.len(),
            self.queries[leading].number
        );
        Ok(leading)
    }

    fn visit_select(&mut self, node: NodeId, select: NodeId, next: Option<usize>, is_main: bool) -> Result<usize> {
        let index = self.queries.len();
        let elements_owner = if is_main {
            Some(self.definition).filter(|d| self.doc.has_prop(*d, "elements"))
        } else {
            Some(select).filter(|s| self.doc.has_prop(*s, "elements"))
        };
        self.queries.push(QueryScope {
            number: index + 1,
            node,
            select,
            set_nodes: Vec::new(),
            aliases: IndexMap::new(),
            mixins: IndexMap::new(),
            elements_owner,
            next,
        });
        self.query_of.insert(node, index);
        self.query_of.insert(select, index);
        trace!("[TOPOLOGY] query {} (next: {:?})", index + 1, next.map(|n| n + 1));

        if let Some(from) = self.doc.prop(select, "from") {
            self.visit_from(from, index)?;
        }

        if let Some(mixin) = self.doc.prop(select, "mixin") {
            let mixins: Vec<(String, NodeId)> = self
                .doc
                .entries(mixin)
                .map(|(name, m)| (name.to_string(), m))
                .collect();
            for (name, member) in mixins {
                self.links.push(TopologyLink::Parent {
                    member,
                    parent: select,
                });
                // Mixins are a mapping: one binding per name.
                self.queries[index].mixins.insert(name, member);
            }
        }

        self.link_columns(index)?;

        let nested: Vec<NodeId> = self
            .doc
            .entries(select)
            .filter(|(key, _)| EXPRESSION_PROPERTIES.contains(key))
            .map(|(_, child)| child)
            .collect();
        for expr in nested {
            self.visit_nested_queries(expr, index)?;
        }
        Ok(index)
    }

    fn visit_from(&mut self, from: NodeId, index: usize) -> Result<()> {
        if let Some(ref_path) = self.doc.ref_path(from) {
            let alias = match self.doc.prop_str(from, "as") {
                Some(alias) => alias.to_string(),
                None => implicit_alias(self.doc, ref_path)
                    .ok_or_else(|| self.malformed(from, "empty reference in FROM".to_string()))?,
            };
            self.queries[index].aliases.insert(alias, AliasBinding::Ref { from });
            return Ok(());
        }

        if self.doc.has_prop(from, "join") {
            let args: Vec<NodeId> = self.doc.items(self.doc.prop(from, "args").unwrap_or(NodeId::NONE)).collect();
            if args.is_empty() {
                return Err(self.malformed(from, "join without arguments".to_string()));
            }
            for arg in args {
                self.visit_from(arg, index)?;
            }
            if let Some(on) = self.doc.prop(from, "on") {
                self.visit_nested_queries(on, index)?;
            }
            return Ok(());
        }

        if self.doc.is_query(from) {
            let sub = self.visit_query(from, Some(index), false)?;
            let alias = match self.doc.prop_str(from, "as") {
                Some(alias) => alias.to_string(),
                None => format!("$_select_{}", self.queries[sub].number),
            };
            self.queries[index]
                .aliases
                .insert(alias, AliasBinding::Query { from, query: sub });
            return Ok(());
        }

        Err(self.malformed(
            from,
            format!("unsupported FROM item in query {}", self.queries[index].number),
        ))
    }

    /// Number correlated sub-queries found anywhere inside an expression.
    fn visit_nested_queries(&mut self, expr: NodeId, index: usize) -> Result<()> {
        if self.doc.is_query(expr) {
            self.visit_query(expr, Some(index), false)?;
            return Ok(());
        }
        let children: Vec<NodeId> = match self.doc.value(expr) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(props)) => props
                .iter()
                .filter(|(key, _)| !key.starts_with('$'))
                .map(|(_, child)| *child)
                .collect(),
            _ => return Ok(()),
        };
        for child in children {
            self.visit_nested_queries(child, index)?;
        }
        Ok(())
    }

    // =========================================================================
    // Columns
    // =========================================================================

    fn link_columns(&mut self, index: usize) -> Result<()> {
        let scope = &self.queries[index];
        let number = scope.number;
        let Some(columns) = self.doc.prop(scope.select, "columns") else {
            return Ok(());
        };
        // Sub-queries of hand-written documents may carry no inferred
        // elements; there is nothing to link then.
        let Some(elements) = scope.elements(self.doc) else {
            return Ok(());
        };

        let linked = self.link_select_items(columns, elements, "", number)?;

        let has_wildcard_or_inline = self.doc.items(columns).any(|col| {
            self.doc.as_str(col) == Some("*") || self.doc.has_prop(col, "inline")
        });
        let claimed = self.doc.entries(elements).count();
        if !has_wildcard_or_inline && claimed > linked && !self.options.tolerate_partial {
            return Err(self.malformed(
                columns,
                format!(
                    "query {number} has {claimed} result members but only {linked} columns"
                ),
            ));
        }
        Ok(())
    }

    /// Link columns to members of `elements`; returns the number linked.
    fn link_select_items(&mut self, columns: NodeId, elements: NodeId, prefix: &str, number: usize) -> Result<usize> {
        let items: Vec<NodeId> = self.doc.items(columns).collect();
        let mut wildcard = false;
        let mut linked = 0;

        for (position, column) in items.into_iter().enumerate() {
            if self.doc.as_str(column) == Some("*") {
                wildcard = true;
                continue;
            }

            let name = match column_name(self.doc, column) {
                Some(name) => name,
                // Positional fallback only works before a wildcard.
                None if !wildcard && prefix.is_empty() => {
                    match self.doc.entries(elements).nth(position) {
                        Some((name, _)) => name.to_string(),
                        None => {
                            if self.options.tolerate_partial {
                                continue;
                            }
                            return Err(self.malformed(
                                column,
                                format!("column {} of query {number} infers no member", position + 1),
                            ));
                        }
                    }
                }
                None => {
                    if self.options.tolerate_partial {
                        continue;
                    }
                    return Err(self.malformed(
                        column,
                        format!("column {} of query {number} has no name", position + 1),
                    ));
                }
            };

            if let Some(inline) = self.doc.prop(column, "inline") {
                let nested_prefix = format!("{prefix}{name}_");
                linked += self.link_select_items(inline, elements, &nested_prefix, number)?;
                continue;
            }

            let full_name = format!("{prefix}{name}");
            let Some(element) = self.doc.prop(elements, &full_name) else {
                if self.options.tolerate_partial {
                    continue;
                }
                return Err(self.malformed(
                    column,
                    format!("column `{full_name}` of query {number} has no result member"),
                ));
            };
            self.links.push(TopologyLink::Column { column, element });
            linked += 1;

            if let Some(expand) = self.doc.prop(column, "expand") {
                let sub_elements = self.doc.prop(element, "elements").or_else(|| {
                    let items = self.doc.prop(element, "items")?;
                    self.doc.prop(items, "elements")
                });
                match sub_elements {
                    Some(sub_elements) => {
                        self.link_select_items(expand, sub_elements, "", number)?;
                    }
                    None if self.options.tolerate_partial => {}
                    None => {
                        return Err(self.malformed(
                            column,
                            format!("expanded column `{full_name}` of query {number} has no result members"),
                        ));
                    }
                }
            }
        }
        Ok(linked)
    }
}
