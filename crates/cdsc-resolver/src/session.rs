//! Resolver Session.
//!
//! A [`Resolver`] is bound to one schema document and owns the Node Cache
//! for it. Definitions are initialized lazily: the first request touching a
//! definition builds its query topology and member parent links. Individual
//! definitions can be dropped again after an edit without affecting the rest
//! of the session.
//!
//! The session's operations are split across modules:
//! - `inspect.rs`: `inspect_ref`, `artifact_ref`
//! - `origin.rs`: `get_origin`, `effective_type`, `navigation_env`
//! - `locations.rs`: `msg_locations`
//! - `snapshot.rs`: `debug_snapshot`

use crate::cache::{
    CacheStats, ColumnKey, ElementKey, NodeCache, ParentKey, QueryIndexKey, TopologyKey,
};
use crate::error::{ModelError, ModelErrorKind, ResolveError, Result};
use crate::topology::{QueryScope, Topology, TopologyLink, build_topology};
use cdsc_model::{NodeId, SchemaDocument};
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{Level, debug, span};

/// Session configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Skip columns without a derivable result member instead of failing.
    pub tolerate_partial: bool,
}

/// Name-resolution session over one schema document.
pub struct Resolver<'doc> {
    pub(crate) doc: &'doc SchemaDocument,
    pub(crate) options: ResolverOptions,
    pub(crate) cache: RefCell<NodeCache>,
    /// Reference holders currently being resolved.
    pub(crate) resolving: RefCell<FxHashSet<NodeId>>,
}

impl<'doc> Resolver<'doc> {
    pub fn new(doc: &'doc SchemaDocument) -> Self {
        Resolver::with_options(doc, ResolverOptions::default())
    }

    pub fn with_options(doc: &'doc SchemaDocument, options: ResolverOptions) -> Self {
        Resolver {
            doc,
            options,
            cache: RefCell::new(NodeCache::new()),
            resolving: RefCell::new(FxHashSet::default()),
        }
    }

    pub fn document(&self) -> &'doc SchemaDocument {
        self.doc
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Recomputation counters of this session.
    pub fn stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    /// Number of nodes with memoized facts.
    pub fn cached_node_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// The top-level definition owning `node`.
    pub(crate) fn owner_of(&self, node: NodeId) -> Result<NodeId> {
        self.doc.owning_definition(node).ok_or_else(|| {
            ResolveError::assertion(format!("node {} lies outside every definition", node.0))
        })
    }

    // =========================================================================
    // Definition lifecycle
    // =========================================================================

    /// Build (once) the query topology and member links of a definition.
    pub fn init_definition(&self, definition: NodeId) -> Result<Rc<Topology>> {
        if !self.doc.is_definition(definition) {
            return Err(ResolveError::assertion(format!(
                "node {} is not a top-level definition",
                definition.0
            )));
        }
        if let Some(topology) = self.cache.borrow().get::<TopologyKey>(definition) {
            return Ok(topology);
        }

        let name = self.doc.definition_name(definition).unwrap_or("?");
        let _span = span!(Level::DEBUG, "init_definition", name).entered();

        let build = build_topology(self.doc, definition, &self.options).map_err(|err| match err {
            ResolveError::Model(err) => {
                let err = if err.name.is_none() { err.with_name(name) } else { err };
                ResolveError::Model(err.with_location(self.doc.location(definition)))
            }
            other => other,
        })?;
        let topology = Rc::new(build.topology);

        let mut cache = self.cache.borrow_mut();
        cache.stats_mut().topology_builds += 1;
        for (index, scope) in topology.queries.iter().enumerate() {
            let mut nodes = vec![scope.node, scope.select];
            for &set in &scope.set_nodes {
                nodes.push(set);
                nodes.extend(self.doc.prop(set, "SET"));
            }
            for node in nodes {
                if !cache.contains::<QueryIndexKey>(node) {
                    cache.set::<QueryIndexKey>(definition, node, index)?;
                }
            }
        }
        for link in &build.links {
            match *link {
                TopologyLink::Parent { member, parent } => {
                    cache.set::<ParentKey>(definition, member, parent)?;
                }
                TopologyLink::Column { column, element } => {
                    cache.set::<ElementKey>(definition, column, element)?;
                    // The first column inferring a member names it.
                    if !cache.contains::<ColumnKey>(element) {
                        cache.set::<ColumnKey>(definition, element, column)?;
                    }
                }
            }
        }
        cache.set::<TopologyKey>(definition, definition, Rc::clone(&topology))?;

        debug!(
            "[TOPOLOGY] initialized {} ({} queries)",
            name,
            topology.queries.len()
        );
        Ok(topology)
    }

    /// Forget everything memoized on behalf of `definition`.
    pub fn drop_definition_cache(&self, definition: NodeId) -> usize {
        let removed = self.cache.borrow_mut().drop_all(definition);
        debug!(
            "[CACHE] dropped {} entries of {}",
            removed,
            self.doc.definition_name(definition).unwrap_or("?")
        );
        removed
    }

    // =========================================================================
    // Query helpers
    // =========================================================================

    /// The node carrying the result `elements` relevant to `query`: the
    /// definition for its main query, the query's `SELECT` otherwise.
    pub fn query_or_main(&self, query: NodeId, main: NodeId) -> Result<NodeId> {
        let topology = self.init_definition(main)?;
        let Some(index) = topology.query_of(query) else {
            return Err(ResolveError::assertion(format!(
                "node {} is not a query of definition {}",
                query.0, main.0
            )));
        };
        let scope = &topology.queries[index];
        Ok(match scope.elements_owner {
            Some(owner) => owner,
            None if index == 0 => main,
            None => scope.select,
        })
    }

    /// The query whose result members are held by `elements_owner`.
    pub fn query_for_elements(&self, elements_owner: NodeId) -> Result<Option<NodeId>> {
        let definition = self.owner_of(elements_owner)?;
        let topology = self.init_definition(definition)?;
        Ok(topology
            .queries
            .iter()
            .find(|scope| scope.elements_owner == Some(elements_owner))
            .map(|scope| scope.node))
    }

    /// The query scopes of a definition in query-number order.
    pub fn query_scopes(&self, definition: NodeId) -> Result<Vec<QueryScope>> {
        Ok(self.init_definition(definition)?.queries.clone())
    }

    /// 1-based number of the query a query node belongs to.
    pub fn query_number(&self, query: NodeId) -> Result<Option<usize>> {
        let definition = self.owner_of(query)?;
        self.init_definition(definition)?;
        Ok(self
            .cache
            .borrow()
            .get::<QueryIndexKey>(query)
            .map(|index| index + 1))
    }

    /// Result member inferred by a query column.
    pub fn column_element(&self, column: NodeId) -> Result<Option<NodeId>> {
        self.init_definition(self.owner_of(column)?)?;
        Ok(self.cache.borrow().get::<ElementKey>(column))
    }

    /// Column a query result member is inferred from.
    pub fn element_column(&self, element: NodeId) -> Result<Option<NodeId>> {
        self.init_definition(self.owner_of(element)?)?;
        Ok(self.cache.borrow().get::<ColumnKey>(element))
    }

    /// Structural parent of a member (its definition, member or anonymous aspect).
    pub fn parent_of(&self, member: NodeId) -> Result<Option<NodeId>> {
        self.init_definition(self.owner_of(member)?)?;
        Ok(self.cache.borrow().get::<ParentKey>(member))
    }

    pub(crate) fn model_error(&self, kind: ModelErrorKind, message: String) -> ResolveError {
        ResolveError::Model(ModelError::new(kind, message))
    }
}
