//! Node Cache - per-session side table of derived facts.
//!
//! The schema document is never mutated. Everything the resolver derives
//! about a node (its structural parent, origin, effective type, query
//! number, column/element cross-links, memoized resolutions) lives here,
//! keyed by `NodeId`.
//!
//! Each entry records the top-level definition that owns it. `drop_all`
//! removes every entry of one definition and nothing else; it is the only
//! invalidation primitive. Facts are additive: once memoized, a fact is never
//! replaced by a different value (the in-progress marker of an effective-type
//! walk is the one state that may advance).

use crate::error::{ResolveError, Result};
use crate::inspect::Resolution;
use crate::topology::Topology;
use cdsc_model::NodeId;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// State of an effective-type computation for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeState {
    /// The node is on the chain currently being walked.
    InProgress,
    Done(NodeId),
}

/// Facts memoized for one node.
#[derive(Clone, Debug, Default)]
pub struct CacheEntry {
    owner: NodeId,
    parent: Option<NodeId>,
    origin: Option<Option<NodeId>>,
    effective_type: Option<TypeState>,
    query_index: Option<usize>,
    element: Option<NodeId>,
    column: Option<NodeId>,
    resolution: Option<Rc<Resolution>>,
    topology: Option<Rc<Topology>>,
}

impl CacheEntry {
    pub fn owner(&self) -> NodeId {
        self.owner
    }
}

/// A typed key into a [`CacheEntry`].
pub trait CacheKey {
    type Value: Clone + PartialEq + fmt::Debug;
    /// Name used in diagnostics and debug snapshots.
    const NAME: &'static str;

    fn slot(entry: &CacheEntry) -> &Option<Self::Value>;
    fn slot_mut(entry: &mut CacheEntry) -> &mut Option<Self::Value>;

    /// Whether `new` may be stored over `old`.
    fn may_replace(old: &Self::Value, new: &Self::Value) -> bool {
        old == new
    }
}

macro_rules! cache_key {
    ($(#[$meta:meta])* $key:ident, $field:ident, $value:ty, $name:literal) => {
        $(#[$meta])*
        pub struct $key;

        impl CacheKey for $key {
            type Value = $value;
            const NAME: &'static str = $name;

            fn slot(entry: &CacheEntry) -> &Option<$value> {
                &entry.$field
            }

            fn slot_mut(entry: &mut CacheEntry) -> &mut Option<$value> {
                &mut entry.$field
            }
        }
    };
}

cache_key!(
    /// Structural containing member or definition.
    ParentKey, parent, NodeId, "_parent"
);
cache_key!(
    /// Prototype the node is derived from (`None`: root of its chain).
    OriginKey, origin, Option<NodeId>, "_origin"
);
cache_key!(
    /// Index of the query scope a query node belongs to.
    QueryIndexKey, query_index, usize, "$queryNumber"
);
cache_key!(
    /// Result member inferred by a column.
    ElementKey, element, NodeId, "_element"
);
cache_key!(
    /// Column a result member is inferred from.
    ColumnKey, column, NodeId, "_column"
);
cache_key!(
    /// Memoized resolution of the reference held by a node.
    ResolutionKey, resolution, Rc<Resolution>, "_links"
);
cache_key!(
    /// Query topology of a top-level definition.
    TopologyKey, topology, Rc<Topology>, "$queries"
);

/// Effective type of a node; may advance from `InProgress` to `Done`.
pub struct EffectiveTypeKey;

impl CacheKey for EffectiveTypeKey {
    type Value = TypeState;
    const NAME: &'static str = "_effectiveType";

    fn slot(entry: &CacheEntry) -> &Option<TypeState> {
        &entry.effective_type
    }

    fn slot_mut(entry: &mut CacheEntry) -> &mut Option<TypeState> {
        &mut entry.effective_type
    }

    fn may_replace(old: &TypeState, new: &TypeState) -> bool {
        *old == TypeState::InProgress || old == new
    }
}

/// Recomputation counters, used to verify invalidation scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub topology_builds: usize,
    pub resolutions: usize,
    pub effective_type_walks: usize,
    pub origin_computations: usize,
    pub dropped_entries: usize,
}

/// Side table from node handle to memoized facts.
#[derive(Debug, Default)]
pub struct NodeCache {
    entries: FxHashMap<NodeId, CacheEntry>,
    /// Nodes populated on behalf of each top-level definition.
    owned: FxHashMap<NodeId, Vec<NodeId>>,
    stats: CacheStats,
}

impl NodeCache {
    pub fn new() -> Self {
        NodeCache::default()
    }

    pub fn get<K: CacheKey>(&self, node: NodeId) -> Option<K::Value> {
        self.entries.get(&node).and_then(|entry| K::slot(entry).clone())
    }

    pub fn contains<K: CacheKey>(&self, node: NodeId) -> bool {
        self.entries
            .get(&node)
            .is_some_and(|entry| K::slot(entry).is_some())
    }

    pub fn entry(&self, node: NodeId) -> Option<&CacheEntry> {
        self.entries.get(&node)
    }

    pub fn owner_of(&self, node: NodeId) -> Option<NodeId> {
        self.entries.get(&node).map(|entry| entry.owner)
    }

    /// Memoize `value` for `node` on behalf of definition `owner`.
    pub fn set<K: CacheKey>(&mut self, owner: NodeId, node: NodeId, value: K::Value) -> Result<()> {
        let entry = match self.entries.entry(node) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if entry.owner != owner {
                    return Err(ResolveError::assertion(format!(
                        "cache entry of node {} belongs to definition {}, not {}",
                        node.0, entry.owner.0, owner.0
                    )));
                }
                entry
            }
            Entry::Vacant(vacant) => {
                self.owned.entry(owner).or_default().push(node);
                vacant.insert(CacheEntry {
                    owner,
                    ..CacheEntry::default()
                })
            }
        };

        let slot = K::slot_mut(entry);
        if let Some(old) = slot.as_ref() {
            if !K::may_replace(old, &value) {
                return Err(ResolveError::assertion(format!(
                    "cached fact {} of node {} would change from {:?} to {:?}",
                    K::NAME,
                    node.0,
                    old,
                    value
                )));
            }
        }
        trace!("[CACHE] set {} of node {} (owner {})", K::NAME, node.0, owner.0);
        *slot = Some(value);
        Ok(())
    }

    /// Remove one fact. Only used to retract in-progress markers of a failed walk.
    pub(crate) fn clear<K: CacheKey>(&mut self, node: NodeId) {
        if let Some(entry) = self.entries.get_mut(&node) {
            *K::slot_mut(entry) = None;
        }
    }

    /// Return the memoized fact or compute and store it.
    ///
    /// The cache is not borrowed while `compute` runs, so the computation may
    /// itself consult the cache.
    pub fn get_or_compute<K, F>(
        cache: &RefCell<NodeCache>,
        owner: NodeId,
        node: NodeId,
        compute: F,
    ) -> Result<K::Value>
    where
        K: CacheKey,
        F: FnOnce() -> Result<K::Value>,
    {
        if let Some(value) = cache.borrow().get::<K>(node) {
            return Ok(value);
        }
        let value = compute()?;
        let mut cache = cache.borrow_mut();
        // The computation may have memoized the same fact on the way.
        if let Some(existing) = cache.get::<K>(node) {
            if existing == value {
                return Ok(existing);
            }
        }
        cache.set::<K>(owner, node, value.clone())?;
        Ok(value)
    }

    /// Drop every entry owned by definition `owner`. Returns the number removed.
    pub fn drop_all(&mut self, owner: NodeId) -> usize {
        let Some(nodes) = self.owned.remove(&owner) else {
            return 0;
        };
        let mut removed = 0;
        for node in nodes {
            if self.entries.remove(&node).is_some() {
                removed += 1;
            }
        }
        self.stats.dropped_entries += removed;
        trace!("[CACHE] dropped {} entries of definition {}", removed, owner.0);
        removed
    }

    /// Nodes populated on behalf of `owner`, in population order.
    pub fn owned_nodes(&self, owner: NodeId) -> &[NodeId] {
        self.owned.get(&owner).map_or(&[], |nodes| nodes.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }
}
