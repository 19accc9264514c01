//! Origin / Effective-Type Resolver.
//!
//! Type references (`type`) and derived-from markers (`$origin`) form
//! prototype-like chains between definitions and members. The effective
//! type of a node is the first node on its chain that owns structure of its
//! own (`elements`, `target`, `targetAspect`, `enum`, `items`), or the last
//! node of the chain. Chains are walked iteratively with explicit
//! in-progress markers in the cache, so a revisited node is reported as a
//! circular type instead of looping.

use crate::cache::{EffectiveTypeKey, NodeCache, OriginKey, ParentKey, TypeState};
use crate::error::{ModelError, ModelErrorKind, ResolveError, Result};
use crate::session::Resolver;
use cdsc_common::limits::{MAX_ITEMS_NESTING, MAX_TYPE_CHAIN_LENGTH};
use cdsc_model::{NodeId, StructuralFacts, Value};
use tracing::{Level, debug, span, trace};

impl Resolver<'_> {
    // =========================================================================
    // Effective type
    // =========================================================================

    /// The nearest node on the `type`/`$origin` chain of `node` owning
    /// intrinsic structure; `node` itself if it is not part of a chain.
    pub fn effective_type(&self, node: NodeId) -> Result<NodeId> {
        match self.cache.borrow().get::<EffectiveTypeKey>(node) {
            Some(TypeState::Done(ty)) => return Ok(ty),
            Some(TypeState::InProgress) => return Err(self.circular(node)),
            None => {}
        }

        let _span = span!(Level::DEBUG, "effective_type", node = node.0).entered();
        self.cache.borrow_mut().stats_mut().effective_type_walks += 1;

        let mut chain: Vec<NodeId> = Vec::new();
        let result = self.walk_type_chain(node, &mut chain);

        let mut cache = self.cache.borrow_mut();
        match result {
            Ok(ty) => {
                if chain.is_empty() {
                    cache.set::<EffectiveTypeKey>(self.owner_of(node)?, node, TypeState::Done(ty))?;
                }
                for &link in &chain {
                    cache.set::<EffectiveTypeKey>(self.owner_of(link)?, link, TypeState::Done(ty))?;
                }
                trace!("[ORIGIN] effective type of {} is {}", node.0, ty.0);
                Ok(ty)
            }
            Err(err) => {
                for &link in &chain {
                    if cache.get::<EffectiveTypeKey>(link) == Some(TypeState::InProgress) {
                        cache.clear::<EffectiveTypeKey>(link);
                    }
                }
                Err(err)
            }
        }
    }

    fn walk_type_chain(&self, start: NodeId, chain: &mut Vec<NodeId>) -> Result<NodeId> {
        let mut current = start;
        loop {
            match self.cache.borrow().get::<EffectiveTypeKey>(current) {
                Some(TypeState::Done(ty)) => return Ok(ty),
                Some(TypeState::InProgress) => return Err(self.circular(current)),
                None => {}
            }
            if chain.len() >= MAX_TYPE_CHAIN_LENGTH {
                return Err(self.circular(start));
            }
            if self.doc.artifact(current).has_intrinsic_structure() {
                return Ok(current);
            }

            let owner = self.owner_of(current)?;
            self.cache
                .borrow_mut()
                .set::<EffectiveTypeKey>(owner, current, TypeState::InProgress)?;
            chain.push(current);

            match self.chain_link(current)? {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
    }

    /// The next node on the type chain: `type`, else `$origin`.
    fn chain_link(&self, node: NodeId) -> Result<Option<NodeId>> {
        let art = self.doc.artifact(node);
        if let Some(type_ref) = art.type_ref() {
            if let Some(next) = self.resolve_type_ref(type_ref)? {
                return Ok(Some(next));
            }
        }
        match art.origin_ref() {
            Some(origin) => self.resolve_origin_marker(origin),
            None => Ok(None),
        }
    }

    /// Target of a `type` property. Built-in and unknown type names end the chain.
    fn resolve_type_ref(&self, type_ref: NodeId) -> Result<Option<NodeId>> {
        if let Some(name) = self.doc.as_str(type_ref) {
            return Ok(self.doc.definition(name));
        }
        if self.doc.ref_path(type_ref).is_some() {
            let resolution = self.inspect_ref(&self.doc.path_of(type_ref))?;
            return Ok(resolution.art);
        }
        Ok(None)
    }

    /// Target of a `$origin` marker: a definition name or `[Definition, member, ...]`.
    fn resolve_origin_marker(&self, origin: NodeId) -> Result<Option<NodeId>> {
        match self.doc.value(origin) {
            Some(Value::String(name)) => Ok(self.doc.definition(name)),
            Some(Value::Array(steps)) => {
                let Some((&first, rest)) = steps.split_first() else {
                    return Ok(None);
                };
                let Some(mut current) = self.doc.as_str(first).and_then(|n| self.doc.definition(n))
                else {
                    return Ok(None);
                };
                for &step in rest {
                    let Some(name) = self.doc.as_str(step) else {
                        return Ok(None);
                    };
                    let Some(env) = self.navigation_env(current, false)? else {
                        return Ok(None);
                    };
                    match self.element_in(env, name) {
                        Some(member) => current = member,
                        None => return Ok(None),
                    }
                }
                Ok(Some(current))
            }
            _ => Ok(None),
        }
    }

    fn circular(&self, node: NodeId) -> ResolveError {
        let path = self.doc.path_of(node);
        ResolveError::Model(
            ModelError::new(
                ModelErrorKind::CircularType,
                format!("type chain of `{path}` refers to itself"),
            )
            .with_name(path.to_string())
            .with_location(self.nearest_location(node)),
        )
    }

    // =========================================================================
    // Origin
    // =========================================================================

    /// The prototype `node` is derived from, or `None` at the root of its chain.
    ///
    /// In order: an explicit `$origin`, a `type` reference, the column a query
    /// result member is inferred from, or the same-named member of the
    /// parent's origin.
    pub fn get_origin(&self, node: NodeId) -> Result<Option<NodeId>> {
        let owner = self.owner_of(node)?;
        self.init_definition(owner)?;
        NodeCache::get_or_compute::<OriginKey, _>(&self.cache, owner, node, || {
            self.cache.borrow_mut().stats_mut().origin_computations += 1;
            self.compute_origin(node)
        })
    }

    fn compute_origin(&self, node: NodeId) -> Result<Option<NodeId>> {
        let art = self.doc.artifact(node);
        if let Some(origin) = art.origin_ref() {
            if let Some(found) = self.resolve_origin_marker(origin)? {
                return Ok(Some(found));
            }
        }
        if let Some(type_ref) = art.type_ref() {
            if let Some(found) = self.resolve_type_ref(type_ref)? {
                return Ok(Some(found));
            }
        }

        if let Some(column) = self.element_column(node)? {
            if self.doc.ref_path(column).is_some() {
                let resolution = self.inspect_ref(&self.doc.path_of(column))?;
                if resolution.art.is_some() {
                    return Ok(resolution.art);
                }
            }
        }

        // Flattened/expanded members derive from the same-named member of
        // their parent's origin.
        let parent = self.cache.borrow().get::<ParentKey>(node);
        let name = self.doc.step_of(node).and_then(|step| step.as_key());
        if let (Some(parent), Some(name)) = (parent, name) {
            if let Some(parent_origin) = self.get_origin(parent)? {
                if let Some(env) = self.navigation_env(parent_origin, false)? {
                    let found = self.element_in(env, name);
                    debug!("[ORIGIN] {} via parent origin: {:?}", name, found.map(|n| n.0));
                    return Ok(found);
                }
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Navigation environments
    // =========================================================================

    /// The node whose `elements` are searched for the segment after `node`.
    ///
    /// Unwraps `items`, then returns the effective type if it has elements,
    /// else follows the association target. With `prefer_static_target`,
    /// a composition's `targetAspect` is preferred over its `target`.
    pub fn navigation_env(&self, node: NodeId, prefer_static_target: bool) -> Result<Option<NodeId>> {
        let mut current = node;
        for _ in 0..MAX_ITEMS_NESTING {
            let ty = self.effective_type(current)?;
            let art = self.doc.artifact(ty);
            if let Some(items) = art.items() {
                current = items;
                continue;
            }
            if art.elements().is_some() {
                return Ok(Some(ty));
            }

            let target = if prefer_static_target {
                art.target_aspect().or(art.target())
            } else {
                art.target().or(art.target_aspect())
            };
            let Some(target) = target else {
                return Ok(None);
            };
            if let Some(name) = self.doc.as_str(target) {
                current = self.doc.definition(name).ok_or_else(|| {
                    ResolveError::Model(
                        ModelError::new(
                            ModelErrorKind::UnknownDefinition,
                            format!("association target `{name}` is not defined"),
                        )
                        .with_name(name)
                        .with_location(self.nearest_location(target)),
                    )
                })?;
                continue;
            }
            if self.doc.has_prop(target, "elements") {
                return Ok(Some(target));
            }
            return Ok(None);
        }
        Err(self.circular(node))
    }

    /// Member `name` of an environment returned by [`Self::navigation_env`].
    pub(crate) fn element_in(&self, env: NodeId, name: &str) -> Option<NodeId> {
        self.doc.prop(self.doc.prop(env, "elements")?, name)
    }
}
