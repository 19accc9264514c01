//! Reference Resolver.
//!
//! `inspect_ref` takes the document path of a reference, classifies its
//! context, resolves the first path segment through lexical scopes (table
//! aliases, mixins, `$self`) and then the context's dynamic source, and
//! walks the remaining segments through navigation environments.
//!
//! Resolutions are memoized per reference holder, owned by the top-level
//! definition containing the reference.

use crate::cache::{NodeCache, ResolutionKey};
use crate::context::{DynamicSource, LexicalScopes, RefContext};
use crate::error::{ModelError, ModelErrorKind, ResolveError, Result};
use crate::session::Resolver;
use crate::topology::{AliasBinding, Topology};
use crate::walker::{self, BaseRef, RefSite, SiteKind};
use cdsc_common::DocumentPath;
use cdsc_common::limits::MAX_SCOPE_WALK_ITERATIONS;
use cdsc_model::{NodeId, SchemaDocument, is_builtin_type};
use serde_json::json;
use smallvec::{SmallVec, smallvec};
use std::fmt;
use std::rc::Rc;
use tracing::{Level, debug, span, trace};

// =============================================================================
// Resolution results
// =============================================================================

/// One resolved path segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    /// The node the segment resolved to.
    pub art: NodeId,
    /// The environment the next segment is looked up in.
    pub env: Option<NodeId>,
}

/// Where the first path segment was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Parent,
    Target,
    Query,
    Source,
    Alias,
    Mixin,
    SelfRef,
    /// An opaque `$`-variable such as `$now` or `$user`.
    Magic,
    /// A built-in type name.
    Builtin,
    Expand,
    Inline,
    RefTarget,
    Param,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Parent => "parent",
            Scope::Target => "target",
            Scope::Query => "query",
            Scope::Source => "source",
            Scope::Alias => "alias",
            Scope::Mixin => "mixin",
            Scope::SelfRef => "$self",
            Scope::Magic => "$magic",
            Scope::Builtin => "builtin",
            Scope::Expand => "expand",
            Scope::Inline => "inline",
            Scope::RefTarget => "ref-target",
            Scope::Param => "param",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra information about the binding of the first segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeEnv {
    /// A table alias of query `query_number`.
    Alias { name: String, query_number: usize },
    Mixin { name: String, query_number: usize },
    /// A source element provided through table alias `alias`.
    Source { alias: String, query_number: usize },
    /// The `up_` link of an anonymous composition aspect.
    UpLink { composition: NodeId },
    SelfRef { query_number: Option<usize> },
}

/// The result of [`Resolver::inspect_ref`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// One entry per path segment. Empty when the first segment is
    /// opaque (magic variables, built-in types): no segment is resolved then.
    pub links: SmallVec<[Link; 4]>,
    /// The referenced node; `None` for magic variables and built-ins.
    pub art: Option<NodeId>,
    /// The member or definition using the reference.
    pub parent: Option<NodeId>,
    pub scope: Scope,
    pub env: Option<ScopeEnv>,
    pub context: RefContext,
}

impl Resolution {
    /// Navigation environment attached to the final link.
    pub fn final_env(&self) -> Option<NodeId> {
        self.links.last().and_then(|link| link.env)
    }

    /// JSON rendering with node handles replaced by document paths.
    pub fn describe(&self, doc: &SchemaDocument) -> serde_json::Value {
        let path = |node: NodeId| doc.path_of(node).to_string();
        let links: Vec<serde_json::Value> = self
            .links
            .iter()
            .map(|link| json!({ "art": path(link.art), "env": link.env.map(path) }))
            .collect();
        let env = self.env.as_ref().map(|env| match env {
            ScopeEnv::Alias { name, query_number } => {
                json!({ "alias": name, "query": query_number })
            }
            ScopeEnv::Mixin { name, query_number } => {
                json!({ "mixin": name, "query": query_number })
            }
            ScopeEnv::Source {
                alias,
                query_number,
            } => json!({ "source": alias, "query": query_number }),
            ScopeEnv::UpLink { composition } => json!({ "up": path(*composition) }),
            ScopeEnv::SelfRef { query_number } => json!({ "self": query_number }),
        });
        json!({
            "context": self.context.as_str(),
            "scope": self.scope.as_str(),
            "art": self.art.map(path),
            "parent": self.parent.map(path),
            "env": env,
            "links": links,
        })
    }
}

/// A reference known to denote a top-level definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactRef<'a> {
    Name(&'a str),
    /// A string node or `{ ref }` object in the document.
    Node(NodeId),
}

impl<'a> From<&'a str> for ArtifactRef<'a> {
    fn from(name: &'a str) -> Self {
        ArtifactRef::Name(name)
    }
}

impl<'a> From<&'a String> for ArtifactRef<'a> {
    fn from(name: &'a String) -> Self {
        ArtifactRef::Name(name)
    }
}

impl From<NodeId> for ArtifactRef<'_> {
    fn from(node: NodeId) -> Self {
        ArtifactRef::Node(node)
    }
}

/// How the first segment was bound.
enum Head {
    Bound {
        link: Link,
        scope: Scope,
        env: Option<ScopeEnv>,
    },
    /// Resolves to no document node; remaining segments are not attempted.
    Opaque(Scope),
}

impl Head {
    fn bound(art: NodeId, env: Option<NodeId>, scope: Scope) -> Head {
        Head::Bound {
            link: Link { art, env },
            scope,
            env: None,
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

impl Resolver<'_> {
    /// Resolve the reference at `path`.
    ///
    /// A path ending at a member or definition yields a resolution of the
    /// member itself (scope `parent` resp. `global`) with its navigation
    /// environment attached.
    pub fn inspect_ref(&self, path: &DocumentPath) -> Result<Rc<Resolution>> {
        let _span = span!(Level::DEBUG, "inspect_ref", path = %path).entered();

        let definition = walker::path_definition(self.doc, path)?;
        let topology = self.init_definition(definition)?;
        let site = walker::analyze(self.doc, &topology, path)?;

        if let Some(resolution) = self.cache.borrow().get::<ResolutionKey>(site.holder) {
            trace!("[RESOLVE] {} (cached)", path);
            return Ok(resolution);
        }
        if !self.resolving.borrow_mut().insert(site.holder) {
            return Err(self.annotate(
                self.model_error(
                    ModelErrorKind::CircularType,
                    format!("reference at `{path}` depends on itself"),
                ),
                &site,
            ));
        }

        let result = NodeCache::get_or_compute::<ResolutionKey, _>(&self.cache, definition, site.holder, || {
            self.cache.borrow_mut().stats_mut().resolutions += 1;
            self.resolve_site(&site, &topology).map(Rc::new)
        });
        self.resolving.borrow_mut().remove(&site.holder);

        match result {
            Ok(resolution) => {
                debug!(
                    "[RESOLVE] {} -> {} ({}, {} links)",
                    path,
                    resolution
                        .art
                        .map_or_else(|| "-".to_string(), |art| self.doc.path_of(art).to_string()),
                    resolution.scope,
                    resolution.links.len()
                );
                Ok(resolution)
            }
            Err(err) => Err(self.annotate(err, &site)),
        }
    }

    /// Resolve a reference denoting a top-level definition.
    ///
    /// Returns `not_found` when given and the reference does not resolve.
    pub fn artifact_ref<'a>(
        &self,
        reference: impl Into<ArtifactRef<'a>>,
        not_found: Option<NodeId>,
    ) -> Result<NodeId> {
        let reference = reference.into();
        let (name, found) = match reference {
            ArtifactRef::Name(name) => (name.to_string(), self.doc.definition(name)),
            ArtifactRef::Node(node) => {
                if let Some(name) = self.doc.as_str(node) {
                    (name.to_string(), self.doc.definition(name))
                } else if let Some(ref_path) = self.doc.ref_path(node) {
                    let segments = self.doc.array(ref_path).unwrap_or_default();
                    let name = segments
                        .first()
                        .and_then(|seg| self.doc.segment_name(*seg))
                        .unwrap_or_default()
                        .to_string();
                    let found = if segments.len() > 1 {
                        match self.inspect_ref(&self.doc.path_of(node)) {
                            Ok(resolution) => resolution.art,
                            Err(err) if !err.is_internal() && not_found.is_some() => {
                                debug!("[RESOLVE] `{}` unresolved, using fallback: {}", name, err);
                                None
                            }
                            Err(err) => return Err(err),
                        }
                    } else {
                        self.doc.definition(&name)
                    };
                    (name, found)
                } else {
                    return Err(self.model_error(
                        ModelErrorKind::InvalidReference,
                        format!("`{}` is not a reference", self.doc.path_of(node)),
                    ));
                }
            }
        };

        match found.or(not_found) {
            Some(art) => Ok(art),
            None => Err(ResolveError::Model(
                ModelError::new(
                    ModelErrorKind::UnknownDefinition,
                    format!("no definition `{name}`"),
                )
                .with_name(name),
            )),
        }
    }

    fn annotate(&self, err: ResolveError, site: &RefSite) -> ResolveError {
        match err {
            ResolveError::Model(err) => ResolveError::Model(
                err.with_location(self.nearest_location(site.holder))
                    .with_context(site.context.as_str()),
            ),
            internal => internal,
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    fn resolve_site(&self, site: &RefSite, topology: &Topology) -> Result<Resolution> {
        match site.kind {
            SiteKind::Definition => Ok(Resolution {
                links: smallvec![Link {
                    art: site.main,
                    env: self.navigation_env(site.main, false)?,
                }],
                art: Some(site.main),
                parent: None,
                scope: Scope::Global,
                env: None,
                context: site.context,
            }),
            SiteKind::Member => Ok(Resolution {
                links: smallvec![Link {
                    art: site.holder,
                    env: self.navigation_env(site.holder, false)?,
                }],
                art: Some(site.holder),
                parent: site.member_parent,
                scope: Scope::Parent,
                env: None,
                context: site.context,
            }),
            SiteKind::Reference => self.resolve_reference(site, topology),
        }
    }

    fn resolve_reference(&self, site: &RefSite, topology: &Topology) -> Result<Resolution> {
        let doc = self.doc;
        let holder = site.holder;
        let segments: SmallVec<[NodeId; 4]> = match doc.ref_path(holder) {
            Some(ref_path) => doc.items(ref_path).collect(),
            None => smallvec![holder],
        };
        if segments.is_empty() {
            return Err(self.model_error(
                ModelErrorKind::InvalidReference,
                "reference path is empty".to_string(),
            ));
        }
        let mut names: SmallVec<[&str; 4]> = SmallVec::new();
        for &segment in &segments {
            match doc.segment_name(segment) {
                Some(name) => names.push(name),
                None => {
                    return Err(self.model_error(
                        ModelErrorKind::InvalidReference,
                        format!("segment `{}` has no name", doc.path_of(segment)),
                    ));
                }
            }
        }

        let head = if doc.prop(holder, "param").and_then(|p| doc.as_bool(p)) == Some(true) {
            let param = doc.prop(site.main, "params").and_then(|params| doc.prop(params, names[0]));
            match param {
                Some(param) => Head::bound(param, None, Scope::Param),
                None => return Err(self.unknown_name(names[0], "the parameters")),
            }
        } else if doc.prop(holder, "global").and_then(|g| doc.as_bool(g)) == Some(true) {
            self.resolve_dynamic(site, topology, DynamicSource::Global, names[0], names.len())?
        } else {
            self.resolve_head(site, topology, names[0], names.len())?
        };

        let (first, scope, scope_env) = match head {
            Head::Bound { link, scope, env } => (link, scope, env),
            Head::Opaque(scope) => {
                return Ok(Resolution {
                    links: SmallVec::new(),
                    art: None,
                    parent: site.member.or(Some(site.main)),
                    scope,
                    env: None,
                    context: site.context,
                });
            }
        };

        let mut links: SmallVec<[Link; 4]> = smallvec![first];
        for i in 1..segments.len() {
            let prev = links[i - 1];
            let env = match prev.env {
                Some(env) => env,
                None => {
                    let env = self.navigation_env(prev.art, false)?.ok_or_else(|| {
                        ResolveError::Model(
                            ModelError::new(
                                ModelErrorKind::MissingEnvironment,
                                format!("`{}` has no elements to look up `{}` in", names[i - 1], names[i]),
                            )
                            .with_name(names[i - 1]),
                        )
                    })?;
                    links[i - 1].env = Some(env);
                    env
                }
            };
            let Some(art) = self.element_in(env, names[i]) else {
                return Err(self.unknown_name(names[i], &format!("`{}`", doc.path_of(env))));
            };
            links.push(Link { art, env: None });
        }

        let semantics = site.context.semantics();
        let last_decorated =
            doc.ref_path(holder).is_some() && !doc.is_plain_segment(segments[segments.len() - 1]);
        let continues = doc.has_prop(holder, "expand") || doc.has_prop(holder, "inline");
        if let Some(last) = links.last_mut() {
            if last.env.is_none() && (semantics.env_on_last || last_decorated || continues) {
                last.env = self.navigation_env(last.art, false)?;
                if last.env.is_none() && site.context == RefContext::From {
                    return Err(ResolveError::Model(
                        ModelError::new(
                            ModelErrorKind::MissingEnvironment,
                            format!("`{}` in FROM has no elements", names[names.len() - 1]),
                        )
                        .with_name(names[names.len() - 1]),
                    ));
                }
            }
        }

        let art = links.last().map(|link| link.art);
        Ok(Resolution {
            links,
            art,
            parent: site.member.or(Some(site.main)),
            scope,
            env: scope_env,
            context: site.context,
        })
    }

    /// Lexical scopes first, then the context's dynamic source.
    fn resolve_head(&self, site: &RefSite, topology: &Topology, name: &str, segment_count: usize) -> Result<Head> {
        let semantics = site.context.semantics();
        let lexical = match semantics.lexical {
            LexicalScopes::None => None,
            LexicalScopes::DollarOnly => self.resolve_dollar(site, topology, name)?,
            LexicalScopes::Full | LexicalScopes::FullMixinsFirst | LexicalScopes::Enclosing => {
                match self.resolve_lexical(site, topology, name, segment_count)? {
                    Some(head) => Some(head),
                    None => self.resolve_dollar(site, topology, name)?,
                }
            }
        };
        if let Some(head) = lexical {
            return Ok(head);
        }
        self.resolve_dynamic(site, topology, semantics.dynamic, name, segment_count)
    }

    /// Walk outward through the enclosing queries; the nearest binding wins.
    fn resolve_lexical(
        &self,
        site: &RefSite,
        topology: &Topology,
        name: &str,
        segment_count: usize,
    ) -> Result<Option<Head>> {
        let semantics = site.context.semantics();
        let mixins_first = semantics.lexical == LexicalScopes::FullMixinsFirst;
        // A bare single-segment name is a column, not a table alias.
        let aliases_visible = segment_count > 1
            || self.doc.has_prop(site.holder, "expand")
            || self.doc.has_prop(site.holder, "inline");

        let mut index = match semantics.lexical {
            LexicalScopes::Enclosing => site
                .query
                .and_then(|q| topology.scope(q))
                .and_then(|scope| scope.next),
            _ => site.query,
        };

        let mut iterations = 0;
        while let Some(current) = index {
            iterations += 1;
            if iterations > MAX_SCOPE_WALK_ITERATIONS {
                return Err(ResolveError::assertion(format!(
                    "lexical scope chain of query {} does not terminate",
                    current + 1
                )));
            }
            let Some(scope) = topology.scope(current) else {
                return Err(ResolveError::assertion(format!(
                    "query scope {current} is not part of the topology"
                )));
            };

            let mixin = scope.mixins.get(name).copied();
            let alias = if aliases_visible {
                scope.aliases.get(name)
            } else {
                None
            };
            let mixin_head = |mixin: NodeId| Head::Bound {
                link: Link {
                    art: mixin,
                    env: None,
                },
                scope: Scope::Mixin,
                env: Some(ScopeEnv::Mixin {
                    name: name.to_string(),
                    query_number: scope.number,
                }),
            };

            if mixins_first {
                if let Some(mixin) = mixin {
                    return Ok(Some(mixin_head(mixin)));
                }
            }
            if let Some(binding) = alias {
                let link = self.alias_link(binding, topology)?;
                trace!("[RESOLVE] `{}` is an alias of query {}", name, scope.number);
                return Ok(Some(Head::Bound {
                    link,
                    scope: Scope::Alias,
                    env: Some(ScopeEnv::Alias {
                        name: name.to_string(),
                        query_number: scope.number,
                    }),
                }));
            }
            if let Some(mixin) = mixin {
                return Ok(Some(mixin_head(mixin)));
            }
            index = scope.next;
        }
        Ok(None)
    }

    /// `$self`/`$projection` and opaque magic variables.
    fn resolve_dollar(&self, site: &RefSite, topology: &Topology, name: &str) -> Result<Option<Head>> {
        if !name.starts_with('$') {
            return Ok(None);
        }
        if name == "$self" || name == "$projection" {
            let env = self.navigation_env(site.main, false)?;
            return Ok(Some(Head::Bound {
                link: Link {
                    art: site.main,
                    env,
                },
                scope: Scope::SelfRef,
                env: Some(ScopeEnv::SelfRef {
                    query_number: site
                        .query
                        .and_then(|q| topology.scope(q))
                        .map(|scope| scope.number),
                }),
            }));
        }
        Ok(Some(Head::Opaque(Scope::Magic)))
    }

    fn resolve_dynamic(
        &self,
        site: &RefSite,
        topology: &Topology,
        source: DynamicSource,
        name: &str,
        segment_count: usize,
    ) -> Result<Head> {
        let doc = self.doc;
        match source {
            DynamicSource::Global => {
                if let Some(definition) = doc.definition(name) {
                    return Ok(Head::bound(definition, None, Scope::Global));
                }
                if segment_count == 1 && site.context == RefContext::Type && is_builtin_type(name) {
                    return Ok(Head::Opaque(Scope::Builtin));
                }
                Err(ResolveError::Model(
                    ModelError::new(
                        ModelErrorKind::UnknownDefinition,
                        format!("no definition `{name}`"),
                    )
                    .with_name(name),
                ))
            }
            DynamicSource::Parent => {
                let parent = if site.member.is_some() {
                    site.member_parent
                } else {
                    Some(site.main)
                };
                let Some(parent) = parent else {
                    return Err(self.unknown_name(name, "the enclosing structure"));
                };
                if let Some(env) = self.navigation_env(parent, false)? {
                    if let Some(member) = self.element_in(env, name) {
                        return Ok(Head::bound(member, None, Scope::Parent));
                    }
                }
                if name == "up_" {
                    if let Some(head) = self.resolve_up_link(parent)? {
                        return Ok(head);
                    }
                }
                Err(self.unknown_name(name, &format!("`{}`", doc.path_of(parent))))
            }
            DynamicSource::Target => {
                let Some(association) = site.member else {
                    return Err(self.unknown_name(name, "the association target"));
                };
                let Some(env) = self.navigation_env(association, false)? else {
                    return Err(ResolveError::Model(
                        ModelError::new(
                            ModelErrorKind::MissingEnvironment,
                            format!("`{}` has no target to take keys from", doc.path_of(association)),
                        )
                        .with_name(name),
                    ));
                };
                match self.element_in(env, name) {
                    Some(key) => Ok(Head::bound(key, None, Scope::Target)),
                    None => Err(self.unknown_name(name, &format!("target `{}`", doc.path_of(env)))),
                }
            }
            DynamicSource::Query => {
                let scope = site.query.and_then(|q| topology.scope(q));
                let elements_owner = match scope {
                    Some(scope) if scope.number == 1 => scope.elements_owner.or(Some(site.main)),
                    Some(scope) => scope.elements_owner,
                    None => None,
                };
                if let Some(member) = elements_owner.and_then(|owner| self.element_in(owner, name)) {
                    return Ok(Head::bound(member, None, Scope::Query));
                }
                // ORDER BY may also name source elements not selected.
                if site.context == RefContext::OrderBy {
                    return self.resolve_dynamic(site, topology, DynamicSource::Source, name, segment_count);
                }
                Err(self.unknown_name(name, "the query result"))
            }
            DynamicSource::Source => self.resolve_source(site, topology, name),
            DynamicSource::Expand | DynamicSource::Inline | DynamicSource::RefTarget => {
                let scope = match source {
                    DynamicSource::Expand => Scope::Expand,
                    DynamicSource::Inline => Scope::Inline,
                    _ => Scope::RefTarget,
                };
                let Some(env) = self.base_env(site)? else {
                    return Err(ResolveError::Model(
                        ModelError::new(
                            ModelErrorKind::MissingEnvironment,
                            format!("no elements to look up `{name}` in"),
                        )
                        .with_name(name),
                    ));
                };
                match self.element_in(env, name) {
                    Some(member) => Ok(Head::bound(member, None, scope)),
                    None => Err(self.unknown_name(name, &format!("`{}`", doc.path_of(env)))),
                }
            }
            DynamicSource::None => Err(self.unknown_name(name, "the enclosing queries")),
        }
    }

    /// A unique element among all table aliases of the current query.
    fn resolve_source(&self, site: &RefSite, topology: &Topology, name: &str) -> Result<Head> {
        let Some(scope) = site.query.and_then(|q| topology.scope(q)) else {
            return Err(ResolveError::Model(
                ModelError::new(
                    ModelErrorKind::UnsupportedContext,
                    format!("`{name}` refers to query sources outside of a query"),
                )
                .with_name(name),
            ));
        };

        let mut found: Option<(NodeId, &str)> = None;
        for (alias, binding) in &scope.aliases {
            let link = self.alias_link(binding, topology)?;
            let env = match link.env {
                Some(env) => Some(env),
                None => self.navigation_env(link.art, false)?,
            };
            let Some(element) = env.and_then(|env| self.element_in(env, name)) else {
                continue;
            };
            if let Some((_, first)) = found {
                return Err(ResolveError::Model(
                    ModelError::new(
                        ModelErrorKind::AmbiguousName,
                        format!(
                            "`{name}` is provided by both `{first}` and `{alias}` in query {}",
                            scope.number
                        ),
                    )
                    .with_name(name),
                ));
            }
            found = Some((element, alias.as_str()));
        }

        match found {
            Some((element, alias)) => Ok(Head::Bound {
                link: Link {
                    art: element,
                    env: None,
                },
                scope: Scope::Source,
                env: Some(ScopeEnv::Source {
                    alias: alias.to_string(),
                    query_number: scope.number,
                }),
            }),
            None => Err(self.unknown_name(name, &format!("the sources of query {}", scope.number))),
        }
    }

    /// The node and environment a table alias stands for.
    fn alias_link(&self, binding: &AliasBinding, topology: &Topology) -> Result<Link> {
        match binding {
            AliasBinding::Ref { from } => {
                let resolution = self.inspect_ref(&self.doc.path_of(*from))?;
                let Some(last) = resolution.links.last() else {
                    return Err(ResolveError::assertion(format!(
                        "FROM reference `{}` resolved without links",
                        self.doc.path_of(*from)
                    )));
                };
                Ok(*last)
            }
            AliasBinding::Query { query, .. } => {
                let Some(scope) = topology.scope(*query) else {
                    return Err(ResolveError::assertion(format!(
                        "sub-query {query} is not part of the topology"
                    )));
                };
                Ok(Link {
                    art: scope.node,
                    env: scope.elements_owner,
                })
            }
        }
    }

    /// Environment provided by the outer reference of a filter or expand/inline item.
    fn base_env(&self, site: &RefSite) -> Result<Option<NodeId>> {
        match &site.base {
            Some(BaseRef::Segment { path, index }) => {
                let outer = self.inspect_ref(path)?;
                let Some(link) = outer.links.get(*index) else {
                    return Err(ResolveError::assertion(format!(
                        "filter on segment {index} of `{path}` which has {} links",
                        outer.links.len()
                    )));
                };
                match link.env {
                    Some(env) if *index + 1 == outer.links.len() => Ok(Some(env)),
                    _ => self.navigation_env(link.art, false),
                }
            }
            Some(BaseRef::Column { path }) => {
                let outer = self.inspect_ref(path)?;
                match outer.final_env() {
                    Some(env) => Ok(Some(env)),
                    None => match outer.art {
                        Some(art) => self.navigation_env(art, false),
                        None => Ok(None),
                    },
                }
            }
            None => Ok(None),
        }
    }

    /// `up_` inside an anonymous composition aspect: the structure owning the composition.
    fn resolve_up_link(&self, aspect: NodeId) -> Result<Option<Head>> {
        let doc = self.doc;
        let is_aspect = doc.step_of(aspect).is_some_and(|step| step.is("targetAspect"));
        if !is_aspect {
            return Ok(None);
        }
        let Some(composition) = doc.container(aspect) else {
            return Ok(None);
        };
        let Some(owner) = doc.container(composition).and_then(|map| doc.container(map)) else {
            return Ok(None);
        };
        let env = self.navigation_env(owner, false)?;
        Ok(Some(Head::Bound {
            link: Link { art: owner, env },
            scope: Scope::Parent,
            env: Some(ScopeEnv::UpLink { composition }),
        }))
    }

    fn unknown_name(&self, name: &str, place: &str) -> ResolveError {
        ResolveError::Model(
            ModelError::new(ModelErrorKind::UnknownName, format!("`{name}` not found in {place}"))
                .with_name(name),
        )
    }
}
