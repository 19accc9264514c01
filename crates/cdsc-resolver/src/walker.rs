//! Reference-site analysis.
//!
//! Walks a document path from the root and derives, from the sequence of
//! property names and indices alone, where the reference sits: its context,
//! the enclosing query scope, the member using it and, for filters and
//! expand/inline items, the outer reference providing the base environment.

use crate::context::RefContext;
use crate::error::{ModelError, ModelErrorKind, ResolveError, Result};
use crate::topology::Topology;
use cdsc_common::{DocumentPath, PathStep};
use cdsc_model::artifact::MEMBER_PROPERTIES;
use cdsc_model::{NodeId, SchemaDocument};
use tracing::trace;

/// What kind of node a document path ends at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SiteKind {
    /// A reference: a `{ ref }` object or a plain string in a type-like position.
    Reference,
    /// A member declaration (element, enum symbol, parameter, action, mixin).
    Member,
    /// A top-level definition.
    Definition,
}

/// The outer reference that provides the environment of a nested one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BaseRef {
    /// A filter on segment `index` of the reference held at `path`.
    Segment { path: DocumentPath, index: usize },
    /// An `expand`/`inline` item below the column at `path`.
    Column { path: DocumentPath },
}

/// Everything resolution needs to know about the position of a reference.
#[derive(Clone, Debug)]
pub(crate) struct RefSite {
    pub kind: SiteKind,
    /// The node holding the reference (or the member/definition itself).
    pub holder: NodeId,
    pub context: RefContext,
    /// The top-level definition.
    pub main: NodeId,
    /// Scope index of the innermost enclosing query.
    pub query: Option<usize>,
    /// The member whose property holds the reference.
    pub member: Option<NodeId>,
    /// Structural parent of `member`.
    pub member_parent: Option<NodeId>,
    pub base: Option<BaseRef>,
}

/// Split a path into its definition and the remaining steps.
pub(crate) fn path_definition(doc: &SchemaDocument, path: &DocumentPath) -> Result<NodeId> {
    let Some(name) = path.definition_name() else {
        return Err(ResolveError::Model(ModelError::new(
            ModelErrorKind::InvalidPath,
            format!("`{path}` does not start with `definitions/<name>`"),
        )));
    };
    doc.definition(name).ok_or_else(|| {
        ResolveError::Model(
            ModelError::new(
                ModelErrorKind::UnknownDefinition,
                format!("no definition `{name}`"),
            )
            .with_name(name),
        )
    })
}

pub(crate) fn analyze(doc: &SchemaDocument, topology: &Topology, path: &DocumentPath) -> Result<RefSite> {
    let main = path_definition(doc, path)?;
    let mut walk = Walk {
        doc,
        topology,
        main,
        node: main,
        prefix: DocumentPath::definition(doc.definition_name(main).unwrap_or_default()),
        context: None,
        context_depth: 0,
        query: None,
        member: None,
        member_parent: None,
        structure: main,
        member_map: None,
        in_mixin: false,
        in_from: false,
        set_body: false,
        base: None,
        ref_holder: None,
        in_ref_array: false,
        segment: None,
        unknown_key: None,
    };

    for step in path.steps().iter().skip(2) {
        let Some(next) = doc.step(walk.node, step) else {
            return Err(ResolveError::Model(ModelError::new(
                ModelErrorKind::InvalidPath,
                format!("`{path}` leads nowhere at step `{step}`"),
            )));
        };
        walk.advance(step, next);
        walk.node = next;
        walk.prefix.push(step.clone());
    }

    let site = walk.finish(path)?;
    trace!(
        "[RESOLVE] site of {}: {:?} in {} (query {:?})",
        path,
        site.kind,
        site.context,
        site.query.map(|q| q + 1)
    );
    Ok(site)
}

struct Walk<'a> {
    doc: &'a SchemaDocument,
    topology: &'a Topology,
    main: NodeId,
    node: NodeId,
    prefix: DocumentPath,

    context: Option<RefContext>,
    /// Steps taken since `context` was last set.
    context_depth: usize,
    query: Option<usize>,

    member: Option<NodeId>,
    member_parent: Option<NodeId>,
    /// Innermost node that can own members.
    structure: NodeId,
    /// Set after stepping onto a member mapping: the mapping's property name.
    member_map: Option<&'static str>,
    in_mixin: bool,
    in_from: bool,
    set_body: bool,

    base: Option<BaseRef>,
    ref_holder: Option<(NodeId, DocumentPath)>,
    in_ref_array: bool,
    segment: Option<usize>,
    unknown_key: Option<String>,
}

impl<'a> Walk<'a> {
    fn set_context(&mut self, context: RefContext) {
        self.context = Some(context);
        self.context_depth = 0;
    }

    fn advance(&mut self, step: &PathStep, next: NodeId) {
        let at_segment = self.segment.take();
        let at_ref_array = std::mem::take(&mut self.in_ref_array);
        self.context_depth += 1;

        if let Some(index) = self.topology.query_of(next) {
            self.query = Some(index);
            self.context = None;
            self.base = None;
            self.ref_holder = None;
            self.member_map = None;
            self.in_from = false;
            self.in_mixin = false;
            self.set_body = self.doc.prop(self.node, "SET") == Some(next);
            self.structure = next;
            return;
        }

        match self.context {
            None => self.advance_structural(step, next),
            Some(context) => self.advance_expression(context, step, at_segment, at_ref_array),
        }
    }

    fn advance_structural(&mut self, step: &PathStep, next: NodeId) {
        if let Some(map) = self.member_map.take() {
            self.member_parent = Some(self.structure);
            self.member = Some(next);
            self.structure = next;
            self.in_mixin = map == "mixin";
            return;
        }
        let Some(key) = step.as_key() else {
            return;
        };
        let doc = self.doc;

        if let Some(map) = MEMBER_PROPERTIES.iter().copied().find(|p| *p == key) {
            if doc.is_object(next) {
                self.member_map = Some(map);
                return;
            }
        }

        let is_ref_like = doc.is_string(next) || doc.ref_path(next).is_some();
        match key {
            "type" => self.set_context(RefContext::Type),
            "includes" => self.set_context(RefContext::Includes),
            "target" if is_ref_like => self.set_context(RefContext::Target),
            "targetAspect" if is_ref_like => self.set_context(RefContext::TargetAspect),
            "target" | "targetAspect" | "returns" => self.structure = next,
            "items" => {}
            "keys" => self.set_context(RefContext::Keys),
            "on" => {
                let context = self.on_context();
                self.set_context(context);
            }
            "value" | "default" => self.set_context(RefContext::Value),
            _ if key.starts_with('@') => self.set_context(RefContext::Annotation),
            _ if self.query.is_some() => match key {
                "from" => {
                    self.in_from = true;
                    self.set_context(RefContext::From);
                }
                "columns" => self.set_context(RefContext::Columns),
                "where" => self.set_context(RefContext::Where),
                "having" => self.set_context(RefContext::Having),
                "groupBy" => self.set_context(RefContext::GroupBy),
                "orderBy" if self.set_body => self.set_context(RefContext::OrderBySet),
                "orderBy" => self.set_context(RefContext::OrderBy),
                "excluding" => self.set_context(RefContext::Excluding),
                // `args` of a SET leads to its arms.
                "args" => {}
                _ => self.unknown_key = Some(key.to_string()),
            },
            _ => self.unknown_key = Some(key.to_string()),
        }
    }

    fn advance_expression(
        &mut self,
        context: RefContext,
        step: &PathStep,
        at_segment: Option<usize>,
        at_ref_array: bool,
    ) {
        let key = match step {
            PathStep::Index(index) => {
                if at_ref_array {
                    self.segment = Some(*index);
                }
                return;
            }
            PathStep::Key(key) => key.as_str(),
        };

        if let Some(index) = at_segment {
            match key {
                "where" => {
                    if let Some((_, path)) = self.ref_holder.take() {
                        self.base = Some(BaseRef::Segment { path, index });
                    }
                    self.set_context(RefContext::RefWhere);
                }
                // Arguments keep the context of the reference they decorate.
                _ => self.ref_holder = None,
            }
            return;
        }

        match key {
            "ref" => {
                self.ref_holder = Some((self.node, self.prefix.clone()));
                self.in_ref_array = true;
            }
            "expand" | "inline" => {
                if self.doc.ref_path(self.node).is_some() {
                    self.base = Some(BaseRef::Column {
                        path: self.prefix.clone(),
                    });
                    self.set_context(if key == "expand" {
                        RefContext::Expand
                    } else {
                        RefContext::Inline
                    });
                }
            }
            "on" if self.in_from => self.set_context(RefContext::JoinOn),
            "type" => self.set_context(RefContext::Type),
            "xpr" | "args" | "list" => {
                let nested = context.nested_expression();
                if nested != context {
                    self.set_context(nested);
                }
            }
            _ if key.starts_with('@') => self.set_context(RefContext::Annotation),
            _ => {}
        }
    }

    /// Context of an `on` condition of the current member.
    fn on_context(&mut self) -> RefContext {
        if self.in_mixin {
            return RefContext::MixinOn;
        }
        let Some(parent) = self.member_parent else {
            return RefContext::On;
        };
        // Elements published by a query: the main query's are declared on
        // the definition itself.
        if let Some(index) = self.query {
            if self.topology.scope(index).is_some_and(|scope| {
                scope.select == parent || scope.elements_owner == Some(parent)
            }) {
                return RefContext::QueryOn;
            }
        } else if parent == self.main && !self.topology.is_empty() {
            self.query = Some(0);
            return RefContext::QueryOn;
        }
        RefContext::On
    }

    fn finish(self, path: &DocumentPath) -> Result<RefSite> {
        let doc = self.doc;
        let node = self.node;
        let site = |kind, holder, context| RefSite {
            kind,
            holder,
            context,
            main: self.main,
            query: self.query,
            member: self.member,
            member_parent: self.member_parent,
            base: self.base.clone(),
        };

        let Some(context) = self.context else {
            if node == self.main {
                return Ok(site(SiteKind::Definition, node, RefContext::Member));
            }
            if self.member == Some(node) {
                return Ok(site(SiteKind::Member, node, RefContext::Member));
            }
            if let Some(key) = &self.unknown_key {
                if doc.is_string(node) || doc.ref_path(node).is_some() {
                    return Err(ResolveError::Model(
                        ModelError::new(
                            ModelErrorKind::UnsupportedContext,
                            format!("no resolution rules for references below `{key}` (at `{path}`)"),
                        )
                        .with_name(key.clone()),
                    ));
                }
            }
            return Err(no_reference(path));
        };

        // A path into the `ref` array or one of its segments denotes the
        // whole reference.
        if self.segment.is_some() || self.in_ref_array {
            if let Some((holder, _)) = &self.ref_holder {
                return Ok(site(SiteKind::Reference, *holder, context));
            }
        }
        if doc.ref_path(node).is_some() {
            return Ok(site(SiteKind::Reference, node, context));
        }
        let bare_name_context = matches!(
            context,
            RefContext::Type
                | RefContext::Includes
                | RefContext::Target
                | RefContext::TargetAspect
                | RefContext::Excluding
        );
        if bare_name_context && self.context_depth <= 1 && doc.as_str(node).is_some_and(|s| s != "*") {
            return Ok(site(SiteKind::Reference, node, context));
        }
        Err(no_reference(path))
    }
}

fn no_reference(path: &DocumentPath) -> ResolveError {
    ResolveError::Model(ModelError::new(
        ModelErrorKind::InvalidReference,
        format!("no reference at `{path}`"),
    ))
}
