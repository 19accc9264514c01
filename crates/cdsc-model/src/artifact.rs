//! Typed views over definitions and members.
//!
//! Definitions and members share one set of structural facts (`elements`,
//! `target`, `items`, `enum`, `type`, ...). Instead of probing raw
//! properties at every call site, consumers go through [`StructuralFacts`].

use crate::document::SchemaDocument;
use crate::node::NodeId;
use std::fmt;

/// The `kind` of a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Entity,
    Aspect,
    Type,
    Action,
    Function,
    Event,
    Context,
    Service,
    Annotation,
    Element,
    Other,
}

impl DefinitionKind {
    pub fn from_kind(kind: &str) -> DefinitionKind {
        match kind {
            "entity" => DefinitionKind::Entity,
            "aspect" => DefinitionKind::Aspect,
            "type" => DefinitionKind::Type,
            "action" => DefinitionKind::Action,
            "function" => DefinitionKind::Function,
            "event" => DefinitionKind::Event,
            "context" => DefinitionKind::Context,
            "service" => DefinitionKind::Service,
            "annotation" => DefinitionKind::Annotation,
            "element" => DefinitionKind::Element,
            _ => DefinitionKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Entity => "entity",
            DefinitionKind::Aspect => "aspect",
            DefinitionKind::Type => "type",
            DefinitionKind::Action => "action",
            DefinitionKind::Function => "function",
            DefinitionKind::Event => "event",
            DefinitionKind::Context => "context",
            DefinitionKind::Service => "service",
            DefinitionKind::Annotation => "annotation",
            DefinitionKind::Element => "element",
            DefinitionKind::Other => "artifact",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties holding named members of a definition or member.
pub const MEMBER_PROPERTIES: &[&str] = &["elements", "enum", "params", "actions", "mixin"];

/// Structural facts a definition or member may own.
///
/// Every accessor returns the node holding the fact, or `None` when the node
/// does not declare it directly. Inherited facts are the resolver's business.
pub trait StructuralFacts {
    fn elements(&self) -> Option<NodeId>;
    fn target(&self) -> Option<NodeId>;
    fn target_aspect(&self) -> Option<NodeId>;
    fn items(&self) -> Option<NodeId>;
    fn enum_symbols(&self) -> Option<NodeId>;
    /// `type`: a definition name or a `{ ref: [...] }` type-of reference.
    fn type_ref(&self) -> Option<NodeId>;
    /// `$origin`: explicit derived-from marker.
    fn origin_ref(&self) -> Option<NodeId>;
    fn params(&self) -> Option<NodeId>;
    fn actions(&self) -> Option<NodeId>;

    /// Whether the node owns one of the facts that stop an effective-type walk.
    fn has_intrinsic_structure(&self) -> bool {
        self.elements().is_some()
            || self.target().is_some()
            || self.target_aspect().is_some()
            || self.enum_symbols().is_some()
            || self.items().is_some()
    }
}

/// A definition or member node seen through its structural facts.
#[derive(Clone, Copy)]
pub struct Artifact<'a> {
    doc: &'a SchemaDocument,
    id: NodeId,
}

impl<'a> Artifact<'a> {
    pub fn new(doc: &'a SchemaDocument, id: NodeId) -> Self {
        Artifact { doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> Option<DefinitionKind> {
        self.doc.prop_str(self.id, "kind").map(DefinitionKind::from_kind)
    }

    /// The query of a view-like definition; a `projection` counts as a query.
    pub fn query(&self) -> Option<NodeId> {
        self.doc
            .prop(self.id, "query")
            .or_else(|| self.doc.prop(self.id, "projection"))
    }

    /// Whether the query is given as `projection` (i.e. is the `SELECT` body itself).
    pub fn is_projection(&self) -> bool {
        !self.doc.has_prop(self.id, "query") && self.doc.has_prop(self.id, "projection")
    }

    /// Named member `name` of the `elements` mapping.
    pub fn element(&self, name: &str) -> Option<NodeId> {
        self.doc.prop(self.elements()?, name)
    }

    fn object_prop(&self, key: &str) -> Option<NodeId> {
        self.doc.prop(self.id, key).filter(|id| self.doc.is_object(*id))
    }
}

impl StructuralFacts for Artifact<'_> {
    fn elements(&self) -> Option<NodeId> {
        self.object_prop("elements")
    }

    fn target(&self) -> Option<NodeId> {
        self.doc.prop(self.id, "target")
    }

    fn target_aspect(&self) -> Option<NodeId> {
        self.doc.prop(self.id, "targetAspect")
    }

    fn items(&self) -> Option<NodeId> {
        self.object_prop("items")
    }

    fn enum_symbols(&self) -> Option<NodeId> {
        self.object_prop("enum")
    }

    fn type_ref(&self) -> Option<NodeId> {
        self.doc.prop(self.id, "type")
    }

    fn origin_ref(&self) -> Option<NodeId> {
        self.doc.prop(self.id, "$origin")
    }

    fn params(&self) -> Option<NodeId> {
        self.object_prop("params")
    }

    fn actions(&self) -> Option<NodeId> {
        self.object_prop("actions")
    }
}

// =============================================================================
// Reference shapes
// =============================================================================

impl SchemaDocument {
    pub fn artifact(&self, id: NodeId) -> Artifact<'_> {
        Artifact::new(self, id)
    }

    /// The `ref` array of a reference object.
    pub fn ref_path(&self, id: NodeId) -> Option<NodeId> {
        self.prop(id, "ref").filter(|r| self.is_array(*r))
    }

    /// Name of one reference segment: a plain string or `{ id, ... }`.
    pub fn segment_name(&self, segment: NodeId) -> Option<&str> {
        self.as_str(segment).or_else(|| self.prop_str(segment, "id"))
    }

    /// Whether a segment is a plain name without filter/argument decorations.
    pub fn is_plain_segment(&self, segment: NodeId) -> bool {
        self.is_string(segment)
    }

    /// Whether `id` is a query node (`{ SELECT }` or `{ SET }`).
    pub fn is_query(&self, id: NodeId) -> bool {
        self.has_prop(id, "SELECT") || self.has_prop(id, "SET")
    }
}

/// Built-in scalar and association types that are not document definitions.
const BUILTIN_TYPES: &[&str] = &[
    "UUID",
    "Boolean",
    "Integer",
    "Int16",
    "Int32",
    "Int64",
    "UInt8",
    "Decimal",
    "Double",
    "Date",
    "Time",
    "DateTime",
    "Timestamp",
    "String",
    "LargeString",
    "Binary",
    "LargeBinary",
    "Vector",
    "Map",
    "Association",
    "Composition",
];

/// Whether `name` denotes a built-in type (`cds.Integer`, `Integer`, `hana.TINYINT`, ...).
pub fn is_builtin_type(name: &str) -> bool {
    name.starts_with("cds.") || name.starts_with("hana.") || BUILTIN_TYPES.contains(&name)
}
