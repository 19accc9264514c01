//! Arena nodes.

use cdsc_common::PathStep;
use indexmap::IndexMap;
use serde::Serialize;

/// Handle of a node in a [`SchemaDocument`](crate::SchemaDocument) arena.
///
/// Only valid for the document that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    pub fn into_option(self) -> Option<NodeId> {
        if self.is_none() { None } else { Some(self) }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::NONE
    }
}

/// JSON-shaped payload of a node. Children are stored as handles.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<NodeId>),
    /// Property order is preserved; `elements` and `enum` are ordered mappings.
    Object(IndexMap<String, NodeId>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// One arena slot.
#[derive(Clone, Debug)]
pub struct Node {
    pub value: Value,
    /// The JSON container holding this node (`NodeId::NONE` for the root).
    pub container: NodeId,
    /// How this node is reached from its container.
    pub step: Option<PathStep>,
}
