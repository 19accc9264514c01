//! Schema document arena.
//!
//! Nodes are allocated in pre-order while loading, so `NodeId` order equals
//! document order. Each node remembers its JSON container and the step
//! leading to it, which makes `path_of` a walk to the root.

use crate::error::LoadError;
use crate::node::{Node, NodeId, Value};
use cdsc_common::{DocumentPath, Location, PathStep};
use indexmap::IndexMap;
use tracing::debug;

/// Arena-based storage for a compiled schema document.
#[derive(Debug)]
pub struct SchemaDocument {
    nodes: Vec<Node>,
    root: NodeId,
    definitions: NodeId,
}

impl SchemaDocument {
    /// Parse a compiled schema document from JSON text.
    pub fn from_json_str(text: &str) -> Result<SchemaDocument, LoadError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        SchemaDocument::from_value(value)
    }

    /// Build the arena from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<SchemaDocument, LoadError> {
        if !value.is_object() {
            return Err(LoadError::NotAnObject {
                found: json_type_name(&value),
            });
        }

        let mut doc = SchemaDocument {
            nodes: Vec::new(),
            root: NodeId::NONE,
            definitions: NodeId::NONE,
        };
        doc.root = doc.alloc(value, NodeId::NONE, None);

        doc.definitions = match doc.prop(doc.root, "definitions") {
            Some(defs) if doc.is_object(defs) => defs,
            _ => return Err(LoadError::MissingDefinitions),
        };

        debug!(
            "[MODEL] loaded schema document: {} nodes, {} definitions",
            doc.nodes.len(),
            doc.entries(doc.definitions).count()
        );
        Ok(doc)
    }

    fn alloc(&mut self, value: serde_json::Value, container: NodeId, step: Option<PathStep>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            value: Value::Null,
            container,
            step,
        });

        let value = match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.alloc(item, id, Some(PathStep::Index(i))))
                    .collect(),
            ),
            serde_json::Value::Object(map) => {
                let mut props = IndexMap::with_capacity(map.len());
                for (key, item) in map {
                    let child = self.alloc(item, id, Some(PathStep::Key(key.clone())));
                    props.insert(key, child);
                }
                Value::Object(props)
            }
        };
        self.nodes[id.0 as usize].value = value;
        id
    }

    // =========================================================================
    // Basic access
    // =========================================================================

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            None
        } else {
            self.nodes.get(id.0 as usize)
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&Value> {
        self.node(id).map(|node| &node.value)
    }

    pub fn object(&self, id: NodeId) -> Option<&IndexMap<String, NodeId>> {
        match self.value(id)? {
            Value::Object(props) => Some(props),
            _ => None,
        }
    }

    pub fn array(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.value(id)? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self, id: NodeId) -> Option<&str> {
        match self.value(id)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self, id: NodeId) -> Option<bool> {
        match self.value(id)? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_object(&self, id: NodeId) -> bool {
        self.object(id).is_some()
    }

    pub fn is_array(&self, id: NodeId) -> bool {
        self.array(id).is_some()
    }

    pub fn is_string(&self, id: NodeId) -> bool {
        self.as_str(id).is_some()
    }

    /// Property `key` of an object node.
    pub fn prop(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.object(id)?.get(key).copied()
    }

    pub fn has_prop(&self, id: NodeId, key: &str) -> bool {
        self.prop(id, key).is_some()
    }

    /// String value of property `key`.
    pub fn prop_str(&self, id: NodeId, key: &str) -> Option<&str> {
        self.as_str(self.prop(id, key)?)
    }

    /// Item `idx` of an array node.
    pub fn index(&self, id: NodeId, idx: usize) -> Option<NodeId> {
        self.array(id)?.get(idx).copied()
    }

    /// Properties of an object node in document order; empty for other nodes.
    pub fn entries(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.object(id)
            .into_iter()
            .flat_map(|props| props.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Items of an array node; empty for other nodes.
    pub fn items(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.array(id).into_iter().flat_map(|items| items.iter().copied())
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// The `definitions` object node.
    pub fn definitions_node(&self) -> NodeId {
        self.definitions
    }

    /// Top-level definitions in document order.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.entries(self.definitions)
    }

    pub fn definition(&self, name: &str) -> Option<NodeId> {
        self.prop(self.definitions, name)
    }

    /// Whether `id` is one of the top-level definitions.
    pub fn is_definition(&self, id: NodeId) -> bool {
        self.node(id)
            .is_some_and(|node| node.container == self.definitions && id.is_some())
    }

    /// Name of a top-level definition node.
    pub fn definition_name(&self, id: NodeId) -> Option<&str> {
        if !self.is_definition(id) {
            return None;
        }
        self.node(id)?.step.as_ref()?.as_key()
    }

    /// The top-level definition containing `id` (or `id` itself).
    pub fn owning_definition(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        while current.is_some() {
            if self.is_definition(current) {
                return Some(current);
            }
            current = self.container(current)?;
        }
        None
    }

    // =========================================================================
    // Paths
    // =========================================================================

    pub fn container(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.container.into_option()
    }

    pub fn step_of(&self, id: NodeId) -> Option<&PathStep> {
        self.node(id)?.step.as_ref()
    }

    /// The document path leading from the root to `id`.
    pub fn path_of(&self, id: NodeId) -> DocumentPath {
        let mut steps = Vec::new();
        let mut current = id;
        while let Some(node) = self.node(current) {
            match &node.step {
                Some(step) => steps.push(step.clone()),
                None => break,
            }
            current = node.container;
        }
        steps.into_iter().rev().collect()
    }

    /// The node reached by following `path` from the root.
    ///
    /// Index steps on objects are looked up as property names, so `elements/0`
    /// finds an element literally called `0`.
    pub fn node_at(&self, path: &DocumentPath) -> Option<NodeId> {
        path.iter().try_fold(self.root, |current, step| self.step(current, step))
    }

    /// Follow one path step from `id`.
    pub fn step(&self, id: NodeId, step: &PathStep) -> Option<NodeId> {
        match (self.value(id)?, step) {
            (Value::Object(props), PathStep::Key(key)) => props.get(key).copied(),
            (Value::Object(props), PathStep::Index(idx)) => props.get(&idx.to_string()).copied(),
            (Value::Array(items), PathStep::Index(idx)) => items.get(*idx).copied(),
            _ => None,
        }
    }

    // =========================================================================
    // Locations
    // =========================================================================

    /// The node's own `$location`, if it has a usable one.
    pub fn location(&self, id: NodeId) -> Option<Location> {
        let loc = self.prop(id, "$location")?;
        let file = self.prop_str(loc, "file")?;
        let number = |key: &str| -> Option<u32> {
            match self.value(self.prop(loc, key)?)? {
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                _ => None,
            }
        };
        Some(Location {
            file: file.to_string(),
            line: number("line"),
            col: number("col"),
            end_line: number("endLine"),
            end_col: number("endCol"),
        })
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Re-materialize the subtree at `id` as JSON.
    pub fn to_json(&self, id: NodeId) -> serde_json::Value {
        match self.value(id) {
            None | Some(Value::Null) => serde_json::Value::Null,
            Some(Value::Bool(b)) => serde_json::Value::Bool(*b),
            Some(Value::Number(n)) => serde_json::Value::Number(n.clone()),
            Some(Value::String(s)) => serde_json::Value::String(s.clone()),
            Some(Value::Array(items)) => {
                serde_json::Value::Array(items.iter().map(|item| self.to_json(*item)).collect())
            }
            Some(Value::Object(props)) => serde_json::Value::Object(
                props
                    .iter()
                    .map(|(key, child)| (key.clone(), self.to_json(*child)))
                    .collect(),
            ),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
