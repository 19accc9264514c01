//! Semantic-Location Mapper.
//!
//! Turns a document path into a human-oriented description
//! (`entity:"Books"/element:"genre"/on`) plus the most specific source
//! location found along the path. Nodes without a `$location` of their own
//! (inferred members, generated columns) fall back to the nearest ancestor's.

use crate::cache::TopologyKey;
use crate::error::{ModelError, ModelErrorKind, ResolveError, Result};
use crate::session::Resolver;
use crate::topology::{Topology, build_topology, column_name};
use cdsc_common::{DocumentPath, Location, PathStep};
use cdsc_model::NodeId;
use cdsc_model::artifact::MEMBER_PROPERTIES;
use std::rc::Rc;

/// Keys below which the path continues in a structure, not an expression.
const STRUCTURAL_KEYS: &[&str] = &["items", "returns", "targetAspect", "target"];

impl Resolver<'_> {
    /// Best source location and semantic description of `path`.
    ///
    /// Does not populate the cache: without a cached topology for the
    /// definition, query numbers come from a throwaway build.
    pub fn msg_locations(&self, path: &DocumentPath) -> Result<(Option<Location>, String)> {
        let doc = self.doc;
        let definition = path
            .definition_name()
            .and_then(|name| doc.definition(name))
            .ok_or_else(|| {
                ResolveError::Model(ModelError::new(
                    ModelErrorKind::InvalidPath,
                    format!("`{path}` does not lead into a definition"),
                ))
            })?;

        let cached = self.cache.borrow().get::<TopologyKey>(definition);
        let topology: Option<Rc<Topology>> = cached.or_else(|| {
            build_topology(doc, definition, &self.options)
                .ok()
                .map(|build| Rc::new(build.topology))
        });

        let kind = doc
            .artifact(definition)
            .kind()
            .map_or("artifact", |kind| kind.as_str());
        let mut parts = vec![format!(
            "{kind}:{}",
            quoted(doc.definition_name(definition).unwrap_or_default())
        )];
        let mut best = doc.location(definition);

        let mut node = definition;
        let mut member_map: Option<&str> = None;
        let mut in_columns = false;
        let mut in_expression = false;
        let mut last_query = None;

        for step in path.steps().iter().skip(2) {
            let Some(next) = doc.step(node, step) else {
                break;
            };

            if let Some(map) = member_map.take() {
                parts.push(format!("{}:{}", member_label(map), quoted(&step.to_string())));
            } else if let Some(index) = topology.as_ref().and_then(|t| t.query_of(next)) {
                let number = index + 1;
                if last_query != Some(number) {
                    parts.push(format!("query:{number}"));
                    last_query = Some(number);
                }
                in_expression = false;
                in_columns = false;
            } else if in_columns {
                in_columns = false;
                in_expression = true;
                parts.push(column_label(doc, next, step));
            } else if !in_expression {
                match step {
                    PathStep::Key(key) if MEMBER_PROPERTIES.contains(&key.as_str()) && doc.is_object(next) => {
                        member_map = MEMBER_PROPERTIES.iter().copied().find(|p| *p == key.as_str());
                    }
                    PathStep::Key(key) if key == "columns" => in_columns = true,
                    PathStep::Key(key) if key == "SELECT" || key == "SET" || key == "args" => {}
                    PathStep::Key(key) if STRUCTURAL_KEYS.contains(&key.as_str()) && doc.is_object(next) => {
                        parts.push(key.clone());
                    }
                    PathStep::Key(key) => {
                        parts.push(key.clone());
                        in_expression = true;
                    }
                    PathStep::Index(_) => {}
                }
            }

            if let Some(location) = doc.location(next) {
                best = Some(location);
            }
            node = next;
        }

        Ok((best, parts.join("/")))
    }

    /// The `$location` of `node` or of its nearest ancestor carrying one.
    pub fn nearest_location(&self, node: NodeId) -> Option<Location> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(location) = self.doc.location(id) {
                return Some(location);
            }
            current = self.doc.container(id);
        }
        None
    }
}

fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}

fn member_label(map: &str) -> &'static str {
    match map {
        "elements" => "element",
        "enum" => "enum",
        "params" => "param",
        "actions" => "action",
        "mixin" => "mixin",
        _ => "member",
    }
}

fn column_label(doc: &cdsc_model::SchemaDocument, column: NodeId, step: &PathStep) -> String {
    match column_name(doc, column) {
        Some(name) => format!("column:{}", quoted(&name)),
        None => match step {
            PathStep::Index(index) => format!("column:{}", index + 1),
            PathStep::Key(key) => format!("column:{}", quoted(key)),
        },
    }
}
