//! Debug rendering of the cached facts of one definition.

use crate::cache::{
    CacheKey, ColumnKey, EffectiveTypeKey, ElementKey, OriginKey, ParentKey, QueryIndexKey,
    ResolutionKey, TypeState,
};
use crate::error::Result;
use crate::session::Resolver;
use crate::topology::AliasBinding;
use cdsc_model::NodeId;
use serde_json::{Map, Value, json};

impl Resolver<'_> {
    /// JSON snapshot of the query topology and every cached fact owned by
    /// `definition`. Initializes the definition if needed.
    pub fn debug_snapshot(&self, definition: NodeId) -> Result<Value> {
        let topology = self.init_definition(definition)?;
        let doc = self.doc;
        let path = |node: NodeId| Value::String(doc.path_of(node).to_string());

        let queries: Vec<Value> = topology
            .queries
            .iter()
            .map(|scope| {
                let aliases: Map<String, Value> = scope
                    .aliases
                    .iter()
                    .map(|(name, binding)| {
                        let value = match binding {
                            AliasBinding::Ref { from } => json!({ "ref": path(*from) }),
                            AliasBinding::Query { query, .. } => json!({ "query": query + 1 }),
                        };
                        (name.clone(), value)
                    })
                    .collect();
                let mixins: Map<String, Value> = scope
                    .mixins
                    .iter()
                    .map(|(name, mixin)| (name.clone(), path(*mixin)))
                    .collect();
                json!({
                    "number": scope.number,
                    "node": path(scope.node),
                    "next": scope.next.map(|next| next + 1),
                    "elements": scope.elements_owner.map(path),
                    "aliases": aliases,
                    "mixins": mixins,
                })
            })
            .collect();

        let cache = self.cache.borrow();
        let mut entries = Map::new();
        for &node in cache.owned_nodes(definition) {
            let mut facts = Map::new();
            if let Some(parent) = cache.get::<ParentKey>(node) {
                facts.insert(ParentKey::NAME.to_string(), path(parent));
            }
            if let Some(origin) = cache.get::<OriginKey>(node) {
                facts.insert(OriginKey::NAME.to_string(), origin.map_or(Value::Null, path));
            }
            if let Some(TypeState::Done(ty)) = cache.get::<EffectiveTypeKey>(node) {
                facts.insert(EffectiveTypeKey::NAME.to_string(), path(ty));
            }
            if let Some(index) = cache.get::<QueryIndexKey>(node) {
                facts.insert(QueryIndexKey::NAME.to_string(), json!(index + 1));
            }
            if let Some(element) = cache.get::<ElementKey>(node) {
                facts.insert(ElementKey::NAME.to_string(), path(element));
            }
            if let Some(column) = cache.get::<ColumnKey>(node) {
                facts.insert(ColumnKey::NAME.to_string(), path(column));
            }
            if let Some(resolution) = cache.get::<ResolutionKey>(node) {
                facts.insert(ResolutionKey::NAME.to_string(), resolution.describe(doc));
            }
            if !facts.is_empty() {
                entries.insert(doc.path_of(node).to_string(), Value::Object(facts));
            }
        }

        Ok(json!({
            "definition": doc.definition_name(definition),
            "queries": queries,
            "entries": entries,
        }))
    }
}
