//! Reference enumeration.
//!
//! Lists the document path of every reference inside one definition, in
//! document order, so callers can inspect all of them.

use cdsc_common::{DocumentPath, PathStep};
use cdsc_model::{NodeId, SchemaDocument, Value, is_builtin_type};

/// Properties whose plain string values name a definition.
const NAME_PROPERTIES: &[&str] = &["type", "target", "targetAspect"];

/// Paths of all references inside `definition`.
///
/// References are `{ ref }` objects, definition names in `type`, `target`,
/// `targetAspect` and `includes`, and element names in `excluding`. Built-in
/// type names are not references into the document and are skipped.
pub fn collect_ref_paths(doc: &SchemaDocument, definition: NodeId) -> Vec<DocumentPath> {
    let mut paths = Vec::new();
    let mut path = doc.path_of(definition);
    visit(doc, definition, &mut path, &mut paths);
    paths
}

fn visit(doc: &SchemaDocument, node: NodeId, path: &mut DocumentPath, out: &mut Vec<DocumentPath>) {
    match doc.value(node) {
        Some(Value::Array(items)) => {
            for (index, &item) in items.iter().enumerate() {
                path.push(index);
                visit(doc, item, path, out);
                path.pop();
            }
        }
        Some(Value::Object(props)) => {
            if let Some(ref_path) = doc.ref_path(node) {
                if doc.array(ref_path).is_some_and(|segments| !segments.is_empty()) {
                    out.push(path.clone());
                }
                // Filters and arguments of segments hold references of their own.
                for (index, segment) in doc.items(ref_path).enumerate() {
                    for key in ["args", "where"] {
                        if let Some(expr) = doc.prop(segment, key) {
                            path.push("ref");
                            path.push(index);
                            path.push(key);
                            visit(doc, expr, path, out);
                            path.pop();
                            path.pop();
                            path.pop();
                        }
                    }
                }
            }

            for (key, &child) in props {
                if key == "ref" || key.starts_with('$') {
                    continue;
                }
                path.push(PathStep::key(key.as_str()));
                if NAME_PROPERTIES.contains(&key.as_str()) && doc.is_string(child) {
                    if doc.as_str(child).is_some_and(|name| !is_builtin_type(name)) {
                        out.push(path.clone());
                    }
                } else if key == "includes" || key == "excluding" {
                    for (index, item) in doc.items(child).enumerate() {
                        if doc.is_string(item) {
                            out.push(path.child(index));
                        } else {
                            path.push(index);
                            visit(doc, item, path, out);
                            path.pop();
                        }
                    }
                } else {
                    visit(doc, child, path, out);
                }
                path.pop();
            }
        }
        _ => {}
    }
}
