#![deny(missing_docs)]

//! # Reference Resolution
//!
//! Stateless dereferencing of `$ref` pointers across loaded documents.
//!
//! Pointers take the forms `#/local/pointer`, `externalLocation#/pointer` or a
//! bare `externalLocation`. By the time the pipeline runs, the loader has
//! rewritten every external part to a canonical location key, so lookups are
//! plain registry hits.

use crate::document::{Document, ReferenceRegistry};
use crate::error::{ReferenceError, ReferenceResult};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of resolving a node.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// The dereferenced node, or the input when it held no pointer.
    pub object: &'a Value,
    /// The document that owns `object`.
    pub document: &'a Arc<Document>,
    /// `true` when the input had no `$ref` and was returned unchanged.
    pub was_identity: bool,
}

/// Returns the `$ref` string of a node, if present.
pub fn pointer(node: &Value) -> Option<&str> {
    node.get("$ref").and_then(Value::as_str)
}

/// Resolves `node` against `current` and the registry.
///
/// Safe to call repeatedly and recursively; nothing is cached or mutated.
///
/// # Errors
///
/// * `ReferenceError::MissingDocument` when the external part is not loaded.
/// * `ReferenceError::MissingSegment` naming the exact failing pointer prefix.
pub fn resolve<'a>(
    node: &'a Value,
    current: &'a Arc<Document>,
    registry: &'a ReferenceRegistry,
) -> ReferenceResult<Resolved<'a>> {
    let Some(reference) = pointer(node) else {
        return Ok(Resolved {
            object: node,
            document: current,
            was_identity: true,
        });
    };

    let (object, document) = dereference(reference, current, registry)?;
    Ok(Resolved {
        object,
        document,
        was_identity: false,
    })
}

/// Dereferences a pointer string against `current` and the registry.
///
/// The result borrows only the documents, never the node the pointer came
/// from.
pub fn dereference<'a>(
    reference: &str,
    current: &'a Arc<Document>,
    registry: &'a ReferenceRegistry,
) -> ReferenceResult<(&'a Value, &'a Arc<Document>)> {
    let (external, fragment) = match reference.split_once('#') {
        Some((external, fragment)) => (external, fragment),
        None => (reference, ""),
    };

    let document = if external.is_empty() {
        current
    } else {
        registry
            .get(external)
            .ok_or_else(|| ReferenceError::MissingDocument {
                location: external.to_string(),
            })?
    };

    let object = walk(&document.root, fragment, &document.location)?;
    Ok((object, document))
}

/// Walks a JSON pointer fragment from `root`.
///
/// Leading separators are stripped; an empty fragment yields `root`.
pub fn walk<'a>(root: &'a Value, fragment: &str, location: &str) -> ReferenceResult<&'a Value> {
    let trimmed = fragment.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root);
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    let mut data = root;
    for (index, raw) in segments.iter().enumerate() {
        let segment = decode_pointer_segment(raw);
        let next = match data {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        data = next.ok_or_else(|| ReferenceError::MissingSegment {
            path: segments[..=index].join("/"),
            location: location.to_string(),
        })?;
    }
    Ok(data)
}

/// Decodes a JSON Pointer segment (handles `~1`, `~0` and percent encoding).
pub fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded)
        .decode_utf8_lossy()
        .into_owned()
}

/// Returns the last section of a pointer.
///
/// e.g. `#/definitions/Pet` -> `Pet`
pub fn reference_name(reference: &str) -> &str {
    let trimmed = reference.trim_start_matches('#');
    match trimmed.rfind('/') {
        Some(slash) => &trimmed[slash + 1..],
        None => trimmed,
    }
}

/// Extracts the model name from a pointer, dropping any file extension.
///
/// e.g. `/specs/pet.yaml` -> `pet`, `other.json#/definitions/Error` -> `Error`
pub fn model_name(reference: &str) -> String {
    let name = reference_name(reference);
    let name = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    decode_pointer_segment(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with(doc: Arc<Document>) -> ReferenceRegistry {
        let mut registry = ReferenceRegistry::new();
        registry.sub.insert(doc.location.clone(), doc);
        registry
    }

    #[test]
    fn test_no_pointer_is_identity() {
        let current = Arc::new(Document::new("/a.yaml", json!({})));
        let registry = ReferenceRegistry::new();
        let node = json!({ "type": "string" });

        let resolved = resolve(&node, &current, &registry).unwrap();
        assert!(resolved.was_identity);
        assert!(std::ptr::eq(resolved.object, &node));
        assert!(Arc::ptr_eq(resolved.document, &current));
    }

    #[test]
    fn test_local_pointer() {
        let current = Arc::new(Document::new(
            "/a.yaml",
            json!({ "definitions": { "Pet": { "type": "object" } } }),
        ));
        let registry = ReferenceRegistry::new();
        let node = json!({ "$ref": "#/definitions/Pet" });

        let resolved = resolve(&node, &current, &registry).unwrap();
        assert!(!resolved.was_identity);
        assert_eq!(resolved.object, &json!({ "type": "object" }));
    }

    #[test]
    fn test_external_pointer_switches_document() {
        let current = Arc::new(Document::new("/a.yaml", json!({})));
        let other = Arc::new(Document::new(
            "/b.yaml",
            json!({ "tagsParam": { "name": "tags", "in": "query" } }),
        ));
        let registry = registry_with(Arc::clone(&other));
        let node = json!({ "$ref": "/b.yaml#/tagsParam" });

        let resolved = resolve(&node, &current, &registry).unwrap();
        assert_eq!(resolved.object["name"], "tags");
        assert!(Arc::ptr_eq(resolved.document, &other));
    }

    #[test]
    fn test_bare_external_returns_root() {
        let current = Arc::new(Document::new("/a.yaml", json!({})));
        let other = Arc::new(Document::new("/pet.yaml", json!({ "type": "object" })));
        let registry = registry_with(other);
        let node = json!({ "$ref": "/pet.yaml" });

        let resolved = resolve(&node, &current, &registry).unwrap();
        assert_eq!(resolved.object, &json!({ "type": "object" }));
    }

    #[test]
    fn test_missing_document_is_named() {
        let current = Arc::new(Document::new("/a.yaml", json!({})));
        let registry = ReferenceRegistry::new();
        let node = json!({ "$ref": "/missing.yaml#/x" });

        let err = resolve(&node, &current, &registry).unwrap_err();
        assert_eq!(
            err,
            ReferenceError::MissingDocument {
                location: "/missing.yaml".into()
            }
        );
    }

    #[test]
    fn test_missing_segment_names_failing_prefix() {
        let current = Arc::new(Document::new(
            "/a.yaml",
            json!({ "definitions": { "Pet": {} } }),
        ));
        let registry = ReferenceRegistry::new();
        let node = json!({ "$ref": "#/definitions/Dog/properties" });

        let err = resolve(&node, &current, &registry).unwrap_err();
        assert_eq!(
            err,
            ReferenceError::MissingSegment {
                path: "definitions/Dog".into(),
                location: "/a.yaml".into()
            }
        );
    }

    #[test]
    fn test_walk_arrays_and_escapes() {
        let root = json!({ "paths": { "/pets/{id}": { "parameters": [ { "name": "id" } ] } } });
        let found = walk(&root, "/paths/~1pets~1{id}/parameters/0", "x").unwrap();
        assert_eq!(found["name"], "id");
    }

    #[test]
    fn test_model_names() {
        assert_eq!(model_name("#/definitions/Pet"), "Pet");
        assert_eq!(model_name("/specs/pet.yaml"), "pet");
        assert_eq!(model_name("/specs/common.yaml#/definitions/Error"), "Error");
        assert_eq!(reference_name("#Pet"), "Pet");
    }
}
