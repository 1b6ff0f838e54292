#![deny(missing_docs)]

//! # Documents & Reference Registry
//!
//! Parsed specification documents and the registry the loader builds for
//! them. Both are immutable once loading completes and are shared through
//! `Arc` for the rest of a generation run.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One parsed input specification (root or referenced).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Canonical location key.
    pub location: String,
    /// Parsed content, with external `$ref`s rewritten to canonical locations.
    pub root: Value,
}

impl Document {
    /// Creates a document.
    pub fn new(location: impl Into<String>, root: Value) -> Self {
        Self {
            location: location.into(),
            root,
        }
    }

    /// The `paths` object, if any.
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(Value::as_object)
    }

    /// Top-level schema definitions.
    ///
    /// Swagger `definitions`, falling back to OpenAPI 3 `components.schemas`.
    pub fn definitions(&self) -> Option<&Map<String, Value>> {
        self.root
            .get("definitions")
            .and_then(Value::as_object)
            .or_else(|| {
                self.root
                    .get("components")
                    .and_then(|c| c.get("schemas"))
                    .and_then(Value::as_object)
            })
    }

    /// Swagger `basePath`.
    pub fn base_path(&self) -> Option<&str> {
        self.root.get("basePath").and_then(Value::as_str)
    }

    /// Default request media types.
    pub fn consumes(&self) -> Vec<String> {
        string_list(self.root.get("consumes"))
    }

    /// Default response media types.
    pub fn produces(&self) -> Vec<String> {
        string_list(self.root.get("produces"))
    }

    /// The raw `openapi` / `swagger` marker as text.
    pub fn version(&self) -> Option<String> {
        version_marker(&self.root)
    }

    /// Major version of the marker (`"2.0"` -> 2, `"3.0.1"` -> 3).
    pub fn major_version(&self) -> Option<u64> {
        major_version(&self.root)
    }
}

fn version_marker(root: &Value) -> Option<String> {
    let marker = root.get("openapi").or_else(|| root.get("swagger"))?;
    match marker {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Leading integer of a parsed document's `openapi` / `swagger` marker.
pub fn major_version(root: &Value) -> Option<u64> {
    let version = version_marker(root)?;
    let digits: String = version
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Documents produced by one `Loader::load` call.
///
/// `top` holds the documents explicitly requested by the caller, `sub` the
/// documents discovered transitively through external pointers. Keys are
/// canonical locations and every location appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceRegistry {
    /// Requested roots, in request order.
    pub top: IndexMap<String, Arc<Document>>,
    /// Discovered documents, ordered by canonical location.
    pub sub: IndexMap<String, Arc<Document>>,
}

impl ReferenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a location up in `sub`, then in `top`.
    pub fn get(&self, location: &str) -> Option<&Arc<Document>> {
        self.sub.get(location).or_else(|| self.top.get(location))
    }

    /// All documents, roots first.
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.top.values().chain(self.sub.values())
    }

    /// Total number of documents.
    pub fn len(&self) -> usize {
        self.top.len() + self.sub.len()
    }

    /// Whether nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.sub.is_empty()
    }
}

/// The result of a load: the roots plus the registry covering every document.
#[derive(Debug, Clone)]
pub struct LoadedSpecs {
    /// Root documents in the order they were requested.
    pub roots: Vec<Arc<Document>>,
    /// Registry of roots and transitively referenced documents.
    pub references: Arc<ReferenceRegistry>,
}

impl LoadedSpecs {
    /// Builds a single-document set with no external references.
    ///
    /// Useful when the document was obtained without the loader.
    pub fn from_document(document: Document) -> Self {
        let doc = Arc::new(document);
        let mut registry = ReferenceRegistry::new();
        registry.top.insert(doc.location.clone(), Arc::clone(&doc));
        Self {
            roots: vec![doc],
            references: Arc::new(registry),
        }
    }

    /// The first root; the whole result when a single location was loaded.
    pub fn root(&self) -> &Arc<Document> {
        &self.roots[0]
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_major_version_from_string_and_number() {
        let doc = Document::new("a", json!({ "swagger": "2.0" }));
        assert_eq!(doc.major_version(), Some(2));

        let doc = Document::new("b", json!({ "openapi": "3.1.0" }));
        assert_eq!(doc.major_version(), Some(3));

        let doc = Document::new("c", json!({ "swagger": 2.0 }));
        assert_eq!(doc.major_version(), Some(2));

        let doc = Document::new("d", json!({ "info": {} }));
        assert_eq!(doc.major_version(), None);
    }

    #[test]
    fn test_definitions_fall_back_to_components() {
        let doc = Document::new(
            "a",
            json!({ "components": { "schemas": { "Pet": { "type": "object" } } } }),
        );
        assert!(doc.definitions().unwrap().contains_key("Pet"));
    }

    #[test]
    fn test_registry_prefers_sub() {
        let mut registry = ReferenceRegistry::new();
        registry
            .top
            .insert("x".into(), Arc::new(Document::new("x", json!({ "top": true }))));
        registry
            .sub
            .insert("x".into(), Arc::new(Document::new("x", json!({ "sub": true }))));
        assert!(registry.get("x").unwrap().root.get("sub").is_some());
        assert_eq!(registry.len(), 2);
    }
}
