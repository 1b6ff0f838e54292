#![deny(missing_docs)]

//! # Generation Context
//!
//! The accumulator threaded through one generation run. Resources, groups,
//! operations and models are created during grouping (models on first sight
//! during traversal) and enriched in place by every later phase.

use crate::document::{Document, ReferenceRegistry};
use crate::naming;
use crate::resolver;
use derive_more::Display;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// The ordered passes of a generation run.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fixed operation classification pass.
    #[display("grouping")]
    Grouping,
    /// First extensible pass.
    #[display("prepare")]
    Prepare,
    /// Second extensible pass.
    #[display("decorate")]
    Decorate,
    /// Last extensible pass.
    #[display("finalize")]
    Finalize,
    /// Emission pass with its own subscription namespace.
    #[display("write")]
    Write,
}

impl Phase {
    /// Phases that traverse the documents and accept handlers.
    pub const EXTENSIBLE: [Phase; 3] = [Phase::Prepare, Phase::Decorate, Phase::Finalize];
}

/// Index of an operation in `Context::operations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(pub usize);

/// Classification of a group inside its resource.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupKind {
    /// Paths without parameter segments.
    Collection,
    /// Paths ending in a parameter segment.
    Entity,
    /// Paths with a static suffix after a parameter segment.
    Actions,
}

impl GroupKind {
    /// Sort position: Collection, Entity, Actions.
    pub fn rank(self) -> usize {
        match self {
            GroupKind::Collection => 1,
            GroupKind::Entity => 2,
            GroupKind::Actions => 3,
        }
    }
}

/// A named collection of operations, e.g. `Pet`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Resource name.
    pub name: String,
    /// Base path of the root document.
    pub base_path: Option<String>,
    /// Default request media types of the root document.
    pub consumes: Vec<String>,
    /// Default response media types of the root document.
    pub produces: Vec<String>,
    /// Operations, sorted after grouping.
    pub operations: Vec<OperationId>,
    /// Groups, sorted by classification after grouping.
    pub groups: IndexMap<String, Group>,
    /// Location of the document that declared the first operation.
    pub document: String,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl Resource {
    /// Creates an empty resource inheriting the root document defaults.
    pub fn new(name: impl Into<String>, root: &Document, document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: root.base_path().map(str::to_string),
            consumes: root.consumes(),
            produces: root.produces(),
            operations: Vec::new(),
            groups: IndexMap::new(),
            document: document.into(),
            extensions: Map::new(),
        }
    }
}

/// A subset of a resource's operations sharing a classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// Group name, e.g. `Pets Collection`.
    pub name: String,
    /// Classification.
    pub kind: GroupKind,
    /// Base path of the root document.
    pub base_path: Option<String>,
    /// Default request media types of the root document.
    pub consumes: Vec<String>,
    /// Default response media types of the root document.
    pub produces: Vec<String>,
    /// Operations, sorted after grouping.
    pub operations: Vec<OperationId>,
    /// Location of the document that declared the first operation.
    pub document: String,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl Group {
    /// Creates an empty group inheriting the root document defaults.
    pub fn new(
        name: impl Into<String>,
        kind: GroupKind,
        root: &Document,
        document: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            base_path: root.base_path().map(str::to_string),
            consumes: root.consumes(),
            produces: root.produces(),
            operations: Vec::new(),
            document: document.into(),
            extensions: Map::new(),
        }
    }
}

/// One method + path endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// Arena index.
    pub id: OperationId,
    /// Path item key, lower case (`get`, `post`, ...).
    pub method: String,
    /// Path template.
    pub path: String,
    /// Declared `operationId`.
    pub operation_id: Option<String>,
    /// Declared tags.
    pub tags: Vec<String>,
    /// Resolved parameters with ignored names filtered out.
    pub parameters: Vec<Parameter>,
    /// OpenAPI 3 request body.
    pub request_body: Option<RequestBody>,
    /// Responses by status code, in declaration order.
    pub responses: IndexMap<String, Response>,
    /// Declared request media types.
    pub consumes: Option<Vec<String>>,
    /// Declared response media types.
    pub produces: Option<Vec<String>>,
    /// Declared media types, else the document defaults.
    pub resolved_consumes: Vec<String>,
    /// Declared media types, else the document defaults.
    pub resolved_produces: Vec<String>,
    /// `200` if declared, else `201` if declared.
    pub success_response: Option<String>,
    /// Whether a success response is declared.
    pub has_return: bool,
    /// GET with more than two optional query/header parameters.
    pub is_query: bool,
    /// Owning resource name.
    pub resource: String,
    /// Owning group name.
    pub group: String,
    /// Location of the root document whose `paths` declared this operation.
    pub root: String,
    /// Location of the document the operation object lives in.
    pub document: String,
    /// The dereferenced operation object.
    #[serde(skip)]
    pub raw: Value,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl Operation {
    /// Upper-case HTTP method.
    pub fn http_method(&self) -> String {
        self.method.to_uppercase()
    }

    /// Name used by the ignore list: `x-resource-operation`, else `operationId`.
    pub fn ignore_key(&self) -> Option<&str> {
        ignore_key(&self.raw)
    }

    /// Path with parameter segments collapsed, used for ordering.
    pub fn compressed_path(&self) -> String {
        naming::compress_path(&self.path)
    }
}

/// Name used by the ignore list for a raw operation object.
pub fn ignore_key(raw: &Value) -> Option<&str> {
    raw.get("x-resource-operation")
        .or_else(|| raw.get("operationId"))
        .and_then(Value::as_str)
}

/// A resolved operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// `in` value (`path`, `query`, `header`, `body`, `formData`, `cookie`).
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter is required.
    pub required: bool,
    /// Body schema (Swagger) or value schema (OpenAPI 3).
    pub schema: Option<Value>,
    /// Location of the document the parameter lives in.
    pub document: String,
    /// The dereferenced parameter object.
    #[serde(skip)]
    pub raw: Value,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl Parameter {
    /// Builds a parameter from its dereferenced object.
    pub fn from_value(raw: &Value, document: impl Into<String>) -> Self {
        Self {
            name: str_field(raw, "name").unwrap_or_default(),
            location: str_field(raw, "in").unwrap_or_default(),
            required: raw.get("required").and_then(Value::as_bool).unwrap_or(false),
            schema: raw.get("schema").cloned(),
            document: document.into(),
            raw: raw.clone(),
            extensions: Map::new(),
        }
    }
}

/// An OpenAPI 3 request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    /// Declared media types.
    pub content_types: Vec<String>,
    /// Schema of the preferred media type.
    pub schema: Option<Value>,
    /// Whether the body is required.
    pub required: bool,
    /// Location of the document the body lives in.
    pub document: String,
}

impl RequestBody {
    /// Builds a request body from its dereferenced object.
    pub fn from_value(raw: &Value, document: impl Into<String>) -> Self {
        let content = raw.get("content");
        Self {
            content_types: content
                .and_then(Value::as_object)
                .map(|c| c.keys().cloned().collect())
                .unwrap_or_default(),
            schema: content.and_then(content_schema).cloned(),
            required: raw.get("required").and_then(Value::as_bool).unwrap_or(false),
            document: document.into(),
        }
    }
}

/// A response of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Status code key (`200`, `default`, ...).
    pub code: String,
    /// Declared description.
    pub description: Option<String>,
    /// Swagger `schema`, else the preferred `content.*.schema`.
    pub schema: Option<Value>,
    /// Declared media types (OpenAPI 3).
    pub content_types: Vec<String>,
    /// Location of the document the response lives in.
    pub document: String,
    /// The dereferenced response object.
    #[serde(skip)]
    pub raw: Value,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl Response {
    /// Builds a response from its dereferenced object.
    pub fn from_value(code: impl Into<String>, raw: &Value, document: impl Into<String>) -> Self {
        let content = raw.get("content");
        Self {
            code: code.into(),
            description: str_field(raw, "description"),
            schema: raw
                .get("schema")
                .or_else(|| content.and_then(content_schema))
                .cloned(),
            content_types: content
                .and_then(Value::as_object)
                .map(|c| c.keys().cloned().collect())
                .unwrap_or_default(),
            document: document.into(),
            raw: raw.clone(),
            extensions: Map::new(),
        }
    }
}

/// Picks the schema of `application/json` if present, else of the first media type.
fn content_schema(content: &Value) -> Option<&Value> {
    let content = content.as_object()?;
    content
        .get("application/json")
        .or_else(|| content.values().next())
        .and_then(|media| media.get("schema"))
}

/// A named data type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSchema {
    /// Model name, taken from the last pointer segment.
    pub name: String,
    /// The dereferenced schema.
    #[serde(skip)]
    pub schema: Value,
    /// Location of the document the schema lives in.
    pub document: String,
    /// Own properties, including those of inline `allOf` branches.
    pub properties: IndexMap<String, Property>,
    /// Own required names, including those of inline `allOf` branches.
    pub required: Vec<String>,
    /// Models referenced from `allOf`, in declaration order.
    pub parents: Vec<String>,
    /// Models naming this one directly in `allOf`.
    pub referenced_by: Vec<String>,
    /// Models composing this one at any depth.
    pub recursive_referenced_by: Vec<String>,
    /// Ancestors' properties first, own properties last.
    pub all_properties: IndexMap<String, Property>,
    /// Union of the ancestors' and own required names.
    pub all_required: Vec<String>,
    /// All ancestors, each parent followed by its own ancestors.
    pub all_references: Vec<String>,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl ModelSchema {
    /// Builds a model from its dereferenced schema.
    pub fn new(name: impl Into<String>, schema: &Value, document: impl Into<String>) -> Self {
        let mut model = Self {
            name: name.into(),
            schema: schema.clone(),
            document: document.into(),
            properties: IndexMap::new(),
            required: Vec::new(),
            parents: Vec::new(),
            referenced_by: Vec::new(),
            recursive_referenced_by: Vec::new(),
            all_properties: IndexMap::new(),
            all_required: Vec::new(),
            all_references: Vec::new(),
            extensions: Map::new(),
        };

        model.merge_branch(schema);
        if let Some(branches) = schema.get("allOf").and_then(Value::as_array) {
            for branch in branches {
                match resolver::pointer(branch) {
                    Some(reference) => {
                        let parent = resolver::model_name(reference);
                        if !model.parents.contains(&parent) {
                            model.parents.push(parent);
                        }
                    }
                    None => model.merge_branch(branch),
                }
            }
        }
        model
    }

    fn merge_branch(&mut self, schema: &Value) {
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                self.properties
                    .insert(name.clone(), Property::from_schema(name, property));
            }
        }
        for name in string_list(schema.get("required")) {
            if !self.required.contains(&name) {
                self.required.push(name);
            }
        }
    }

    /// Whether the schema composes parents through `allOf`.
    pub fn is_composed(&self) -> bool {
        self.schema.get("allOf").is_some()
    }
}

/// A property of a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// The property schema as declared.
    #[serde(skip)]
    pub schema: Value,
    /// Declared `type`.
    pub type_name: Option<String>,
    /// Declared `format`.
    pub format: Option<String>,
    /// Model referenced directly or as the array item type.
    pub reference: Option<String>,
    /// Whether the property is an array.
    pub is_array: bool,
    /// Whether the owning model lists the property as required.
    pub required: bool,
    /// Module decorations.
    pub extensions: Map<String, Value>,
}

impl Property {
    /// Builds a property from its schema.
    pub fn from_schema(name: impl Into<String>, schema: &Value) -> Self {
        let type_name = str_field(schema, "type");
        Self {
            name: name.into(),
            schema: schema.clone(),
            is_array: type_name.as_deref() == Some("array"),
            type_name,
            format: str_field(schema, "format"),
            reference: model_pointer(schema)
                .and_then(resolver::pointer)
                .map(resolver::model_name),
            required: false,
            extensions: Map::new(),
        }
    }
}

/// Returns the node holding a model pointer: the schema itself, or its
/// array `items`.
pub fn model_pointer(schema: &Value) -> Option<&Value> {
    if resolver::pointer(schema).is_some() {
        return Some(schema);
    }
    schema.get("items").filter(|items| resolver::pointer(items).is_some())
}

/// Key of the operation index: root location, path, method.
type OperationKey = (String, String, String);

/// Shared mutable accumulator for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    /// Phase currently executing.
    pub phase: Phase,
    /// Every loaded document.
    #[serde(skip)]
    pub references: Arc<ReferenceRegistry>,
    /// Root documents, in load order.
    #[serde(skip)]
    pub documents: Vec<Arc<Document>>,
    /// Resources, sorted by name after grouping.
    pub resources: IndexMap<String, Resource>,
    /// Operation arena; `OperationId` indexes into it.
    pub operations: Vec<Operation>,
    /// Models in first-seen order.
    pub models: IndexMap<String, ModelSchema>,
    /// Query-style operations recorded by the `Helpers` module.
    pub query_operations: Vec<OperationId>,
    /// Module decorations.
    pub extensions: Map<String, Value>,
    #[serde(skip)]
    index: HashMap<OperationKey, OperationId>,
}

impl Context {
    /// Creates an empty context over loaded documents.
    pub fn new(documents: Vec<Arc<Document>>, references: Arc<ReferenceRegistry>) -> Self {
        Self {
            phase: Phase::Grouping,
            references,
            documents,
            resources: IndexMap::new(),
            operations: Vec::new(),
            models: IndexMap::new(),
            query_operations: Vec::new(),
            extensions: Map::new(),
            index: HashMap::new(),
        }
    }

    /// Looks a loaded document up by location.
    pub fn document(&self, location: &str) -> Option<&Arc<Document>> {
        self.references.get(location)
    }

    /// Returns an operation by id.
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.0)
    }

    /// Returns an operation by id, mutably.
    pub fn operation_mut(&mut self, id: OperationId) -> Option<&mut Operation> {
        self.operations.get_mut(id.0)
    }

    /// Returns the operations of a list of ids, skipping stale ids.
    pub fn operations_of<'a>(
        &'a self,
        ids: &'a [OperationId],
    ) -> impl Iterator<Item = &'a Operation> + 'a {
        ids.iter().filter_map(|id| self.operation(*id))
    }

    /// Finds the operation declared at `method` of `path` in a root document.
    pub fn find_operation(&self, root: &str, path: &str, method: &str) -> Option<OperationId> {
        self.index
            .get(&(root.to_string(), path.to_string(), method.to_string()))
            .copied()
    }

    /// Returns a model by name.
    pub fn model(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name)
    }

    /// Returns a model by name, mutably.
    pub fn model_mut(&mut self, name: &str) -> Option<&mut ModelSchema> {
        self.models.get_mut(name)
    }

    /// Returns a resource by name.
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Returns a resource by name, mutably.
    pub fn resource_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.get_mut(name)
    }

    /// Returns a group by resource and group name, mutably.
    pub fn group_mut(&mut self, resource: &str, group: &str) -> Option<&mut Group> {
        self.resources.get_mut(resource)?.groups.get_mut(group)
    }

    /// Appends an operation to the arena and indexes it.
    pub(crate) fn push_operation(&mut self, mut operation: Operation) -> OperationId {
        let id = OperationId(self.operations.len());
        operation.id = id;
        self.index.insert(
            (
                operation.root.clone(),
                operation.path.clone(),
                operation.method.clone(),
            ),
            id,
        );
        self.operations.push(operation);
        id
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
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
