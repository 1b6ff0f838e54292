#![deny(missing_docs)]

//! # Grouping
//!
//! The fixed first phase: classifies every operation of every root document
//! into a resource and a group, then sorts resources, groups and operations.

use crate::config::PipelineConfig;
use crate::document::{Document, ReferenceRegistry};
use crate::error::AppResult;
use crate::naming;
use crate::pipeline::context::{
    self, Context, Group, GroupKind, Operation, OperationId, Parameter, RequestBody, Resource,
    Response,
};
use crate::resolver;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Resource and group an operation belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Resource name, e.g. `Pet`.
    pub resource: String,
    /// Group name, e.g. `Pets Collection`.
    pub group: String,
    /// Group classification.
    pub kind: GroupKind,
}

/// Pluggable grouping hooks.
pub trait Classifier: Send + Sync {
    /// Computes the resource and group of an operation.
    fn classify(&self, operation: &Operation) -> Classification;

    /// Sort key of a group within its resource.
    fn group_rank(&self, group: &Group) -> usize {
        group.kind.rank()
    }

    /// Sort key of an operation within its resource and group.
    fn operation_rank(&self, operation: &Operation) -> usize {
        operation.compressed_path().len()
    }
}

/// Tag-or-first-segment heuristic.
///
/// * resource: first tag, else first path segment; singular UpperCamelCase
/// * `Pets Collection`: no parameter segment
/// * `Pet Actions`: a parameter segment followed by a static suffix
/// * `Pet`: otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl Classifier for DefaultClassifier {
    fn classify(&self, operation: &Operation) -> Classification {
        let source = operation
            .tags
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| naming::first_segment(&operation.path));
        let resource = naming::classify(&naming::capitalize(source));

        let compressed = operation.compressed_path();
        let (group, kind) = match (compressed.find('_'), compressed.rfind('_')) {
            (None, _) => (
                format!("{} Collection", naming::pluralize(&resource)),
                GroupKind::Collection,
            ),
            (Some(first), Some(last)) if !compressed.ends_with('_') || last > first => {
                (format!("{} Actions", resource), GroupKind::Actions)
            }
            _ => (resource.clone(), GroupKind::Entity),
        };

        Classification {
            resource,
            group,
            kind,
        }
    }
}

/// Runs the grouping phase over every root document.
pub(crate) fn group(
    classifier: &dyn Classifier,
    config: &PipelineConfig,
    roots: &[Arc<Document>],
    registry: &ReferenceRegistry,
    context: &mut Context,
) -> AppResult<()> {
    for root in roots {
        group_document(classifier, config, root, registry, context)?;
    }
    sort(classifier, context);
    Ok(())
}

fn group_document(
    classifier: &dyn Classifier,
    config: &PipelineConfig,
    root: &Arc<Document>,
    registry: &ReferenceRegistry,
    context: &mut Context,
) -> AppResult<()> {
    let Some(paths) = root.paths() else {
        return Ok(());
    };

    for (path, item) in paths {
        if !path.starts_with('/') {
            continue;
        }
        let item = resolver::resolve(item, root, registry)?;
        let Some(methods) = item.object.as_object() else {
            continue;
        };
        let shared = methods.get("parameters");

        for (method, raw) in methods {
            if !config.is_method(method) {
                continue;
            }
            let resolved = resolver::resolve(raw, item.document, registry)?;
            let mut operation = build_operation(
                method,
                path,
                resolved.object,
                resolved.document,
                shared.map(|s| (s, item.document)),
                root,
                registry,
                config,
            )?;
            let classification = classifier.classify(&operation);

            // Ignored operations still create their resource and group.
            if config.is_ignored_operation(context::ignore_key(resolved.object)) {
                tracing::debug!(path = %path, method = %method, "operation ignored");
                ensure_group(context, &classification, root, resolved.document);
                continue;
            }

            operation.resource = classification.resource.clone();
            operation.group = classification.group.clone();
            let id = context.push_operation(operation);
            add_to_group(context, &classification, id, root, resolved.document);
        }
    }
    Ok(())
}

fn ensure_resource<'c>(
    context: &'c mut Context,
    name: &str,
    root: &Document,
    document: &Document,
) -> &'c mut Resource {
    context
        .resources
        .entry(name.to_string())
        .or_insert_with(|| Resource::new(name, root, document.location.clone()))
}

fn ensure_group<'c>(
    context: &'c mut Context,
    classification: &Classification,
    root: &Document,
    document: &Document,
) -> &'c mut Resource {
    let resource = ensure_resource(context, &classification.resource, root, document);
    resource
        .groups
        .entry(classification.group.clone())
        .or_insert_with(|| {
            Group::new(
                classification.group.clone(),
                classification.kind,
                root,
                document.location.clone(),
            )
        });
    resource
}

fn add_to_group(
    context: &mut Context,
    classification: &Classification,
    id: OperationId,
    root: &Document,
    document: &Document,
) {
    let resource = ensure_group(context, classification, root, document);
    resource.operations.push(id);
    if let Some(group) = resource.groups.get_mut(&classification.group) {
        group.operations.push(id);
    }
}

/// Resources by name (case-insensitive), groups by rank, operations by rank.
///
/// Every sort is stable so ties keep insertion order.
fn sort(classifier: &dyn Classifier, context: &mut Context) {
    context
        .resources
        .sort_by(|a, _, b, _| a.to_lowercase().cmp(&b.to_lowercase()));

    let operations = &context.operations;
    let rank = |id: &OperationId| {
        operations
            .get(id.0)
            .map(|op| classifier.operation_rank(op))
            .unwrap_or(usize::MAX)
    };

    for resource in context.resources.values_mut() {
        resource
            .groups
            .sort_by(|_, a, _, b| classifier.group_rank(a).cmp(&classifier.group_rank(b)));
        for group in resource.groups.values_mut() {
            group.operations.sort_by_key(&rank);
        }
        resource.operations.sort_by_key(&rank);
    }
}

/// Builds an operation from its dereferenced object.
///
/// Parameters are dereferenced and ignore-filtered here; path item level
/// parameters apply unless the operation redeclares the same name and `in`.
#[allow(clippy::too_many_arguments)]
fn build_operation(
    method: &str,
    path: &str,
    raw: &Value,
    document: &Arc<Document>,
    shared: Option<(&Value, &Arc<Document>)>,
    root: &Arc<Document>,
    registry: &ReferenceRegistry,
    config: &PipelineConfig,
) -> AppResult<Operation> {
    let mut parameters = Vec::new();
    if let Some(declared) = raw.get("parameters").and_then(Value::as_array) {
        for parameter in declared {
            let resolved = resolver::resolve(parameter, document, registry)?;
            parameters.push(Parameter::from_value(
                resolved.object,
                resolved.document.location.clone(),
            ));
        }
    }
    if let Some((Value::Array(declared), owner)) = shared {
        for parameter in declared {
            let resolved = resolver::resolve(parameter, owner, registry)?;
            let candidate =
                Parameter::from_value(resolved.object, resolved.document.location.clone());
            if !parameters
                .iter()
                .any(|p| p.name == candidate.name && p.location == candidate.location)
            {
                parameters.push(candidate);
            }
        }
    }
    parameters.retain(|p| !config.is_ignored_parameter(Some(&p.name)));

    let request_body = match raw.get("requestBody") {
        Some(body) => {
            let resolved = resolver::resolve(body, document, registry)?;
            Some(RequestBody::from_value(
                resolved.object,
                resolved.document.location.clone(),
            ))
        }
        None => None,
    };

    let mut responses = IndexMap::new();
    if let Some(declared) = raw.get("responses").and_then(Value::as_object) {
        for (code, response) in declared {
            let resolved = resolver::resolve(response, document, registry)?;
            responses.insert(
                code.clone(),
                Response::from_value(code, resolved.object, resolved.document.location.clone()),
            );
        }
    }

    let consumes = raw.get("consumes").map(|c| context::string_list(Some(c)));
    let produces = raw.get("produces").map(|p| context::string_list(Some(p)));

    let resolved_consumes = consumes
        .clone()
        .or_else(|| {
            request_body
                .as_ref()
                .map(|b| b.content_types.clone())
                .filter(|types| !types.is_empty())
        })
        .unwrap_or_else(|| document_default(document, root, Document::consumes));
    let resolved_produces = produces
        .clone()
        .or_else(|| {
            let types: Vec<String> = responses
                .values()
                .flat_map(|r: &Response| r.content_types.iter().cloned())
                .fold(Vec::new(), |mut acc, t| {
                    if !acc.contains(&t) {
                        acc.push(t);
                    }
                    acc
                });
            (!types.is_empty()).then_some(types)
        })
        .unwrap_or_else(|| document_default(document, root, Document::produces));

    let success_response = ["200", "201"]
        .into_iter()
        .find(|code| responses.contains_key(*code))
        .map(str::to_string);

    let is_query = method == "get"
        && parameters.len() > 2
        && parameters
            .iter()
            .all(|p| !p.required && (p.location == "query" || p.location == "header"));

    Ok(Operation {
        id: OperationId(0),
        method: method.to_string(),
        path: path.to_string(),
        operation_id: raw
            .get("operationId")
            .and_then(Value::as_str)
            .map(str::to_string),
        tags: context::string_list(raw.get("tags")),
        parameters,
        request_body,
        responses,
        consumes,
        produces,
        resolved_consumes,
        resolved_produces,
        has_return: success_response.is_some(),
        success_response,
        is_query,
        resource: String::new(),
        group: String::new(),
        root: root.location.clone(),
        document: document.location.clone(),
        raw: raw.clone(),
        extensions: Map::new(),
    })
}

/// The owning document's media types, else the root's.
fn document_default(
    document: &Document,
    root: &Document,
    accessor: fn(&Document) -> Vec<String>,
) -> Vec<String> {
    let own = accessor(document);
    if own.is_empty() {
        accessor(root)
    } else {
        own
    }
}
