#![deny(missing_docs)]

//! # Phase Traversal
//!
//! Walks the document tree once per extensible phase, emitting events in a
//! reproducible order: Context, Specification (root, then each referenced
//! document), then per path PathItem, Operation, Parameter*, Response*, with
//! referenced models processed on first sight within the phase.

use crate::config::PipelineConfig;
use crate::document::{Document, ReferenceRegistry};
use crate::error::AppResult;
use crate::pipeline::composition;
use crate::pipeline::context::{self, Context, ModelSchema, OperationId, Phase};
use crate::pipeline::events::{EventTable, Scope};
use crate::resolver;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// State of one phase walk.
pub(crate) struct Traversal<'p, 'c> {
    phase: Phase,
    events: &'p EventTable,
    config: &'p PipelineConfig,
    registry: &'p ReferenceRegistry,
    context: &'c mut Context,
    /// Models already processed in this phase.
    seen: HashSet<String>,
}

impl<'p, 'c> Traversal<'p, 'c> {
    pub(crate) fn new(
        phase: Phase,
        events: &'p EventTable,
        config: &'p PipelineConfig,
        registry: &'p ReferenceRegistry,
        context: &'c mut Context,
    ) -> Self {
        Self {
            phase,
            events,
            config,
            registry,
            context,
            seen: HashSet::new(),
        }
    }

    fn emit(
        &mut self,
        name: &str,
        scope: Scope,
        document: Option<&Arc<Document>>,
    ) -> AppResult<()> {
        self.events
            .dispatch(self.phase, name, scope, self.context, document, self.config)
    }

    /// Runs the whole phase.
    pub(crate) fn run(mut self, roots: &'p [Arc<Document>]) -> AppResult<()> {
        self.context.phase = self.phase;
        tracing::debug!(phase = %self.phase, "phase started");

        self.emit("Context", Scope::Context, None)?;

        for root in roots {
            self.document(root)?;
        }

        composition::link(&mut self.context.models)?;

        let resources: Vec<(String, Vec<String>, String)> = self
            .context
            .resources
            .values()
            .map(|r| (r.name.clone(), r.groups.keys().cloned().collect(), r.document.clone()))
            .collect();
        for (resource, groups, location) in resources {
            let document = self.registry.get(&location);
            self.emit(
                "Resource",
                Scope::Resource {
                    resource: resource.clone(),
                },
                document,
            )?;
            for group in groups {
                self.emit(
                    "Group",
                    Scope::Group {
                        resource: resource.clone(),
                        group,
                    },
                    document,
                )?;
            }
        }
        Ok(())
    }

    fn document(&mut self, root: &'p Arc<Document>) -> AppResult<()> {
        let registry = self.registry;

        self.emit(
            "Specification",
            Scope::Specification {
                location: root.location.clone(),
            },
            Some(root),
        )?;
        for sub in registry.sub.values() {
            self.emit(
                "Specification",
                Scope::Specification {
                    location: sub.location.clone(),
                },
                Some(sub),
            )?;
        }

        if let Some(paths) = root.paths() {
            for (path, item) in paths {
                if path.starts_with('/') {
                    let item = resolver::resolve(item, root, registry)?;
                    self.path_item(root, path, item.object, item.document)?;
                }
            }
        }

        if self.config.process_unreferenced_models {
            if let Some(definitions) = root.definitions() {
                for (name, schema) in definitions {
                    let resolved = resolver::resolve(schema, root, registry)?;
                    self.model(name, resolved.object, resolved.document)?;
                }
            }
        }
        Ok(())
    }

    fn path_item(
        &mut self,
        root: &'p Arc<Document>,
        path: &str,
        item: &'p Value,
        document: &'p Arc<Document>,
    ) -> AppResult<()> {
        self.emit(
            "PathItem",
            Scope::PathItem {
                root: root.location.clone(),
                path: path.to_string(),
            },
            Some(document),
        )?;

        let Some(methods) = item.as_object() else {
            return Ok(());
        };
        for method in methods.keys() {
            if !self.config.is_method(method) {
                continue;
            }
            // Ignored operations were never added to the arena.
            if let Some(id) = self.context.find_operation(&root.location, path, method) {
                self.operation(id)?;
            }
        }
        Ok(())
    }

    fn operation(&mut self, id: OperationId) -> AppResult<()> {
        let registry = self.registry;
        let Some(operation) = self.context.operation(id) else {
            return Ok(());
        };
        let document = registry.get(&operation.document);
        let parameters: Vec<(Option<Value>, String)> = operation
            .parameters
            .iter()
            .map(|p| (p.schema.clone(), p.document.clone()))
            .collect();
        let request_body = operation
            .request_body
            .as_ref()
            .and_then(|b| b.schema.clone().map(|s| (s, b.document.clone())));
        let responses: Vec<(String, Option<Value>, String)> = operation
            .responses
            .values()
            .map(|r| (r.code.clone(), r.schema.clone(), r.document.clone()))
            .collect();

        self.emit("Operation", Scope::Operation { operation: id }, document)?;

        for (index, (schema, location)) in parameters.into_iter().enumerate() {
            let owner = registry.get(&location);
            self.schema_model(schema.as_ref(), owner)?;
            self.emit("Parameter", Scope::Parameter { operation: id, index }, owner)?;
        }

        if let Some((schema, location)) = request_body {
            self.schema_model(Some(&schema), registry.get(&location))?;
        }

        for (code, schema, location) in responses {
            let owner = registry.get(&location);
            self.schema_model(schema.as_ref(), owner)?;
            self.emit("Response", Scope::Response { operation: id, code }, owner)?;
        }
        Ok(())
    }

    /// Processes the model a body schema points at, directly or through
    /// array items.
    fn schema_model(
        &mut self,
        schema: Option<&Value>,
        owner: Option<&'p Arc<Document>>,
    ) -> AppResult<()> {
        let (Some(schema), Some(owner)) = (schema, owner) else {
            return Ok(());
        };
        let Some(reference) = context::model_pointer(schema).and_then(resolver::pointer) else {
            return Ok(());
        };
        let (object, document) = resolver::dereference(reference, owner, self.registry)?;
        self.model(&resolver::model_name(reference), object, document)
    }

    /// Processes a model once per phase.
    ///
    /// `allOf` parents are processed first, then the Model event fires for
    /// the composite, then Property events for its inline branches.
    fn model(
        &mut self,
        name: &str,
        schema: &'p Value,
        document: &'p Arc<Document>,
    ) -> AppResult<()> {
        if !self.seen.insert(name.to_string()) {
            return Ok(());
        }
        if !self.context.models.contains_key(name) {
            self.context.models.insert(
                name.to_string(),
                ModelSchema::new(name, schema, document.location.clone()),
            );
        }

        let scope = Scope::Model {
            model: name.to_string(),
        };
        match schema.get("allOf").and_then(Value::as_array) {
            Some(branches) => {
                for branch in branches {
                    if let Some(reference) = resolver::pointer(branch) {
                        let (parent, owner) =
                            resolver::dereference(reference, document, self.registry)?;
                        self.model(&resolver::model_name(reference), parent, owner)?;
                    }
                }
                self.emit("Model", scope, Some(document))?;
                for branch in branches {
                    if resolver::pointer(branch).is_none() {
                        self.properties(name, branch, document)?;
                    }
                }
            }
            None => {
                self.emit("Model", scope, Some(document))?;
                self.properties(name, schema, document)?;
            }
        }
        Ok(())
    }

    fn properties(
        &mut self,
        model: &str,
        schema: &'p Value,
        document: &'p Arc<Document>,
    ) -> AppResult<()> {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(());
        };
        for (name, property) in properties {
            self.emit(
                "Property",
                Scope::Property {
                    model: model.to_string(),
                    property: name.clone(),
                },
                Some(document),
            )?;

            if let Some(reference) = context::model_pointer(property).and_then(resolver::pointer) {
                let (target, owner) = resolver::dereference(reference, document, self.registry)?;
                self.model(&resolver::model_name(reference), target, owner)?;
            }
        }
        Ok(())
    }
}
