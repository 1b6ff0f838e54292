#![deny(missing_docs)]

//! # Helpers Module
//!
//! Built-in module decorating operations and models with data most target
//! modules need: fallback operation names, full paths, preferred media
//! types, query-style operations and property required flags.

use crate::error::AppResult;
use crate::modules::Module;
use crate::naming;
use crate::pipeline::{Event, ModelSchema, Scope, WriteEvent, WritePayload};
use serde_json::Value;

/// Registered name of the module.
pub const NAME: &str = "Helpers";

/// Media type used when an operation declares none.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// The `Helpers` module.
pub fn module() -> Module {
    Module::new(NAME, &[], |pipeline| {
        pipeline
            .on_prepare("Model", mark_required)
            .on_decorate("Context", |event| {
                event.context.query_operations.clear();
                Ok(())
            })
            .on_decorate("Operation", decorate_operation)
            .on_write("Context", write_query_operations);
        Ok(())
    })
}

/// `application/json` when listed (or nothing is), else the first entry.
pub fn preferred_media_type(types: &[String]) -> String {
    if types.is_empty() || types.iter().any(|t| t == DEFAULT_MEDIA_TYPE) {
        DEFAULT_MEDIA_TYPE.to_string()
    } else {
        types[0].clone()
    }
}

fn mark_required(event: &mut Event<'_>) -> AppResult<()> {
    if let Some(ModelSchema {
        properties,
        required,
        ..
    }) = event.model_mut()
    {
        for (name, property) in properties.iter_mut() {
            property.required = required.contains(name);
        }
    }
    Ok(())
}

fn decorate_operation(event: &mut Event<'_>) -> AppResult<()> {
    let Some(id) = event.scope.operation() else {
        return Ok(());
    };
    let Some(operation) = event.context.operation(id) else {
        return Ok(());
    };

    let base_path = event
        .context
        .document(&operation.root)
        .and_then(|doc| doc.base_path())
        .unwrap_or_default();
    let full_path = format!("{}{}", base_path, operation.path);
    let accepts = preferred_media_type(&operation.resolved_produces);
    let content_type = match operation.method.as_str() {
        "get" | "delete" => Value::Null,
        _ => Value::String(preferred_media_type(&operation.resolved_consumes)),
    };
    let fallback_id = naming::derive_operation_id(&operation.method, &operation.path);
    let is_query = operation.is_query;

    if let Some(operation) = event.operation_mut() {
        operation.operation_id.get_or_insert(fallback_id);
        let extensions = &mut operation.extensions;
        extensions.insert("fullPath".into(), Value::String(full_path));
        extensions.insert("accepts".into(), Value::String(accepts));
        extensions.insert("contentType".into(), content_type);
    }

    if is_query {
        event.context.query_operations.push(id);
        event.emit("QueryOperation", Scope::Operation { operation: id });
    }
    Ok(())
}

fn write_query_operations(event: &mut WriteEvent<'_>) -> AppResult<()> {
    let context = event.context;
    for id in &context.query_operations {
        event.write("QueryOperation", WritePayload::Operation { operation: *id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, LoadedSpecs};
    use crate::pipeline::{Phase, Pipeline};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn specs() -> LoadedSpecs {
        LoadedSpecs::from_document(Document::new(
            "/pets.yaml",
            json!({
                "swagger": "2.0",
                "basePath": "/v1",
                "consumes": ["application/xml", "application/json"],
                "paths": {
                    "/pets": {
                        "get": {
                            "parameters": [
                                { "name": "limit", "in": "query" },
                                { "name": "offset", "in": "query" },
                                { "name": "sort", "in": "query" }
                            ],
                            "responses": { "200": { "description": "ok" } }
                        },
                        "post": {
                            "operationId": "addPet",
                            "produces": ["text/plain"],
                            "parameters": [
                                { "name": "body", "in": "body", "schema": { "$ref": "#/definitions/Pet" } }
                            ],
                            "responses": { "201": { "description": "created" } }
                        }
                    }
                },
                "definitions": {
                    "Pet": {
                        "required": ["name"],
                        "properties": { "name": { "type": "string" }, "tag": { "type": "string" } }
                    }
                }
            }),
        ))
    }

    #[test]
    fn test_preferred_media_type() {
        assert_eq!(preferred_media_type(&[]), "application/json");
        assert_eq!(
            preferred_media_type(&["text/xml".into(), "application/json".into()]),
            "application/json"
        );
        assert_eq!(preferred_media_type(&["text/xml".into()]), "text/xml");
    }

    #[test]
    fn test_operations_are_decorated() {
        let query_events = Arc::new(Mutex::new(0));
        let query_writes = Arc::new(Mutex::new(0));

        let mut pipeline = Pipeline::default();
        pipeline.use_named(&[NAME]).unwrap();
        {
            let query_events = Arc::clone(&query_events);
            pipeline.on(Phase::Decorate, "QueryOperation", move |_| {
                *query_events.lock().unwrap() += 1;
                Ok(())
            });
        }
        {
            let query_writes = Arc::clone(&query_writes);
            pipeline.on_write("QueryOperation", move |event| {
                assert_eq!(event.operation().unwrap().path, "/pets");
                *query_writes.lock().unwrap() += 1;
                Ok(())
            });
        }

        let context = pipeline.process(&specs()).unwrap();

        let list = &context.operations[0];
        assert_eq!(list.operation_id.as_deref(), Some("getPets"));
        assert_eq!(list.extensions["fullPath"], "/v1/pets");
        assert_eq!(list.extensions["accepts"], "application/json");
        assert_eq!(list.extensions["contentType"], Value::Null);

        let add = &context.operations[1];
        assert_eq!(add.operation_id.as_deref(), Some("addPet"));
        assert_eq!(add.extensions["accepts"], "text/plain");
        assert_eq!(add.extensions["contentType"], "application/json");

        assert_eq!(context.query_operations.len(), 1);
        assert_eq!(*query_events.lock().unwrap(), 1);
        assert_eq!(*query_writes.lock().unwrap(), 1);
    }

    #[test]
    fn test_required_flags() {
        let mut pipeline = Pipeline::default();
        pipeline.use_named(&[NAME]).unwrap();
        let context = pipeline.process(&specs()).unwrap();

        let pet = context.model("Pet").unwrap();
        assert!(pet.properties["name"].required);
        assert!(!pet.properties["tag"].required);
    }
}
