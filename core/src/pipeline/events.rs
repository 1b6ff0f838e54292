#![deny(missing_docs)]

//! # Event Dispatch
//!
//! An explicit table mapping `(phase, event name)` to an ordered handler
//! list, plus a separate table for write events. Handlers run synchronously
//! in registration order; events they queue run right after them.

use crate::config::PipelineConfig;
use crate::document::Document;
use crate::error::{AppResult, ReferenceError, ReferenceResult};
use crate::pipeline::context::{
    Context, Group, ModelSchema, Operation, OperationId, Parameter, Phase, Property, Resource,
    Response,
};
use crate::resolver::{self, Resolved};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Handler for a Prepare/Decorate/Finalize event.
pub type Handler = Box<dyn Fn(&mut Event<'_>) -> AppResult<()> + Send + Sync>;

/// Handler for a write event.
pub type WriteHandler = Box<dyn Fn(&mut WriteEvent<'_>) -> AppResult<()> + Send + Sync>;

/// What an event is about.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// The whole run.
    Context,
    /// A root or referenced document.
    Specification {
        /// Document location.
        location: String,
    },
    /// A path entry of a root document.
    PathItem {
        /// Root document location.
        root: String,
        /// Path template.
        path: String,
    },
    /// An operation.
    Operation {
        /// Arena index.
        operation: OperationId,
    },
    /// A parameter of an operation.
    Parameter {
        /// Owning operation.
        operation: OperationId,
        /// Position in `Operation::parameters`.
        index: usize,
    },
    /// A response of an operation.
    Response {
        /// Owning operation.
        operation: OperationId,
        /// Status code key.
        code: String,
    },
    /// A model.
    Model {
        /// Model name.
        model: String,
    },
    /// A property of a model.
    Property {
        /// Owning model name.
        model: String,
        /// Property name.
        property: String,
    },
    /// A resource.
    Resource {
        /// Resource name.
        resource: String,
    },
    /// A group of a resource.
    Group {
        /// Owning resource name.
        resource: String,
        /// Group name.
        group: String,
    },
    /// A module-defined event.
    Custom(Value),
}

impl Scope {
    /// The operation this scope is about, directly or through a parameter
    /// or response.
    pub fn operation(&self) -> Option<OperationId> {
        match self {
            Scope::Operation { operation }
            | Scope::Parameter { operation, .. }
            | Scope::Response { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// The model this scope is about, directly or through a property.
    pub fn model(&self) -> Option<&str> {
        match self {
            Scope::Model { model } | Scope::Property { model, .. } => Some(model),
            _ => None,
        }
    }

    /// The resource this scope is about, directly or through a group.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Scope::Resource { resource } | Scope::Group { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

/// Payload of one Prepare/Decorate/Finalize event.
pub struct Event<'a> {
    /// Phase being executed.
    pub phase: Phase,
    /// Event name (`Operation`, `Model`, ...).
    pub name: &'a str,
    /// What the event is about.
    pub scope: &'a Scope,
    /// The shared accumulator.
    pub context: &'a mut Context,
    /// The document owning the scope, when there is one.
    pub document: Option<&'a Arc<Document>>,
    /// Configuration of the running pipeline.
    pub config: &'a PipelineConfig,
    follow_ups: Vec<(String, Scope)>,
}

impl<'a> Event<'a> {
    /// Queues another event of the current phase, dispatched after every
    /// handler of this one.
    pub fn emit(&mut self, name: impl Into<String>, scope: Scope) {
        self.follow_ups.push((name.into(), scope));
    }

    /// The operation in scope.
    pub fn operation(&self) -> Option<&Operation> {
        self.context.operation(self.scope.operation()?)
    }

    /// The operation in scope, mutably.
    pub fn operation_mut(&mut self) -> Option<&mut Operation> {
        let id = self.scope.operation()?;
        self.context.operation_mut(id)
    }

    /// The parameter in scope, mutably.
    pub fn parameter_mut(&mut self) -> Option<&mut Parameter> {
        let Scope::Parameter { operation, index } = self.scope else {
            return None;
        };
        self.context.operation_mut(*operation)?.parameters.get_mut(*index)
    }

    /// The response in scope, mutably.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        let Scope::Response { operation, code } = self.scope else {
            return None;
        };
        self.context.operation_mut(*operation)?.responses.get_mut(code)
    }

    /// The model in scope.
    pub fn model(&self) -> Option<&ModelSchema> {
        self.context.model(self.scope.model()?)
    }

    /// The model in scope, mutably.
    pub fn model_mut(&mut self) -> Option<&mut ModelSchema> {
        let name = self.scope.model()?;
        self.context.model_mut(name)
    }

    /// The property in scope, mutably.
    pub fn property_mut(&mut self) -> Option<&mut Property> {
        let Scope::Property { model, property } = self.scope else {
            return None;
        };
        self.context.model_mut(model)?.properties.get_mut(property)
    }

    /// The resource in scope.
    pub fn resource(&self) -> Option<&Resource> {
        self.context.resource(self.scope.resource()?)
    }

    /// The resource in scope, mutably.
    pub fn resource_mut(&mut self) -> Option<&mut Resource> {
        let name = self.scope.resource()?;
        self.context.resource_mut(name)
    }

    /// The group in scope, mutably.
    pub fn group_mut(&mut self) -> Option<&mut Group> {
        let Scope::Group { resource, group } = self.scope else {
            return None;
        };
        self.context.group_mut(resource, group)
    }

    /// Resolves a pointer relative to the document in scope (the first root
    /// when the scope has no document).
    pub fn resolve<'v>(&'v self, node: &'v Value) -> ReferenceResult<Resolved<'v>> {
        let current = self
            .document
            .or_else(|| self.context.documents.first())
            .ok_or_else(|| ReferenceError::MissingDocument {
                location: String::new(),
            })?;
        resolver::resolve(node, current, &self.context.references)
    }
}

/// What a write event is about.
#[derive(Debug, Clone, PartialEq)]
pub enum WritePayload {
    /// The whole run.
    Context,
    /// A root or referenced document.
    Specification {
        /// Document location.
        location: String,
    },
    /// An accumulated model.
    Model {
        /// Model name.
        name: String,
    },
    /// An accumulated resource.
    Resource {
        /// Resource name.
        name: String,
    },
    /// An operation.
    Operation {
        /// Arena index.
        operation: OperationId,
    },
    /// A module-defined value.
    Value(Value),
}

/// Payload of one write event.
pub struct WriteEvent<'a> {
    /// Event name (`Context`, `Specification`, `Model`, `Resource`, ...).
    pub name: &'a str,
    /// What is being written.
    pub payload: &'a WritePayload,
    /// The final accumulator.
    pub context: &'a Context,
    /// Configuration of the running pipeline.
    pub config: &'a PipelineConfig,
    follow_ups: Vec<(String, WritePayload)>,
}

impl<'a> WriteEvent<'a> {
    /// Queues another write event, dispatched after every handler of this one.
    pub fn write(&mut self, name: impl Into<String>, payload: WritePayload) {
        self.follow_ups.push((name.into(), payload));
    }

    /// The document being written.
    pub fn document(&self) -> Option<&Arc<Document>> {
        match self.payload {
            WritePayload::Specification { location } => self.context.document(location),
            _ => None,
        }
    }

    /// The model being written.
    pub fn model(&self) -> Option<&ModelSchema> {
        match self.payload {
            WritePayload::Model { name } => self.context.model(name),
            _ => None,
        }
    }

    /// The resource being written.
    pub fn resource(&self) -> Option<&Resource> {
        match self.payload {
            WritePayload::Resource { name } => self.context.resource(name),
            _ => None,
        }
    }

    /// The operation being written.
    pub fn operation(&self) -> Option<&Operation> {
        match self.payload {
            WritePayload::Operation { operation } => self.context.operation(*operation),
            _ => None,
        }
    }
}

/// Handler lists keyed by phase and event name.
#[derive(Default)]
pub struct EventTable {
    phases: HashMap<(Phase, String), Vec<Handler>>,
    writes: HashMap<String, Vec<WriteHandler>>,
}

impl EventTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for `name` in `phase`.
    pub fn on<F>(&mut self, phase: Phase, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut Event<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.phases
            .entry((phase, name.into()))
            .or_default()
            .push(Box::new(handler));
    }

    /// Appends a write handler for `name`.
    pub fn on_write<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut WriteEvent<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.writes
            .entry(name.into())
            .or_default()
            .push(Box::new(handler));
    }

    /// Handlers for `name` in `phase`, in registration order.
    pub fn handlers(&self, phase: Phase, name: &str) -> &[Handler] {
        self.phases
            .get(&(phase, name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Write handlers for `name`, in registration order.
    pub fn write_handlers(&self, name: &str) -> &[WriteHandler] {
        self.writes
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.phases.values().map(Vec::len).sum::<usize>()
            + self.writes.values().map(Vec::len).sum::<usize>()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the handlers of an event, then every event they queued.
    ///
    /// The first handler error aborts the dispatch.
    pub fn dispatch(
        &self,
        phase: Phase,
        name: &str,
        scope: Scope,
        context: &mut Context,
        document: Option<&Arc<Document>>,
        config: &PipelineConfig,
    ) -> AppResult<()> {
        let mut queue = VecDeque::from([(name.to_string(), scope)]);
        while let Some((name, scope)) = queue.pop_front() {
            let handlers = self.handlers(phase, &name);
            if handlers.is_empty() {
                continue;
            }
            let mut event = Event {
                phase,
                name: &name,
                scope: &scope,
                context: &mut *context,
                document,
                config,
                follow_ups: Vec::new(),
            };
            for handler in handlers {
                handler(&mut event)?;
            }
            queue.extend(event.follow_ups);
        }
        Ok(())
    }

    /// Runs the write handlers of an event, then every write they queued.
    pub fn dispatch_write(
        &self,
        name: &str,
        payload: WritePayload,
        context: &Context,
        config: &PipelineConfig,
    ) -> AppResult<()> {
        let mut queue = VecDeque::from([(name.to_string(), payload)]);
        while let Some((name, payload)) = queue.pop_front() {
            let handlers = self.write_handlers(&name);
            if handlers.is_empty() {
                continue;
            }
            let mut event = WriteEvent {
                name: &name,
                payload: &payload,
                context,
                config,
                follow_ups: Vec::new(),
            };
            for handler in handlers {
                handler(&mut event)?;
            }
            queue.extend(event.follow_ups);
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTable")
            .field("phases", &self.phases.keys().collect::<Vec<_>>())
            .field("writes", &self.writes.keys().collect::<Vec<_>>())
            .finish()
    }
}
