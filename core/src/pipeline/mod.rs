#![deny(missing_docs)]

//! # Generation Pipeline
//!
//! Runs the phases over loaded documents, strictly in order:
//! Grouping, Prepare, Decorate, Finalize, Write.
//!
//! - **context**: The accumulator and the types it holds.
//! - **events**: Handler tables and event payloads.
//! - **grouping**: Operation classification and ordering.
//! - **traversal**: The per-phase document walk.
//! - **composition**: `allOf` inheritance sets.

pub mod composition;
pub mod context;
pub mod events;
pub mod grouping;
mod traversal;

pub use context::{
    Context, Group, GroupKind, ModelSchema, Operation, OperationId, Parameter, Phase, Property,
    RequestBody, Resource, Response,
};
pub use events::{Event, EventTable, Scope, WriteEvent, WritePayload};
pub use grouping::{Classification, Classifier, DefaultClassifier};

use crate::config::PipelineConfig;
use crate::document::LoadedSpecs;
use crate::error::{AppError, AppResult, ModuleError};
use crate::modules::{Module, ModuleRegistry};
use std::sync::Arc;
use traversal::Traversal;

/// The generation core: configuration, installed modules, handler tables
/// and the grouping hooks.
pub struct Pipeline {
    config: PipelineConfig,
    modules: ModuleRegistry,
    installed: Vec<String>,
    installing: Vec<String>,
    events: EventTable,
    classifier: Box<dyn Classifier>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("installed", &self.installed)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Creates a pipeline with the built-in module registry and the default
    /// classifier. No module is installed yet.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            modules: ModuleRegistry::with_builtins(),
            installed: Vec::new(),
            installing: Vec::new(),
            events: EventTable::new(),
            classifier: Box::new(DefaultClassifier),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Configuration, mutably; modules may extend the ignore lists.
    pub fn config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    /// Registry consulted by `use_named`.
    pub fn modules_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.modules
    }

    /// Replaces the registry consulted by `use_named`.
    pub fn set_modules(&mut self, modules: ModuleRegistry) -> &mut Self {
        self.modules = modules;
        self
    }

    /// Replaces the grouping hooks.
    pub fn set_classifier(&mut self, classifier: impl Classifier + 'static) -> &mut Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Names of installed modules, in install order.
    pub fn installed(&self) -> &[String] {
        &self.installed
    }

    /// Installs a module: runs its initializer once.
    ///
    /// Installing an already installed name, or one whose initializer is
    /// running, is a no-op. A module only counts as installed once its
    /// initializer succeeded.
    ///
    /// # Errors
    ///
    /// `ModuleError::MissingDependency` when a dependency is not installed on
    /// this pipeline yet; errors from the initializer.
    pub fn use_module(&mut self, module: Module) -> AppResult<&mut Self> {
        if self.installed.contains(&module.name) || self.installing.contains(&module.name) {
            return Ok(self);
        }
        if let Some(dependency) = module
            .depends_on
            .iter()
            .find(|d| !self.installed.contains(*d))
        {
            return Err(ModuleError::MissingDependency {
                module: module.name.clone(),
                dependency: dependency.clone(),
            }
            .into());
        }

        tracing::debug!(module = %module.name, "installing module");
        self.installing.push(module.name.clone());
        let initialized = (module.initialize)(self);
        self.installing.retain(|name| name != &module.name);
        initialized?;
        self.installed.push(module.name.clone());
        Ok(self)
    }

    /// Installs registered modules by name, dependencies first.
    pub fn use_named<S: AsRef<str>>(&mut self, names: &[S]) -> AppResult<&mut Self> {
        for module in self.modules.get(names)? {
            self.use_module(module)?;
        }
        Ok(self)
    }

    /// Registers a handler for `name` in an extensible phase.
    pub fn on<F>(&mut self, phase: Phase, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Event<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.events.on(phase, name, handler);
        self
    }

    /// Shorthand for `on(Phase::Prepare, ..)`.
    pub fn on_prepare<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Event<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.on(Phase::Prepare, name, handler)
    }

    /// Shorthand for `on(Phase::Decorate, ..)`.
    pub fn on_decorate<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Event<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.on(Phase::Decorate, name, handler)
    }

    /// Shorthand for `on(Phase::Finalize, ..)`.
    pub fn on_finalize<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Event<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.on(Phase::Finalize, name, handler)
    }

    /// Registers a write handler for `name`.
    pub fn on_write<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut WriteEvent<'_>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.events.on_write(name, handler);
        self
    }

    /// Fires a write event outside the fixed write traversal.
    pub fn write(&self, context: &Context, name: &str, payload: WritePayload) -> AppResult<()> {
        self.events
            .dispatch_write(name, payload, context, &self.config)
    }

    /// Runs every phase over `specs` and returns the final context.
    ///
    /// # Errors
    ///
    /// Any dereference failure, composition cycle or handler error aborts
    /// the run.
    pub fn process(&self, specs: &LoadedSpecs) -> AppResult<Context> {
        if specs.roots.is_empty() {
            return Err(AppError::General("No documents to process".into()));
        }
        let registry = specs.references.as_ref();
        let mut context = Context::new(specs.roots.clone(), Arc::clone(&specs.references));

        tracing::debug!(phase = %Phase::Grouping, "phase started");
        grouping::group(
            self.classifier.as_ref(),
            &self.config,
            &specs.roots,
            registry,
            &mut context,
        )?;

        for phase in Phase::EXTENSIBLE {
            Traversal::new(phase, &self.events, &self.config, registry, &mut context)
                .run(&specs.roots)?;
        }

        context.phase = Phase::Write;
        tracing::debug!(phase = %Phase::Write, "phase started");
        self.write(&context, "Context", WritePayload::Context)?;
        for root in &specs.roots {
            self.write(
                &context,
                "Specification",
                WritePayload::Specification {
                    location: root.location.clone(),
                },
            )?;
            for location in registry.sub.keys() {
                self.write(
                    &context,
                    "Specification",
                    WritePayload::Specification {
                        location: location.clone(),
                    },
                )?;
            }
        }
        for name in context.models.keys() {
            self.write(&context, "Model", WritePayload::Model { name: name.clone() })?;
        }
        for name in context.resources.keys() {
            self.write(
                &context,
                "Resource",
                WritePayload::Resource { name: name.clone() },
            )?;
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use serde_json::json;
    use std::sync::Mutex;

    fn noop(_: &mut Pipeline) -> AppResult<()> {
        Ok(())
    }

    #[test]
    fn test_install_requires_installed_dependency() {
        let mut pipeline = Pipeline::default();
        let a = Module::new("A", &[], noop);
        let b = Module::new("B", &["A"], noop);

        let err = pipeline.use_module(b.clone()).unwrap_err();
        assert_eq!(err.to_string(), "Module Error: B depends on A which is not loaded.");

        pipeline.use_module(a.clone()).unwrap();
        pipeline.use_module(b).unwrap();
        pipeline.use_module(a).unwrap();
        assert_eq!(pipeline.installed(), ["A", "B"]);
    }

    #[test]
    fn test_failed_initializer_is_not_installed() {
        let mut pipeline = Pipeline::default();
        let broken = Module::new("A", &[], |_| Err(AppError::General("boom".into())));
        let b = Module::new("B", &["A"], noop);

        assert!(pipeline.use_module(broken).is_err());
        assert!(pipeline.installed().is_empty());

        let err = pipeline.use_module(b).unwrap_err();
        assert!(matches!(
            err,
            AppError::Module(ModuleError::MissingDependency { .. })
        ));

        pipeline.use_module(Module::new("A", &[], noop)).unwrap();
        assert_eq!(pipeline.installed(), ["A"]);
    }

    #[test]
    fn test_initializer_runs_once() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let module = Module::new("Counted", &[], move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let mut pipeline = Pipeline::default();
        pipeline.use_module(module.clone()).unwrap();
        pipeline.use_module(module).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_use_named_resolves_dependencies() {
        let mut pipeline = Pipeline::default();
        pipeline
            .modules_mut()
            .register("A", &[], noop)
            .register("B", &["A"], noop);
        pipeline.use_named(&["B"]).unwrap();
        assert_eq!(pipeline.installed(), ["A", "B"]);

        let err = pipeline.use_named(&["Missing"]).unwrap_err();
        assert!(matches!(err, AppError::Module(ModuleError::Unknown { .. })));
    }

    #[test]
    fn test_phase_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::default();
        for phase in Phase::EXTENSIBLE {
            let log = Arc::clone(&log);
            pipeline.on(phase, "Context", move |event| {
                log.lock().unwrap().push(event.phase.to_string());
                Ok(())
            });
        }
        {
            let log = Arc::clone(&log);
            pipeline.on_write("Context", move |_| {
                log.lock().unwrap().push("write".to_string());
                Ok(())
            });
        }

        let specs = LoadedSpecs::from_document(Document::new(
            "/a.yaml",
            json!({ "swagger": "2.0", "paths": {} }),
        ));
        let context = pipeline.process(&specs).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["prepare", "decorate", "finalize", "write"]
        );
        assert_eq!(context.phase, Phase::Write);
    }
}
