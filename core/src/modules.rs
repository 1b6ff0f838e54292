#![deny(missing_docs)]

//! # Module Registry
//!
//! Named decoration modules and dependency-first resolution.

use crate::error::{AppResult, ModuleError, ModuleResult};
use crate::pipeline::Pipeline;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// One-time initializer; registers handlers on the pipeline it is installed on.
pub type Initializer = Arc<dyn Fn(&mut Pipeline) -> AppResult<()> + Send + Sync>;

/// An installable unit of decoration logic.
#[derive(Clone)]
pub struct Module {
    /// Unique module name.
    pub name: String,
    /// Names of modules that must be installed first.
    pub depends_on: Vec<String>,
    /// Runs once when the module is installed.
    pub initialize: Initializer,
}

impl Module {
    /// Creates a module.
    pub fn new<F>(name: impl Into<String>, depends_on: &[&str], initialize: F) -> Self
    where
        F: Fn(&mut Pipeline) -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            initialize: Arc::new(initialize),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// Registry of named modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Module>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in modules (`Helpers`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_module(crate::helpers::module());
        registry
    }

    /// Registers a module under its name, replacing any previous one.
    pub fn register_module(&mut self, module: Module) -> &mut Self {
        self.modules.insert(module.name.clone(), module);
        self
    }

    /// Shorthand for `register_module(Module::new(..))`.
    pub fn register<F>(&mut self, name: &str, depends_on: &[&str], initialize: F) -> &mut Self
    where
        F: Fn(&mut Pipeline) -> AppResult<()> + Send + Sync + 'static,
    {
        self.register_module(Module::new(name, depends_on, initialize))
    }

    /// Whether a module is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Returns the named modules with their dependencies, dependencies first.
    ///
    /// Post-order traversal; each module appears once, siblings keep the
    /// order they were first seen in.
    ///
    /// # Errors
    ///
    /// `ModuleError::Unknown` for any unregistered name.
    pub fn get<S: AsRef<str>>(&self, names: &[S]) -> ModuleResult<Vec<Module>> {
        let mut resolved = Vec::new();
        let mut visiting = Vec::new();
        for name in names {
            self.resolve_dependencies(name.as_ref(), &mut resolved, &mut visiting)?;
        }
        Ok(resolved)
    }

    fn resolve_dependencies(
        &self,
        name: &str,
        resolved: &mut Vec<Module>,
        visiting: &mut Vec<String>,
    ) -> ModuleResult<()> {
        let module = self.modules.get(name).ok_or_else(|| ModuleError::Unknown {
            name: name.to_string(),
        })?;

        if resolved.iter().any(|m| m.name == module.name) {
            return Ok(());
        }
        // A dependency cycle cannot be satisfied at install time either; the
        // module stays out and `Pipeline::use_module` reports it.
        if visiting.iter().any(|v| v == name) {
            return Ok(());
        }

        visiting.push(name.to_string());
        for dependency in &module.depends_on {
            self.resolve_dependencies(dependency, resolved, visiting)?;
        }
        visiting.pop();

        if !resolved.iter().any(|m| m.name == module.name) {
            resolved.push(module.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Pipeline) -> AppResult<()> {
        Ok(())
    }

    fn names(modules: &[Module]) -> Vec<&str> {
        modules.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut registry = ModuleRegistry::new();
        registry.register("A", &[], noop).register("B", &["A"], noop);

        let resolved = registry.get(&["B"]).unwrap();
        assert_eq!(names(&resolved), vec!["A", "B"]);
    }

    #[test]
    fn test_deduplicates_and_keeps_sibling_order() {
        let mut registry = ModuleRegistry::new();
        registry
            .register("Base", &[], noop)
            .register("Left", &["Base"], noop)
            .register("Right", &["Base"], noop)
            .register("Top", &["Left", "Right"], noop);

        let resolved = registry.get(&["Top", "Left"]).unwrap();
        assert_eq!(names(&resolved), vec!["Base", "Left", "Right", "Top"]);
    }

    #[test]
    fn test_unknown_module_is_named() {
        let mut registry = ModuleRegistry::new();
        registry.register("B", &["A"], noop);

        let err = registry.get(&["B"]).unwrap_err();
        assert_eq!(err, ModuleError::Unknown { name: "A".into() });
        assert_eq!(err.to_string(), "Could not find module A");
    }

    #[test]
    fn test_builtins_include_helpers() {
        assert!(ModuleRegistry::with_builtins().contains("Helpers"));
    }
}
