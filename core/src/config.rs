#![deny(missing_docs)]

//! # Pipeline Configuration
//!
//! Settings consumed by the generation core. Every field has a default, so a
//! configuration file only needs to name what it changes.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// HTTP method keys recognized inside a path item.
pub const DEFAULT_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Configuration for one `Pipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Also process every top-level schema definition after path traversal.
    pub process_unreferenced_models: bool,
    /// Operations (by `x-resource-operation`, else `operationId`) to skip.
    pub ignored_operations: Vec<String>,
    /// Parameter names to filter out of every operation.
    pub ignored_parameters: Vec<String>,
    /// Path item keys treated as operations.
    pub methods: Vec<String>,
    /// Free-form values readable by handlers.
    pub settings: Map<String, Value>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            process_unreferenced_models: true,
            ignored_operations: Vec::new(),
            ignored_parameters: Vec::new(),
            methods: DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
            settings: Map::new(),
        }
    }
}

impl PipelineConfig {
    /// Parses a YAML (or JSON) configuration document.
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse pipeline config: {}", e)))
    }

    /// Reads and parses a configuration file.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Adds operation names to skip; duplicates are ignored.
    pub fn add_ignored_operations<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        union_into(&mut self.ignored_operations, names);
        self
    }

    /// Adds parameter names to filter; duplicates are ignored.
    pub fn add_ignored_parameters<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        union_into(&mut self.ignored_parameters, names);
        self
    }

    /// Whether a path item key is a recognized HTTP method.
    pub fn is_method(&self, key: &str) -> bool {
        self.methods.iter().any(|m| m == key)
    }

    /// Whether an operation name is on the ignore list.
    pub fn is_ignored_operation(&self, name: Option<&str>) -> bool {
        name.is_some_and(|n| self.ignored_operations.iter().any(|i| i == n))
    }

    /// Whether a parameter name is on the ignore list.
    pub fn is_ignored_parameter(&self, name: Option<&str>) -> bool {
        name.is_some_and(|n| self.ignored_parameters.iter().any(|i| i == n))
    }

    /// Reads a free-form setting.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}

fn union_into<I, S>(target: &mut Vec<String>, names: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for name in names {
        let name = name.into();
        if !target.contains(&name) {
            target.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.process_unreferenced_models);
        assert!(config.is_method("patch"));
        assert!(!config.is_method("parameters"));
    }

    #[test]
    fn test_partial_yaml() {
        let config = PipelineConfig::from_yaml_str(
            r#"
processUnreferencedModels: false
ignoredParameters: [tags]
settings:
  package: com.example
"#,
        )
        .unwrap();
        assert!(!config.process_unreferenced_models);
        assert!(config.is_ignored_parameter(Some("tags")));
        assert_eq!(config.methods.len(), 7);
        assert_eq!(config.setting("package").unwrap(), "com.example");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = PipelineConfig::from_yaml_str("methods: {").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_add_ignored_is_a_union() {
        let mut config = PipelineConfig::default();
        config
            .add_ignored_parameters(["tags", "limit"])
            .add_ignored_parameters(["tags"]);
        assert_eq!(config.ignored_parameters, vec!["tags", "limit"]);
        assert!(!config.is_ignored_operation(None));
    }
}
