#![deny(missing_docs)]

//! # Error Handling
//!
//! Provides the error taxonomy shared by the loader, the reference resolver,
//! the module registry and the pipeline, plus the unified `AppError` enum.

use derive_more::{Display, From};

/// Failures raised while fetching, parsing or validating documents.
///
/// Any single `LoadError` rejects the whole `Loader::load` call.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The caller supplied no locations.
    #[display("No document locations were supplied")]
    NoLocations,

    /// A location could not be turned into an absolute path or URL.
    #[display("Invalid document location '{location}': {reason}")]
    InvalidLocation {
        /// Raw location as supplied or referenced.
        location: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The transport (filesystem or network) failed.
    #[display("Failed to fetch {location}: {reason}")]
    Fetch {
        /// Canonical location.
        location: String,
        /// Transport error message.
        reason: String,
    },

    /// A remote location answered with a non-200 status.
    #[display("Received status code {status} for {location}")]
    Status {
        /// Canonical location.
        location: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body was neither valid JSON nor valid YAML.
    #[display("Failed to parse {location}: {reason}")]
    Parse {
        /// Canonical location.
        location: String,
        /// Parser error message.
        reason: String,
    },

    /// A root document lacks a numeric `openapi`/`swagger` marker >= 2.
    #[display(
        "{location} was not a valid OAS or swagger document (version 2.0 or greater is supported)"
    )]
    Version {
        /// Canonical location.
        location: String,
    },

    /// A string in the document matched the injection blocklist.
    #[display("Suspected code injection in {location}: {value}")]
    Injection {
        /// Canonical location.
        location: String,
        /// The offending original value.
        value: String,
    },

    /// A fetch task panicked or was cancelled.
    #[display("Document fetch task failed: {reason}")]
    Task {
        /// Join error message.
        reason: String,
    },
}

impl std::error::Error for LoadError {}

/// Failures raised while dereferencing pointers or linking composed schemas.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The external part of a pointer names a document that was never loaded.
    #[display("Could not find reference for {location}")]
    MissingDocument {
        /// External location part of the pointer.
        location: String,
    },

    /// A fragment segment does not exist in the target document.
    #[display("Could not find {path} in {location}")]
    MissingSegment {
        /// The pointer prefix up to and including the failing segment.
        path: String,
        /// Location of the document that was walked.
        location: String,
    },

    /// The `allOf` parent graph contains a cycle.
    #[display("Cyclic allOf composition: {}", chain.join(" -> "))]
    CompositionCycle {
        /// Model names forming the cycle, first name repeated at the end.
        chain: Vec<String>,
    },
}

impl std::error::Error for ReferenceError {}

/// Failures raised while resolving or installing modules.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// No module with this name was registered.
    #[display("Could not find module {name}")]
    Unknown {
        /// Requested module name.
        name: String,
    },

    /// A module was installed before one of its dependencies.
    #[display("{module} depends on {dependency} which is not loaded.")]
    MissingDependency {
        /// The module being installed.
        module: String,
        /// The dependency that is not installed yet.
        dependency: String,
    },
}

impl std::error::Error for ModuleError {}

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Document loading failed.
    #[display("Load Error: {_0}")]
    Load(LoadError),

    /// A pointer could not be resolved.
    #[display("Reference Error: {_0}")]
    Reference(ReferenceError),

    /// A module could not be resolved or installed.
    #[display("Module Error: {_0}")]
    Module(ModuleError),

    /// Invalid configuration file.
    /// We ignore this for `From<String>` to avoid conflict with General.
    #[from(ignore)]
    #[display("Config Error: {_0}")]
    Config(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for the loader.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result alias for the reference resolver.
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Result alias for the module registry.
pub type ModuleResult<T> = Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        // Test that String defaults to General, not Config
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_module_dependency_message() {
        let err = ModuleError::MissingDependency {
            module: "B".into(),
            dependency: "A".into(),
        };
        assert_eq!(err.to_string(), "B depends on A which is not loaded.");
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Module(_)));
    }

    #[test]
    fn test_reference_messages_name_the_pointer() {
        let err = ReferenceError::MissingSegment {
            path: "definitions/Pet".into(),
            location: "/specs/pets.yaml".into(),
        };
        assert_eq!(
            err.to_string(),
            "Could not find definitions/Pet in /specs/pets.yaml"
        );

        let cycle = ReferenceError::CompositionCycle {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(cycle.to_string(), "Cyclic allOf composition: A -> B -> A");
    }
}
