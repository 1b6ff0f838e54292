#![deny(missing_docs)]

//! # OasPipe Core
//!
//! Loads OpenAPI / Swagger documents split across files and URLs, resolves
//! cross-document pointers, and drives the phased generation pipeline that
//! groups operations into resources and decorates them through modules.

/// Shared error types.
pub mod error;

/// Canonical document locations.
pub mod location;

/// Parsed documents and the reference registry.
pub mod document;

/// Code injection blocklist.
pub mod sanitize;

/// Pointer dereferencing.
pub mod resolver;

/// Concurrent multi-document loading.
pub mod loader;

/// Module registry and dependency ordering.
pub mod modules;

/// Pipeline configuration.
pub mod config;

/// Resource and group naming.
pub mod naming;

/// Grouping, traversal and composition.
pub mod pipeline;

/// The built-in `Helpers` module.
pub mod helpers;

pub use config::PipelineConfig;
pub use document::{Document, LoadedSpecs, ReferenceRegistry};
pub use error::{
    AppError, AppResult, LoadError, LoadResult, ModuleError, ModuleResult, ReferenceError,
    ReferenceResult,
};
pub use loader::{DefaultFetcher, Fetched, Fetcher, Loader, LoaderOptions};
pub use location::Location;
pub use modules::{Module, ModuleRegistry};
pub use pipeline::{
    Classifier, Context, DefaultClassifier, Event, Phase, Pipeline, Scope, WriteEvent,
    WritePayload,
};
pub use resolver::{resolve, Resolved};
