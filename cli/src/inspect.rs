#![deny(missing_docs)]

//! # Inspect Command
//!
//! Loads one or more root documents, installs the requested modules, runs
//! every pipeline phase and prints the resources, groups, operations and
//! composed models the run produced.

use crate::error::{CliError, CliResult};
use clap::{Args, ValueEnum};
use oaspipe_core::pipeline::{ModelSchema, Property, Resource};
use oaspipe_core::{
    AppError, AppResult, Context, Loader, LoaderOptions, Pipeline, PipelineConfig, WriteEvent,
};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Output rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Indented outline written from the write phase.
    Text,
    /// The final context serialized as JSON.
    Json,
}

/// Arguments for the inspect command.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Root documents: file paths or http(s) URLs.
    #[clap(required = true)]
    pub locations: Vec<String>,

    /// Pipeline configuration file (YAML or JSON).
    #[clap(long, env = "OASPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Operation to skip, by `x-resource-operation` or `operationId`.
    #[clap(long = "ignore-operation")]
    pub ignored_operations: Vec<String>,

    /// Parameter name to filter out of every operation.
    #[clap(long = "ignore-parameter")]
    pub ignored_parameters: Vec<String>,

    /// Only process models reachable from operations.
    #[clap(long)]
    pub skip_unreferenced_models: bool,

    /// Strip suspected code injection instead of failing the load.
    #[clap(long)]
    pub allow_injection: bool,

    /// Disable the code injection scan.
    #[clap(long)]
    pub no_sanitize: bool,

    /// Modules to install, dependencies first.
    #[clap(long = "module", default_value = "Helpers")]
    pub modules: Vec<String>,

    /// Output format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: Format,
}

/// Executes the inspect command and prints the report to stdout.
pub async fn execute(args: &InspectArgs) -> CliResult<()> {
    let output = run(args).await?;
    print!("{}", output);
    Ok(())
}

/// Runs the command and returns the rendered report.
pub async fn run(args: &InspectArgs) -> CliResult<String> {
    let config = build_config(args)?;

    let loader = Loader::new().options(LoaderOptions {
        sanitize: !args.no_sanitize,
        allow_injection: args.allow_injection,
    });
    let specs = loader.load(&args.locations).await?;
    if loader.poison_detected() {
        tracing::warn!("suspected code injection was stripped from the input");
    }
    tracing::info!(
        roots = specs.roots.len(),
        documents = specs.references.len(),
        "documents loaded"
    );
    for document in specs.references.documents() {
        let version = document.version().unwrap_or_default();
        tracing::debug!(location = %document.location, version = %version, "document");
    }

    let mut pipeline = Pipeline::new(config);
    pipeline.use_named(&args.modules)?;

    let report = Arc::new(Mutex::new(String::new()));
    if args.format == Format::Text {
        register_report(&mut pipeline, &report);
    }

    let context = pipeline.process(&specs)?;
    tracing::info!(
        resources = context.resources.len(),
        operations = context.operations.len(),
        models = context.models.len(),
        "pipeline finished"
    );

    match args.format {
        Format::Json => {
            let mut json = serde_json::to_string_pretty(&context)?;
            json.push('\n');
            Ok(json)
        }
        Format::Text => {
            let text = report
                .lock()
                .map_err(|_| CliError::General("Report buffer was poisoned".into()))?;
            Ok(text.clone())
        }
    }
}

fn build_config(args: &InspectArgs) -> CliResult<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    config
        .add_ignored_operations(args.ignored_operations.iter().cloned())
        .add_ignored_parameters(args.ignored_parameters.iter().cloned());
    if args.skip_unreferenced_models {
        config.process_unreferenced_models = false;
    }
    Ok(config)
}

fn register_report(pipeline: &mut Pipeline, report: &Arc<Mutex<String>>) {
    let documents = Arc::clone(report);
    pipeline.on_write("Specification", move |event: &mut WriteEvent<'_>| {
        if let Some(document) = event.document() {
            append(&documents, |out| {
                writeln!(
                    out,
                    "document {} ({})",
                    document.location,
                    document.version().as_deref().unwrap_or("referenced")
                )
            })?;
        }
        Ok(())
    });

    let resources = Arc::clone(report);
    pipeline.on_write("Resource", move |event: &mut WriteEvent<'_>| {
        if let Some(resource) = event.resource() {
            append(&resources, |out| write_resource(out, resource, event.context))?;
        }
        Ok(())
    });

    let models = Arc::clone(report);
    pipeline.on_write("Model", move |event: &mut WriteEvent<'_>| {
        if let Some(model) = event.model() {
            append(&models, |out| write_model(out, model))?;
        }
        Ok(())
    });
}

fn append<F>(report: &Mutex<String>, render: F) -> AppResult<()>
where
    F: FnOnce(&mut String) -> std::fmt::Result,
{
    let mut out = report
        .lock()
        .map_err(|_| AppError::General("Report buffer was poisoned".into()))?;
    render(&mut out).map_err(|e| AppError::General(e.to_string()))
}

fn write_resource(out: &mut String, resource: &Resource, context: &Context) -> std::fmt::Result {
    writeln!(out, "resource {}", resource.name)?;
    for group in resource.groups.values() {
        writeln!(out, "  {} ({})", group.name, group.kind)?;
        for operation in group.operations.iter().filter_map(|id| context.operation(*id)) {
            writeln!(
                out,
                "    {} {} {}",
                operation.http_method(),
                operation.path,
                operation.operation_id.as_deref().unwrap_or("-")
            )?;
        }
    }
    Ok(())
}

fn write_model(out: &mut String, model: &ModelSchema) -> std::fmt::Result {
    if model.parents.is_empty() {
        writeln!(out, "model {}", model.name)?;
    } else {
        writeln!(out, "model {} : {}", model.name, model.parents.join(", "))?;
    }
    for property in model.all_properties.values() {
        let required = if model.all_required.contains(&property.name) {
            " (required)"
        } else {
            ""
        };
        writeln!(out, "  {}: {}{}", property.name, type_label(property), required)?;
    }
    if !model.referenced_by.is_empty() {
        writeln!(out, "  derived: {}", model.referenced_by.join(", "))?;
    }
    Ok(())
}

fn type_label(property: &Property) -> String {
    let base = property
        .reference
        .as_deref()
        .or(property.type_name.as_deref().filter(|t| *t != "array"))
        .unwrap_or("object");
    if property.is_array {
        format!("[{}]", base)
    } else {
        base.to_string()
    }
}
