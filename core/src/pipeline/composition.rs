#![deny(missing_docs)]

//! # Schema Composition
//!
//! Derives the `allOf` inheritance sets from the explicit parent graph kept
//! on each `ModelSchema`. Everything derived is recomputed from scratch, so
//! the result does not depend on the order models were first seen in.

use crate::error::{ReferenceError, ReferenceResult};
use crate::pipeline::context::{ModelSchema, Property};
use indexmap::{IndexMap, IndexSet};

/// Recomputes `referenced_by`, `recursive_referenced_by`, `all_properties`,
/// `all_required` and `all_references` for every model.
///
/// Parents that were never processed are ignored.
///
/// # Errors
///
/// `ReferenceError::CompositionCycle` when a model is its own ancestor.
pub fn link(models: &mut IndexMap<String, ModelSchema>) -> ReferenceResult<()> {
    check_acyclic(models)?;

    let mut referenced_by: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut recursive: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut flattened = Vec::with_capacity(models.len());

    for (name, model) in models.iter() {
        for parent in known_parents(models, model) {
            push_unique(referenced_by.entry(parent.clone()).or_default(), name);
        }
        for ancestor in ancestors(models, name) {
            push_unique(recursive.entry(ancestor).or_default(), name);
        }
        flattened.push(flatten(models, model));
    }

    for ((name, model), (all_properties, all_required, all_references)) in
        models.iter_mut().zip(flattened)
    {
        model.referenced_by = referenced_by.shift_remove(name).unwrap_or_default();
        model.recursive_referenced_by = recursive.shift_remove(name).unwrap_or_default();
        model.all_properties = all_properties;
        model.all_required = all_required;
        model.all_references = all_references;
    }
    Ok(())
}

fn known_parents<'m>(
    models: &'m IndexMap<String, ModelSchema>,
    model: &'m ModelSchema,
) -> impl Iterator<Item = &'m String> + 'm {
    model.parents.iter().filter(|p| models.contains_key(p.as_str()))
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Every ancestor of `name`, each parent followed by its own ancestors.
fn ancestors(models: &IndexMap<String, ModelSchema>, name: &str) -> Vec<String> {
    let mut found = IndexSet::new();
    collect_ancestors(models, name, &mut found);
    found.into_iter().collect()
}

fn collect_ancestors(
    models: &IndexMap<String, ModelSchema>,
    name: &str,
    found: &mut IndexSet<String>,
) {
    let Some(model) = models.get(name) else {
        return;
    };
    for parent in known_parents(models, model) {
        if found.insert(parent.clone()) {
            collect_ancestors(models, parent, found);
        }
    }
}

type Flattened = (IndexMap<String, Property>, Vec<String>, Vec<String>);

/// Ancestors' properties and required names first, own last.
fn flatten(models: &IndexMap<String, ModelSchema>, model: &ModelSchema) -> Flattened {
    let mut properties = IndexMap::new();
    let mut required = Vec::new();
    for parent in known_parents(models, model) {
        if let Some(parent) = models.get(parent) {
            let (parent_properties, parent_required, _) = flatten(models, parent);
            properties.extend(parent_properties);
            for name in parent_required {
                push_unique(&mut required, &name);
            }
        }
    }
    properties.extend(
        model
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    for name in &model.required {
        push_unique(&mut required, name);
    }
    (properties, required, ancestors(models, &model.name))
}

fn check_acyclic(models: &IndexMap<String, ModelSchema>) -> ReferenceResult<()> {
    let mut done = IndexSet::new();
    for name in models.keys() {
        let mut stack = Vec::new();
        visit(models, name, &mut stack, &mut done)?;
    }
    Ok(())
}

fn visit(
    models: &IndexMap<String, ModelSchema>,
    name: &str,
    stack: &mut Vec<String>,
    done: &mut IndexSet<String>,
) -> ReferenceResult<()> {
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = stack.iter().position(|n| n == name) {
        let mut chain = stack[start..].to_vec();
        chain.push(name.to_string());
        return Err(ReferenceError::CompositionCycle { chain });
    }
    let Some(model) = models.get(name) else {
        return Ok(());
    };

    stack.push(name.to_string());
    for parent in known_parents(models, model) {
        visit(models, parent, stack, done)?;
    }
    stack.pop();
    done.insert(name.to_string());
    Ok(())
}
