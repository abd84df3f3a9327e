//! Fixes for specific known-bad inputs.
//!
//! Each patch is named and can be disabled through
//! [`FixOptions::disabled_patches`]. Patches run after the general passes
//! and must leave the document as valid as they found it.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::diagnostics::RepairStats;
use crate::model::{Document, Parameter, ParameterLocation, PathItem, RefOr};
use crate::naming::next_free;
use crate::options::{CancelToken, Canceled, FixOptions};
use crate::passes::{merge_path_item, path_placeholders};
use crate::schema::{AdditionalProperties, Schema, SchemaType};

/// A named fix. `apply` returns how many places it changed.
pub struct Patch {
    pub name: &'static str,
    pub description: &'static str,
    apply: fn(&mut Document) -> usize,
}

impl Patch {
    pub fn apply(&self, doc: &mut Document) -> usize {
        (self.apply)(doc)
    }
}

pub static PATCHES: &[Patch] = &[
    Patch {
        name: "duplicate-path-placeholder",
        description: "rename a repeated path placeholder and declare the new parameter",
        apply: duplicate_path_placeholder,
    },
    Patch {
        name: "siprec-parameter",
        description: "align path parameter case with the placeholder under /Siprec paths",
        apply: siprec_parameter,
    },
    Patch {
        name: "tool-parameter-placeholder",
        description: "make empty `parameters` of tool and function schemas free-form objects",
        apply: tool_parameter_placeholder,
    },
];

/// Run every enabled patch in table order.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips between two patches.
#[tracing::instrument(skip_all, name = "patches")]
pub fn apply_patches(
    doc: &mut Document,
    options: &FixOptions,
    cancel: &CancelToken,
    stats: &mut RepairStats,
) -> Result<(), Canceled> {
    for patch in PATCHES {
        cancel.checkpoint()?;
        if !options.patch_enabled(patch.name) {
            tracing::debug!(patch = patch.name, "patch disabled");
            continue;
        }
        let applied = patch.apply(doc);
        if applied > 0 {
            tracing::warn!(patch = patch.name, applied, "applied patch");
            stats.patches_applied += applied;
        }
    }
    Ok(())
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Rename repeated placeholders of `path` with a numeric suffix. Returns the
/// rewritten path and the new names, or `None` if nothing repeats.
fn dedupe_placeholders(path: &str) -> Option<(String, Vec<String>)> {
    let existing = path_placeholders(path);
    let mut seen: Vec<String> = Vec::new();
    let mut renamed: Vec<String> = Vec::new();
    let rewritten = PLACEHOLDER.replace_all(path, |caps: &Captures<'_>| {
        let name = &caps[1];
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
            return caps[0].to_string();
        }
        let fresh = next_free(name, |candidate| {
            existing.iter().chain(&seen).any(|taken| taken == candidate)
        });
        seen.push(fresh.clone());
        renamed.push(fresh.clone());
        format!("{{{fresh}}}")
    });
    let rewritten = rewritten.into_owned();
    (!renamed.is_empty()).then_some((rewritten, renamed))
}

fn declare_path_parameters(item: &mut PathItem, names: &[String]) {
    let mut declared = false;
    for (_, operation) in item.operations_mut() {
        declared = true;
        for name in names {
            operation.parameters.push(RefOr::Item(Parameter::path(name)));
        }
    }
    if !declared {
        for name in names {
            item.parameters.push(RefOr::Item(Parameter::path(name)));
        }
    }
}

fn duplicate_path_placeholder(doc: &mut Document) -> usize {
    let mut applied = 0;
    for (path, mut item) in core::mem::take(&mut doc.paths) {
        let key = match dedupe_placeholders(&path) {
            Some((rewritten, renamed)) => {
                tracing::warn!(path = %path, to = %rewritten, "renamed repeated path placeholder");
                declare_path_parameters(&mut item, &renamed);
                applied += 1;
                rewritten
            }
            None => path,
        };
        merge_path_item(&mut doc.paths, key, item);
    }
    applied
}

/// Rename path parameters of `parameters` that match a placeholder only up
/// to letter case.
fn align_parameter_case(
    parameters: &mut [RefOr<Parameter>],
    placeholders: &[String],
    path: &str,
) -> usize {
    let mut renamed = 0;
    for parameter in parameters.iter_mut().filter_map(RefOr::as_item_mut) {
        if parameter.location != Some(ParameterLocation::Path)
            || placeholders.contains(&parameter.name)
        {
            continue;
        }
        if let Some(placeholder) = placeholders
            .iter()
            .find(|p| p.eq_ignore_ascii_case(&parameter.name))
        {
            tracing::warn!(
                path,
                from = %parameter.name,
                to = %placeholder,
                "aligned parameter case"
            );
            parameter.name.clone_from(placeholder);
            renamed += 1;
        }
    }
    renamed
}

fn siprec_parameter(doc: &mut Document) -> usize {
    let mut applied = 0;
    for (path, item) in doc.paths.iter_mut().filter(|(p, _)| p.contains("/Siprec")) {
        let placeholders = path_placeholders(path);
        applied += align_parameter_case(&mut item.parameters, &placeholders, path);
        for (_, operation) in item.operations_mut() {
            applied += align_parameter_case(&mut operation.parameters, &placeholders, path);
        }
    }
    applied
}

fn tool_parameter_placeholder(doc: &mut Document) -> usize {
    let mut applied = 0;
    for (name, schema) in &mut doc.components.schemas {
        if !(name.contains("Tool") || name.contains("Function")) {
            continue;
        }
        let Some(parameters) = schema.properties.get_mut("parameters") else {
            continue;
        };
        if parameters.is_structurally_empty() {
            tracing::warn!(schema = %name, "replacing placeholder parameters with an open object");
            *parameters = Schema {
                schema_type: Some(SchemaType::Object),
                additional_properties: Some(AdditionalProperties::Bool(true)),
                description: parameters.description.take(),
                ..Schema::default()
            };
            applied += 1;
        }
    }
    applied
}
