//! Round-trip check of emitted text.
//!
//! The validator never corrects anything. Every finding is a defect the
//! passes should have repaired.

use std::collections::HashMap;

use crate::diagnostics::{Residual, ResidualKind};
use crate::loader::{self, Format};
use crate::model::{ComponentKind, Document, Parameter, ParameterLocation, RefOr};
use crate::naming::is_identifier;
use crate::options::{CancelToken, Canceled};
use crate::passes::path_placeholders;
use crate::refs::for_each_reference_mut;
use crate::schema::Composition;
use crate::traverse::{child_pointer, walk_document_mut};

/// Re-parse `text` and report what is still wrong with it.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips while walking the document.
#[tracing::instrument(skip_all, fields(file = file_name))]
pub fn validate(
    text: &str,
    file_name: &str,
    format: Format,
    cancel: &CancelToken,
) -> Result<Vec<Residual>, Canceled> {
    let mut doc = match loader::load(text, file_name, format) {
        Ok(loaded) => loaded.document,
        Err(e) => return Ok(vec![Residual::new(ResidualKind::Parse, "#", e.to_string())]),
    };
    let mut residuals = Vec::new();
    dangling_references(&mut doc, cancel, &mut residuals)?;
    operation_ids(&doc, &mut residuals);
    component_names(&doc, &mut residuals);
    path_parameters(&doc, &mut residuals);
    schema_shapes(&mut doc, cancel, &mut residuals)?;
    tracing::debug!(residuals = residuals.len(), "validated round trip");
    Ok(residuals)
}

fn dangling_references(
    doc: &mut Document,
    cancel: &CancelToken,
    residuals: &mut Vec<Residual>,
) -> Result<(), Canceled> {
    let components = doc.components.clone();
    for_each_reference_mut(doc, cancel, |kind, reference, pointer| {
        let resolves = ComponentKind::parse_reference(reference)
            .is_some_and(|(k, name)| k == kind && components.contains(kind, name));
        if !resolves {
            residuals.push(Residual::new(
                ResidualKind::DanglingReference,
                pointer,
                format!("`{reference}` does not resolve to a {kind} component"),
            ));
        }
    })
}

fn operation_ids(doc: &Document, residuals: &mut Vec<Residual>) {
    let mut seen: HashMap<&str, String> = HashMap::new();
    for (path, item) in &doc.paths {
        for (method, operation) in item.operations() {
            let pointer = format!("{}/{method}", child_pointer("#/paths", path));
            match operation.operation_id.as_deref().map(str::trim) {
                None | Some("") => residuals.push(Residual::new(
                    ResidualKind::MissingOperationId,
                    pointer,
                    "operation has no operationId",
                )),
                Some(id) => {
                    if let Some(first) = seen.get(id) {
                        residuals.push(Residual::new(
                            ResidualKind::DuplicateOperationId,
                            &pointer,
                            format!("operationId `{id}` is already used at {first}"),
                        ));
                    } else {
                        seen.insert(id, pointer);
                    }
                }
            }
        }
    }
}

fn component_names(doc: &Document, residuals: &mut Vec<Residual>) {
    for kind in ComponentKind::ALL {
        for name in doc.components.names(kind) {
            if !is_identifier(&name) {
                residuals.push(Residual::new(
                    ResidualKind::InvalidComponentName,
                    child_pointer(&format!("#/components/{}", kind.section()), &name),
                    format!("`{name}` is not a valid identifier"),
                ));
            }
        }
    }
}

fn path_parameter_names<'a>(
    doc: &'a Document,
    parameters: &'a [RefOr<Parameter>],
) -> Vec<&'a str> {
    parameters
        .iter()
        .filter_map(|p| doc.components.resolve_parameter(p))
        .filter(|p| p.location == Some(ParameterLocation::Path))
        .map(|p| p.name.as_str())
        .collect()
}

fn path_parameters(doc: &Document, residuals: &mut Vec<Residual>) {
    for (path, item) in &doc.paths {
        let base = child_pointer("#/paths", path);
        let placeholders = path_placeholders(path);
        let shared = path_parameter_names(doc, &item.parameters);
        let mut report = |pointer: String, name: &str| {
            residuals.push(Residual::new(
                ResidualKind::MissingPathParameter,
                pointer,
                format!("placeholder `{{{name}}}` has no path parameter"),
            ));
        };
        let mut operations = item.operations().peekable();
        if operations.peek().is_none() {
            for name in placeholders.iter().filter(|n| !shared.contains(&n.as_str())) {
                report(base.clone(), name.as_str());
            }
        }
        for (method, operation) in operations {
            let own = path_parameter_names(doc, &operation.parameters);
            for name in &placeholders {
                if !shared.contains(&name.as_str()) && !own.contains(&name.as_str()) {
                    report(format!("{base}/{method}"), name.as_str());
                }
            }
        }
    }
}

fn schema_shapes(
    doc: &mut Document,
    cancel: &CancelToken,
    residuals: &mut Vec<Residual>,
) -> Result<(), Canceled> {
    walk_document_mut(doc, cancel, &mut |schema, pointer| {
        if schema.is_reference() {
            return;
        }
        let implies_type = !schema.properties.is_empty()
            || schema.nullable
            || schema.has_composition()
            || schema.items.is_some();
        if schema.schema_type.is_none() && implies_type {
            residuals.push(Residual::new(
                ResidualKind::MissingType,
                pointer,
                "schema implies a type but declares none",
            ));
        }
        for which in Composition::ALL {
            for (i, member) in schema.composition(which).iter().enumerate() {
                if member.is_structurally_empty() {
                    residuals.push(Residual::new(
                        ResidualKind::EmptyCompositionMember,
                        format!("{pointer}/{}/{i}", which.keyword()),
                        "composition member constrains nothing",
                    ));
                }
            }
        }
        if let (Some(default), Some(values)) = (&schema.default, &schema.enum_values)
            && !values.contains(default)
        {
            residuals.push(Residual::new(
                ResidualKind::DefaultNotInEnum,
                pointer,
                format!("default {default} is not one of the enum values"),
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn residuals(value: &serde_json::Value) -> Vec<ResidualKind> {
        let text = serde_json::to_string(value).expect("serialize");
        validate(&text, "api.json", Format::Json, &CancelToken::new())
            .expect("not canceled")
            .into_iter()
            .map(|r| r.kind)
            .collect()
    }

    #[test]
    fn clean_document_has_no_residuals() {
        let doc = json!({
            "openapi": "3.0.3",
            "paths": {"/pets/{id}": {"get": {
                "operationId": "getPet",
                "parameters": [{"name": "id", "in": "path", "required": true}],
                "responses": {"200": {"description": "ok", "content": {"application/json": {
                    "schema": {"$ref": "#/components/schemas/Pet"}
                }}}}
            }}},
            "components": {"schemas": {"Pet": {"type": "object"}}}
        });
        assert_eq!(residuals(&doc), Vec::<ResidualKind>::new());
    }

    #[test]
    fn reports_each_kind_of_defect() {
        let doc = json!({
            "paths": {
                "/a/{id}": {"get": {
                    "operationId": "dup",
                    "responses": {"200": {"$ref": "#/components/responses/Gone"}}
                }},
                "/b": {
                    "get": {"operationId": "dup", "responses": {}},
                    "put": {"responses": {}}
                }
            },
            "components": {"schemas": {
                "Bad-Name": {"properties": {"x": {"type": "string"}}},
                "Color": {"type": "string", "enum": ["Red"], "default": "red"},
                "U": {"type": "object", "oneOf": [{}]}
            }}
        });
        let found = residuals(&doc);
        for kind in [
            ResidualKind::DanglingReference,
            ResidualKind::DuplicateOperationId,
            ResidualKind::MissingOperationId,
            ResidualKind::InvalidComponentName,
            ResidualKind::MissingPathParameter,
            ResidualKind::MissingType,
            ResidualKind::EmptyCompositionMember,
            ResidualKind::DefaultNotInEnum,
        ] {
            assert!(found.contains(&kind), "expected {kind} in {found:?}");
        }
    }

    #[test]
    fn unparseable_text_is_a_single_residual() {
        let found = validate("{", "api.json", Format::Json, &CancelToken::new())
            .expect("not canceled");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ResidualKind::Parse);
    }
}
