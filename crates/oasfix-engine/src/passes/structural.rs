use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::{Pass, PassContext};
use crate::loader::strip_angle_brackets;
use crate::model::{
    ComponentKind, Components, Document, Method, Parameter, ParameterLocation, PathItem, RefOr,
};
use crate::naming::{is_identifier, next_free, sanitize_identifier};
use crate::options::Canceled;
use crate::refs::{clean_reference, for_each_reference_mut, rewrite_references};

/// Operation ids, component names, path keys, path parameters and
/// reference syntax.
pub struct Structural;

impl Pass for Structural {
    fn name(&self) -> &'static str {
        "structural"
    }

    #[tracing::instrument(skip_all, name = "structural")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        clean_references(doc, cx)?;
        sanitize_component_names(doc, cx)?;
        normalize_path_keys(doc, cx)?;
        fix_operation_ids(doc, cx)?;
        repair_path_parameters(doc, cx)?;
        Ok(())
    }
}

fn clean_references(doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
    let mut cleaned = 0;
    for_each_reference_mut(doc, cx.cancel, |kind, reference, pointer| {
        if let Some(clean) = clean_reference(kind, reference) {
            tracing::warn!(pointer, from = %reference, to = %clean, "repaired reference syntax");
            *reference = clean;
            cleaned += 1;
        }
    })?;
    cx.stats.references_cleaned += cleaned;
    Ok(())
}

/// Rename components whose names fall outside the identifier grammar and
/// rewrite every reference to them.
fn sanitize_component_names(doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
    for kind in ComponentKind::ALL {
        cx.cancel.checkpoint()?;
        let mut renames = HashMap::new();
        for name in doc.components.names(kind) {
            if is_identifier(&name) {
                continue;
            }
            let base = sanitize_identifier(&name);
            let to = next_free(&base, |candidate| doc.components.contains(kind, candidate));
            if !doc.components.rename(kind, &name, &to) {
                continue;
            }
            tracing::warn!(%kind, from = %name, to = %to, "renamed invalid component");
            cx.stats.components_renamed += 1;
            // References were stripped of angle brackets before parsing, so
            // `Page<User>` is referred to as `PageUser`.
            let stripped = strip_angle_brackets(&name).into_owned();
            if stripped != name && !doc.components.contains(kind, &stripped) {
                renames.insert(stripped, to.clone());
            }
            renames.insert(name, to);
        }
        rewrite_references(doc, cx.cancel, kind, &renames)?;
    }
    Ok(())
}

/// Canonical spelling of a path key: trimmed, one leading slash, no
/// doubled or trailing slashes.
fn canonical_path(path: &str) -> String {
    let segments: Vec<&str> = path.trim().split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn normalize_path_keys(doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
    if doc
        .paths
        .keys()
        .all(|p| p.is_empty() || canonical_path(p) == *p)
    {
        return Ok(());
    }
    let paths = core::mem::take(&mut doc.paths);
    let mut out: IndexMap<String, PathItem> = IndexMap::with_capacity(paths.len());
    for (path, item) in paths {
        cx.cancel.checkpoint()?;
        // Empty keys are the emptiness pass's to remove.
        let key = if path.is_empty() {
            path.clone()
        } else {
            canonical_path(&path)
        };
        if key != path {
            tracing::warn!(from = %path, to = %key, "normalized path key");
        }
        if merge_path_item(&mut out, key, item) {
            cx.stats.paths_merged += 1;
        }
    }
    doc.paths = out;
    Ok(())
}

/// Insert `item` under `key`, merging into an existing item if the key is
/// taken. Methods the existing item lacks are moved over; conflicting
/// methods keep the existing operation and drop the incoming one. Returns
/// whether a merge happened.
pub fn merge_path_item(
    paths: &mut IndexMap<String, PathItem>,
    key: String,
    mut item: PathItem,
) -> bool {
    let Some(existing) = paths.get_mut(&key) else {
        paths.insert(key, item);
        return false;
    };
    for method in Method::ALL {
        let Some(operation) = item.operation_slot(method).take() else {
            continue;
        };
        let slot = existing.operation_slot(method);
        if slot.is_some() {
            tracing::warn!(path = %key, %method, "dropping conflicting operation on merged path");
        } else {
            *slot = Some(operation);
        }
    }
    for parameter in item.parameters {
        if !existing.parameters.contains(&parameter) {
            existing.parameters.push(parameter);
        }
    }
    for (k, v) in item.extensions {
        existing.extensions.entry(k).or_insert(v);
    }
    tracing::warn!(path = %key, "merged colliding path items");
    true
}

/// Synthesized id for an operation without one: `get /pets/{id}` becomes
/// `get_pets_by_id`.
fn synthesize_operation_id(method: Method, path: &str) -> String {
    let mut parts = vec![method.as_str().to_string()];
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            parts.push(format!("by_{name}"));
        } else {
            parts.push(segment.to_string());
        }
    }
    sanitize_identifier(&parts.join("_"))
}

/// Make every operation id present and unique. The first occurrence of an
/// id keeps it; later ones get `_fixed`, `_fixed2`, ...
fn fix_operation_ids(doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
    let mut seen: HashSet<String> = HashSet::new();
    for (path, item) in &mut doc.paths {
        cx.cancel.checkpoint()?;
        for (method, operation) in item.operations_mut() {
            let current = operation
                .operation_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty());
            let base = match current {
                Some(id) => id.to_string(),
                None => {
                    let id = synthesize_operation_id(method, path);
                    tracing::warn!(
                        path = %path, %method, operation = %id,
                        "synthesized operation id"
                    );
                    id
                }
            };
            let id = if seen.contains(&base) {
                let fixed = next_free(&format!("{base}_fixed"), |c| seen.contains(c));
                tracing::warn!(
                    path = %path, %method, from = %base, to = %fixed,
                    "renamed duplicate operation id"
                );
                fixed
            } else {
                base
            };
            if operation.operation_id.as_deref() != Some(id.as_str()) {
                cx.stats.operation_ids_fixed += 1;
                operation.operation_id = Some(id.clone());
            }
            seen.insert(id);
        }
    }
    Ok(())
}

/// Placeholder names of a path template in order of first appearance.
pub fn path_placeholders(path: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    names
}

fn force_required(parameters: &mut [RefOr<Parameter>]) -> usize {
    let mut forced = 0;
    for parameter in parameters.iter_mut().filter_map(RefOr::as_item_mut) {
        if parameter.location == Some(ParameterLocation::Path) && !parameter.required {
            parameter.required = true;
            forced += 1;
        }
    }
    forced
}

fn declared_path_names<'a>(
    components: &'a Components,
    parameters: &'a [RefOr<Parameter>],
) -> Vec<&'a str> {
    parameters
        .iter()
        .filter_map(|p| components.resolve_parameter(p))
        .filter(|p| p.location == Some(ParameterLocation::Path))
        .map(|p| p.name.as_str())
        .collect()
}

/// Declare every path placeholder as a required path parameter.
fn repair_path_parameters(doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
    let Document {
        paths, components, ..
    } = doc;
    for parameter in components.parameters.values_mut() {
        force_required(core::slice::from_mut(parameter));
    }
    for (path, item) in paths.iter_mut() {
        cx.cancel.checkpoint()?;
        let placeholders = path_placeholders(path);
        force_required(&mut item.parameters);
        let shared: Vec<String> = declared_path_names(components, &item.parameters)
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut has_operations = false;
        for (method, operation) in item.operations_mut() {
            has_operations = true;
            force_required(&mut operation.parameters);
            let own = declared_path_names(components, &operation.parameters);
            let missing: Vec<String> = placeholders
                .iter()
                .filter(|name| !shared.contains(name) && !own.contains(&name.as_str()))
                .cloned()
                .collect();
            for name in missing {
                tracing::warn!(
                    path = %path, %method, parameter = %name,
                    "added missing path parameter"
                );
                operation.parameters.push(RefOr::Item(Parameter::path(&name)));
                cx.stats.path_parameters_added += 1;
            }
        }
        if !has_operations {
            for name in placeholders.iter().filter(|name| !shared.contains(name)) {
                tracing::warn!(path = %path, parameter = %name, "added missing path parameter");
                item.parameters.push(RefOr::Item(Parameter::path(name)));
                cx.stats.path_parameters_added += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::diagnostics::RepairStats;
    use crate::options::{CancelToken, FixOptions};

    fn run(value: serde_json::Value) -> (Document, RepairStats) {
        let mut doc: Document = serde_json::from_value(value).expect("document deserializes");
        let options = FixOptions::default();
        let cancel = CancelToken::new();
        let mut stats = RepairStats::default();
        let mut cx = PassContext {
            options: &options,
            cancel: &cancel,
            stats: &mut stats,
        };
        Structural.run(&mut doc, &mut cx).expect("not canceled");
        (doc, stats)
    }

    fn ids(doc: &Document) -> Vec<String> {
        doc.paths
            .values()
            .flat_map(|item| item.operations().filter_map(|(_, op)| op.operation_id.clone()))
            .collect()
    }

    #[test]
    fn duplicate_operation_ids_get_fixed_suffixes() {
        let (doc, stats) = run(json!({"paths": {
            "/things": {"get": {"operationId": "listThings"}},
            "/things/all": {"get": {"operationId": "listThings"}},
            "/things/every": {"get": {"operationId": "listThings"}}
        }}));
        assert_eq!(ids(&doc), ["listThings", "listThings_fixed", "listThings_fixed2"]);
        assert_eq!(stats.operation_ids_fixed, 2);
    }

    #[test]
    fn missing_operation_ids_are_synthesized() {
        let (doc, _) = run(json!({"paths": {
            "/pets/{petId}": {"get": {}, "delete": {"operationId": "  "}}
        }}));
        assert_eq!(ids(&doc), ["get_pets_by_petId", "delete_pets_by_petId"]);
    }

    #[test]
    fn invalid_component_names_are_renamed_with_references() {
        let (doc, stats) = run(json!({
            "paths": {"/a": {"get": {"responses": {"200": {
                "description": "ok",
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Page<User>"}}}
            }}}}},
            "components": {"schemas": {
                "Page<User>": {"type": "object"},
                "Page_User": {"type": "string"},
                "2fa": {"$ref": "#/definitions/Page<User>"}
            }}
        }));
        assert_eq!(
            doc.components.names(ComponentKind::Schema),
            ["Page_User2", "Page_User", "_2fa"]
        );
        let schema = doc.paths["/a"].get.as_ref().expect("get").responses["200"]
            .as_item()
            .expect("inline response")
            .content["application/json"]
            .schema
            .as_ref()
            .expect("schema");
        assert_eq!(schema.reference.as_deref(), Some("#/components/schemas/Page_User2"));
        assert_eq!(
            doc.components.schemas["_2fa"].reference.as_deref(),
            Some("#/components/schemas/Page_User2")
        );
        assert_eq!(stats.components_renamed, 2);
    }

    #[test]
    fn missing_path_parameters_are_added_and_declared_ones_required() {
        let (doc, stats) = run(json!({"paths": {"/users/{userId}/posts/{postId}": {
            "parameters": [{"name": "userId", "in": "path"}],
            "get": {"operationId": "getPost"}
        }}}));
        let item = &doc.paths["/users/{userId}/posts/{postId}"];
        assert!(item.parameters[0].as_item().expect("inline").required);
        let added = item.get.as_ref().expect("get").parameters[0]
            .as_item()
            .expect("inline");
        assert_eq!(added.name, "postId");
        assert!(added.required);
        assert_eq!(stats.path_parameters_added, 1);
    }

    #[test]
    fn colliding_path_keys_merge() {
        let (doc, stats) = run(json!({"paths": {
            "/pets": {"get": {"operationId": "list"}},
            "/pets/": {"get": {"operationId": "other"}, "post": {"operationId": "create"}}
        }}));
        assert_eq!(doc.paths.len(), 1);
        assert_eq!(ids(&doc), ["list", "create"]);
        assert_eq!(stats.paths_merged, 1);
    }

    #[test]
    fn placeholders_in_order() {
        assert_eq!(path_placeholders("/a/{id}/b/{id}/{x}"), ["id", "x"]);
        assert!(path_placeholders("/plain").is_empty());
    }
}
