use indexmap::IndexMap;

use super::metadata::sanitize_schema;
use super::{Pass, PassContext, normalize_schema};
use crate::diagnostics::RepairStats;
use crate::model::{
    Components, Document, Header, MediaType, Method, Operation, Parameter, RefOr, RequestBody,
    Response, SecurityRequirement,
};
use crate::options::Canceled;
use crate::traverse::{child_pointer, walk_document_mut};

/// Remove empty keys, empty security requirements and empty composition
/// members; give bodiless request bodies and responseless operations a
/// fallback.
pub struct Emptiness;

impl Pass for Emptiness {
    fn name(&self) -> &'static str {
        "emptiness"
    }

    #[tracing::instrument(skip_all, name = "emptiness")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        let mut removed = retain_named(&mut doc.paths, "#/paths");
        removed += clean_components(&mut doc.components, cx.stats);
        removed += clean_security(&mut doc.security, "#/security");
        for (path, item) in &mut doc.paths {
            cx.cancel.checkpoint()?;
            let base = child_pointer("#/paths", path);
            removed += clean_parameters(&mut item.parameters, &base);
            for (method, operation) in item.operations_mut() {
                let pointer = format!("{base}/{method}");
                removed += clean_operation(operation, method, &pointer, cx.stats);
            }
        }
        cx.stats.empty_entries_removed += removed;

        // Re-normalizing can absorb an enum next to a default that metadata
        // already settled, so each node is sanitized again afterwards.
        let options = cx.options;
        let stats = &mut *cx.stats;
        walk_document_mut(doc, cx.cancel, &mut |schema, pointer| {
            stats.empty_entries_removed += retain_named(&mut schema.properties, pointer);
            stats.empty_entries_removed += retain_required(&mut schema.required, pointer);
            normalize_schema(schema, pointer, options, stats);
            sanitize_schema(schema, pointer, options.max_example_length, stats);
        })
    }
}

/// Drop entries whose key is empty or blank. Returns the number dropped.
fn retain_named<V>(map: &mut IndexMap<String, V>, pointer: &str) -> usize {
    let before = map.len();
    map.retain(|key, _| !key.trim().is_empty());
    let removed = before - map.len();
    if removed > 0 {
        tracing::warn!(pointer, removed, "removed entries with empty keys");
    }
    removed
}

/// Drop blank names from a `required` list.
fn retain_required(required: &mut Vec<String>, pointer: &str) -> usize {
    let before = required.len();
    required.retain(|name| !name.trim().is_empty());
    let removed = before - required.len();
    if removed > 0 {
        tracing::warn!(pointer, removed, "removed blank required names");
    }
    removed
}

fn clean_content(content: &mut IndexMap<String, MediaType>, pointer: &str) -> usize {
    retain_named(content, &format!("{pointer}/content"))
}

fn clean_parameter(parameter: &mut Parameter, pointer: &str) -> usize {
    clean_content(&mut parameter.content, pointer)
}

fn clean_parameters(parameters: &mut [RefOr<Parameter>], pointer: &str) -> usize {
    parameters
        .iter_mut()
        .enumerate()
        .filter_map(|(i, p)| p.as_item_mut().map(|p| (i, p)))
        .map(|(i, p)| clean_parameter(p, &format!("{pointer}/parameters/{i}")))
        .sum()
}

fn clean_header(header: &mut Header, pointer: &str) -> usize {
    clean_content(&mut header.content, pointer)
}

fn clean_response(response: &mut Response, pointer: &str) -> usize {
    let mut removed = retain_named(&mut response.headers, &format!("{pointer}/headers"));
    for (name, header) in &mut response.headers {
        if let RefOr::Item(header) = header {
            removed += clean_header(header, &child_pointer(&format!("{pointer}/headers"), name));
        }
    }
    removed + clean_content(&mut response.content, pointer)
}

/// Returns `true` if the body had no content and was replaced.
fn fill_request_body(body: &mut RequestBody, pointer: &str) -> bool {
    if !body.content.is_empty() {
        return false;
    }
    tracing::warn!(pointer, "request body without content, using a generic JSON body");
    let generic = RequestBody::generic();
    body.content = generic.content;
    true
}

/// Drop requirements with no scheme bound, and the list if that empties it.
fn clean_security(security: &mut Option<Vec<SecurityRequirement>>, pointer: &str) -> usize {
    let Some(requirements) = security.as_mut() else {
        return 0;
    };
    let before = requirements.len();
    requirements.retain(|requirement| !requirement.is_empty());
    let removed = before - requirements.len();
    if removed > 0 {
        tracing::warn!(pointer, removed, "removed empty security requirements");
        if requirements.is_empty() {
            *security = None;
        }
    }
    removed
}

fn clean_components(components: &mut Components, stats: &mut RepairStats) -> usize {
    let mut removed = retain_named(&mut components.schemas, "#/components/schemas");
    removed += retain_named(&mut components.parameters, "#/components/parameters");
    removed += retain_named(&mut components.request_bodies, "#/components/requestBodies");
    removed += retain_named(&mut components.responses, "#/components/responses");
    removed += retain_named(&mut components.headers, "#/components/headers");
    removed += retain_named(&mut components.security_schemes, "#/components/securitySchemes");

    for (name, parameter) in &mut components.parameters {
        if let RefOr::Item(parameter) = parameter {
            removed += clean_parameter(parameter, &child_pointer("#/components/parameters", name));
        }
    }
    for (name, body) in &mut components.request_bodies {
        if let RefOr::Item(body) = body {
            let pointer = child_pointer("#/components/requestBodies", name);
            removed += clean_content(&mut body.content, &pointer);
            if fill_request_body(body, &pointer) {
                stats.fallbacks_added += 1;
            }
        }
    }
    for (name, response) in &mut components.responses {
        if let RefOr::Item(response) = response {
            removed += clean_response(response, &child_pointer("#/components/responses", name));
        }
    }
    for (name, header) in &mut components.headers {
        if let RefOr::Item(header) = header {
            removed += clean_header(header, &child_pointer("#/components/headers", name));
        }
    }
    removed
}

fn clean_operation(
    operation: &mut Operation,
    method: Method,
    pointer: &str,
    stats: &mut RepairStats,
) -> usize {
    let mut removed = clean_parameters(&mut operation.parameters, pointer);
    removed += clean_security(&mut operation.security, &format!("{pointer}/security"));
    if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
        let body_pointer = format!("{pointer}/requestBody");
        removed += clean_content(&mut body.content, &body_pointer);
        if fill_request_body(body, &body_pointer) {
            stats.fallbacks_added += 1;
        }
    }
    let responses = format!("{pointer}/responses");
    removed += retain_named(&mut operation.responses, &responses);
    for (status, response) in &mut operation.responses {
        if let RefOr::Item(response) = response {
            removed += clean_response(response, &child_pointer(&responses, status));
        }
    }
    if operation.responses.is_empty() {
        let status = method.success_status();
        tracing::warn!(pointer, status, "operation without responses, adding a fallback");
        operation
            .responses
            .insert(status.to_string(), RefOr::Item(Response::generic(status)));
        stats.fallbacks_added += 1;
    }
    removed
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::options::{CancelToken, FixOptions};

    fn run(value: Value) -> (Value, RepairStats) {
        let mut doc: Document = serde_json::from_value(value).expect("document deserializes");
        let options = FixOptions::default();
        let cancel = CancelToken::new();
        let mut stats = RepairStats::default();
        let mut cx = PassContext {
            options: &options,
            cancel: &cancel,
            stats: &mut stats,
        };
        Emptiness.run(&mut doc, &mut cx).expect("not canceled");
        (serde_json::to_value(&doc).expect("serialize"), stats)
    }

    #[test]
    fn empty_keys_are_removed_everywhere() {
        let (doc, stats) = run(json!({
            "paths": {
                "": {"get": {"responses": {"200": {"description": "ok"}}}},
                "/a": {"get": {"responses": {
                    "": {"description": "nameless"},
                    "200": {"description": "ok", "content": {
                        "": {},
                        "application/json": {"schema": {"type": "object", "properties": {
                            "": {"type": "string"},
                            "id": {"type": "string"}
                        }}}
                    }}
                }}}
            },
            "components": {"schemas": {" ": {"type": "string"}, "Kept": {"type": "string"}}}
        }));
        assert!(doc["paths"].get("").is_none());
        let responses = &doc["paths"]["/a"]["get"]["responses"];
        assert!(responses.get("").is_none());
        let content = &responses["200"]["content"];
        assert!(content.get("").is_none());
        assert_eq!(
            content["application/json"]["schema"]["properties"],
            json!({"id": {"type": "string"}})
        );
        assert_eq!(doc["components"]["schemas"], json!({"Kept": {"type": "string"}}));
        assert_eq!(stats.empty_entries_removed, 5);
    }

    #[test]
    fn missing_responses_get_method_fallbacks() {
        let (doc, stats) = run(json!({"paths": {"/a": {
            "post": {"responses": {}},
            "delete": {"responses": {}},
            "get": {"responses": {}}
        }}}));
        let item = &doc["paths"]["/a"];
        assert_eq!(item["post"]["responses"]["201"]["description"], json!("Success"));
        assert_eq!(
            item["delete"]["responses"]["204"],
            json!({"description": "No Content"})
        );
        assert!(item["get"]["responses"].get("200").is_some());
        assert_eq!(stats.fallbacks_added, 3);
    }

    #[test]
    fn bodiless_request_body_gets_generic_content() {
        let (doc, _) = run(json!({"paths": {"/a": {"put": {
            "requestBody": {"required": true, "content": {}},
            "responses": {"200": {"description": "ok"}}
        }}}}));
        assert_eq!(
            doc["paths"]["/a"]["put"]["requestBody"],
            json!({
                "content": {"application/json": {"schema": {"type": "object"}}},
                "required": true
            })
        );
    }

    #[test]
    fn empty_security_requirements_are_dropped() {
        let (doc, _) = run(json!({
            "security": [{}, {"apiKey": []}],
            "paths": {"/a": {"get": {
                "security": [{}],
                "responses": {"200": {"description": "ok"}}
            }}}
        }));
        assert_eq!(doc["security"], json!([{"apiKey": []}]));
        assert!(doc["paths"]["/a"]["get"].get("security").is_none());
    }

    #[test]
    fn empty_composition_members_are_pruned_and_parent_renormalized() {
        let (doc, _) = run(json!({"components": {"schemas": {
            "Pet": {"allOf": [{}, {"$ref": "#/components/schemas/Base"}]},
            "Base": {"type": "object"}
        }}}));
        assert_eq!(
            doc["components"]["schemas"]["Pet"],
            json!({"$ref": "#/components/schemas/Base"})
        );
    }

    #[test]
    fn blank_required_names_go_with_blank_properties() {
        let (doc, stats) = run(json!({"components": {"schemas": {"Pet": {
            "type": "object",
            "required": ["", "id", " "],
            "properties": {"": {"type": "string"}, "id": {"type": "string"}}
        }}}}));
        assert_eq!(
            doc["components"]["schemas"]["Pet"],
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {"id": {"type": "string"}}
            })
        );
        assert_eq!(stats.empty_entries_removed, 3);
    }

    #[test]
    fn absorbed_enum_brings_the_default_into_line() {
        let (doc, stats) = run(json!({"components": {"schemas": {"Level": {
            "type": "object",
            "default": {},
            "allOf": [{}, {"type": "string", "enum": ["a", "b"]}]
        }}}}));
        assert_eq!(
            doc["components"]["schemas"]["Level"],
            json!({"type": "string", "enum": ["a", "b"], "default": "a"})
        );
        assert_eq!(stats.defaults_fixed, 1);
    }
}
