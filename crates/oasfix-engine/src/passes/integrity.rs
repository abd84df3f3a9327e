use std::collections::HashSet;

use indexmap::IndexMap;

use super::{Pass, PassContext};
use crate::model::{
    ComponentKind, Components, Document, Header, Parameter, RefOr, RequestBody, Response,
    resolve_in,
};
use crate::options::Canceled;
use crate::schema::Schema;
use crate::traverse::{Resolved, child_pointer, resolve_schema, walk_document_mut};

/// Make every reference resolve.
///
/// Dangling schema references are nulled, dangling parameter and header
/// references dropped, dangling request body and response references
/// replaced with generic ones.
pub struct Integrity;

impl Pass for Integrity {
    fn name(&self) -> &'static str {
        "integrity"
    }

    #[tracing::instrument(skip_all, name = "integrity")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        repair_component_tables(&mut doc.components, cx);
        break_alias_cycles(&mut doc.components, cx);
        repair_schema_references(doc, cx)?;
        repair_operation_references(doc, cx)?;
        Ok(())
    }
}

fn resolves_schema(schemas: &HashSet<String>, reference: &str) -> bool {
    matches!(
        ComponentKind::parse_reference(reference),
        Some((ComponentKind::Schema, name)) if schemas.contains(name)
    )
}

/// Names in `table` whose reference chain does not end in an item.
fn broken_entries<T>(table: &IndexMap<String, RefOr<T>>, kind: ComponentKind) -> Vec<String> {
    table
        .iter()
        .filter(|(_, entry)| resolve_in(table, kind, entry).is_none())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Component tables whose entries are themselves references: drop or
/// replace entries whose chains dangle or loop.
fn repair_component_tables(components: &mut Components, cx: &mut PassContext<'_>) {
    for name in broken_entries(&components.parameters, ComponentKind::Parameter) {
        tracing::warn!(component = %name, "removing unresolvable parameter component");
        components.parameters.shift_remove(&name);
        cx.stats.references_nulled += 1;
    }
    for name in broken_entries(&components.headers, ComponentKind::Header) {
        tracing::warn!(component = %name, "removing unresolvable header component");
        components.headers.shift_remove(&name);
        cx.stats.references_nulled += 1;
    }
    for name in broken_entries(&components.security_schemes, ComponentKind::SecurityScheme) {
        tracing::warn!(component = %name, "removing unresolvable security scheme component");
        components.security_schemes.shift_remove(&name);
        cx.stats.references_nulled += 1;
    }
    for name in broken_entries(&components.request_bodies, ComponentKind::RequestBody) {
        tracing::warn!(component = %name, "replacing unresolvable request body component");
        components
            .request_bodies
            .insert(name, RefOr::Item(RequestBody::generic()));
        cx.stats.references_nulled += 1;
    }
    for name in broken_entries(&components.responses, ComponentKind::Response) {
        tracing::warn!(component = %name, "replacing unresolvable response component");
        components
            .responses
            .insert(name, RefOr::Item(Response::generic("200")));
        cx.stats.references_nulled += 1;
    }
}

/// A component schema that is only a reference and whose chain comes back
/// to itself describes nothing; null it so the cycle is broken.
fn break_alias_cycles(components: &mut Components, cx: &mut PassContext<'_>) {
    for name in components.names(ComponentKind::Schema) {
        let looped = components.schemas.get(&name).is_some_and(|schema| {
            schema.is_reference()
                && matches!(
                    resolve_schema(components, schema, &mut HashSet::new()),
                    Resolved::Cycle(_)
                )
        });
        if looped && let Some(schema) = components.schemas.get_mut(&name) {
            tracing::warn!(schema = %name, "nulling schema reference cycle");
            *schema = Schema::default();
            cx.stats.references_nulled += 1;
        }
    }
}

fn repair_schema_references(
    doc: &mut Document,
    cx: &mut PassContext<'_>,
) -> Result<(), Canceled> {
    let schemas: HashSet<String> = doc.components.schemas.keys().cloned().collect();
    let mut nulled = 0;
    walk_document_mut(doc, cx.cancel, &mut |schema, pointer| {
        if let Some(reference) = schema.reference.as_deref()
            && !resolves_schema(&schemas, reference)
        {
            tracing::warn!(pointer, reference, "nulling unresolvable schema reference");
            *schema = Schema::default();
            nulled += 1;
        }
        if let Some(discriminator) = schema.discriminator.as_mut() {
            let before = discriminator.mapping.len();
            discriminator
                .mapping
                .retain(|_, target| resolves_schema(&schemas, target));
            let removed = before - discriminator.mapping.len();
            if removed > 0 {
                tracing::warn!(pointer, removed, "removed unresolvable discriminator mappings");
                nulled += removed;
            }
        }
    })?;
    cx.stats.references_nulled += nulled;
    Ok(())
}

fn retain_parameters(
    components: &Components,
    parameters: &mut Vec<RefOr<Parameter>>,
    pointer: &str,
) -> usize {
    let before = parameters.len();
    parameters.retain(|p| {
        let keep = components.resolve_parameter(p).is_some();
        if !keep {
            tracing::warn!(
                pointer,
                reference = p.as_reference(),
                "dropping unresolvable parameter"
            );
        }
        keep
    });
    before - parameters.len()
}

fn retain_headers(
    table: &IndexMap<String, RefOr<Header>>,
    headers: &mut IndexMap<String, RefOr<Header>>,
    pointer: &str,
) -> usize {
    let before = headers.len();
    headers.retain(|name, h| {
        let keep = resolve_in(table, ComponentKind::Header, h).is_some();
        if !keep {
            tracing::warn!(pointer, header = %name, "dropping unresolvable header");
        }
        keep
    });
    before - headers.len()
}

fn repair_operation_references(
    doc: &mut Document,
    cx: &mut PassContext<'_>,
) -> Result<(), Canceled> {
    let Document {
        paths, components, ..
    } = doc;
    for (name, response) in &mut components.responses {
        if let RefOr::Item(response) = response {
            let pointer = child_pointer("#/components/responses", name);
            cx.stats.references_nulled +=
                retain_headers(&components.headers, &mut response.headers, &pointer);
        }
    }
    for (path, item) in paths.iter_mut() {
        cx.cancel.checkpoint()?;
        let base = child_pointer("#/paths", path);
        cx.stats.references_nulled += retain_parameters(components, &mut item.parameters, &base);
        for (method, operation) in item.operations_mut() {
            let op = format!("{base}/{method}");
            cx.stats.references_nulled +=
                retain_parameters(components, &mut operation.parameters, &op);
            if let Some(body) = operation.request_body.as_mut()
                && resolve_in(&components.request_bodies, ComponentKind::RequestBody, body)
                    .is_none()
            {
                tracing::warn!(
                    pointer = %op,
                    reference = body.as_reference(),
                    "replacing unresolvable request body"
                );
                *body = RefOr::Item(RequestBody::generic());
                cx.stats.references_nulled += 1;
            }
            for (status, response) in &mut operation.responses {
                let pointer = child_pointer(&format!("{op}/responses"), status);
                cx.stats.references_nulled +=
                    repair_response(components, response, status, &pointer);
            }
        }
    }
    Ok(())
}

fn repair_response(
    components: &Components,
    response: &mut RefOr<Response>,
    status: &str,
    pointer: &str,
) -> usize {
    if let RefOr::Item(item) = response {
        return retain_headers(&components.headers, &mut item.headers, pointer);
    }
    if resolve_in(&components.responses, ComponentKind::Response, response).is_some() {
        return 0;
    }
    tracing::warn!(
        pointer,
        reference = response.as_reference(),
        "replacing unresolvable response"
    );
    *response = RefOr::Item(Response::generic(status));
    1
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::diagnostics::RepairStats;
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
        Integrity.run(&mut doc, &mut cx).expect("not canceled");
        (serde_json::to_value(&doc).expect("serialize"), stats)
    }

    #[test]
    fn dangling_schema_references_are_nulled() {
        let (doc, stats) = run(json!({"components": {"schemas": {
            "Pet": {"type": "object", "properties": {
                "owner": {"$ref": "#/components/schemas/Missing"},
                "tag": {"$ref": "#/components/schemas/Tag"}
            }},
            "Tag": {"type": "string"}
        }}}));
        assert_eq!(doc["components"]["schemas"]["Pet"]["properties"]["owner"], json!({}));
        assert_eq!(
            doc["components"]["schemas"]["Pet"]["properties"]["tag"],
            json!({"$ref": "#/components/schemas/Tag"})
        );
        assert_eq!(stats.references_nulled, 1);
    }

    #[test]
    fn alias_cycles_are_broken() {
        let (doc, _) = run(json!({"components": {"schemas": {
            "A": {"$ref": "#/components/schemas/B"},
            "B": {"$ref": "#/components/schemas/A"}
        }}}));
        assert_eq!(doc["components"]["schemas"]["A"], json!({}));
        assert_eq!(
            doc["components"]["schemas"]["B"],
            json!({"$ref": "#/components/schemas/A"})
        );
    }

    #[test]
    fn dangling_operation_references_are_repaired() {
        let (doc, stats) = run(json!({
            "paths": {"/a": {"post": {
                "parameters": [
                    {"$ref": "#/components/parameters/Gone"},
                    {"$ref": "#/components/parameters/Limit"}
                ],
                "requestBody": {"$ref": "#/components/requestBodies/Gone"},
                "responses": {"201": {"$ref": "#/components/responses/Gone"}}
            }}},
            "components": {"parameters": {"Limit": {"name": "limit", "in": "query"}}}
        }));
        let post = &doc["paths"]["/a"]["post"];
        assert_eq!(
            post["parameters"],
            json!([{"$ref": "#/components/parameters/Limit"}])
        );
        assert_eq!(
            post["requestBody"],
            json!({"content": {"application/json": {"schema": {"type": "object"}}}})
        );
        assert_eq!(post["responses"]["201"]["description"], json!("Success"));
        assert_eq!(stats.references_nulled, 3);
    }

    #[test]
    fn unresolvable_discriminator_mappings_are_removed() {
        let (doc, _) = run(json!({"components": {"schemas": {
            "A": {"type": "object"},
            "U": {
                "oneOf": [{"$ref": "#/components/schemas/A"}],
                "discriminator": {"propertyName": "kind", "mapping": {
                    "a": "#/components/schemas/A",
                    "b": "#/components/schemas/B"
                }}
            }
        }}}));
        assert_eq!(
            doc["components"]["schemas"]["U"]["discriminator"]["mapping"],
            json!({"a": "#/components/schemas/A"})
        );
    }
}
